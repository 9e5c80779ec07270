pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod types;

pub mod form201;

#[cfg(feature = "amendments")]
pub mod amendment;

pub mod engine;

pub use error::VatEngineError;
pub use types::*;

/// Standard result type for all VAT engine operations
pub type VatEngineResult<T> = Result<T, VatEngineError>;
