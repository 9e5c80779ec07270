use thiserror::Error;

use crate::form201::advance_payments::AdvancePaymentRecord;
use crate::types::{
    AdjustmentDelta, BlockedVatEntry, InputExpenseRecord, OutputSupplyRecord, TaxPeriod,
};

/// An adapter failed to produce its records. The engine degrades this to a
/// partial-data warning on the affected boxes; it never aborts generation.
#[derive(Debug, Clone, Error)]
#[error("ledger fetch failed: {0}")]
pub struct LedgerError(pub String);

pub type LedgerFetch<T> = Result<Vec<T>, LedgerError>;

/// The source ledgers a return is computed from. Each read is parameterized
/// by the period bounds, is side-effect free, and is independent of the
/// others; implementations map whatever shape their backend uses into the
/// canonical records before returning.
pub trait LedgerSource {
    fn output_supplies(&self, period: &TaxPeriod) -> LedgerFetch<OutputSupplyRecord>;
    fn input_expenses(&self, period: &TaxPeriod) -> LedgerFetch<InputExpenseRecord>;
    fn advance_payments(&self, period: &TaxPeriod) -> LedgerFetch<AdvancePaymentRecord>;
    fn blocked_vat_entries(&self, period: &TaxPeriod) -> LedgerFetch<BlockedVatEntry>;
    fn adjustments(&self, period: &TaxPeriod) -> LedgerFetch<AdjustmentDelta>;
}

/// Issues the human-readable numbers stamped on returns and amendments.
pub trait SequenceNumberSource {
    fn next_return_number(&self) -> String;
    fn next_amendment_number(&self) -> String;
}
