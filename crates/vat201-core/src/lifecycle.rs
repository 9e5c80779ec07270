use serde::{Deserialize, Serialize};

use crate::error::VatEngineError;
use crate::VatEngineResult;

/// Lifecycle of a VAT return. Transitions are one-directional:
/// `Draft → Generated → Submitted → {Acknowledged, RejectedByAuthority}`,
/// and any state except `Acknowledged` may move to `Cancelled`. A return
/// in `Submitted` or later is immutable; corrections go through an
/// amendment, never an in-place box edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Draft,
    Generated,
    Submitted,
    Acknowledged,
    RejectedByAuthority,
    Cancelled,
}

impl ReturnStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ReturnStatus::Draft => "draft",
            ReturnStatus::Generated => "generated",
            ReturnStatus::Submitted => "submitted",
            ReturnStatus::Acknowledged => "acknowledged",
            ReturnStatus::RejectedByAuthority => "rejected_by_authority",
            ReturnStatus::Cancelled => "cancelled",
        }
    }

    /// Boxes may be recomputed (idempotent overwrite) only before
    /// submission.
    pub fn allows_regeneration(&self) -> bool {
        matches!(self, ReturnStatus::Draft | ReturnStatus::Generated)
    }

    /// A filed return that an amendment can reference.
    pub fn is_filed(&self) -> bool {
        matches!(self, ReturnStatus::Submitted | ReturnStatus::Acknowledged)
    }

    pub fn can_transition(&self, to: ReturnStatus) -> bool {
        use ReturnStatus::*;
        match (self, to) {
            (Draft, Generated) => true,
            (Generated, Submitted) => true,
            (Submitted, Acknowledged) | (Submitted, RejectedByAuthority) => true,
            (Acknowledged, _) => false,
            (from, Cancelled) => *from != Cancelled,
            _ => false,
        }
    }

    pub fn transition(&self, to: ReturnStatus, attempted: &str) -> VatEngineResult<ReturnStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(VatEngineError::StateViolation {
                entity: "VatReturn".to_string(),
                from: self.name().to_string(),
                attempted: attempted.to_string(),
            })
        }
    }
}
