pub mod penalty;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::VatEngineError;
use crate::form201::boxes::Form201Boxes;
use crate::types::Money;
use crate::VatEngineResult;

pub use penalty::{calculate_penalty, PenaltyBreakdown};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the correction reached the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentType {
    VoluntaryDisclosure,
    AuthorityAssessment,
    AuditFinding,
}

/// What kind of error the correction fixes. Informational metadata derived
/// from which boxes moved; the penalty formula does not read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    OutputUnderReported,
    OutputOverReported,
    InputOverClaimed,
    InputUnderClaimed,
    CalculationError,
    Mixed,
}

/// Lifecycle of an amendment: `Draft → Submitted → {Approved, Rejected}`;
/// `Draft → Cancelled`. Only a draft may be edited or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

impl AmendmentStatus {
    pub fn name(&self) -> &'static str {
        match self {
            AmendmentStatus::Draft => "draft",
            AmendmentStatus::Submitted => "submitted",
            AmendmentStatus::Approved => "approved",
            AmendmentStatus::Rejected => "rejected",
            AmendmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, AmendmentStatus::Draft)
    }

    pub fn can_transition(&self, to: AmendmentStatus) -> bool {
        use AmendmentStatus::*;
        matches!(
            (self, to),
            (Draft, Submitted) | (Draft, Cancelled) | (Submitted, Approved) | (Submitted, Rejected)
        )
    }

    pub fn transition(
        &self,
        to: AmendmentStatus,
        attempted: &str,
    ) -> VatEngineResult<AmendmentStatus> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(VatEngineError::StateViolation {
                entity: "VatAmendment".to_string(),
                from: self.name().to_string(),
                attempted: attempted.to_string(),
            })
        }
    }
}

/// A correction to a filed return. References the original by id and never
/// mutates its stored box values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatAmendment {
    pub id: u64,
    pub number: String,
    pub original_return_id: u64,
    pub amendment_type: AmendmentType,
    pub error_category: ErrorCategory,
    pub original_taxable_amount: Money,
    pub corrected_taxable_amount: Money,
    pub difference_amount: Money,
    /// Corrected net VAT minus original net VAT. Positive = under-paid.
    pub difference_vat: Money,
    pub estimated_penalty: Money,
    pub penalty: PenaltyBreakdown,
    pub corrected_boxes: Form201Boxes,
    pub discovery_date: NaiveDate,
    pub status: AmendmentStatus,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Derive the error category from which side of the return moved.
pub fn classify(original: &Form201Boxes, corrected: &Form201Boxes) -> ErrorCategory {
    let output_delta = corrected.total_output_vat() - original.total_output_vat();
    let input_delta = corrected.total_input_vat() - original.total_input_vat();

    match (output_delta.is_zero(), input_delta.is_zero()) {
        (false, false) => ErrorCategory::Mixed,
        (false, true) => {
            if output_delta > rust_decimal::Decimal::ZERO {
                ErrorCategory::OutputUnderReported
            } else {
                ErrorCategory::OutputOverReported
            }
        }
        (true, false) => {
            if input_delta < rust_decimal::Decimal::ZERO {
                ErrorCategory::InputOverClaimed
            } else {
                ErrorCategory::InputUnderClaimed
            }
        }
        // Neither leaf total moved; whatever differed was in the derived
        // figures themselves.
        (true, true) => ErrorCategory::CalculationError,
    }
}

/// Total taxable base reported on a return (output plus input sides).
pub fn reported_taxable_amount(boxes: &Form201Boxes) -> Money {
    boxes
        .get(crate::form201::boxes::BoxId::TotalOutputVat)
        .taxable_amount
        + boxes
            .get(crate::form201::boxes::BoxId::TotalRecoverableVat)
            .taxable_amount
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
