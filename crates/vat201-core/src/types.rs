use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::VatEngineError;
use crate::VatEngineResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
/// Materialized values carry 2 decimal places.
pub type Money = Decimal;

/// VAT rates expressed as percentages (5 = 5%), up to 4 decimal places.
pub type Rate = Decimal;

/// One of the seven emirates a standard-rated supply is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Emirate {
    AbuDhabi,
    Dubai,
    Sharjah,
    Ajman,
    UmmAlQuwain,
    RasAlKhaimah,
    Fujairah,
}

/// VAT treatment of an output supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputVatCategory {
    StandardRated,
    ZeroRated,
    Exempt,
    OutOfScope,
    ReverseCharge,
    DesignatedZone,
}

/// VAT treatment of an input expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputVatCategory {
    StandardRated,
    ImportedGoods,
    ReverseCharge,
}

/// A tax period with its filing deadline. Immutable once a return
/// references it; periods for the same entity must not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub filing_deadline: Option<NaiveDate>,
}

impl TaxPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate, filing_deadline: Option<NaiveDate>) -> Self {
        TaxPeriod {
            start,
            end,
            filing_deadline,
        }
    }

    /// Returns true if the given date falls within this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if the two periods share at least one day.
    pub fn overlaps(&self, other: &TaxPeriod) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Stable identity used for serialization and conflict reporting.
    pub fn key(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }

    pub fn validate(&self) -> VatEngineResult<()> {
        if self.start > self.end {
            return Err(VatEngineError::Configuration {
                field: "period".to_string(),
                reason: format!("start {} is after end {}", self.start, self.end),
            });
        }
        Ok(())
    }
}

/// A sales/supply line already mapped into the canonical schema by the
/// adapter. `vat_amount` is the VAT computed at transaction time; it is
/// summed as-is, never re-derived from a nominal rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSupplyRecord {
    pub emirate: Emirate,
    pub category: OutputVatCategory,
    pub net_amount: Money,
    pub vat_amount: Money,
    pub invoice_date: NaiveDate,
}

/// A vendor-bill line in the canonical schema. `recoverable_vat` is the
/// recoverable portion only; callers pre-split mixed-use lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputExpenseRecord {
    pub category: InputVatCategory,
    pub net_amount: Money,
    pub recoverable_vat: Money,
    pub bill_date: NaiveDate,
}

/// Non-recoverable input VAT, retained for disclosure only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedVatEntry {
    pub category: crate::form201::blocked_vat::BlockedVatCategory,
    pub blocked_amount: Money,
    pub reason: String,
    pub source_reference: String,
}

/// Which side of the return a debit/credit note adjusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentSide {
    Output,
    Input,
}

/// A debit/credit note delta, applied additively in the period containing
/// `note_date` — never retroactively into a filed period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentDelta {
    pub linked_document_id: String,
    pub side: AdjustmentSide,
    /// Output category the delta lands in; ignored for input-side notes.
    pub output_category: Option<OutputVatCategory>,
    /// Input category the delta lands in; ignored for output-side notes.
    pub input_category: Option<InputVatCategory>,
    pub subtotal_delta: Money,
    pub vat_delta: Money,
    pub note_date: NaiveDate,
}

/// The sub-ledger a warning or fetch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerKind {
    OutputSupplies,
    InputExpenses,
    AdvancePayments,
    BlockedVat,
    Adjustments,
}

impl LedgerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerKind::OutputSupplies => "output_supplies",
            LedgerKind::InputExpenses => "input_expenses",
            LedgerKind::AdvancePayments => "advance_payments",
            LedgerKind::BlockedVat => "blocked_vat",
            LedgerKind::Adjustments => "adjustments",
        }
    }
}

/// Non-fatal conditions recorded during generation. These travel with the
/// computed return; they never abort it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationWarning {
    /// The period has no filing deadline configured.
    MissingDeadline,
    /// A sub-ledger fetch failed; its boxes contribute zero.
    PartialData { ledger: LedgerKind, detail: String },
}

impl std::fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationWarning::MissingDeadline => {
                write!(f, "period has no filing deadline configured")
            }
            GenerationWarning::PartialData { ledger, detail } => {
                write!(f, "partial data: {} unavailable ({})", ledger.name(), detail)
            }
        }
    }
}
