use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::VatEngineError;
use crate::form201::advance_payments::AdvancePaymentRecord;
use crate::form201::blocked_vat::{self, BlockedVatSummary};
use crate::form201::boxes::{BoxId, Form201Boxes};
use crate::form201::net_position::NetVatPosition;
use crate::types::{
    AdjustmentDelta, AdjustmentSide, BlockedVatEntry, Emirate, GenerationWarning,
    InputExpenseRecord, InputVatCategory, LedgerKind, Money, OutputSupplyRecord,
    OutputVatCategory, TaxPeriod,
};
use crate::VatEngineResult;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One sub-ledger as handed to the aggregator: either its records, or the
/// reason the adapter could not supply them. A single broken adapter must
/// not block generation of the other boxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Fetched<T> {
    Available(Vec<T>),
    Unavailable { detail: String },
}

impl<T> Fetched<T> {
    pub fn empty() -> Self {
        Fetched::Available(Vec::new())
    }

    /// Records to aggregate, degrading a failure to a warning.
    fn records(&self, ledger: LedgerKind, warnings: &mut Vec<GenerationWarning>) -> &[T] {
        match self {
            Fetched::Available(records) => records,
            Fetched::Unavailable { detail } => {
                warnings.push(GenerationWarning::PartialData {
                    ledger,
                    detail: detail.clone(),
                });
                &[]
            }
        }
    }
}

/// Everything the Box Aggregator folds for one period, already mapped into
/// the canonical record schema by the adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationInput {
    pub period: TaxPeriod,
    pub output_supplies: Fetched<OutputSupplyRecord>,
    pub input_expenses: Fetched<InputExpenseRecord>,
    pub advance_payments: Fetched<AdvancePaymentRecord>,
    pub blocked_entries: Fetched<BlockedVatEntry>,
    pub adjustments: Fetched<AdjustmentDelta>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Box-1 contribution of one emirate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmirateBreakdown {
    pub emirate: Emirate,
    pub taxable_amount: Money,
    pub vat_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOutput {
    pub boxes: Form201Boxes,
    pub total_output_vat: Money,
    pub total_input_vat: Money,
    pub net_position: NetVatPosition,
    pub standard_rated_by_emirate: Vec<EmirateBreakdown>,
    pub blocked_vat: BlockedVatSummary,
    pub advance_vat_total: Money,
    pub warnings: Vec<GenerationWarning>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// True for categories whose supplies never carry output VAT, whatever a
/// stray rate or VAT field on the record says.
fn forces_zero_vat(category: OutputVatCategory) -> bool {
    matches!(
        category,
        OutputVatCategory::ZeroRated | OutputVatCategory::Exempt | OutputVatCategory::OutOfScope
    )
}

fn output_box(category: OutputVatCategory) -> BoxId {
    match category {
        OutputVatCategory::StandardRated => BoxId::StandardRatedSupplies,
        OutputVatCategory::ZeroRated => BoxId::ZeroRatedSupplies,
        OutputVatCategory::Exempt => BoxId::ExemptSupplies,
        OutputVatCategory::ReverseCharge => BoxId::ReverseChargeSupplies,
        OutputVatCategory::OutOfScope => BoxId::OutOfScopeSupplies,
        OutputVatCategory::DesignatedZone => BoxId::DesignatedZoneSupplies,
    }
}

fn input_box(category: InputVatCategory) -> BoxId {
    match category {
        InputVatCategory::StandardRated => BoxId::StandardRatedExpenses,
        InputVatCategory::ImportedGoods | InputVatCategory::ReverseCharge => {
            BoxId::ReverseChargeExpenses
        }
    }
}

/// Fold the period's ledgers into the fifteen Form 201 boxes.
///
/// Per-line VAT is summed as recorded at transaction time; it is never
/// re-derived by multiplying a summed base by a nominal rate, since lines
/// may carry different effective rates. Debit/credit notes dated within
/// the period land additively in the matching box before totals are
/// finalized. Blocked entries reach box 15 only.
pub fn aggregate_boxes(input: &AggregationInput) -> VatEngineResult<AggregationOutput> {
    input.period.validate()?;

    let mut warnings: Vec<GenerationWarning> = Vec::new();
    if input.period.filing_deadline.is_none() {
        warnings.push(GenerationWarning::MissingDeadline);
    }

    let mut boxes = Form201Boxes::default();
    let mut by_emirate: BTreeMap<Emirate, (Money, Money)> = BTreeMap::new();

    // Output supplies
    for record in input
        .output_supplies
        .records(LedgerKind::OutputSupplies, &mut warnings)
    {
        let vat = if forces_zero_vat(record.category) {
            Decimal::ZERO
        } else {
            record.vat_amount
        };
        boxes.add(output_box(record.category), record.net_amount, vat);
        if record.category == OutputVatCategory::StandardRated {
            let bucket = by_emirate
                .entry(record.emirate)
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            bucket.0 += record.net_amount;
            bucket.1 += vat;
        }
    }

    // Advance payments: VAT recognized in the period of receipt, reported
    // as a standard-rated supply and disclosed in box 14.
    let mut advance_vat_total = Decimal::ZERO;
    for advance in input
        .advance_payments
        .records(LedgerKind::AdvancePayments, &mut warnings)
    {
        let net = advance.net_amount();
        let vat = advance.vat_amount();
        boxes.add(BoxId::StandardRatedSupplies, net, vat);
        boxes.add(BoxId::AdvancePaymentVat, net, vat);
        advance_vat_total += vat;
        let bucket = by_emirate
            .entry(advance.emirate)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        bucket.0 += net;
        bucket.1 += vat;
    }

    // Input expenses
    for record in input
        .input_expenses
        .records(LedgerKind::InputExpenses, &mut warnings)
    {
        boxes.add(
            input_box(record.category),
            record.net_amount,
            record.recoverable_vat,
        );
    }

    // Debit/credit notes dated in this period
    for note in input
        .adjustments
        .records(LedgerKind::Adjustments, &mut warnings)
    {
        if !input.period.contains(note.note_date) {
            continue;
        }
        apply_adjustment(&mut boxes, note)?;
    }

    // Blocked VAT: disclosure only, never part of box 10
    let blocked_vat = blocked_vat::summarize(
        input
            .blocked_entries
            .records(LedgerKind::BlockedVat, &mut warnings),
    );
    boxes.add(BoxId::BlockedInputVat, Decimal::ZERO, blocked_vat.total);

    boxes.finalize();
    boxes.validate()?;

    Ok(AggregationOutput {
        total_output_vat: boxes.total_output_vat(),
        total_input_vat: boxes.total_input_vat(),
        net_position: NetVatPosition::from_boxes(&boxes),
        standard_rated_by_emirate: by_emirate
            .into_iter()
            .map(|(emirate, (taxable_amount, vat_amount))| EmirateBreakdown {
                emirate,
                taxable_amount,
                vat_amount,
            })
            .collect(),
        blocked_vat,
        advance_vat_total,
        warnings,
        boxes,
    })
}

fn apply_adjustment(boxes: &mut Form201Boxes, note: &AdjustmentDelta) -> VatEngineResult<()> {
    match note.side {
        AdjustmentSide::Output => {
            let category = note.output_category.ok_or_else(|| VatEngineError::Configuration {
                field: "output_category".to_string(),
                reason: format!(
                    "output-side adjustment {} has no category",
                    note.linked_document_id
                ),
            })?;
            let vat = if forces_zero_vat(category) {
                Decimal::ZERO
            } else {
                note.vat_delta
            };
            boxes.add(output_box(category), note.subtotal_delta, vat);
            boxes.add(BoxId::OutputAdjustments, note.subtotal_delta, vat);
        }
        AdjustmentSide::Input => {
            let category = note.input_category.ok_or_else(|| VatEngineError::Configuration {
                field: "input_category".to_string(),
                reason: format!(
                    "input-side adjustment {} has no category",
                    note.linked_document_id
                ),
            })?;
            boxes.add(input_box(category), note.subtotal_delta, note.vat_delta);
            boxes.add(BoxId::InputAdjustments, note.subtotal_delta, note.vat_delta);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
