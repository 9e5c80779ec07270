mod common;

use std::sync::{Arc, Barrier};

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use common::{d, expense, q1_2026, standard_ledger, supply, CountingSequences, FixtureLedger};
use vat201_core::engine::{EngineConfig, VatReturnEngine};
use vat201_core::form201::blocked_vat::BlockedVatCategory;
use vat201_core::form201::{BoxId, Form201Variant, TaxPosition};
use vat201_core::lifecycle::ReturnStatus;
use vat201_core::types::{
    AdjustmentDelta, AdjustmentSide, BlockedVatEntry, Emirate, GenerationWarning,
    InputVatCategory, LedgerKind, OutputVatCategory, TaxPeriod,
};
use vat201_core::VatEngineError;

fn engine(ledger: FixtureLedger) -> VatReturnEngine<FixtureLedger, CountingSequences> {
    VatReturnEngine::new(ledger, CountingSequences::default(), EngineConfig::default())
}

// ===========================================================================
// Generation
// ===========================================================================

#[test]
fn test_generate_standard_quarter() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();

    assert_eq!(ret.status, ReturnStatus::Generated);
    assert_eq!(ret.number, "VAT201-0001");
    assert_eq!(ret.boxes.get(BoxId::StandardRatedSupplies).taxable_amount, dec!(200_000));
    assert_eq!(ret.total_output_vat, dec!(10_000));
    assert_eq!(ret.total_input_vat, dec!(2_000));
    assert_eq!(ret.net_vat_due, dec!(8_000));
    assert_eq!(ret.net_position().position(), TaxPosition::NetVatDue);
    assert!(ret.warnings.is_empty());
    assert!(ret.generated_at.is_some());

    // per-emirate breakdown of box 1
    assert_eq!(ret.standard_rated_by_emirate.len(), 2);
    let dubai = ret
        .standard_rated_by_emirate
        .iter()
        .find(|b| b.emirate == Emirate::Dubai)
        .unwrap();
    assert_eq!(dubai.vat_amount, dec!(6_000));
}

#[test]
fn test_generate_is_idempotent() {
    let engine = engine(standard_ledger());
    let first = engine.generate(&q1_2026()).unwrap();
    let second = engine.generate(&q1_2026()).unwrap();

    // Same return, identical box values both times — overwritten, not
    // accumulated.
    assert_eq!(first.id, second.id);
    assert_eq!(first.boxes, second.boxes);
    assert_eq!(first.total_output_vat, second.total_output_vat);
    assert_eq!(first.net_vat_due, second.net_vat_due);
}

#[test]
fn test_generate_refundable_quarter() {
    let mut ledger = FixtureLedger::default();
    ledger.expenses = vec![expense(
        InputVatCategory::StandardRated,
        dec!(100_000),
        dec!(5_000),
        d(2026, 2, 1),
    )];
    let engine = engine(ledger);
    let ret = engine.generate(&q1_2026()).unwrap();

    assert_eq!(ret.net_vat_due, dec!(-5_000));
    assert_eq!(ret.net_position().position(), TaxPosition::VatRefundable);
    assert_eq!(ret.net_position().display_magnitude(), dec!(5_000));
}

#[test]
fn test_generate_with_blocked_vat_disclosure() {
    let mut ledger = standard_ledger();
    ledger.blocked = vec![BlockedVatEntry {
        category: BlockedVatCategory::Entertainment,
        blocked_amount: dec!(750),
        reason: "client dinners".to_string(),
        source_reference: "BILL-17".to_string(),
    }];
    let engine = engine(ledger);
    let ret = engine.generate(&q1_2026()).unwrap();

    // Disclosure only: recoverable total unchanged
    assert_eq!(ret.total_input_vat, dec!(2_000));
    assert_eq!(ret.boxes.get(BoxId::BlockedInputVat).vat_amount, dec!(750));
    assert_eq!(ret.blocked_vat.total, dec!(750));

    let summary = engine.blocked_summary(ret.id).unwrap();
    assert_eq!(summary.by_category.len(), 1);
}

#[test]
fn test_partial_data_names_failed_ledger() {
    let mut ledger = standard_ledger();
    ledger.fail_expenses = true;
    let engine = engine(ledger);
    let ret = engine.generate(&q1_2026()).unwrap();

    // Output side unaffected, failed side zero
    assert_eq!(ret.total_output_vat, dec!(10_000));
    assert_eq!(ret.total_input_vat, dec!(0));
    assert!(ret.warnings.iter().any(|w| matches!(
        w,
        GenerationWarning::PartialData {
            ledger: LedgerKind::InputExpenses,
            ..
        }
    )));
}

#[test]
fn test_missing_deadline_warning() {
    let engine = engine(standard_ledger());
    let period = TaxPeriod::new(d(2026, 1, 1), d(2026, 3, 31), None);
    let ret = engine.generate(&period).unwrap();
    assert!(ret.warnings.contains(&GenerationWarning::MissingDeadline));
}

#[test]
fn test_overlapping_period_rejected() {
    let engine = engine(standard_ledger());
    engine.generate(&q1_2026()).unwrap();

    let straddle = TaxPeriod::new(d(2026, 3, 1), d(2026, 5, 31), Some(d(2026, 6, 28)));
    match engine.generate(&straddle) {
        Err(VatEngineError::Configuration { field, .. }) => assert_eq!(field, "period"),
        other => panic!("Expected Configuration error, got {:?}", other),
    }

    // An adjacent period is fine
    let q2 = TaxPeriod::new(d(2026, 4, 1), d(2026, 6, 30), Some(d(2026, 7, 28)));
    engine.generate(&q2).unwrap();
}

#[test]
fn test_failed_generation_leaves_no_draft_shell() {
    let mut ledger = standard_ledger();
    // Output-side note with no category: aggregation fails
    ledger.adjustments.push(AdjustmentDelta {
        linked_document_id: "CN-77".to_string(),
        side: AdjustmentSide::Output,
        output_category: None,
        input_category: None,
        subtotal_delta: dec!(-1_000),
        vat_delta: dec!(-50),
        note_date: d(2026, 2, 1),
    });
    let engine = engine(ledger);

    assert!(matches!(
        engine.generate(&q1_2026()),
        Err(VatEngineError::Configuration { .. })
    ));

    // The reserved draft is taken back out; the period reads as unclaimed.
    assert!(engine.return_for_period(&q1_2026()).unwrap().is_none());
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[test]
fn test_submit_then_generate_is_state_violation() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();
    let submitted = engine.submit(ret.id).unwrap();
    assert_eq!(submitted.status, ReturnStatus::Submitted);
    assert!(submitted.submitted_at.is_some());

    match engine.generate(&q1_2026()) {
        Err(VatEngineError::StateViolation { from, attempted, .. }) => {
            assert_eq!(from, "submitted");
            assert_eq!(attempted, "generate");
        }
        other => panic!("Expected StateViolation, got {:?}", other),
    }

    // Stored boxes unchanged after the rejected call
    let stored = engine.get_return(ret.id).unwrap();
    assert_eq!(stored.boxes, submitted.boxes);
    assert_eq!(stored.status, ReturnStatus::Submitted);
}

#[test]
fn test_acknowledge_and_reference() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();
    engine.submit(ret.id).unwrap();
    let acked = engine.acknowledge(ret.id, "FTA-ACK-991").unwrap();

    assert_eq!(acked.status, ReturnStatus::Acknowledged);
    assert_eq!(acked.acknowledgment_reference.as_deref(), Some("FTA-ACK-991"));

    // Acknowledged is terminal: cancel is rejected
    assert!(matches!(
        engine.cancel(ret.id),
        Err(VatEngineError::StateViolation { .. })
    ));
}

#[test]
fn test_submit_requires_generated() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();
    engine.submit(ret.id).unwrap();
    // Double submission is a state violation
    assert!(matches!(
        engine.submit(ret.id),
        Err(VatEngineError::StateViolation { .. })
    ));
}

#[test]
fn test_cancelled_period_can_be_regenerated_fresh() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();
    engine.cancel(ret.id).unwrap();

    let fresh = engine.generate(&q1_2026()).unwrap();
    assert_ne!(fresh.id, ret.id);
    assert_eq!(fresh.status, ReturnStatus::Generated);
    assert_eq!(
        engine.return_for_period(&q1_2026()).unwrap().unwrap().id,
        fresh.id
    );
}

#[test]
fn test_rejected_by_authority_path() {
    let engine = engine(standard_ledger());
    let ret = engine.generate(&q1_2026()).unwrap();
    engine.submit(ret.id).unwrap();
    let rejected = engine.reject_by_authority(ret.id).unwrap();
    assert_eq!(rejected.status, ReturnStatus::RejectedByAuthority);
    // Still immutable: no regeneration after filing
    assert!(matches!(
        engine.generate(&q1_2026()),
        Err(VatEngineError::StateViolation { .. })
    ));
}

// ===========================================================================
// Variants and invariants
// ===========================================================================

#[test]
fn test_compact_variant_reports_eleven_boxes() {
    let engine = VatReturnEngine::new(
        standard_ledger(),
        CountingSequences::default(),
        EngineConfig {
            variant: Form201Variant::Compact11,
        },
    );
    let ret = engine.generate(&q1_2026()).unwrap();
    let reported = ret.reported_boxes();
    assert_eq!(reported.len(), 11);
    assert_eq!(reported.last().unwrap().id, BoxId::NetVatDue);
}

#[test]
fn test_box_identities_hold_end_to_end() {
    let mut ledger = standard_ledger();
    ledger.supplies.push(supply(
        Emirate::Sharjah,
        OutputVatCategory::ZeroRated,
        dec!(55_000),
        dec!(0),
        d(2026, 1, 5),
    ));
    ledger.supplies.push(supply(
        Emirate::Dubai,
        OutputVatCategory::ReverseCharge,
        dec!(10_000),
        dec!(500),
        d(2026, 2, 2),
    ));
    let engine = engine(ledger);
    let ret = engine.generate(&q1_2026()).unwrap();

    let output_sum: rust_decimal::Decimal = BoxId::ALL[..6]
        .iter()
        .map(|id| ret.boxes.get(*id).vat_amount)
        .sum();
    assert_eq!(ret.total_output_vat, output_sum);
    assert_eq!(ret.net_vat_due, ret.total_output_vat - ret.total_input_vat);
    ret.boxes.validate().unwrap();
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[test]
fn test_concurrent_generate_conflicts_cleanly() {
    let barrier = Arc::new(Barrier::new(2));
    let mut ledger = standard_ledger();
    ledger.barrier = Some(barrier);
    let engine = Arc::new(engine(ledger));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.generate(&q1_2026()))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(VatEngineError::Conflict { .. })))
        .count();

    // Exactly one writer wins; the loser fails with a conflict, it never
    // interleaves a partial write.
    assert_eq!(ok_count, 1);
    assert_eq!(conflicts, 1);

    let stored = engine.return_for_period(&q1_2026()).unwrap().unwrap();
    assert_eq!(stored.total_output_vat, dec!(10_000));
    stored.boxes.validate().unwrap();
}
