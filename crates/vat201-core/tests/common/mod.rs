#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use vat201_core::form201::advance_payments::AdvancePaymentRecord;
use vat201_core::ledger::{LedgerError, LedgerFetch, LedgerSource, SequenceNumberSource};
use vat201_core::types::{
    AdjustmentDelta, BlockedVatEntry, Emirate, InputExpenseRecord, InputVatCategory,
    OutputSupplyRecord, OutputVatCategory, TaxPeriod,
};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn q1_2026() -> TaxPeriod {
    TaxPeriod::new(d(2026, 1, 1), d(2026, 3, 31), Some(d(2026, 4, 28)))
}

/// In-memory ledger double. Records are filtered by the requested period,
/// as a real adapter would filter its backend query.
#[derive(Default)]
pub struct FixtureLedger {
    pub supplies: Vec<OutputSupplyRecord>,
    pub expenses: Vec<InputExpenseRecord>,
    pub advances: Vec<AdvancePaymentRecord>,
    pub blocked: Vec<BlockedVatEntry>,
    pub adjustments: Vec<AdjustmentDelta>,
    /// Simulate a broken input-expense adapter.
    pub fail_expenses: bool,
    /// When set, the first fetch of each generate call rendezvouses here,
    /// forcing two concurrent generates to overlap.
    pub barrier: Option<Arc<Barrier>>,
}

impl LedgerSource for FixtureLedger {
    fn output_supplies(&self, period: &TaxPeriod) -> LedgerFetch<OutputSupplyRecord> {
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        Ok(self
            .supplies
            .iter()
            .filter(|r| period.contains(r.invoice_date))
            .cloned()
            .collect())
    }

    fn input_expenses(&self, period: &TaxPeriod) -> LedgerFetch<InputExpenseRecord> {
        if self.fail_expenses {
            return Err(LedgerError("expense adapter unreachable".to_string()));
        }
        Ok(self
            .expenses
            .iter()
            .filter(|r| period.contains(r.bill_date))
            .cloned()
            .collect())
    }

    fn advance_payments(&self, period: &TaxPeriod) -> LedgerFetch<AdvancePaymentRecord> {
        Ok(self
            .advances
            .iter()
            .filter(|r| period.contains(r.payment_date))
            .cloned()
            .collect())
    }

    fn blocked_vat_entries(&self, _period: &TaxPeriod) -> LedgerFetch<BlockedVatEntry> {
        Ok(self.blocked.clone())
    }

    fn adjustments(&self, period: &TaxPeriod) -> LedgerFetch<AdjustmentDelta> {
        Ok(self
            .adjustments
            .iter()
            .filter(|r| period.contains(r.note_date))
            .cloned()
            .collect())
    }
}

/// Monotonic human-readable numbers.
#[derive(Default)]
pub struct CountingSequences {
    returns: AtomicU64,
    amendments: AtomicU64,
}

impl SequenceNumberSource for CountingSequences {
    fn next_return_number(&self) -> String {
        let n = self.returns.fetch_add(1, Ordering::SeqCst) + 1;
        format!("VAT201-{n:04}")
    }

    fn next_amendment_number(&self) -> String {
        let n = self.amendments.fetch_add(1, Ordering::SeqCst) + 1;
        format!("VD-{n:04}")
    }
}

pub fn supply(
    emirate: Emirate,
    category: OutputVatCategory,
    net: rust_decimal::Decimal,
    vat: rust_decimal::Decimal,
    date: NaiveDate,
) -> OutputSupplyRecord {
    OutputSupplyRecord {
        emirate,
        category,
        net_amount: net,
        vat_amount: vat,
        invoice_date: date,
    }
}

pub fn expense(
    category: InputVatCategory,
    net: rust_decimal::Decimal,
    vat: rust_decimal::Decimal,
    date: NaiveDate,
) -> InputExpenseRecord {
    InputExpenseRecord {
        category,
        net_amount: net,
        recoverable_vat: vat,
        bill_date: date,
    }
}

/// A ledger population whose correct Q1 2026 return is:
/// box 1 = 200,000 / 10,000; box 8 = 40,000 / 2,000; net due 8,000.
pub fn standard_ledger() -> FixtureLedger {
    FixtureLedger {
        supplies: vec![
            supply(
                Emirate::Dubai,
                OutputVatCategory::StandardRated,
                dec!(120_000),
                dec!(6_000),
                d(2026, 1, 20),
            ),
            supply(
                Emirate::AbuDhabi,
                OutputVatCategory::StandardRated,
                dec!(80_000),
                dec!(4_000),
                d(2026, 2, 14),
            ),
            // outside the period, must be ignored
            supply(
                Emirate::Dubai,
                OutputVatCategory::StandardRated,
                dec!(999_999),
                dec!(49_999.95),
                d(2025, 12, 30),
            ),
        ],
        expenses: vec![expense(
            InputVatCategory::StandardRated,
            dec!(40_000),
            dec!(2_000),
            d(2026, 3, 2),
        )],
        ..FixtureLedger::default()
    }
}
