use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::round_money;
use crate::types::Money;

// Administrative penalty: flat 20% of the unpaid difference.
const ADMINISTRATIVE_RATE: Decimal = dec!(0.20);
// Late payment: 1% per full or partial month, capped at 300% of the
// unpaid difference. Follows the stated FTA rule; confirm against the
// statute before production use.
const LATE_MONTHLY_RATE: Decimal = dec!(0.01);
const LATE_CAP_RATE: Decimal = dec!(3);

/// Penalty attached to an amendment, split into its components so the cap
/// is auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub administrative: Money,
    pub late_payment: Money,
    pub months_late: u32,
    pub late_payment_capped: bool,
    pub total: Money,
}

impl PenaltyBreakdown {
    pub fn zero() -> Self {
        PenaltyBreakdown {
            administrative: Decimal::ZERO,
            late_payment: Decimal::ZERO,
            months_late: 0,
            late_payment_capped: false,
            total: Decimal::ZERO,
        }
    }
}

/// Full or partial months from the filing deadline to the disclosure date.
/// Anything past the deadline counts at least one month.
pub fn months_late(deadline: NaiveDate, disclosure: NaiveDate) -> u32 {
    if disclosure <= deadline {
        return 0;
    }
    let raw = (disclosure.year() - deadline.year()) * 12 + disclosure.month() as i32
        - deadline.month() as i32;
    let mut n = raw.max(1) as u32;
    while deadline + Months::new(n) < disclosure {
        n += 1;
    }
    while n > 1 && deadline + Months::new(n - 1) >= disclosure {
        n -= 1;
    }
    n
}

/// Penalty on an unpaid VAT difference disclosed after the deadline.
/// No penalty applies when the correction is in the taxpayer's favor
/// (`difference_vat <= 0`).
pub fn calculate_penalty(
    difference_vat: Money,
    deadline: NaiveDate,
    disclosure: NaiveDate,
) -> PenaltyBreakdown {
    if difference_vat <= Decimal::ZERO {
        return PenaltyBreakdown::zero();
    }

    let administrative = round_money(difference_vat * ADMINISTRATIVE_RATE);

    let months = months_late(deadline, disclosure);
    let uncapped = round_money(difference_vat * LATE_MONTHLY_RATE * Decimal::from(months));
    let cap = round_money(difference_vat * LATE_CAP_RATE);
    let (late_payment, late_payment_capped) = if uncapped > cap {
        (cap, true)
    } else {
        (uncapped, false)
    };

    PenaltyBreakdown {
        administrative,
        late_payment,
        months_late: months,
        late_payment_capped,
        total: administrative + late_payment,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
