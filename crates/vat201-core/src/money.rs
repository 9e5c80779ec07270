use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::VatEngineError;
use crate::types::{Money, Rate};
use crate::VatEngineResult;

/// Currency scale. Every materialized monetary value carries 2 dp.
pub const MONEY_SCALE: u32 = 2;

/// Rates are percentages with at most 4 dp.
pub const RATE_SCALE: u32 = 4;

/// Round a monetary value at the point it is first materialized into a box
/// or ledger line. Midpoint rounds away from zero. Sums of already-rounded
/// leaves are never re-rounded.
pub fn round_money(value: Decimal) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a rate to its 4 dp scale.
pub fn round_rate(value: Decimal) -> Rate {
    value.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects negative rates, rates that cannot be expressed at 4 dp, and the
/// degenerate -100% divisor before it reaches an extraction.
pub fn validate_rate(rate: Rate) -> VatEngineResult<()> {
    if rate == dec!(-100) {
        return Err(VatEngineError::DivisionByZero {
            context: "VAT-inclusive extraction at rate -100%".to_string(),
        });
    }
    if rate < Decimal::ZERO {
        return Err(VatEngineError::Configuration {
            field: "vat_rate".to_string(),
            reason: format!("rate {rate} is negative"),
        });
    }
    if round_rate(rate) != rate {
        return Err(VatEngineError::Configuration {
            field: "vat_rate".to_string(),
            reason: format!("rate {rate} exceeds {RATE_SCALE} decimal places"),
        });
    }
    Ok(())
}

/// VAT on a net (exclusive) amount: `net * rate/100`, rounded once.
pub fn vat_on_net(net: Money, rate: Rate) -> VatEngineResult<Money> {
    validate_rate(rate)?;
    Ok(round_money(net * rate / dec!(100)))
}

/// VAT contained in a gross (inclusive) amount:
/// `gross * (rate/100) / (1 + rate/100)`, rounded once.
pub fn vat_in_gross(gross: Money, rate: Rate) -> VatEngineResult<Money> {
    validate_rate(rate)?;
    let fraction = rate / dec!(100);
    let divisor = Decimal::ONE + fraction;
    if divisor.is_zero() {
        return Err(VatEngineError::DivisionByZero {
            context: "VAT-inclusive extraction divisor".to_string(),
        });
    }
    Ok(round_money(gross * fraction / divisor))
}
