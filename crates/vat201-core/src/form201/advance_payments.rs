use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::VatEngineError;
use crate::money::{round_money, vat_in_gross, vat_on_net};
use crate::types::{Emirate, Money, Rate};
use crate::VatEngineResult;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// VAT due on a deposit at the moment of receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceVatBreakdown {
    pub vat_amount: Money,
    pub total_received: Money,
}

/// Compute the VAT on an advance payment. Inclusive: the VAT is inside the
/// amount received. Exclusive: the VAT is added on top.
pub fn extract_advance_vat(
    amount: Money,
    rate: Rate,
    is_vat_inclusive: bool,
) -> VatEngineResult<AdvanceVatBreakdown> {
    if amount < Decimal::ZERO {
        return Err(VatEngineError::Configuration {
            field: "amount".to_string(),
            reason: "advance amount must not be negative".to_string(),
        });
    }
    if is_vat_inclusive {
        let vat_amount = vat_in_gross(amount, rate)?;
        Ok(AdvanceVatBreakdown {
            vat_amount,
            total_received: round_money(amount),
        })
    } else {
        let vat_amount = vat_on_net(amount, rate)?;
        Ok(AdvanceVatBreakdown {
            vat_amount,
            total_received: round_money(amount) + vat_amount,
        })
    }
}

// ---------------------------------------------------------------------------
// Receipt record with cross-period application tracking
// ---------------------------------------------------------------------------

/// An advance payment as received. The VAT is computed once, at receipt,
/// and recognized in the period containing `payment_date`. Applying the
/// advance to an invoice later never recomputes it; instead the invoicing
/// flow subtracts the returned `invoice_vat_offset` from the invoice's own
/// VAT so the same money is not taxed twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancePaymentRecord {
    pub id: String,
    pub emirate: Emirate,
    pub amount_received: Money,
    pub vat_rate: Rate,
    pub is_vat_inclusive: bool,
    pub payment_date: NaiveDate,
    vat_amount: Money,
    total_received: Money,
    amount_applied: Money,
    vat_offset_claimed: Money,
}

/// The result of applying part of an advance to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceApplication {
    pub applied: Money,
    /// Share of the already-recognized VAT the invoice must deduct.
    pub invoice_vat_offset: Money,
}

impl AdvancePaymentRecord {
    pub fn receive(
        id: impl Into<String>,
        emirate: Emirate,
        amount: Money,
        vat_rate: Rate,
        is_vat_inclusive: bool,
        payment_date: NaiveDate,
    ) -> VatEngineResult<Self> {
        let breakdown = extract_advance_vat(amount, vat_rate, is_vat_inclusive)?;
        Ok(AdvancePaymentRecord {
            id: id.into(),
            emirate,
            amount_received: amount,
            vat_rate,
            is_vat_inclusive,
            payment_date,
            vat_amount: breakdown.vat_amount,
            total_received: breakdown.total_received,
            amount_applied: Decimal::ZERO,
            vat_offset_claimed: Decimal::ZERO,
        })
    }

    /// VAT recognized at receipt. Never changes after construction.
    pub fn vat_amount(&self) -> Money {
        self.vat_amount
    }

    pub fn total_received(&self) -> Money {
        self.total_received
    }

    /// Taxable base reported alongside the VAT in the receipt period.
    pub fn net_amount(&self) -> Money {
        self.total_received - self.vat_amount
    }

    /// Gross amount already applied to invoices.
    pub fn amount_applied(&self) -> Money {
        self.amount_applied
    }

    /// Gross amount still available for application.
    pub fn unapplied_amount(&self) -> Money {
        self.total_received - self.amount_applied
    }

    /// VAT offset already handed to invoices.
    pub fn vat_offset_claimed(&self) -> Money {
        self.vat_offset_claimed
    }

    /// Apply part of the advance to an invoice. The offset is the
    /// proportional share of the receipt-time VAT; the final application
    /// takes whatever remains so the offsets sum exactly to `vat_amount`.
    pub fn apply_to_invoice(&mut self, amount: Money) -> VatEngineResult<AdvanceApplication> {
        if amount <= Decimal::ZERO {
            return Err(VatEngineError::Configuration {
                field: "amount".to_string(),
                reason: "application amount must be positive".to_string(),
            });
        }
        if amount > self.unapplied_amount() {
            return Err(VatEngineError::Configuration {
                field: "amount".to_string(),
                reason: format!(
                    "application {} exceeds unapplied advance {}",
                    amount,
                    self.unapplied_amount()
                ),
            });
        }

        self.amount_applied += amount;
        let invoice_vat_offset = if self.unapplied_amount().is_zero() {
            self.vat_amount - self.vat_offset_claimed
        } else {
            round_money(self.vat_amount * amount / self.total_received)
        };
        self.vat_offset_claimed += invoice_vat_offset;

        Ok(AdvanceApplication {
            applied: amount,
            invoice_vat_offset,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
