use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::form201::boxes::Form201Boxes;
use crate::types::Money;

/// Authority-facing label for a net position. Always derived from the sign
/// of `net_vat_due`; never stored separately where it could desync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxPosition {
    NetVatDue,
    VatRefundable,
}

/// The signed net VAT position for a period. Positive (or zero) = payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetVatPosition {
    pub net_vat_due: Money,
}

impl NetVatPosition {
    pub fn from_boxes(boxes: &Form201Boxes) -> Self {
        NetVatPosition {
            net_vat_due: boxes.net_vat_due(),
        }
    }

    pub fn position(&self) -> TaxPosition {
        if self.net_vat_due >= Decimal::ZERO {
            TaxPosition::NetVatDue
        } else {
            TaxPosition::VatRefundable
        }
    }

    /// Magnitude shown next to the label.
    pub fn display_magnitude(&self) -> Money {
        self.net_vat_due.abs()
    }
}
