use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::VatEngineError;
use crate::types::Money;
use crate::VatEngineResult;

// ---------------------------------------------------------------------------
// Box identifiers
// ---------------------------------------------------------------------------

/// The fifteen numbered Form 201 boxes. Boxes 1–6 report output supplies,
/// 8–9 input expenses, 7/10/11 are calculated from the others, and 12–15
/// are disclosure-only (excluded from every total, so the box-7 and box-10
/// identities stay exact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoxId {
    StandardRatedSupplies,
    ZeroRatedSupplies,
    ExemptSupplies,
    ReverseChargeSupplies,
    OutOfScopeSupplies,
    DesignatedZoneSupplies,
    TotalOutputVat,
    StandardRatedExpenses,
    ReverseChargeExpenses,
    TotalRecoverableVat,
    NetVatDue,
    OutputAdjustments,
    InputAdjustments,
    AdvancePaymentVat,
    BlockedInputVat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxKind {
    Output,
    Input,
    Calculated,
    Disclosure,
}

impl BoxId {
    pub const ALL: [BoxId; 15] = [
        BoxId::StandardRatedSupplies,
        BoxId::ZeroRatedSupplies,
        BoxId::ExemptSupplies,
        BoxId::ReverseChargeSupplies,
        BoxId::OutOfScopeSupplies,
        BoxId::DesignatedZoneSupplies,
        BoxId::TotalOutputVat,
        BoxId::StandardRatedExpenses,
        BoxId::ReverseChargeExpenses,
        BoxId::TotalRecoverableVat,
        BoxId::NetVatDue,
        BoxId::OutputAdjustments,
        BoxId::InputAdjustments,
        BoxId::AdvancePaymentVat,
        BoxId::BlockedInputVat,
    ];

    /// The authority-facing box number (1..=15).
    pub fn number(&self) -> u8 {
        match self {
            BoxId::StandardRatedSupplies => 1,
            BoxId::ZeroRatedSupplies => 2,
            BoxId::ExemptSupplies => 3,
            BoxId::ReverseChargeSupplies => 4,
            BoxId::OutOfScopeSupplies => 5,
            BoxId::DesignatedZoneSupplies => 6,
            BoxId::TotalOutputVat => 7,
            BoxId::StandardRatedExpenses => 8,
            BoxId::ReverseChargeExpenses => 9,
            BoxId::TotalRecoverableVat => 10,
            BoxId::NetVatDue => 11,
            BoxId::OutputAdjustments => 12,
            BoxId::InputAdjustments => 13,
            BoxId::AdvancePaymentVat => 14,
            BoxId::BlockedInputVat => 15,
        }
    }

    pub fn kind(&self) -> BoxKind {
        match self.number() {
            1..=6 => BoxKind::Output,
            7 | 10 | 11 => BoxKind::Calculated,
            8 | 9 => BoxKind::Input,
            _ => BoxKind::Disclosure,
        }
    }
}

// ---------------------------------------------------------------------------
// Box values
// ---------------------------------------------------------------------------

/// One reported line: taxable base plus the VAT carried on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxValue {
    pub id: BoxId,
    pub taxable_amount: Money,
    pub vat_amount: Money,
}

impl BoxValue {
    pub fn zero(id: BoxId) -> Self {
        BoxValue {
            id,
            taxable_amount: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
        }
    }
}

/// Which box set the authority expects. Computation always fills all
/// fifteen; the variant controls which are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Form201Variant {
    #[default]
    Standard15,
    Compact11,
}

static ALL_BOXES: [BoxId; 15] = BoxId::ALL;

impl Form201Variant {
    pub fn reported_boxes(&self) -> &'static [BoxId] {
        match self {
            Form201Variant::Standard15 => &ALL_BOXES,
            Form201Variant::Compact11 => &ALL_BOXES[..11],
        }
    }
}

/// The complete fifteen-box snapshot for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form201Boxes {
    values: Vec<BoxValue>,
}

impl Default for Form201Boxes {
    fn default() -> Self {
        Form201Boxes {
            values: BoxId::ALL.iter().map(|id| BoxValue::zero(*id)).collect(),
        }
    }
}

impl Form201Boxes {
    pub fn get(&self, id: BoxId) -> &BoxValue {
        // ALL is ordered by number, so the index is number - 1
        &self.values[(id.number() - 1) as usize]
    }

    pub fn get_mut(&mut self, id: BoxId) -> &mut BoxValue {
        &mut self.values[(id.number() - 1) as usize]
    }

    /// Add a (taxable, VAT) pair into a box. Leaves are already rounded;
    /// sums are never re-rounded.
    pub fn add(&mut self, id: BoxId, taxable: Money, vat: Money) {
        let v = self.get_mut(id);
        v.taxable_amount += taxable;
        v.vat_amount += vat;
    }

    pub fn values(&self) -> &[BoxValue] {
        &self.values
    }

    /// Box 7: total output VAT.
    pub fn total_output_vat(&self) -> Money {
        self.get(BoxId::TotalOutputVat).vat_amount
    }

    /// Box 10: total recoverable input VAT.
    pub fn total_input_vat(&self) -> Money {
        self.get(BoxId::TotalRecoverableVat).vat_amount
    }

    /// Box 11: signed net VAT position. Positive = payable.
    pub fn net_vat_due(&self) -> Money {
        self.get(BoxId::NetVatDue).vat_amount
    }

    /// Recompute boxes 7, 10 and 11 from the leaf boxes. Called once after
    /// aggregation; calling again is a no-op on unchanged leaves.
    pub fn finalize(&mut self) {
        let output_boxes = [
            BoxId::StandardRatedSupplies,
            BoxId::ZeroRatedSupplies,
            BoxId::ExemptSupplies,
            BoxId::ReverseChargeSupplies,
            BoxId::OutOfScopeSupplies,
            BoxId::DesignatedZoneSupplies,
        ];
        let mut out_taxable = Decimal::ZERO;
        let mut out_vat = Decimal::ZERO;
        for id in output_boxes {
            let v = self.get(id);
            out_taxable += v.taxable_amount;
            out_vat += v.vat_amount;
        }
        *self.get_mut(BoxId::TotalOutputVat) = BoxValue {
            id: BoxId::TotalOutputVat,
            taxable_amount: out_taxable,
            vat_amount: out_vat,
        };

        let b8 = *self.get(BoxId::StandardRatedExpenses);
        let b9 = *self.get(BoxId::ReverseChargeExpenses);
        *self.get_mut(BoxId::TotalRecoverableVat) = BoxValue {
            id: BoxId::TotalRecoverableVat,
            taxable_amount: b8.taxable_amount + b9.taxable_amount,
            vat_amount: b8.vat_amount + b9.vat_amount,
        };

        let net = self.total_output_vat() - self.total_input_vat();
        *self.get_mut(BoxId::NetVatDue) = BoxValue {
            id: BoxId::NetVatDue,
            taxable_amount: Decimal::ZERO,
            vat_amount: net,
        };
    }

    /// Internal consistency check. A failure here is an engine bug, not a
    /// user-facing warning: it aborts submission.
    pub fn validate(&self) -> VatEngineResult<()> {
        let output_vat_sum: Money = BoxId::ALL[..6]
            .iter()
            .map(|id| self.get(*id).vat_amount)
            .sum();
        if self.total_output_vat() != output_vat_sum {
            return Err(VatEngineError::Validation(format!(
                "box 7 ({}) != sum of output VAT boxes ({})",
                self.total_output_vat(),
                output_vat_sum
            )));
        }

        let input_vat_sum = self.get(BoxId::StandardRatedExpenses).vat_amount
            + self.get(BoxId::ReverseChargeExpenses).vat_amount;
        if self.total_input_vat() != input_vat_sum {
            return Err(VatEngineError::Validation(format!(
                "box 10 ({}) != sum of input VAT boxes ({})",
                self.total_input_vat(),
                input_vat_sum
            )));
        }

        let net = self.total_output_vat() - self.total_input_vat();
        if self.net_vat_due() != net {
            return Err(VatEngineError::Validation(format!(
                "box 11 ({}) != box 7 - box 10 ({})",
                self.net_vat_due(),
                net
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
