use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{BlockedVatEntry, Money};

/// Why an input-VAT line is non-recoverable.
///
/// Mixed-use lines must arrive pre-split by the caller into a recoverable
/// expense record and a blocked entry; no apportionment happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockedVatCategory {
    Entertainment,
    PersonalUse,
    MotorVehiclePersonal,
    Other(String),
}

impl BlockedVatCategory {
    pub fn label(&self) -> &str {
        match self {
            BlockedVatCategory::Entertainment => "entertainment",
            BlockedVatCategory::PersonalUse => "personal_use",
            BlockedVatCategory::MotorVehiclePersonal => "motor_vehicle_personal",
            BlockedVatCategory::Other(s) => s,
        }
    }
}

/// Per-category disclosure of non-recoverable input VAT. Never included in
/// box 10 or any recoverable total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedVatSummary {
    pub total: Money,
    pub by_category: Vec<BlockedCategoryTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedCategoryTotal {
    pub category: BlockedVatCategory,
    pub blocked_amount: Money,
    pub entry_count: usize,
}

/// Fold blocked entries into a disclosure summary, ordered by category.
pub fn summarize(entries: &[BlockedVatEntry]) -> BlockedVatSummary {
    let mut buckets: std::collections::BTreeMap<BlockedVatCategory, (Money, usize)> =
        std::collections::BTreeMap::new();
    let mut total = Decimal::ZERO;

    for entry in entries {
        total += entry.blocked_amount;
        let bucket = buckets
            .entry(entry.category.clone())
            .or_insert((Decimal::ZERO, 0));
        bucket.0 += entry.blocked_amount;
        bucket.1 += 1;
    }

    BlockedVatSummary {
        total,
        by_category: buckets
            .into_iter()
            .map(|(category, (blocked_amount, entry_count))| BlockedCategoryTotal {
                category,
                blocked_amount,
                entry_count,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(category: BlockedVatCategory, amount: Money) -> BlockedVatEntry {
        BlockedVatEntry {
            category,
            blocked_amount: amount,
            reason: "test".to_string(),
            source_reference: "BILL-1".to_string(),
        }
    }

    #[test]
    fn test_summary_totals_and_buckets() {
        let entries = vec![
            entry(BlockedVatCategory::Entertainment, dec!(120.50)),
            entry(BlockedVatCategory::Entertainment, dec!(79.50)),
            entry(BlockedVatCategory::PersonalUse, dec!(40.00)),
        ];
        let summary = summarize(&entries);

        assert_eq!(summary.total, dec!(240.00));
        assert_eq!(summary.by_category.len(), 2);

        let ent = summary
            .by_category
            .iter()
            .find(|c| c.category == BlockedVatCategory::Entertainment)
            .unwrap();
        assert_eq!(ent.blocked_amount, dec!(200.00));
        assert_eq!(ent.entry_count, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, dec!(0));
        assert!(summary.by_category.is_empty());
    }

    #[test]
    fn test_other_category_keeps_its_label() {
        let entries = vec![entry(
            BlockedVatCategory::Other("staff gifts".to_string()),
            dec!(15),
        )];
        let summary = summarize(&entries);
        assert_eq!(summary.by_category[0].category.label(), "staff gifts");
    }
}
