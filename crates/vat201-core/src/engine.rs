use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::VatEngineError;
use crate::form201::aggregator::{aggregate_boxes, AggregationInput, EmirateBreakdown, Fetched};
use crate::form201::blocked_vat::BlockedVatSummary;
use crate::form201::boxes::{BoxValue, Form201Boxes, Form201Variant};
use crate::form201::net_position::NetVatPosition;
use crate::ledger::{LedgerFetch, LedgerSource, SequenceNumberSource};
use crate::lifecycle::ReturnStatus;
use crate::types::{GenerationWarning, Money, TaxPeriod};
use crate::VatEngineResult;

#[cfg(feature = "amendments")]
use crate::amendment::{
    calculate_penalty, classify, reported_taxable_amount, AmendmentStatus, AmendmentType,
    ErrorCategory, PenaltyBreakdown, VatAmendment,
};
#[cfg(feature = "amendments")]
use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Return snapshot
// ---------------------------------------------------------------------------

/// A Form 201 snapshot for one period. Created by `generate`, mutated only
/// through lifecycle transitions, never silently recomputed once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatReturn {
    pub id: u64,
    pub number: String,
    pub period: TaxPeriod,
    pub status: ReturnStatus,
    pub variant: Form201Variant,
    pub boxes: Form201Boxes,
    pub total_output_vat: Money,
    pub total_input_vat: Money,
    /// Signed: positive = payable, negative = refundable. The sign is the
    /// single source of truth for the label.
    pub net_vat_due: Money,
    pub standard_rated_by_emirate: Vec<EmirateBreakdown>,
    pub blocked_vat: BlockedVatSummary,
    pub advance_vat_total: Money,
    pub warnings: Vec<GenerationWarning>,
    pub generated_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub acknowledgment_reference: Option<String>,
    /// Bumped on every committed regeneration; concurrent generators that
    /// snapshotted an older version lose with a conflict.
    version: u64,
}

impl VatReturn {
    pub fn net_position(&self) -> NetVatPosition {
        NetVatPosition {
            net_vat_due: self.net_vat_due,
        }
    }

    /// The boxes the configured form variant reports.
    pub fn reported_boxes(&self) -> Vec<BoxValue> {
        self.variant
            .reported_boxes()
            .iter()
            .map(|id| *self.boxes.get(*id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Corrections (feature "amendments")
// ---------------------------------------------------------------------------

/// How a correction is supplied: a full corrected box set, or just the
/// net difference when box-level detail is unavailable.
#[cfg(feature = "amendments")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Correction {
    Boxes(Form201Boxes),
    /// Box-level attribution unknown; classified as a calculation error.
    DirectDifference {
        difference_amount: Money,
        difference_vat: Money,
    },
}

#[cfg(feature = "amendments")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub correction: Correction,
    pub amendment_type: AmendmentType,
    pub discovery_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub variant: Form201Variant,
}

#[derive(Debug, Default)]
struct EngineStore {
    returns: HashMap<u64, VatReturn>,
    next_return_id: u64,
    #[cfg(feature = "amendments")]
    amendments: HashMap<u64, VatAmendment>,
    #[cfg(feature = "amendments")]
    next_amendment_id: u64,
}

/// Batch/on-demand VAT return computation over a set of ledger adapters.
/// Each generate call reads a snapshot of the sub-ledgers, aggregates
/// purely, and commits under an optimistic per-return version check; a
/// losing concurrent request fails with a conflict instead of interleaving
/// partial writes.
pub struct VatReturnEngine<L, S> {
    ledgers: L,
    sequences: S,
    config: EngineConfig,
    state: Mutex<EngineStore>,
}

impl<L: LedgerSource, S: SequenceNumberSource> VatReturnEngine<L, S> {
    pub fn new(ledgers: L, sequences: S, config: EngineConfig) -> Self {
        VatReturnEngine {
            ledgers,
            sequences,
            config,
            state: Mutex::new(EngineStore::default()),
        }
    }

    fn lock(&self) -> VatEngineResult<MutexGuard<'_, EngineStore>> {
        self.state.lock().map_err(|_| {
            VatEngineError::Validation("engine state poisoned by a panicked thread".to_string())
        })
    }

    // -----------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------

    /// Compute (or idempotently recompute) the return for a period.
    ///
    /// Safe to re-run while the return is in draft/generated state: the
    /// prior boxes are overwritten, never accumulated. Once the return is
    /// submitted this fails with a state violation and the stored boxes
    /// are untouched.
    pub fn generate(&self, period: &TaxPeriod) -> VatEngineResult<VatReturn> {
        period.validate()?;

        // Phase 1: reserve (or find) the return and snapshot its version.
        let (return_id, snapshot_version, created) = {
            let mut store = self.lock()?;

            // A cancelled return is inert; a fresh one may replace it.
            let existing = store
                .returns
                .values()
                .find(|r| r.period == *period && r.status != ReturnStatus::Cancelled)
                .map(|r| (r.id, r.status, r.version));

            if let Some((id, status, version)) = existing {
                if !status.allows_regeneration() {
                    return Err(VatEngineError::StateViolation {
                        entity: "VatReturn".to_string(),
                        from: status.name().to_string(),
                        attempted: "generate".to_string(),
                    });
                }
                (id, version, false)
            } else {
                if let Some(other) = store
                    .returns
                    .values()
                    .find(|r| r.period.overlaps(period) && r.status != ReturnStatus::Cancelled)
                {
                    return Err(VatEngineError::Configuration {
                        field: "period".to_string(),
                        reason: format!(
                            "period {} overlaps existing return period {}",
                            period.key(),
                            other.period.key()
                        ),
                    });
                }
                store.next_return_id += 1;
                let id = store.next_return_id;
                let number = self.sequences.next_return_number();
                store.returns.insert(
                    id,
                    VatReturn {
                        id,
                        number,
                        period: period.clone(),
                        status: ReturnStatus::Draft,
                        variant: self.config.variant,
                        boxes: Form201Boxes::default(),
                        total_output_vat: Money::ZERO,
                        total_input_vat: Money::ZERO,
                        net_vat_due: Money::ZERO,
                        standard_rated_by_emirate: Vec::new(),
                        blocked_vat: BlockedVatSummary::default(),
                        advance_vat_total: Money::ZERO,
                        warnings: Vec::new(),
                        generated_at: None,
                        submitted_at: None,
                        acknowledgment_reference: None,
                        version: 0,
                    },
                );
                (id, 0, true)
            }
        };

        // Phase 2: read the sub-ledgers outside the lock. Reads are
        // independent; a failing adapter degrades to a partial-data
        // warning inside the aggregator.
        let input = AggregationInput {
            period: period.clone(),
            output_supplies: fetched(self.ledgers.output_supplies(period)),
            input_expenses: fetched(self.ledgers.input_expenses(period)),
            advance_payments: fetched(self.ledgers.advance_payments(period)),
            blocked_entries: fetched(self.ledgers.blocked_vat_entries(period)),
            adjustments: fetched(self.ledgers.adjustments(period)),
        };
        let computed = match aggregate_boxes(&input) {
            Ok(computed) => computed,
            Err(e) => {
                // Take the reserved shell back out so the failed attempt
                // does not leave a zero-box draft claiming the period.
                // A concurrent generate may have committed over it in the
                // meantime; that result stays.
                if created {
                    let mut store = self.lock()?;
                    let untouched = store
                        .returns
                        .get(&return_id)
                        .is_some_and(|r| r.version == snapshot_version);
                    if untouched {
                        store.returns.remove(&return_id);
                    }
                }
                return Err(e);
            }
        };

        // Phase 3: commit, only if nobody recomputed in between.
        let mut store = self.lock()?;
        let ret = store
            .returns
            .get_mut(&return_id)
            .ok_or_else(|| VatEngineError::NotFound {
                entity: "VatReturn".to_string(),
                id: return_id.to_string(),
            })?;

        if ret.version != snapshot_version {
            return Err(VatEngineError::Conflict {
                period: period.key(),
            });
        }
        if !ret.status.allows_regeneration() {
            return Err(VatEngineError::StateViolation {
                entity: "VatReturn".to_string(),
                from: ret.status.name().to_string(),
                attempted: "generate".to_string(),
            });
        }

        ret.boxes = computed.boxes;
        ret.total_output_vat = computed.total_output_vat;
        ret.total_input_vat = computed.total_input_vat;
        ret.net_vat_due = computed.net_position.net_vat_due;
        ret.standard_rated_by_emirate = computed.standard_rated_by_emirate;
        ret.blocked_vat = computed.blocked_vat;
        ret.advance_vat_total = computed.advance_vat_total;
        ret.warnings = computed.warnings;
        ret.generated_at = Some(Utc::now());
        ret.status = ReturnStatus::Generated;
        ret.version += 1;

        Ok(ret.clone())
    }

    // -----------------------------------------------------------------
    // Return lifecycle
    // -----------------------------------------------------------------

    /// File the return. Box consistency is checked here: a validation
    /// failure blocks submission but never blocked the draft itself.
    pub fn submit(&self, return_id: u64) -> VatEngineResult<VatReturn> {
        let mut store = self.lock()?;
        let ret = get_return_mut(&mut store, return_id)?;
        ret.status.transition(ReturnStatus::Submitted, "submit")?;
        ret.boxes.validate()?;
        ret.status = ReturnStatus::Submitted;
        ret.submitted_at = Some(Utc::now());
        Ok(ret.clone())
    }

    pub fn acknowledge(
        &self,
        return_id: u64,
        reference: impl Into<String>,
    ) -> VatEngineResult<VatReturn> {
        let mut store = self.lock()?;
        let ret = get_return_mut(&mut store, return_id)?;
        ret.status = ret
            .status
            .transition(ReturnStatus::Acknowledged, "acknowledge")?;
        ret.acknowledgment_reference = Some(reference.into());
        Ok(ret.clone())
    }

    pub fn reject_by_authority(&self, return_id: u64) -> VatEngineResult<VatReturn> {
        let mut store = self.lock()?;
        let ret = get_return_mut(&mut store, return_id)?;
        ret.status = ret
            .status
            .transition(ReturnStatus::RejectedByAuthority, "reject")?;
        Ok(ret.clone())
    }

    pub fn cancel(&self, return_id: u64) -> VatEngineResult<VatReturn> {
        let mut store = self.lock()?;
        let ret = get_return_mut(&mut store, return_id)?;
        ret.status = ret.status.transition(ReturnStatus::Cancelled, "cancel")?;
        Ok(ret.clone())
    }

    // -----------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------

    pub fn get_return(&self, return_id: u64) -> VatEngineResult<VatReturn> {
        let mut store = self.lock()?;
        get_return_mut(&mut store, return_id).map(|r| r.clone())
    }

    /// The live (non-cancelled) return for a period, if any.
    pub fn return_for_period(&self, period: &TaxPeriod) -> VatEngineResult<Option<VatReturn>> {
        let store = self.lock()?;
        Ok(store
            .returns
            .values()
            .find(|r| r.period == *period && r.status != ReturnStatus::Cancelled)
            .cloned())
    }

    pub fn blocked_summary(&self, return_id: u64) -> VatEngineResult<BlockedVatSummary> {
        Ok(self.get_return(return_id)?.blocked_vat)
    }

    // -----------------------------------------------------------------
    // Amendments
    // -----------------------------------------------------------------

    /// Open a correction against a filed return. The original's stored
    /// boxes are never touched; the amendment references it by id.
    ///
    /// Building the amendment is pure, so the whole operation runs under
    /// the state lock: the filed-status check and the insert cannot be
    /// interleaved with a lifecycle transition on the return.
    #[cfg(feature = "amendments")]
    pub fn amend(
        &self,
        return_id: u64,
        request: CorrectionRequest,
    ) -> VatEngineResult<VatAmendment> {
        let mut store = self.lock()?;
        let original = get_return_mut(&mut store, return_id)?.clone();
        let drafted = draft_amendment(&original, request)?;

        store.next_amendment_id += 1;
        let id = store.next_amendment_id;
        let amendment = VatAmendment {
            id,
            number: self.sequences.next_amendment_number(),
            ..drafted
        };
        store.amendments.insert(id, amendment.clone());
        Ok(amendment)
    }

    #[cfg(feature = "amendments")]
    pub fn get_amendment(&self, amendment_id: u64) -> VatEngineResult<VatAmendment> {
        let store = self.lock()?;
        store
            .amendments
            .get(&amendment_id)
            .cloned()
            .ok_or_else(|| VatEngineError::NotFound {
                entity: "VatAmendment".to_string(),
                id: amendment_id.to_string(),
            })
    }

    /// Total estimated penalty for an amendment.
    #[cfg(feature = "amendments")]
    pub fn calculate_penalty(&self, amendment_id: u64) -> VatEngineResult<Money> {
        Ok(self.get_amendment(amendment_id)?.estimated_penalty)
    }

    #[cfg(feature = "amendments")]
    pub fn penalty_breakdown(&self, amendment_id: u64) -> VatEngineResult<PenaltyBreakdown> {
        Ok(self.get_amendment(amendment_id)?.penalty)
    }

    #[cfg(feature = "amendments")]
    fn transition_amendment(
        &self,
        amendment_id: u64,
        to: AmendmentStatus,
        attempted: &str,
    ) -> VatEngineResult<VatAmendment> {
        let mut store = self.lock()?;
        let amendment =
            store
                .amendments
                .get_mut(&amendment_id)
                .ok_or_else(|| VatEngineError::NotFound {
                    entity: "VatAmendment".to_string(),
                    id: amendment_id.to_string(),
                })?;
        amendment.status = amendment.status.transition(to, attempted)?;
        Ok(amendment.clone())
    }

    #[cfg(feature = "amendments")]
    pub fn submit_amendment(&self, amendment_id: u64) -> VatEngineResult<VatAmendment> {
        self.transition_amendment(amendment_id, AmendmentStatus::Submitted, "submit")
    }

    #[cfg(feature = "amendments")]
    pub fn approve_amendment(&self, amendment_id: u64) -> VatEngineResult<VatAmendment> {
        self.transition_amendment(amendment_id, AmendmentStatus::Approved, "approve")
    }

    #[cfg(feature = "amendments")]
    pub fn reject_amendment(&self, amendment_id: u64) -> VatEngineResult<VatAmendment> {
        self.transition_amendment(amendment_id, AmendmentStatus::Rejected, "reject")
    }

    #[cfg(feature = "amendments")]
    pub fn cancel_amendment(&self, amendment_id: u64) -> VatEngineResult<VatAmendment> {
        self.transition_amendment(amendment_id, AmendmentStatus::Cancelled, "cancel")
    }

    /// Replace a draft amendment's correction. Anything past draft is
    /// read-only: the editable check and the replacement happen under one
    /// lock, so a submit landing in between cannot be rolled back.
    #[cfg(feature = "amendments")]
    pub fn update_amendment(
        &self,
        amendment_id: u64,
        request: CorrectionRequest,
    ) -> VatEngineResult<VatAmendment> {
        let mut store = self.lock()?;
        let existing = store
            .amendments
            .get(&amendment_id)
            .ok_or_else(|| VatEngineError::NotFound {
                entity: "VatAmendment".to_string(),
                id: amendment_id.to_string(),
            })?;
        if !existing.status.is_editable() {
            return Err(VatEngineError::StateViolation {
                entity: "VatAmendment".to_string(),
                from: existing.status.name().to_string(),
                attempted: "update".to_string(),
            });
        }
        let (id, number, original_return_id) =
            (existing.id, existing.number.clone(), existing.original_return_id);

        let original = get_return_mut(&mut store, original_return_id)?.clone();
        let drafted = draft_amendment(&original, request)?;
        let updated = VatAmendment {
            id,
            number,
            ..drafted
        };
        store.amendments.insert(id, updated.clone());
        Ok(updated)
    }

    #[cfg(feature = "amendments")]
    pub fn delete_amendment(&self, amendment_id: u64) -> VatEngineResult<()> {
        let mut store = self.lock()?;
        let amendment =
            store
                .amendments
                .get(&amendment_id)
                .ok_or_else(|| VatEngineError::NotFound {
                    entity: "VatAmendment".to_string(),
                    id: amendment_id.to_string(),
                })?;
        if !amendment.status.is_editable() {
            return Err(VatEngineError::StateViolation {
                entity: "VatAmendment".to_string(),
                from: amendment.status.name().to_string(),
                attempted: "delete".to_string(),
            });
        }
        store.amendments.remove(&amendment_id);
        Ok(())
    }
}

fn get_return_mut(store: &mut EngineStore, return_id: u64) -> VatEngineResult<&mut VatReturn> {
    store
        .returns
        .get_mut(&return_id)
        .ok_or_else(|| VatEngineError::NotFound {
            entity: "VatReturn".to_string(),
            id: return_id.to_string(),
        })
}

/// Build a draft amendment against a filed return. Pure; the caller stamps
/// the id and number and commits it under the state lock.
#[cfg(feature = "amendments")]
fn draft_amendment(
    original: &VatReturn,
    request: CorrectionRequest,
) -> VatEngineResult<VatAmendment> {
    if !original.status.is_filed() {
        return Err(VatEngineError::StateViolation {
            entity: "VatReturn".to_string(),
            from: original.status.name().to_string(),
            attempted: "amend".to_string(),
        });
    }
    let deadline = original
        .period
        .filing_deadline
        .ok_or_else(|| VatEngineError::Configuration {
            field: "filing_deadline".to_string(),
            reason: format!(
                "period {} has no filing deadline; penalty cannot be computed",
                original.period.key()
            ),
        })?;

    let (corrected_boxes, error_category, difference_amount, difference_vat) =
        match request.correction {
            Correction::Boxes(mut corrected) => {
                corrected.finalize();
                corrected.validate()?;
                let category = classify(&original.boxes, &corrected);
                let difference_amount =
                    reported_taxable_amount(&corrected) - reported_taxable_amount(&original.boxes);
                let difference_vat = corrected.net_vat_due() - original.net_vat_due;
                (corrected, category, difference_amount, difference_vat)
            }
            Correction::DirectDifference {
                difference_amount,
                difference_vat,
            } => (
                original.boxes.clone(),
                ErrorCategory::CalculationError,
                difference_amount,
                difference_vat,
            ),
        };

    let penalty = calculate_penalty(difference_vat, deadline, request.discovery_date);
    let original_taxable = reported_taxable_amount(&original.boxes);

    Ok(VatAmendment {
        id: 0,
        number: String::new(),
        original_return_id: original.id,
        amendment_type: request.amendment_type,
        error_category,
        original_taxable_amount: original_taxable,
        corrected_taxable_amount: original_taxable + difference_amount,
        difference_amount,
        difference_vat,
        estimated_penalty: penalty.total,
        penalty,
        corrected_boxes,
        discovery_date: request.discovery_date,
        status: AmendmentStatus::Draft,
    })
}

fn fetched<T>(result: LedgerFetch<T>) -> Fetched<T> {
    match result {
        Ok(records) => Fetched::Available(records),
        Err(e) => Fetched::Unavailable {
            detail: e.to_string(),
        },
    }
}
