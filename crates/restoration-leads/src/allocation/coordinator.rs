use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    AssignmentDecision, DebitRefusal, Lead, LeadId, LeadStatus, LifecycleError, NoMatchReason,
};
use super::ledger::{DebitOutcome, PartnerStore, StoreError};
use super::matching::RankedCandidates;

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("allocation for {lead_id} exceeded its deadline after {attempts} trial(s)")]
    Timeout { lead_id: LeadId, attempts: usize },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The only component that mutates partner state.
///
/// Candidates are tried one at a time in rank order; each trial is a single
/// check-and-debit through the store, so no partner lock outlives its trial.
pub struct AllocationCoordinator<P> {
    store: Arc<P>,
}

impl<P> AllocationCoordinator<P>
where
    P: PartnerStore,
{
    pub fn new(store: Arc<P>) -> Self {
        Self { store }
    }

    pub fn allocate(
        &self,
        lead: &mut Lead,
        ranked: &RankedCandidates,
        deadline: Instant,
        at: DateTime<Utc>,
    ) -> Result<AssignmentDecision, AllocationError> {
        let value = lead.lead_value().ok_or(LifecycleError::NotValued)?;
        if lead.status() != LeadStatus::Valued {
            return Err(LifecycleError::IllegalTransition {
                from: lead.status(),
                to: LeadStatus::Assigned,
            }
            .into());
        }

        let mut attempts = 0;
        let mut refused_for_credit = false;
        let mut refused_for_cap = false;

        for candidate in ranked.eligible() {
            if Instant::now() >= deadline {
                warn!(lead_id = %lead.id, attempts, "allocation deadline exceeded");
                return Err(AllocationError::Timeout {
                    lead_id: lead.id.clone(),
                    attempts,
                });
            }

            attempts += 1;
            let partner_id = &candidate.partner.id;
            match self.store.debit(partner_id, value, at)? {
                DebitOutcome::Debited(receipt) => {
                    lead.mark_assigned(receipt.partner_id.clone(), at)?;
                    info!(
                        lead_id = %lead.id,
                        partner_id = %receipt.partner_id,
                        score = candidate.score,
                        value_cents = value.cents(),
                        remaining_cents = receipt.remaining_credit.cents(),
                        assigned_today = receipt.assigned_today,
                        "lead assigned"
                    );
                    return Ok(AssignmentDecision {
                        lead_id: lead.id.clone(),
                        partner_id: Some(receipt.partner_id),
                        lead_value: value,
                        match_score: Some(candidate.score),
                        decided_at: at,
                        reason: None,
                        candidates_tried: attempts,
                    });
                }
                DebitOutcome::Refused(refusal) => {
                    debug!(
                        lead_id = %lead.id,
                        partner_id = %partner_id,
                        ?refusal,
                        "final gate refused candidate, falling through"
                    );
                    match refusal {
                        DebitRefusal::InsufficientCredit { .. } => refused_for_credit = true,
                        DebitRefusal::DailyCapReached { .. } => refused_for_cap = true,
                        DebitRefusal::Inactive(_) | DebitRefusal::UnknownPartner => {}
                    }
                }
            }
        }

        let reason = if refused_for_credit {
            NoMatchReason::InsufficientCredit
        } else if refused_for_cap {
            NoMatchReason::DailyCapReached
        } else {
            NoMatchReason::NoEligiblePartner
        };

        info!(
            lead_id = %lead.id,
            reason = reason.code(),
            candidates = ranked.len(),
            attempts,
            "lead left unassigned"
        );

        Ok(AssignmentDecision {
            lead_id: lead.id.clone(),
            partner_id: None,
            lead_value: value,
            match_score: ranked.top().map(|candidate| candidate.score),
            decided_at: at,
            reason: Some(reason),
            candidates_tried: attempts,
        })
    }
}
