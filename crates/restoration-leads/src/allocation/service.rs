use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::candidates::filter_candidates;
use super::config::EngineConfig;
use super::coordinator::{AllocationCoordinator, AllocationError};
use super::domain::{
    AssignmentDecision, Lead, LeadId, LeadStatus, LifecycleError, RawLeadSubmission,
};
use super::intake::{normalize_email, LeadValidator, RejectionReasons, Violation};
use super::ledger::{PartnerStore, StoreError};
use super::matching::MatchScorer;
use super::recorder::{DecisionRecorder, RecordedEvent};
use super::repository::{LeadRecord, LeadRepository, RepositoryError};
use super::valuation::ValuationEngine;

/// Downstream response to an assigned lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadResponse {
    Accept,
    Reject,
    Expire,
}

/// Service composing intake, valuation, matching and allocation over the stores.
pub struct LeadAssignmentService<L, P, E> {
    validator: Arc<LeadValidator>,
    valuation: Arc<ValuationEngine>,
    scorer: Arc<MatchScorer>,
    coordinator: AllocationCoordinator<P>,
    leads: Arc<L>,
    partners: Arc<P>,
    recorder: Arc<E>,
    allocation_timeout: Duration,
}

impl<L, P, E> LeadAssignmentService<L, P, E>
where
    L: LeadRepository + 'static,
    P: PartnerStore + 'static,
    E: DecisionRecorder + 'static,
{
    pub fn new(leads: Arc<L>, partners: Arc<P>, recorder: Arc<E>, config: EngineConfig) -> Self {
        let allocation_timeout = config.allocation_timeout();
        let EngineConfig {
            intake,
            valuation,
            matching,
            ..
        } = config;

        Self {
            validator: Arc::new(LeadValidator::new(intake)),
            valuation: Arc::new(ValuationEngine::new(valuation)),
            scorer: Arc::new(MatchScorer::new(matching)),
            coordinator: AllocationCoordinator::new(partners.clone()),
            leads,
            partners,
            recorder,
            allocation_timeout,
        }
    }

    /// Validate, value and persist a new lead.
    pub fn submit(&self, raw: RawLeadSubmission) -> Result<LeadRecord, LeadServiceError> {
        let now = Utc::now();
        let previous = self.leads.latest_submission(&normalize_email(&raw.email))?;
        let valid = self.validator.validate(raw, previous, now)?;

        let mut lead = Lead::open(LeadId::generate(), valid, now);
        let valuation = self.valuation.valuate(&lead);
        lead.set_value(valuation.value, now)?;

        info!(
            lead_id = %lead.id,
            value_cents = valuation.value.cents(),
            lead_score = lead.lead_score,
            region_multiplier = valuation.region_multiplier,
            "lead valued"
        );

        let window = chrono::Duration::minutes(self.validator.config().duplicate_window_minutes);
        match self.leads.insert(LeadRecord::new(lead), now - window) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::RecentSubmission { previous_at }) => {
                info!(%previous_at, "concurrent duplicate submission refused");
                Err(RejectionReasons(vec![Violation::DuplicateSubmission { previous_at }]).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Allocate a valued lead to the best available partner. The lead is claimed in the
    /// repository first, so concurrent calls for one lead debit at most once.
    pub fn assign(&self, lead_id: &LeadId) -> Result<LeadRecord, LeadServiceError> {
        let record = self.leads.claim(lead_id)?;
        if !record.allocating {
            return Err(LifecycleError::IllegalTransition {
                from: record.lead.status(),
                to: LeadStatus::Assigned,
            }
            .into());
        }

        let claimed = record.clone();
        match self.allocate_record(record) {
            Ok(record) => Ok(record),
            Err(err) => {
                if !matches!(err, LeadServiceError::Persistence { .. }) {
                    self.release(claimed);
                }
                Err(err)
            }
        }
    }

    /// Submit and allocate in one call: one inbound lead, one outcome.
    pub fn intake(&self, raw: RawLeadSubmission) -> Result<LeadRecord, LeadServiceError> {
        let record = self.submit(raw)?;
        self.assign(&record.lead.id)
    }

    pub fn get(&self, lead_id: &LeadId) -> Result<LeadRecord, LeadServiceError> {
        let record = self
            .leads
            .fetch(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Apply a downstream accept/reject/expire to an assigned lead.
    pub fn respond(
        &self,
        lead_id: &LeadId,
        response: LeadResponse,
    ) -> Result<LeadRecord, LeadServiceError> {
        let mut record = self
            .leads
            .fetch(lead_id)?
            .ok_or(RepositoryError::NotFound)?;

        let now = Utc::now();
        let from = record.lead.status();
        match response {
            LeadResponse::Accept => record.lead.accept(now)?,
            LeadResponse::Reject => record.lead.reject(now)?,
            LeadResponse::Expire => record.lead.expire(now)?,
        }

        self.leads.update(record.clone())?;
        self.recorder.record(RecordedEvent::LeadStateChanged {
            lead_id: record.lead.id.clone(),
            from,
            to: record.lead.status(),
            at: now,
        });

        Ok(record)
    }

    fn allocate_record(&self, mut record: LeadRecord) -> Result<LeadRecord, LeadServiceError> {
        let started = Instant::now();
        let deadline = started + self.allocation_timeout;

        let value = record.lead.lead_value().ok_or(LifecycleError::NotValued)?;
        let roster = self.partners.roster()?;
        let candidates = filter_candidates(&record.lead, value, roster);

        let now = Utc::now();
        let ranked = self.scorer.rank(&record.lead, candidates, now);

        let decision = match self
            .coordinator
            .allocate(&mut record.lead, &ranked, deadline, now)
        {
            Ok(decision) => decision,
            Err(AllocationError::Timeout { lead_id, attempts }) => {
                let elapsed = started.elapsed();
                warn!(%lead_id, attempts, elapsed_ms = elapsed.as_millis() as u64, "allocation timed out");
                return Err(LeadServiceError::Timeout { lead_id, elapsed });
            }
            Err(AllocationError::Lifecycle(err)) => return Err(err.into()),
            Err(AllocationError::Store(err)) => return Err(err.into()),
        };

        record.decision = Some(decision.clone());
        record.allocating = false;
        self.recorder.record(RecordedEvent::Decision(decision.clone()));
        if decision.is_assigned() {
            self.recorder.record(RecordedEvent::LeadStateChanged {
                lead_id: decision.lead_id.clone(),
                from: LeadStatus::Valued,
                to: LeadStatus::Assigned,
                at: decision.decided_at,
            });
        }

        if let Err(source) = self.leads.update(record.clone()) {
            error!(
                lead_id = %decision.lead_id,
                error = %source,
                "allocation committed but lead could not be persisted"
            );
            return Err(LeadServiceError::Persistence {
                decision: Box::new(decision),
                source,
            });
        }

        Ok(record)
    }

    /// Drop a claim after an allocation that debited nothing.
    fn release(&self, mut claimed: LeadRecord) {
        claimed.allocating = false;
        let lead_id = claimed.lead.id.clone();
        if let Err(err) = self.leads.update(claimed) {
            warn!(%lead_id, error = %err, "failed to release lead allocation claim");
        }
    }
}

/// Error raised by the lead assignment service.
#[derive(Debug, thiserror::Error)]
pub enum LeadServiceError {
    #[error(transparent)]
    Rejected(#[from] RejectionReasons),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("allocation for {lead_id} timed out after {elapsed:?}")]
    Timeout { lead_id: LeadId, elapsed: Duration },
    #[error("allocation for {} committed but the lead was not saved", .decision.lead_id)]
    Persistence {
        decision: Box<AssignmentDecision>,
        #[source]
        source: RepositoryError,
    },
}
