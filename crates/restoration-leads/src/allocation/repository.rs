use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AssignmentDecision, Lead, LeadId, LeadStatus, Money, PartnerId};

/// Repository record pairing a lead with its latest assignment decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub lead: Lead,
    pub decision: Option<AssignmentDecision>,
    /// Set by `LeadRepository::claim` while one caller owns the lead's allocation.
    #[serde(default)]
    pub allocating: bool,
}

impl LeadRecord {
    pub fn new(lead: Lead) -> Self {
        Self {
            lead,
            decision: None,
            allocating: false,
        }
    }

    /// Claim rule shared by repository backends: only a valued lead that no other
    /// caller is allocating can be claimed. Returns `Ok(true)` when the claim was
    /// taken, `Ok(false)` when the lead is past `Valued` and is left untouched.
    pub fn try_claim(&mut self) -> Result<bool, RepositoryError> {
        if self.allocating {
            return Err(RepositoryError::AllocationInProgress);
        }
        if self.lead.status() != LeadStatus::Valued {
            return Ok(false);
        }
        self.allocating = true;
        Ok(true)
    }

    pub fn decision_rationale(&self) -> String {
        match &self.decision {
            Some(decision) => decision.summary(),
            None => "pending assignment".to_string(),
        }
    }

    pub fn status_view(&self) -> LeadStatusView {
        LeadStatusView {
            lead_id: self.lead.id.clone(),
            status: self.lead.status().label(),
            lead_value: self.lead.lead_value(),
            assigned_partner: self.lead.assigned_partner().cloned(),
            decision_rationale: self.decision_rationale(),
            match_score: self
                .decision
                .as_ref()
                .and_then(|decision| decision.match_score),
        }
    }
}

/// Newest creation time among `records` from `email` that falls after `since`.
/// Backends call it inside `LeadRepository::insert` to refuse duplicates.
pub fn recent_submission<'a>(
    records: impl IntoIterator<Item = &'a LeadRecord>,
    email: &str,
    since: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    records
        .into_iter()
        .filter(|record| record.lead.contact.email == email && record.lead.created_at > since)
        .map(|record| record.lead.created_at)
        .max()
}

/// Storage abstraction for leads so the service can run against any backend.
///
/// `insert` and `claim` are check-and-write operations and must be atomic: an
/// in-memory store does both halves under one lock, a SQL store under a unique
/// constraint or a conditional `UPDATE ... WHERE`.
pub trait LeadRepository: Send + Sync {
    /// Store a new lead unless a lead with the same normalized email was created after
    /// `duplicate_since`, in which case `RecentSubmission` is returned.
    fn insert(
        &self,
        record: LeadRecord,
        duplicate_since: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError>;
    fn update(&self, record: LeadRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError>;
    /// Creation time of the newest lead submitted with `email` (already normalized).
    fn latest_submission(&self, email: &str) -> Result<Option<DateTime<Utc>>, RepositoryError>;
    /// Take exclusive ownership of a valued lead's allocation (see `LeadRecord::try_claim`)
    /// and return the stored record. The claim is released by the next `update`.
    fn claim(&self, id: &LeadId) -> Result<LeadRecord, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("a lead from this email was received at {previous_at}")]
    RecentSubmission { previous_at: DateTime<Utc> },
    #[error("lead allocation already in progress")]
    AllocationInProgress,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Public projection of a lead's state.
#[derive(Debug, Clone, Serialize)]
pub struct LeadStatusView {
    pub lead_id: LeadId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_partner: Option<PartnerId>,
    pub decision_rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u32>,
}
