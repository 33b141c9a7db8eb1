//! Lead valuation and partner assignment.
//!
//! An inbound submission is validated, priced, matched against the partner roster and
//! allocated to at most one partner. The partner's credit debit and daily counter
//! increment happen together inside the store's per-partner critical section, so
//! concurrent allocations can neither overdraw credit nor exceed a daily cap.

pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod intake;
pub mod ledger;
pub mod matching;
pub mod recorder;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod valuation;

#[cfg(test)]
mod tests;

pub use candidates::{filter_candidates, CandidateSet};
pub use config::EngineConfig;
pub use coordinator::{AllocationCoordinator, AllocationError};
pub use domain::{
    Address, AffectedArea, AssignmentDecision, ContactDetails, DailyCounter, DamageType,
    DebitReceipt, DebitRefusal, Lead, LeadId, LeadStatus, LifecycleError, Money,
    NoMatchReason, Partner, PartnerCapabilities, PartnerId, PartnerStatus, RawLeadSubmission,
    ReadyToStart, Urgency, ValidLead,
};
pub use intake::{IntakeConfig, LeadValidator, RejectionReasons, Violation};
pub use ledger::{DebitOutcome, InMemoryPartnerStore, PartnerStore, StoreError};
pub use matching::{MatchScorer, MatchWeights, RankedCandidates, ScoredCandidate};
pub use recorder::{
    DecisionRecorder, DecisionSink, QueueLimits, QueuedRecorder, RecordedEvent, RetryPolicy,
    SinkError, TracingSink,
};
pub use repository::{
    recent_submission, LeadRecord, LeadRepository, LeadStatusView, RepositoryError,
};
pub use roster::{load_roster, parse_roster, RosterImportError};
pub use router::lead_router;
pub use service::{LeadAssignmentService, LeadResponse, LeadServiceError};
pub use valuation::{LeadValue, ValuationConfig, ValuationEngine};
