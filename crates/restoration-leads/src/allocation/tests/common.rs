use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::allocation::domain::{
    Address, AffectedArea, DailyCounter, DamageType, Lead, LeadId, Partner, PartnerCapabilities,
    PartnerId, PartnerStatus, RawLeadSubmission, ReadyToStart, Urgency,
};
use crate::allocation::intake::LeadValidator;
use crate::allocation::ledger::InMemoryPartnerStore;
use crate::allocation::recorder::{DecisionRecorder, RecordedEvent};
use crate::allocation::repository::{
    recent_submission, LeadRecord, LeadRepository, RepositoryError,
};
use crate::allocation::valuation::ValuationEngine;
use crate::allocation::{lead_router, EngineConfig, LeadAssignmentService, Money};

pub(super) type MemoryService =
    LeadAssignmentService<MemoryLeadRepository, InMemoryPartnerStore, MemoryRecorder>;

/// 2025-03-14 02:00 UTC, which is 12:00 for a partner at UTC+10.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 2, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn at_utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn parramatta() -> Address {
    Address {
        street: "12 Harbour Street".to_string(),
        suburb: "Parramatta".to_string(),
        state: "NSW".to_string(),
        postcode: "2150".to_string(),
    }
}

/// Emergency, insured, commercial, $1.2M, entire property, NSW, score 80.
pub(super) fn emergency_submission() -> RawLeadSubmission {
    RawLeadSubmission {
        name: "Jordan Blake".to_string(),
        email: "Jordan.Blake@Example.com ".to_string(),
        phone: "0412 345 678".to_string(),
        address: parramatta(),
        damage_types: vec![DamageType::Water],
        description: "Burst pipe flooded the ground floor warehouse overnight".to_string(),
        urgency: Urgency::Emergency,
        property_value_estimate: Some(1_200_000),
        has_insurance: true,
        is_business_property: true,
        affected_area: AffectedArea::EntireProperty,
        lead_score: Some(80),
        ready_to_start: ReadyToStart::Immediately,
        decision_maker: true,
        source: Some("website".to_string()),
    }
}

/// Routine residential job with no bonuses beyond the base value.
pub(super) fn routine_submission() -> RawLeadSubmission {
    RawLeadSubmission {
        name: "Sam Nguyen".to_string(),
        email: "sam.nguyen@example.com".to_string(),
        phone: "(02) 9876 5432".to_string(),
        address: Address {
            street: "4 Wattle Lane".to_string(),
            suburb: "Hobart".to_string(),
            state: "TAS".to_string(),
            postcode: "7000".to_string(),
        },
        damage_types: vec![DamageType::Mould],
        description: "Mould spreading across the bathroom ceiling after a leak".to_string(),
        urgency: Urgency::Routine,
        property_value_estimate: None,
        has_insurance: false,
        is_business_property: false,
        affected_area: AffectedArea::SingleRoom,
        lead_score: Some(50),
        ready_to_start: ReadyToStart::Flexible,
        decision_maker: false,
        source: None,
    }
}

pub(super) fn with_email(mut raw: RawLeadSubmission, email: &str) -> RawLeadSubmission {
    raw.email = email.to_string();
    raw
}

pub(super) fn open_lead(raw: RawLeadSubmission) -> Lead {
    let valid = LeadValidator::default()
        .validate(raw, None, now())
        .expect("fixture submission is valid");
    Lead::open(LeadId::generate(), valid, now())
}

pub(super) fn valued_lead(raw: RawLeadSubmission) -> Lead {
    let mut lead = open_lead(raw);
    let value = ValuationEngine::default().valuate(&lead).value;
    lead.set_value(value, now()).expect("fresh lead accepts a value");
    lead
}

/// Active Parramatta water-damage partner with every capability and a cap of 10.
pub(super) fn partner(id: &str, credit_dollars: u64) -> Partner {
    Partner {
        id: PartnerId(id.to_string()),
        name: format!("{id} Restorations"),
        status: PartnerStatus::Active,
        service_areas: BTreeSet::from(["Parramatta".to_string()]),
        specializations: BTreeSet::from([DamageType::Water]),
        capabilities: PartnerCapabilities {
            accepts_commercial: true,
            accepts_emergency: true,
            insurance_approved: true,
        },
        credit_balance: Money::from_dollars(credit_dollars),
        daily_lead_cap: 10,
        daily_counter: DailyCounter::default(),
        utc_offset_minutes: 600,
        good_standing: true,
    }
}

pub(super) fn partner_id(id: &str) -> PartnerId {
    PartnerId(id.to_string())
}

pub(super) fn build_service(
    partners: Vec<Partner>,
    config: EngineConfig,
) -> (
    MemoryService,
    Arc<MemoryLeadRepository>,
    Arc<InMemoryPartnerStore>,
    Arc<MemoryRecorder>,
) {
    let repository = Arc::new(MemoryLeadRepository::default());
    let store = Arc::new(InMemoryPartnerStore::new(partners));
    let recorder = Arc::new(MemoryRecorder::default());
    let service = LeadAssignmentService::new(
        repository.clone(),
        store.clone(),
        recorder.clone(),
        config,
    );
    (service, repository, store, recorder)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    lead_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryLeadRepository {
    pub(super) records: Arc<Mutex<HashMap<LeadId, LeadRecord>>>,
}

impl MemoryLeadRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl LeadRepository for MemoryLeadRepository {
    fn insert(
        &self,
        record: LeadRecord,
        duplicate_since: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.lead.id) {
            return Err(RepositoryError::Conflict);
        }
        let email = &record.lead.contact.email;
        if let Some(previous_at) = recent_submission(guard.values(), email, duplicate_since) {
            return Err(RepositoryError::RecentSubmission { previous_at });
        }
        guard.insert(record.lead.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: LeadRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.lead.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn latest_submission(&self, email: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.lead.contact.email == email)
            .map(|record| record.lead.created_at)
            .max())
    }

    fn claim(&self, id: &LeadId) -> Result<LeadRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.try_claim()?;
        Ok(record.clone())
    }
}

/// Accepts inserts but fails every update, as if the store went away mid-request.
#[derive(Default, Clone)]
pub(super) struct ReadOnlyRepository {
    pub(super) inner: MemoryLeadRepository,
}

impl LeadRepository for ReadOnlyRepository {
    fn insert(
        &self,
        record: LeadRecord,
        duplicate_since: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError> {
        self.inner.insert(record, duplicate_since)
    }

    fn update(&self, _record: LeadRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn latest_submission(&self, email: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        self.inner.latest_submission(email)
    }

    fn claim(&self, id: &LeadId) -> Result<LeadRecord, RepositoryError> {
        self.inner.claim(id)
    }
}

/// Reports no submission history, as when two submissions from one email race past the
/// lookup; `insert` is the only thing left to catch the duplicate.
#[derive(Default, Clone)]
pub(super) struct StaleHistoryRepository {
    pub(super) inner: MemoryLeadRepository,
}

impl LeadRepository for StaleHistoryRepository {
    fn insert(
        &self,
        record: LeadRecord,
        duplicate_since: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError> {
        self.inner.insert(record, duplicate_since)
    }

    fn update(&self, record: LeadRecord) -> Result<(), RepositoryError> {
        self.inner.update(record)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn latest_submission(&self, _email: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(None)
    }

    fn claim(&self, id: &LeadId) -> Result<LeadRecord, RepositoryError> {
        self.inner.claim(id)
    }
}

pub(super) struct UnavailableRepository;

impl LeadRepository for UnavailableRepository {
    fn insert(
        &self,
        _record: LeadRecord,
        _duplicate_since: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: LeadRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_submission(&self, _email: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn claim(&self, _id: &LeadId) -> Result<LeadRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MemoryRecorder {
    pub(super) fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("recorder mutex poisoned").clone()
    }
}

impl DecisionRecorder for MemoryRecorder {
    fn record(&self, event: RecordedEvent) {
        self.events
            .lock()
            .expect("recorder mutex poisoned")
            .push(event);
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
