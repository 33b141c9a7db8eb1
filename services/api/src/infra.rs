use chrono::{DateTime, Utc};
use restoration_leads::allocation::{
    load_roster, parse_roster, recent_submission, Address, AffectedArea, DamageType, DecisionRecorder, LeadId,
    LeadRecord, LeadRepository, Partner, RawLeadSubmission, ReadyToStart, RecordedEvent,
    RepositoryError, RosterImportError, Urgency,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    records: Arc<Mutex<HashMap<LeadId, LeadRecord>>>,
}

impl LeadRepository for InMemoryLeadRepository {
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
        if guard.contains_key(&record.lead.id) {
            guard.insert(record.lead.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryEventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl DecisionRecorder for InMemoryEventLog {
    fn record(&self, event: RecordedEvent) {
        let mut guard = self.events.lock().expect("event log mutex poisoned");
        guard.push(event);
    }
}

impl InMemoryEventLog {
    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("event log mutex poisoned").clone()
    }
}

const SAMPLE_ROSTER: &str = "\
Partner ID,Name,Status,Service Areas,Specializations,Accepts Commercial,Accepts Emergency,Insurance Approved,Credit,Daily Cap,UTC Offset Minutes,Good Standing
harbour-dry,Harbour Dry Out,active,Parramatta;2150;Sydney,Water;Mould,yes,yes,yes,\"$2,500\",6,660,yes
west-restore,Western Restorations,active,Parramatta;Blacktown,Water;Fire;Storm,no,yes,yes,$900,2,660,yes
bayside-storm,Bayside Storm Crew,active,Brisbane;4000;QLD,Storm;Hail;Water,yes,yes,no,\"$1,800\",4,600,yes
southern-cross,Southern Cross Remediation,suspended,Melbourne;VIC,Mould;Sewage;Biohazard,yes,no,yes,\"$3,000\",5,660,no
";

/// Partners from `path`, or the bundled sample roster when no path is given.
pub(crate) fn load_partners(path: Option<&Path>) -> Result<Vec<Partner>, RosterImportError> {
    match path {
        Some(path) => load_roster(path),
        None => parse_roster(Cursor::new(SAMPLE_ROSTER.as_bytes())),
    }
}

pub(crate) fn sample_submissions() -> Vec<RawLeadSubmission> {
    vec![
        RawLeadSubmission {
            name: "Priya Raman".to_string(),
            email: "priya.raman@example.com".to_string(),
            phone: "0412 555 019".to_string(),
            address: Address {
                street: "18 Church Street".to_string(),
                suburb: "Parramatta".to_string(),
                state: "NSW".to_string(),
                postcode: "2150".to_string(),
            },
            damage_types: vec![DamageType::Water],
            description: "Hot water system burst and flooded the ground floor overnight"
                .to_string(),
            urgency: Urgency::Emergency,
            property_value_estimate: Some(1_150_000),
            has_insurance: true,
            is_business_property: false,
            affected_area: AffectedArea::WholeFloor,
            lead_score: None,
            ready_to_start: ReadyToStart::Immediately,
            decision_maker: true,
            source: Some("website".to_string()),
        },
        RawLeadSubmission {
            name: "Marcus Lee".to_string(),
            email: "ops@riverside-logistics.com.au".to_string(),
            phone: "+61 7 3000 1234".to_string(),
            address: Address {
                street: "200 Wharf Road".to_string(),
                suburb: "Brisbane".to_string(),
                state: "QLD".to_string(),
                postcode: "4000".to_string(),
            },
            damage_types: vec![DamageType::Storm, DamageType::Hail],
            description: "Hail punched through the warehouse roof and water is coming in"
                .to_string(),
            urgency: Urgency::Urgent,
            property_value_estimate: Some(3_400_000),
            has_insurance: true,
            is_business_property: true,
            affected_area: AffectedArea::CommercialLarge,
            lead_score: None,
            ready_to_start: ReadyToStart::WithinWeek,
            decision_maker: true,
            source: Some("referral".to_string()),
        },
        RawLeadSubmission {
            name: "Ava Thompson".to_string(),
            email: "ava.thompson@example.com".to_string(),
            phone: "03 9123 4567".to_string(),
            address: Address {
                street: "7 Elgin Street".to_string(),
                suburb: "Carlton".to_string(),
                state: "VIC".to_string(),
                postcode: "3053".to_string(),
            },
            damage_types: vec![DamageType::Mould],
            description: "Black mould spreading along the bedroom ceiling after winter"
                .to_string(),
            urgency: Urgency::Routine,
            property_value_estimate: Some(640_000),
            has_insurance: false,
            is_business_property: false,
            affected_area: AffectedArea::SingleRoom,
            lead_score: None,
            ready_to_start: ReadyToStart::WithinMonth,
            decision_maker: true,
            source: None,
        },
        RawLeadSubmission {
            name: "X".to_string(),
            email: "not-an-email".to_string(),
            phone: "12345".to_string(),
            address: Address {
                street: "1 A".to_string(),
                suburb: "Parramatta".to_string(),
                state: "NSW".to_string(),
                postcode: "2150".to_string(),
            },
            damage_types: vec![],
            description: "test".to_string(),
            urgency: Urgency::Routine,
            property_value_estimate: None,
            has_insurance: false,
            is_business_property: false,
            affected_area: AffectedArea::SingleRoom,
            lead_score: None,
            ready_to_start: ReadyToStart::Flexible,
            decision_maker: false,
            source: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use restoration_leads::allocation::{Lead, LeadValidator, Money};

    #[test]
    fn sample_roster_parses() {
        let partners = load_partners(None).expect("sample roster parses");
        assert_eq!(partners.len(), 4);
        assert!(partners.iter().any(|partner| !partner.is_active()));
    }

    #[test]
    fn update_requires_existing_record() {
        let repository = InMemoryLeadRepository::default();
        let valid = LeadValidator::default()
            .validate(sample_submissions().remove(0), None, Utc::now())
            .expect("sample submission is valid");
        let missing = LeadRecord::new(Lead::open(LeadId::generate(), valid, Utc::now()));

        assert!(matches!(
            repository.update(missing.clone()),
            Err(RepositoryError::NotFound)
        ));
        repository
            .insert(missing.clone(), Utc::now() - chrono::Duration::minutes(60))
            .expect("insert succeeds");
        repository.update(missing).expect("update succeeds");
    }

    #[test]
    fn claim_is_exclusive_until_the_next_update() {
        let repository = InMemoryLeadRepository::default();
        let valid = LeadValidator::default()
            .validate(sample_submissions().remove(0), None, Utc::now())
            .expect("sample submission is valid");
        let mut lead = Lead::open(LeadId::generate(), valid, Utc::now());
        lead.set_value(Money::from_dollars(500), Utc::now())
            .expect("fresh lead accepts a value");
        let id = lead.id.clone();
        repository
            .insert(LeadRecord::new(lead), Utc::now() - chrono::Duration::minutes(60))
            .expect("insert succeeds");

        let mut claimed = repository.claim(&id).expect("first claim succeeds");
        assert!(claimed.allocating);
        assert!(matches!(
            repository.claim(&id),
            Err(RepositoryError::AllocationInProgress)
        ));

        claimed.allocating = false;
        repository.update(claimed).expect("update succeeds");
        assert!(repository.claim(&id).expect("claim after release").allocating);
    }

    #[test]
    fn insert_refuses_a_recent_lead_from_the_same_email() {
        let repository = InMemoryLeadRepository::default();
        let now = Utc::now();
        let open = |at: DateTime<Utc>| {
            let valid = LeadValidator::default()
                .validate(sample_submissions().remove(0), None, at)
                .expect("sample submission is valid");
            LeadRecord::new(Lead::open(LeadId::generate(), valid, at))
        };

        let first = open(now - chrono::Duration::minutes(10));
        let previous_at = first.lead.created_at;
        repository
            .insert(first, now - chrono::Duration::minutes(60))
            .expect("first insert succeeds");

        match repository.insert(open(now), now - chrono::Duration::minutes(60)) {
            Err(RepositoryError::RecentSubmission { previous_at: seen }) => {
                assert_eq!(seen, previous_at)
            }
            other => panic!("expected recent submission error, got {other:?}"),
        }
        repository
            .insert(open(now), now - chrono::Duration::minutes(5))
            .expect("outside the window the lead is stored");
    }
}
