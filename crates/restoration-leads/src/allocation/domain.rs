use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for accepted leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl LeadId {
    pub fn generate() -> Self {
        Self(format!("lead-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for partner (contractor) accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(pub String);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Currency amount in whole cents. Unsigned so a balance can never go below zero.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Whole dollars, truncating any cents.
    pub const fn whole_dollars(self) -> u64 {
        self.0 / 100
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Damage categories captured on intake and advertised as partner specializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[serde(alias = "flood")]
    Water,
    #[serde(alias = "smoke")]
    Fire,
    #[serde(alias = "wind")]
    Storm,
    Mould,
    Sewage,
    #[serde(alias = "trauma")]
    Biohazard,
    Hail,
    Structural,
}

impl DamageType {
    /// Lenient tag parser for CRM exports ("Water/Flood Damage", "mold", "fire_damage").
    pub fn from_tag(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let head = normalized
            .split(|c: char| c == '/' || c == '_' || c == ' ' || c == '-')
            .next()
            .unwrap_or_default();

        match head {
            "water" | "flood" | "flooding" => Some(DamageType::Water),
            "fire" | "smoke" => Some(DamageType::Fire),
            "storm" | "wind" => Some(DamageType::Storm),
            "mould" | "mold" => Some(DamageType::Mould),
            "sewage" => Some(DamageType::Sewage),
            "biohazard" | "trauma" => Some(DamageType::Biohazard),
            "hail" => Some(DamageType::Hail),
            "structural" => Some(DamageType::Structural),
            _ => None,
        }
    }
}

/// How quickly the property owner needs a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    #[serde(alias = "soon", alias = "planning")]
    Routine,
    Urgent,
    Emergency,
}

impl Urgency {
    pub const fn label(self) -> &'static str {
        match self {
            Urgency::Routine => "routine",
            Urgency::Urgent => "urgent",
            Urgency::Emergency => "emergency",
        }
    }
}

/// Extent of the damage, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedArea {
    #[default]
    SingleRoom,
    MultipleRooms,
    WholeFloor,
    EntireProperty,
    CommercialLarge,
}

impl AffectedArea {
    pub const fn label(self) -> &'static str {
        match self {
            AffectedArea::SingleRoom => "single_room",
            AffectedArea::MultipleRooms => "multiple_rooms",
            AffectedArea::WholeFloor => "whole_floor",
            AffectedArea::EntireProperty => "entire_property",
            AffectedArea::CommercialLarge => "commercial_large",
        }
    }
}

/// When the owner is ready for work to begin; feeds the derived quality score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyToStart {
    Immediately,
    WithinWeek,
    WithinMonth,
    #[default]
    Flexible,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suburb: String,
    pub state: String,
    pub postcode: String,
}

impl Address {
    /// Normalized geography keys a partner's service area can match on.
    pub fn area_keys(&self) -> [String; 3] {
        [
            normalize_area(&self.suburb),
            normalize_area(&self.postcode),
            normalize_area(&self.state),
        ]
    }
}

pub(crate) fn normalize_area(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Inbound lead payload as received from the intake boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLeadSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
    #[serde(default)]
    pub damage_types: Vec<DamageType>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urgency: Urgency,
    /// Owner's estimate in whole dollars.
    #[serde(default)]
    pub property_value_estimate: Option<u64>,
    #[serde(default)]
    pub has_insurance: bool,
    #[serde(default)]
    pub is_business_property: bool,
    #[serde(default)]
    pub affected_area: AffectedArea,
    /// Quality score computed upstream; derived on intake when absent.
    #[serde(default)]
    pub lead_score: Option<u8>,
    #[serde(default)]
    pub ready_to_start: ReadyToStart,
    #[serde(default)]
    pub decision_maker: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Sanitized submission produced by the intake validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidLead {
    pub contact: ContactDetails,
    pub address: Address,
    pub damage_types: BTreeSet<DamageType>,
    pub description: String,
    pub urgency: Urgency,
    pub property_value: Option<Money>,
    pub has_insurance: bool,
    pub is_commercial: bool,
    pub affected_area: AffectedArea,
    pub lead_score: u8,
    pub source: Option<String>,
}

/// Lifecycle of a lead inside the engine and its downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Valued,
    Assigned,
    Accepted,
    Rejected,
    Expired,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Valued => "valued",
            LeadStatus::Assigned => "assigned",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Expired => "expired",
        }
    }

    pub const fn can_transition_to(self, next: LeadStatus) -> bool {
        matches!(
            (self, next),
            (LeadStatus::New, LeadStatus::Valued)
                | (LeadStatus::Valued, LeadStatus::Assigned)
                | (LeadStatus::Assigned, LeadStatus::Accepted)
                | (LeadStatus::Assigned, LeadStatus::Rejected)
                | (LeadStatus::Assigned, LeadStatus::Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("lead cannot move from {} to {}", .from.label(), .to.label())]
    IllegalTransition { from: LeadStatus, to: LeadStatus },
    #[error("lead value already set to {0}")]
    ValueAlreadySet(Money),
    #[error("lead has not been valued")]
    NotValued,
}

/// A validated service request moving through valuation and assignment.
///
/// Status, value and assignment are private so the lifecycle rules hold: status only
/// moves forward and the value is written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub contact: ContactDetails,
    pub address: Address,
    pub damage_types: BTreeSet<DamageType>,
    pub description: String,
    pub urgency: Urgency,
    pub property_value: Option<Money>,
    pub has_insurance: bool,
    pub is_commercial: bool,
    pub affected_area: AffectedArea,
    pub lead_score: u8,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    status: LeadStatus,
    lead_value: Option<Money>,
    assigned_partner: Option<PartnerId>,
    valued_at: Option<DateTime<Utc>>,
    assigned_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn open(id: LeadId, valid: ValidLead, created_at: DateTime<Utc>) -> Self {
        let ValidLead {
            contact,
            address,
            damage_types,
            description,
            urgency,
            property_value,
            has_insurance,
            is_commercial,
            affected_area,
            lead_score,
            source,
        } = valid;

        Self {
            id,
            contact,
            address,
            damage_types,
            description,
            urgency,
            property_value,
            has_insurance,
            is_commercial,
            affected_area,
            lead_score,
            source,
            created_at,
            status: LeadStatus::New,
            lead_value: None,
            assigned_partner: None,
            valued_at: None,
            assigned_at: None,
            closed_at: None,
        }
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn lead_value(&self) -> Option<Money> {
        self.lead_value
    }

    pub fn assigned_partner(&self) -> Option<&PartnerId> {
        self.assigned_partner.as_ref()
    }

    pub fn valued_at(&self) -> Option<DateTime<Utc>> {
        self.valued_at
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn set_value(&mut self, value: Money, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        if let Some(existing) = self.lead_value {
            return Err(LifecycleError::ValueAlreadySet(existing));
        }
        self.advance(LeadStatus::Valued)?;
        self.lead_value = Some(value);
        self.valued_at = Some(at);
        Ok(())
    }

    pub fn mark_assigned(
        &mut self,
        partner: PartnerId,
        at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.lead_value.is_none() {
            return Err(LifecycleError::NotValued);
        }
        self.advance(LeadStatus::Assigned)?;
        self.assigned_partner = Some(partner);
        self.assigned_at = Some(at);
        Ok(())
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.close(LeadStatus::Accepted, at)
    }

    pub fn reject(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.close(LeadStatus::Rejected, at)
    }

    pub fn expire(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.close(LeadStatus::Expired, at)
    }

    fn close(&mut self, status: LeadStatus, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.advance(status)?;
        self.closed_at = Some(at);
        Ok(())
    }

    fn advance(&mut self, next: LeadStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    #[default]
    Active,
    Suspended,
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerCapabilities {
    pub accepts_commercial: bool,
    pub accepts_emergency: bool,
    pub insurance_approved: bool,
}

/// Persisted per-partner assignment counter, tagged with the local day it counts for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    pub day: Option<NaiveDate>,
    pub count: u32,
}

impl DailyCounter {
    /// Assignments recorded for `day`; a counter from an earlier day reads as zero.
    pub fn count_on(&self, day: NaiveDate) -> u32 {
        if self.day == Some(day) {
            self.count
        } else {
            0
        }
    }
}

/// Contractor eligible to receive leads against a pre-purchased credit balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub status: PartnerStatus,
    pub service_areas: BTreeSet<String>,
    pub specializations: BTreeSet<DamageType>,
    pub capabilities: PartnerCapabilities,
    pub credit_balance: Money,
    pub daily_lead_cap: u32,
    pub daily_counter: DailyCounter,
    /// Offset from UTC defining the partner's local midnight.
    pub utc_offset_minutes: i32,
    pub good_standing: bool,
}

impl Partner {
    pub fn is_active(&self) -> bool {
        self.status == PartnerStatus::Active
    }

    pub fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        (at + Duration::minutes(i64::from(self.utc_offset_minutes))).date_naive()
    }

    pub fn assigned_on(&self, at: DateTime<Utc>) -> u32 {
        self.daily_counter.count_on(self.local_day(at))
    }

    pub fn serves(&self, address: &Address) -> bool {
        let keys = address.area_keys();
        self.service_areas
            .iter()
            .map(|area| normalize_area(area))
            .any(|area| !area.is_empty() && keys.contains(&area))
    }

    /// Check-and-debit for a single assignment. Callers must hold the partner's
    /// exclusive lock for the whole call.
    pub fn try_debit(
        &mut self,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<DebitReceipt, DebitRefusal> {
        if !self.is_active() {
            return Err(DebitRefusal::Inactive(self.status));
        }

        let remaining =
            self.credit_balance
                .checked_sub(amount)
                .ok_or(DebitRefusal::InsufficientCredit {
                    available: self.credit_balance,
                    required: amount,
                })?;

        let day = self.local_day(at);
        let assigned = self.daily_counter.count_on(day);
        if assigned >= self.daily_lead_cap {
            return Err(DebitRefusal::DailyCapReached {
                cap: self.daily_lead_cap,
            });
        }

        self.credit_balance = remaining;
        self.daily_counter = DailyCounter {
            day: Some(day),
            count: assigned + 1,
        };

        Ok(DebitReceipt {
            partner_id: self.id.clone(),
            charged: amount,
            remaining_credit: remaining,
            assigned_today: assigned + 1,
            day,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitReceipt {
    pub partner_id: PartnerId,
    pub charged: Money,
    pub remaining_credit: Money,
    pub assigned_today: u32,
    pub day: NaiveDate,
}

/// Why the final gate refused a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitRefusal {
    Inactive(PartnerStatus),
    InsufficientCredit { available: Money, required: Money },
    DailyCapReached { cap: u32 },
    UnknownPartner,
}

/// Business reasons a lead ends without an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    NoEligiblePartner,
    InsufficientCredit,
    DailyCapReached,
}

impl NoMatchReason {
    pub const fn code(self) -> &'static str {
        match self {
            NoMatchReason::NoEligiblePartner => "no_eligible_partner",
            NoMatchReason::InsufficientCredit => "insufficient_credit",
            NoMatchReason::DailyCapReached => "daily_cap_reached",
        }
    }
}

/// The engine's output for one lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub lead_id: LeadId,
    pub partner_id: Option<PartnerId>,
    pub lead_value: Money,
    pub match_score: Option<u32>,
    pub decided_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoMatchReason>,
    pub candidates_tried: usize,
}

impl AssignmentDecision {
    pub fn is_assigned(&self) -> bool {
        self.partner_id.is_some()
    }

    pub fn summary(&self) -> String {
        match (&self.partner_id, self.reason) {
            (Some(partner), _) => format!(
                "assigned to {} for {} (score {})",
                partner,
                self.lead_value,
                self.match_score.unwrap_or_default()
            ),
            (None, Some(reason)) => format!("no match: {}", reason.code()),
            (None, None) => format!("no match: {}", NoMatchReason::NoEligiblePartner.code()),
        }
    }
}
