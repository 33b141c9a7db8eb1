//! Intake validation: turns a raw submission into a `ValidLead` or the full list of
//! rules it breaks.

mod quality;

pub use quality::quality_score;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{ContactDetails, Money, RawLeadSubmission, ValidLead};

/// Tunable intake rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub min_name_chars: usize,
    pub min_address_chars: usize,
    pub min_description_chars: usize,
    pub placeholder_tokens: Vec<String>,
    pub duplicate_window_minutes: i64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            min_name_chars: 2,
            min_address_chars: 5,
            min_description_chars: 20,
            placeholder_tokens: ["test", "asdf", "fake", "xxx", "qwerty", "lorem", "dummy"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            duplicate_window_minutes: 60,
        }
    }
}

/// A single intake rule a submission failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    #[error("name must be at least {min} characters")]
    NameTooShort { min: usize },
    #[error("phone number is not a valid Australian mobile or landline")]
    InvalidPhone,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("property address must be at least {min} characters")]
    AddressTooShort { min: usize },
    #[error("at least one damage type is required")]
    MissingDamageTypes,
    #[error("damage description must be at least {min} characters")]
    DescriptionTooShort { min: usize },
    #[error("damage description contains placeholder text '{token}'")]
    PlaceholderContent { token: String },
    #[error("duplicate submission: a lead from this email was received at {previous_at}")]
    DuplicateSubmission { previous_at: DateTime<Utc> },
}

/// Every violation found in a rejected submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReasons(pub Vec<Violation>);

impl RejectionReasons {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn contains(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.0.iter().any(predicate)
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for RejectionReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lead rejected: {}", self.messages().join("; "))
    }
}

impl std::error::Error for RejectionReasons {}

/// Stateless validator applying `IntakeConfig` to raw submissions.
#[derive(Debug, Clone, Default)]
pub struct LeadValidator {
    config: IntakeConfig,
}

impl LeadValidator {
    pub fn new(config: IntakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Validate a submission. `previous_submission` is the creation time of the most
    /// recent lead from the same email, looked up by the caller before validation.
    pub fn validate(
        &self,
        raw: RawLeadSubmission,
        previous_submission: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<ValidLead, RejectionReasons> {
        let config = &self.config;
        let mut violations = Vec::new();

        let name = raw.name.trim().to_string();
        if name.chars().count() < config.min_name_chars {
            violations.push(Violation::NameTooShort {
                min: config.min_name_chars,
            });
        }

        let phone = normalize_phone(&raw.phone);
        if !phone_pattern().is_match(&phone) {
            violations.push(Violation::InvalidPhone);
        }

        let email = normalize_email(&raw.email);
        if !email_pattern().is_match(&email) {
            violations.push(Violation::InvalidEmail);
        }

        if raw.address.street.trim().chars().count() < config.min_address_chars {
            violations.push(Violation::AddressTooShort {
                min: config.min_address_chars,
            });
        }

        if raw.damage_types.is_empty() {
            violations.push(Violation::MissingDamageTypes);
        }

        let description = raw.description.trim().to_string();
        if description.chars().count() < config.min_description_chars {
            violations.push(Violation::DescriptionTooShort {
                min: config.min_description_chars,
            });
        }

        let lowered = description.to_lowercase();
        if let Some(token) = config
            .placeholder_tokens
            .iter()
            .find(|token| !token.is_empty() && lowered.contains(&token.to_lowercase()))
        {
            violations.push(Violation::PlaceholderContent {
                token: token.clone(),
            });
        }

        if let Some(previous_at) = previous_submission {
            let window = Duration::minutes(config.duplicate_window_minutes);
            if now.signed_duration_since(previous_at) < window {
                violations.push(Violation::DuplicateSubmission { previous_at });
            }
        }

        if !violations.is_empty() {
            return Err(RejectionReasons(violations));
        }

        let lead_score = raw
            .lead_score
            .map(|score| score.min(100))
            .unwrap_or_else(|| quality_score(&raw));

        let mut address = raw.address;
        address.street = address.street.trim().to_string();
        address.suburb = address.suburb.trim().to_string();
        address.state = address.state.trim().to_ascii_uppercase();
        address.postcode = address.postcode.trim().to_string();

        Ok(ValidLead {
            contact: ContactDetails { name, email, phone },
            address,
            damage_types: raw.damage_types.into_iter().collect::<BTreeSet<_>>(),
            description,
            urgency: raw.urgency,
            property_value: raw.property_value_estimate.map(Money::from_dollars),
            has_insurance: raw.has_insurance,
            is_commercial: raw.is_business_property,
            affected_area: raw.affected_area,
            lead_score,
            source: raw.source,
        })
    }
}

/// Lower-cased, trimmed email used for validation and duplicate lookups.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Strip formatting characters so the phone grammar sees digits and a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Mobiles (04), landlines (02/03/07/08) in national or +61 form, and 13/1300/1800 numbers.
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?:\+61|61|0)[23478]\d{8}|1[38]00\d{6}|13\d{4})$")
            .expect("phone pattern compiles")
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email pattern compiles")
    })
}
