//! Partner roster import from CRM CSV exports.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{
    DailyCounter, DamageType, Money, Partner, PartnerCapabilities, PartnerId, PartnerStatus,
};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read partner roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid partner roster CSV: {}", err),
            RosterImportError::InvalidRow { line, message } => {
                write!(f, "partner roster line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub fn load_roster<P: AsRef<Path>>(path: P) -> Result<Vec<Partner>, RosterImportError> {
    let file = std::fs::File::open(path)?;
    parse_roster(file)
}

/// Parse one partner per row. List columns are `;`-separated and credit is in dollars.
pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<Partner>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut partners = Vec::new();

    for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
        let row = record?;
        // Header is line 1.
        let line = index as u64 + 2;
        let partner = row
            .into_partner()
            .map_err(|message| RosterImportError::InvalidRow { line, message })?;
        partners.push(partner);
    }

    Ok(partners)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Partner ID")]
    partner_id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(rename = "Service Areas", default)]
    service_areas: String,
    #[serde(rename = "Specializations", default)]
    specializations: String,
    #[serde(
        rename = "Accepts Commercial",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    accepts_commercial: Option<String>,
    #[serde(
        rename = "Accepts Emergency",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    accepts_emergency: Option<String>,
    #[serde(
        rename = "Insurance Approved",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    insurance_approved: Option<String>,
    #[serde(rename = "Credit")]
    credit: String,
    #[serde(rename = "Daily Cap")]
    daily_cap: u32,
    #[serde(
        rename = "UTC Offset Minutes",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    utc_offset_minutes: Option<String>,
    #[serde(
        rename = "Good Standing",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    good_standing: Option<String>,
}

impl RosterRow {
    fn into_partner(self) -> Result<Partner, String> {
        if self.partner_id.is_empty() {
            return Err("partner id is required".to_string());
        }

        let status = match self.status.as_deref() {
            None => PartnerStatus::Active,
            Some(raw) => parse_status(raw)?,
        };

        let specializations = split_list(&self.specializations)
            .map(|tag| {
                DamageType::from_tag(tag).ok_or_else(|| format!("unknown specialization '{tag}'"))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let utc_offset_minutes = match self.utc_offset_minutes.as_deref() {
            None => 0,
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| format!("invalid UTC offset '{raw}'"))?,
        };

        Ok(Partner {
            id: PartnerId(self.partner_id),
            name: self.name,
            status,
            service_areas: split_list(&self.service_areas)
                .map(str::to_string)
                .collect(),
            specializations,
            capabilities: PartnerCapabilities {
                accepts_commercial: parse_flag(self.accepts_commercial.as_deref())?,
                accepts_emergency: parse_flag(self.accepts_emergency.as_deref())?,
                insurance_approved: parse_flag(self.insurance_approved.as_deref())?,
            },
            credit_balance: parse_dollars(&self.credit)?,
            daily_lead_cap: self.daily_cap,
            daily_counter: DailyCounter::default(),
            utc_offset_minutes,
            good_standing: match self.good_standing.as_deref() {
                None => true,
                raw => parse_flag(raw)?,
            },
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(';').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_status(raw: &str) -> Result<PartnerStatus, String> {
    match raw.to_ascii_lowercase().as_str() {
        "active" => Ok(PartnerStatus::Active),
        "suspended" => Ok(PartnerStatus::Suspended),
        "inactive" => Ok(PartnerStatus::Inactive),
        _ => Err(format!("unknown partner status '{raw}'")),
    }
}

fn parse_flag(raw: Option<&str>) -> Result<bool, String> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("yes" | "y" | "true" | "1") => Ok(true),
        Some("no" | "n" | "false" | "0") => Ok(false),
        Some(other) => Err(format!("expected yes/no, found '{other}'")),
    }
}

/// "$1,250.50" -> 125050 cents.
fn parse_dollars(raw: &str) -> Result<Money, String> {
    let invalid = || format!("invalid credit amount '{raw}'");
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() || fraction.len() > 2 {
        return Err(invalid());
    }

    let dollars = whole.parse::<u64>().map_err(|_| invalid())?;
    let cents = if fraction.is_empty() {
        0
    } else {
        let parsed = fraction.parse::<u64>().map_err(|_| invalid())?;
        if fraction.len() == 1 {
            parsed * 10
        } else {
            parsed
        }
    };

    dollars
        .checked_mul(100)
        .and_then(|total| total.checked_add(cents))
        .map(Money::from_cents)
        .ok_or_else(invalid)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
