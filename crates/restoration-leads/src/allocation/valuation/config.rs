use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::{AffectedArea, Urgency};

/// Property value band: estimates at or above `minimum` earn `bonus` (whole dollars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValueBand {
    pub minimum: u64,
    pub bonus: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyPremiums {
    pub routine: u64,
    pub urgent: u64,
    pub emergency: u64,
}

impl Default for UrgencyPremiums {
    fn default() -> Self {
        Self {
            routine: 0,
            urgent: 100,
            emergency: 200,
        }
    }
}

impl UrgencyPremiums {
    pub fn premium_for(&self, urgency: Urgency) -> u64 {
        match urgency {
            Urgency::Routine => self.routine,
            Urgency::Urgent => self.urgent,
            Urgency::Emergency => self.emergency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaBonuses {
    pub single_room: u64,
    pub multiple_rooms: u64,
    pub whole_floor: u64,
    pub entire_property: u64,
    pub commercial_large: u64,
}

impl Default for AreaBonuses {
    fn default() -> Self {
        Self {
            single_room: 0,
            multiple_rooms: 50,
            whole_floor: 100,
            entire_property: 200,
            commercial_large: 300,
        }
    }
}

impl AreaBonuses {
    pub fn bonus_for(&self, area: AffectedArea) -> u64 {
        match area {
            AffectedArea::SingleRoom => self.single_room,
            AffectedArea::MultipleRooms => self.multiple_rooms,
            AffectedArea::WholeFloor => self.whole_floor,
            AffectedArea::EntireProperty => self.entire_property,
            AffectedArea::CommercialLarge => self.commercial_large,
        }
    }
}

/// Pricing constants for lead valuation. Dollar amounts are whole dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub base_value: u64,
    pub property_bands: Vec<PropertyValueBand>,
    pub insurance_bonus: u64,
    pub urgency_premiums: UrgencyPremiums,
    pub commercial_premium: u64,
    pub area_bonuses: AreaBonuses,
    /// Keyed by state/territory code; lookups ignore case.
    pub region_multipliers: BTreeMap<String, f64>,
    pub rounding_increment: u64,
    pub ceiling: u64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        let property_bands = vec![
            PropertyValueBand {
                minimum: 2_000_000,
                bonus: 300,
            },
            PropertyValueBand {
                minimum: 1_000_000,
                bonus: 200,
            },
            PropertyValueBand {
                minimum: 750_000,
                bonus: 150,
            },
            PropertyValueBand {
                minimum: 500_000,
                bonus: 100,
            },
        ];

        let region_multipliers = [
            ("NSW", 1.2),
            ("VIC", 1.15),
            ("QLD", 1.1),
            ("WA", 1.1),
            ("ACT", 1.05),
        ]
        .into_iter()
        .map(|(state, multiplier)| (state.to_string(), multiplier))
        .collect();

        Self {
            base_value: 200,
            property_bands,
            insurance_bonus: 150,
            urgency_premiums: UrgencyPremiums::default(),
            commercial_premium: 250,
            area_bonuses: AreaBonuses::default(),
            region_multipliers,
            rounding_increment: 50,
            ceiling: 2_500,
        }
    }
}

impl ValuationConfig {
    /// Bonus of the highest band the estimate reaches; zero below every band.
    pub fn property_bonus(&self, estimate_dollars: u64) -> u64 {
        self.property_bands
            .iter()
            .filter(|band| estimate_dollars >= band.minimum)
            .max_by_key(|band| band.minimum)
            .map(|band| band.bonus)
            .unwrap_or(0)
    }

    /// Multiplier for `state`, matching configured keys without regard to case or
    /// surrounding whitespace. Unknown or invalid entries read as 1.0.
    pub fn region_multiplier(&self, state: &str) -> f64 {
        let key = state.trim();
        self.region_multipliers
            .iter()
            .find(|(region, _)| region.trim().eq_ignore_ascii_case(key))
            .map(|(_, multiplier)| *multiplier)
            .filter(|multiplier| multiplier.is_finite() && *multiplier >= 0.0)
            .unwrap_or(1.0)
    }

    pub(crate) fn increment(&self) -> u64 {
        self.rounding_increment.max(1)
    }

    /// Ceiling snapped down to the rounding increment so clamped values stay on the grid.
    pub(crate) fn effective_ceiling(&self) -> u64 {
        let increment = self.increment();
        self.ceiling / increment * increment
    }
}
