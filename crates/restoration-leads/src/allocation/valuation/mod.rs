mod config;
mod rules;

pub use config::{AreaBonuses, PropertyValueBand, UrgencyPremiums, ValuationConfig};

use serde::{Deserialize, Serialize};

use super::domain::{Lead, Money};

/// Pure pricing engine: identical leads always produce identical values.
#[derive(Debug, Clone, Default)]
pub struct ValuationEngine {
    config: ValuationConfig,
}

impl ValuationEngine {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn valuate(&self, lead: &Lead) -> LeadValue {
        let components = rules::additive_components(lead, &self.config);
        let additive_total: u64 = components.iter().map(|component| component.amount).sum();

        let score_multiplier = 0.5 + f64::from(lead.lead_score.min(100)) / 100.0;
        let region_multiplier = self.config.region_multiplier(&lead.address.state);

        let scaled = additive_total as f64 * score_multiplier * region_multiplier;
        let increment = self.config.increment() as f64;
        let rounded = (scaled / increment).round() * increment;
        let capped = rounded.clamp(0.0, self.config.effective_ceiling() as f64);

        LeadValue {
            value: Money::from_dollars(capped as u64),
            additive_total: Money::from_dollars(additive_total),
            score_multiplier,
            region_multiplier,
            components,
        }
    }
}

/// Pricing factor contributing to the additive sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationFactor {
    Base,
    PropertyValue,
    Insurance,
    Urgency,
    Commercial,
    AffectedArea,
}

/// One additive contribution, kept for audit trails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationComponent {
    pub factor: ValuationFactor,
    pub amount: u64,
    pub notes: String,
}

/// Valuation output: the charged value plus the trail that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadValue {
    pub value: Money,
    pub additive_total: Money,
    pub score_multiplier: f64,
    pub region_multiplier: f64,
    pub components: Vec<ValuationComponent>,
}
