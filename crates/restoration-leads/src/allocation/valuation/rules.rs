use super::super::domain::Lead;
use super::config::ValuationConfig;
use super::{ValuationComponent, ValuationFactor};

/// Additive pricing components in their fixed audit order.
pub(crate) fn additive_components(
    lead: &Lead,
    config: &ValuationConfig,
) -> Vec<ValuationComponent> {
    let mut components = Vec::with_capacity(6);

    components.push(ValuationComponent {
        factor: ValuationFactor::Base,
        amount: config.base_value,
        notes: "base lead value".to_string(),
    });

    let property_bonus = match lead.property_value {
        Some(estimate) => {
            let dollars = estimate.whole_dollars();
            let bonus = config.property_bonus(dollars);
            ValuationComponent {
                factor: ValuationFactor::PropertyValue,
                amount: bonus,
                notes: format!("property estimate ${dollars}"),
            }
        }
        None => ValuationComponent {
            factor: ValuationFactor::PropertyValue,
            amount: 0,
            notes: "no property estimate supplied".to_string(),
        },
    };
    components.push(property_bonus);

    components.push(ValuationComponent {
        factor: ValuationFactor::Insurance,
        amount: if lead.has_insurance {
            config.insurance_bonus
        } else {
            0
        },
        notes: if lead.has_insurance {
            "insurance claim present".to_string()
        } else {
            "uninsured".to_string()
        },
    });

    components.push(ValuationComponent {
        factor: ValuationFactor::Urgency,
        amount: config.urgency_premiums.premium_for(lead.urgency),
        notes: format!("urgency {}", lead.urgency.label()),
    });

    components.push(ValuationComponent {
        factor: ValuationFactor::Commercial,
        amount: if lead.is_commercial {
            config.commercial_premium
        } else {
            0
        },
        notes: if lead.is_commercial {
            "commercial property".to_string()
        } else {
            "residential property".to_string()
        },
    });

    components.push(ValuationComponent {
        factor: ValuationFactor::AffectedArea,
        amount: config.area_bonuses.bonus_for(lead.affected_area),
        notes: format!("affected area {}", lead.affected_area.label()),
    });

    components
}
