use super::super::domain::{RawLeadSubmission, ReadyToStart, Urgency};

/// Derive a 0-100 quality score from the submission when intake did not supply one.
pub fn quality_score(raw: &RawLeadSubmission) -> u8 {
    let mut score: u32 = 0;

    if raw.has_insurance {
        score += 30;
    }

    score += match raw.urgency {
        Urgency::Emergency => 20,
        Urgency::Urgent => 15,
        Urgency::Routine => 0,
    };

    score += match raw.property_value_estimate {
        Some(value) if value > 1_000_000 => 20,
        Some(value) if value > 500_000 => 15,
        Some(value) if value > 250_000 => 10,
        _ => 0,
    };

    if raw.is_business_property {
        score += 15;
    }

    score += match raw.ready_to_start {
        ReadyToStart::Immediately => 10,
        ReadyToStart::WithinWeek => 7,
        ReadyToStart::WithinMonth | ReadyToStart::Flexible => 0,
    };

    if raw.decision_maker {
        score += 5;
    }

    score.min(100) as u8
}
