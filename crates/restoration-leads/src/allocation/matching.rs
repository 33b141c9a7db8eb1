use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidates::CandidateSet;
use super::domain::{Lead, Partner, Urgency};

/// Weights for the additive fit score and the acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub service_area: u32,
    pub per_damage_type: u32,
    pub insurance: u32,
    pub commercial: u32,
    pub emergency: u32,
    pub good_standing: u32,
    pub threshold: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            service_area: 50,
            per_damage_type: 20,
            insurance: 15,
            commercial: 25,
            emergency: 20,
            good_standing: 10,
            threshold: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub partner: Partner,
    pub score: u32,
    pub assigned_today: u32,
}

/// Candidates ordered best first, with the threshold used to accept them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedCandidates {
    ranked: Vec<ScoredCandidate>,
    threshold: u32,
}

impl RankedCandidates {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn top(&self) -> Option<&ScoredCandidate> {
        self.ranked.first()
    }

    pub fn all(&self) -> &[ScoredCandidate] {
        &self.ranked
    }

    /// Candidates at or above the threshold, in rank order.
    pub fn eligible(&self) -> impl Iterator<Item = &ScoredCandidate> {
        let threshold = self.threshold;
        self.ranked
            .iter()
            .take_while(move |candidate| candidate.score >= threshold)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    weights: MatchWeights,
}

impl MatchScorer {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    pub fn score(&self, lead: &Lead, partner: &Partner) -> u32 {
        let weights = &self.weights;
        let mut score = 0;

        if partner.serves(&lead.address) {
            score += weights.service_area;
        }

        let overlapping = lead
            .damage_types
            .intersection(&partner.specializations)
            .count() as u32;
        score += overlapping * weights.per_damage_type;

        if lead.has_insurance && partner.capabilities.insurance_approved {
            score += weights.insurance;
        }

        if lead.is_commercial && partner.capabilities.accepts_commercial {
            score += weights.commercial;
        }

        if lead.urgency == Urgency::Emergency && partner.capabilities.accepts_emergency {
            score += weights.emergency;
        }

        if partner.good_standing {
            score += weights.good_standing;
        }

        score
    }

    /// Rank by score, then lightest load today, then partner id.
    pub fn rank(&self, lead: &Lead, candidates: CandidateSet, at: DateTime<Utc>) -> RankedCandidates {
        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_partners()
            .into_iter()
            .map(|partner| ScoredCandidate {
                score: self.score(lead, &partner),
                assigned_today: partner.assigned_on(at),
                partner,
            })
            .collect();

        ranked.sort_by(compare_candidates);

        RankedCandidates {
            ranked,
            threshold: self.weights.threshold,
        }
    }
}

fn compare_candidates(left: &ScoredCandidate, right: &ScoredCandidate) -> Ordering {
    right
        .score
        .cmp(&left.score)
        .then_with(|| left.assigned_today.cmp(&right.assigned_today))
        .then_with(|| left.partner.id.cmp(&right.partner.id))
}
