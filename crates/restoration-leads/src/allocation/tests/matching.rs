use super::common::*;
use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::allocation::candidates::filter_candidates;
use crate::allocation::domain::{
    DailyCounter, DamageType, Money, Partner, PartnerCapabilities, PartnerStatus,
};
use crate::allocation::matching::{MatchScorer, MatchWeights};

fn busy(mut partner: Partner, assigned_today: u32) -> Partner {
    partner.daily_counter = DailyCounter {
        day: NaiveDate::from_ymd_opt(2025, 3, 14),
        count: assigned_today,
    };
    partner
}

fn bare(id: &str) -> Partner {
    let mut partner = partner(id, 5_000);
    partner.capabilities = PartnerCapabilities::default();
    partner.good_standing = false;
    partner
}

#[test]
fn score_adds_every_matching_weight() {
    let lead = valued_lead(emergency_submission());
    let scorer = MatchScorer::default();

    assert_eq!(scorer.score(&lead, &partner("full", 5_000)), 140);
    assert_eq!(scorer.score(&lead, &bare("bare")), 70);
}

#[test]
fn damage_overlap_is_cumulative() {
    let mut raw = emergency_submission();
    raw.damage_types = vec![DamageType::Water, DamageType::Mould, DamageType::Fire];
    let lead = valued_lead(raw);

    let mut specialist = bare("specialist");
    specialist.specializations =
        BTreeSet::from([DamageType::Water, DamageType::Mould, DamageType::Fire]);

    assert_eq!(MatchScorer::default().score(&lead, &specialist), 50 + 60);
}

#[test]
fn capabilities_only_count_when_the_lead_needs_them() {
    let lead = valued_lead(routine_submission());
    let mut partner = partner("hobart", 5_000);
    partner.service_areas = BTreeSet::from(["TAS".to_string()]);
    partner.specializations = BTreeSet::from([DamageType::Mould]);

    // Area, one specialization and good standing; the lead is not insured,
    // commercial or an emergency.
    assert_eq!(MatchScorer::default().score(&lead, &partner), 80);
}

#[test]
fn ranking_breaks_ties_by_load_then_id() {
    let lead = valued_lead(emergency_submission());
    let value = lead.lead_value().expect("valued");
    let roster = vec![
        busy(partner("bravo", 5_000), 2),
        busy(partner("alpha", 5_000), 2),
        busy(partner("charlie", 5_000), 0),
        bare("delta"),
    ];

    let candidates = filter_candidates(&lead, value, roster);
    let ranked = MatchScorer::default().rank(&lead, candidates, now());

    let order: Vec<&str> = ranked
        .all()
        .iter()
        .map(|candidate| candidate.partner.id.0.as_str())
        .collect();
    assert_eq!(order, vec!["charlie", "alpha", "bravo", "delta"]);
    assert_eq!(ranked.top().map(|candidate| candidate.score), Some(140));
    assert_eq!(ranked.all()[1].assigned_today, 2);
}

#[test]
fn counters_from_earlier_days_do_not_count_as_load() {
    let lead = valued_lead(emergency_submission());
    let value = lead.lead_value().expect("valued");

    let mut yesterday = partner("alpha", 5_000);
    yesterday.daily_counter = DailyCounter {
        day: NaiveDate::from_ymd_opt(2025, 3, 13),
        count: 9,
    };

    let ranked = MatchScorer::default().rank(
        &lead,
        filter_candidates(&lead, value, vec![yesterday, busy(partner("bravo", 5_000), 1)]),
        now(),
    );

    assert_eq!(ranked.all()[0].partner.id, partner_id("alpha"));
    assert_eq!(ranked.all()[0].assigned_today, 0);
}

#[test]
fn eligible_candidates_stop_at_the_threshold() {
    let lead = valued_lead(emergency_submission());
    let value = lead.lead_value().expect("valued");
    let scorer = MatchScorer::new(MatchWeights {
        threshold: 100,
        ..MatchWeights::default()
    });

    let ranked = scorer.rank(
        &lead,
        filter_candidates(&lead, value, vec![partner("full", 5_000), bare("bare")]),
        now(),
    );

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked.threshold(), 100);
    let eligible: Vec<_> = ranked.eligible().map(|candidate| candidate.score).collect();
    assert_eq!(eligible, vec![140]);
}

#[test]
fn filter_applies_status_credit_and_geography_gates() {
    let lead = valued_lead(emergency_submission());
    let value = lead.lead_value().expect("valued");
    assert_eq!(value, Money::from_dollars(1_850));

    let mut suspended = partner("suspended", 5_000);
    suspended.status = PartnerStatus::Suspended;

    let short_of_credit = partner("short", 1_849);
    let exact_credit = partner("exact", 1_850);

    let mut elsewhere = partner("elsewhere", 5_000);
    elsewhere.service_areas = BTreeSet::from(["Geelong".to_string(), "3220".to_string()]);

    let mut by_postcode = partner("postcode", 5_000);
    by_postcode.service_areas = BTreeSet::from([" 2150 ".to_string()]);

    let mut by_state = partner("state", 5_000);
    by_state.service_areas = BTreeSet::from(["nsw".to_string()]);

    let candidates = filter_candidates(
        &lead,
        value,
        vec![
            suspended,
            short_of_credit,
            exact_credit,
            elsewhere,
            by_postcode,
            by_state,
        ],
    );

    let kept: Vec<&str> = candidates
        .iter()
        .map(|partner| partner.id.0.as_str())
        .collect();
    assert_eq!(kept, vec!["exact", "postcode", "state"]);
}

#[test]
fn empty_roster_yields_empty_candidate_set() {
    let lead = valued_lead(emergency_submission());
    let value = lead.lead_value().expect("valued");
    assert!(filter_candidates(&lead, value, Vec::new()).is_empty());
}
