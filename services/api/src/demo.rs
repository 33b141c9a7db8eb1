use crate::infra::{load_partners, sample_submissions, InMemoryEventLog, InMemoryLeadRepository};
use clap::Args;
use restoration_leads::allocation::{
    EngineConfig, InMemoryPartnerStore, LeadAssignmentService, LeadResponse, LeadServiceError,
    PartnerId, RecordedEvent, ValuationEngine,
};
use restoration_leads::config::AppConfig;
use restoration_leads::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Partner roster CSV (defaults to the built-in sample roster)
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Print the additive valuation breakdown for each accepted lead
    #[arg(long)]
    pub(crate) show_valuation: bool,
    /// Ignore APP_ENGINE_CONFIG and friends and run with built-in defaults
    #[arg(long)]
    pub(crate) default_config: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let engine = if args.default_config {
        EngineConfig::default()
    } else {
        AppConfig::load()?.engine
    };

    let partners = load_partners(args.roster.as_deref())?;
    let partner_ids: Vec<PartnerId> = partners.iter().map(|partner| partner.id.clone()).collect();

    let store = Arc::new(InMemoryPartnerStore::new(partners));
    let events = Arc::new(InMemoryEventLog::default());
    let valuation = ValuationEngine::new(engine.valuation.clone());
    let service = LeadAssignmentService::new(
        Arc::new(InMemoryLeadRepository::default()),
        store.clone(),
        events.clone(),
        engine,
    );

    println!("Lead assignment demo");
    println!("Partners on roster: {}", partner_ids.len());

    let mut first_assigned = None;
    let submissions = sample_submissions();
    let repeat = submissions.first().cloned();

    for (index, submission) in submissions.into_iter().chain(repeat).enumerate() {
        println!(
            "\n#{} {} ({}, {})",
            index + 1,
            submission.name.trim(),
            submission.address.suburb,
            submission.address.state
        );

        match service.intake(submission) {
            Ok(record) => {
                let view = record.status_view();
                println!("  Status: {}", view.status);
                if let Some(value) = view.lead_value {
                    println!("  Lead value: {}", value);
                }
                println!("  Decision: {}", view.decision_rationale);

                if args.show_valuation {
                    let breakdown = valuation.valuate(&record.lead);
                    for component in &breakdown.components {
                        println!(
                            "    {:?}: ${} ({})",
                            component.factor, component.amount, component.notes
                        );
                    }
                    println!(
                        "    additive {} x score {:.2} x region {:.2}",
                        breakdown.additive_total,
                        breakdown.score_multiplier,
                        breakdown.region_multiplier
                    );
                }

                if first_assigned.is_none() && record.lead.assigned_partner().is_some() {
                    first_assigned = Some(record.lead.id.clone());
                }
            }
            Err(LeadServiceError::Rejected(reasons)) => {
                println!("  Rejected:");
                for message in reasons.messages() {
                    println!("  - {}", message);
                }
            }
            Err(err) => println!("  Assignment failed: {}", err),
        }
    }

    if let Some(lead_id) = first_assigned {
        match service.respond(&lead_id, LeadResponse::Accept) {
            Ok(record) => println!(
                "\nPartner response for {}: {}",
                lead_id,
                record.lead.status().label()
            ),
            Err(err) => println!("\nPartner response for {} failed: {}", lead_id, err),
        }
    }

    println!("\nPartner balances");
    for partner_id in &partner_ids {
        match store.get(partner_id) {
            Ok(Some(partner)) => println!(
                "  {:<16} credit {:>10}  leads today {}",
                partner.id.to_string(),
                partner.credit_balance.to_string(),
                partner.daily_counter.count
            ),
            Ok(None) => println!("  {:<16} missing from store", partner_id.to_string()),
            Err(err) => println!("  {:<16} unavailable: {}", partner_id.to_string(), err),
        }
    }

    let recorded = events.events();
    let decisions = recorded
        .iter()
        .filter(|event| matches!(event, RecordedEvent::Decision(_)))
        .count();
    println!(
        "\nRecorded events: {} ({} decisions, {} state changes)",
        recorded.len(),
        decisions,
        recorded.len() - decisions
    );

    Ok(())
}
