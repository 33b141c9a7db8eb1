use crate::cli::ServeArgs;
use crate::infra::{load_partners, AppState, InMemoryLeadRepository};
use crate::routes::with_lead_routes;
use axum::Extension;
use restoration_leads::allocation::{
    InMemoryPartnerStore, LeadAssignmentService, QueuedRecorder, RetryPolicy, TracingSink,
};
use restoration_leads::config::AppConfig;
use restoration_leads::error::AppError;
use restoration_leads::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
    };

    let partners = load_partners(args.roster.as_deref())?;
    info!(partners = partners.len(), "partner roster loaded");

    let store = Arc::new(InMemoryPartnerStore::new(partners));
    let repository = Arc::new(InMemoryLeadRepository::default());
    let (recorder, _recorder_task) =
        QueuedRecorder::spawn(Arc::new(TracingSink), RetryPolicy::default());
    let lead_service = Arc::new(LeadAssignmentService::new(
        repository,
        store,
        Arc::new(recorder),
        config.engine.clone(),
    ));

    let app = with_lead_routes(lead_service).layer(Extension(app_state));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        allocation_timeout_ms = config.engine.allocation_timeout_ms,
        "lead assignment engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
