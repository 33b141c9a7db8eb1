mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use restoration_leads::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
