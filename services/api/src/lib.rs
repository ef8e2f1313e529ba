mod cli;
mod infra;
mod ops;
mod routes;
mod server;

use directbnb::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
