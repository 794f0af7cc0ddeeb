use mongodb::{options::ClientOptions, Client, Database};
use tracing::info;

use super::config::DbConfig;

#[tracing::instrument(skip_all, name = "db")]
pub async fn database(config: &DbConfig) -> mongodb::error::Result<Database> {
    let mut options = ClientOptions::parse(config.url()).await?;
    options.app_name = Some("countbot".to_owned());

    let client = Client::with_options(options)?;

    info!(name = config.name(), "using database");
    Ok(client.database(config.name()))
}
