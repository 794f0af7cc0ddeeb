use tracing::info;

use super::config::Config;
use crate::counting::{
    store::{self, MongoDb},
    Counting,
};

#[derive(Debug, thiserror::Error, thisslime::TracingError)]
pub enum Error {
    #[error("error connecting to mongodb: {0}")]
    #[event(level = ERROR)]
    MongoDb(#[from] mongodb::error::Error),

    #[error("error preparing counting storage: {0}")]
    #[event(level = ERROR)]
    Store(#[from] store::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// State shared by every command and event handler.
#[derive(Debug, Clone)]
pub struct PoiseData {
    config: Config,
    counting: Counting<MongoDb>,
}

impl PoiseData {
    pub async fn new(config: Config) -> Result<Self> {
        let db = super::db::database(&config.db).await?;

        let backend = MongoDb::from_database(&db);
        backend.ensure_indexes().await?;
        info!("counting storage ready");

        let counting = Counting::new(backend.into(), config.counting.policy());

        Ok(Self { config, counting })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn counting(&self) -> &Counting<MongoDb> {
        &self.counting
    }
}
