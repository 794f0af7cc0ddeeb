use std::time::Duration;

use ::config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use poise::serenity_prelude::{ActivityData, ChannelId, GuildId};
use rand::seq::IteratorRandom;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::counting::engine::Policy;

#[derive(Debug, thiserror::Error, thisslime::TracingError)]
pub enum Error {
    #[error("file read error: {0}")]
    #[event(level = ERROR)]
    Read(::config::ConfigError),

    #[error("parsing error: {0}")]
    #[event(level = ERROR)]
    Parse(::config::ConfigError),
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub bot: BotConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub counting: CountingConfig,
}

impl Config {
    const PATH_VAR: &'static str = "COUNTBOT_TOML";
    const DEFAULT_PATH: &'static str = "./countbot.toml";
    const ENV_PREFIX: &'static str = "COUNTBOT";

    /// Reads the config file, then lets `COUNTBOT_<SECTION>__<KEY>`
    /// environment variables override it.
    #[tracing::instrument(skip_all, name = "config")]
    pub fn load() -> Result<Self, Error> {
        dotenvy::dotenv().ok();

        let path = if let Ok(path) = std::env::var(Self::PATH_VAR) {
            info!(path, "looking for config file with COUNTBOT_TOML...");
            path
        } else {
            let path = Self::DEFAULT_PATH.to_owned();
            warn!(path, "COUNTBOT_TOML env unset, using default path");
            path
        };

        Self::from_builder(
            ::config::Config::builder()
                .add_source(File::new(&path, FileFormat::Toml))
                .add_source(
                    Environment::with_prefix(Self::ENV_PREFIX)
                        .prefix_separator("_")
                        .separator("__"),
                ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, Error> {
        builder
            .build()
            .map_err(Error::Read)?
            .try_deserialize()
            .map_err(Error::Parse)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BotConfig {
    token: String,
    #[serde(default = "BotConfig::default_prefix")]
    prefix: String,
    testing_server: Option<GuildId>,
    activity: Option<String>,
    status_channel: Option<ChannelId>,
}

impl BotConfig {
    fn default_prefix() -> String {
        "c!".to_owned()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn testing_server(&self) -> Option<GuildId> {
        if self.testing_server.is_none() {
            debug!("no testing server set in config, registering commands globally");
        }

        self.testing_server
    }

    pub fn status_channel(&self) -> Option<ChannelId> {
        self.status_channel
    }

    pub fn activity(&self) -> Option<ActivityData> {
        let Some(activity) = &self.activity else {
            warn!("no bot.activity provided in config, defaulting to none");
            return None;
        };

        if activity.is_empty() {
            warn!("bot.activity provided in config as empty string, defaulting to none");
            return None;
        }

        let parsed_activity = if let Some(name) = activity.strip_prefix("playing ") {
            ActivityData::playing(name)
        } else if let Some(name) = activity.strip_prefix("listening to ") {
            ActivityData::listening(name)
        } else if let Some(name) = activity.strip_prefix("watching ") {
            ActivityData::watching(name)
        } else if let Some(name) = activity.strip_prefix("competing in ") {
            ActivityData::competing(name)
        } else {
            error!("bot.activity in config could not be parsed - must start with `playing`, `listening to`, `watching` or `competing in`");
            warn!("disabling bot activity");
            return None;
        };

        debug!(
            "bot.activity parsed as {:?}: {}",
            parsed_activity.kind, parsed_activity.name
        );

        Some(parsed_activity)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DbConfig {
    url: String,
    #[serde(default = "DbConfig::default_name")]
    name: String,
}

impl DbConfig {
    fn default_name() -> String {
        "countbot".to_owned()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LogsConfig {
    #[serde(default)]
    flavor_texts: Vec<String>,
}

impl LogsConfig {
    pub fn flavor_text(&self) -> Option<&str> {
        let flavor_text = self
            .flavor_texts
            .iter()
            .choose(&mut rand::thread_rng())
            .map(String::as_str);

        if flavor_text.is_none() {
            warn!("no flavor texts provided in config :(");
        }

        flavor_text
    }
}

/// Game policy. Notice lifetimes of zero keep the notice forever.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CountingConfig {
    reset_on_chat_before_start: bool,
    reset_notice_seconds: u64,
    milestone_notice_seconds: u64,
    leaderboard_size: usize,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            reset_on_chat_before_start: false,
            reset_notice_seconds: 6,
            milestone_notice_seconds: 10,
            leaderboard_size: 10,
        }
    }
}

impl CountingConfig {
    fn notice_ttl(seconds: u64) -> Option<Duration> {
        (seconds > 0).then(|| Duration::from_secs(seconds))
    }

    pub const fn policy(&self) -> Policy {
        Policy {
            reset_on_chat_before_start: self.reset_on_chat_before_start,
        }
    }

    pub fn reset_notice_ttl(&self) -> Option<Duration> {
        Self::notice_ttl(self.reset_notice_seconds)
    }

    pub fn milestone_notice_ttl(&self) -> Option<Duration> {
        Self::notice_ttl(self.milestone_notice_seconds)
    }

    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ::config::{File, FileFormat};
    use poise::serenity_prelude::{ActivityType, ChannelId, GuildId};
    use pretty_assertions::assert_eq;

    use super::{Config, CountingConfig};

    fn parse(toml: &str) -> Config {
        Config::from_builder(
            ::config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
        .expect("test config should parse")
    }

    const MINIMAL: &str = r#"
        [bot]
        token = "abc"

        [db]
        url = "mongodb://localhost:27017"
    "#;

    #[test]
    fn minimal() {
        let config = parse(MINIMAL);

        assert_eq!(config.bot.token(), "abc");
        assert_eq!(config.bot.prefix(), "c!");
        assert_eq!(config.bot.testing_server(), None);
        assert!(config.bot.activity().is_none());
        assert_eq!(config.db.url(), "mongodb://localhost:27017");
        assert_eq!(config.db.name(), "countbot");
        assert!(config.logs.flavor_text().is_none());
        assert_eq!(config.counting, CountingConfig::default());
    }

    #[test]
    fn full() {
        let config = parse(
            r#"
            [bot]
            token = "abc"
            prefix = "!"
            testing_server = 123
            status_channel = 456
            activity = "listening to the numbers"

            [db]
            url = "mongodb://db:27017"
            name = "counting"

            [logs]
            flavor_texts = ["one, two, three"]

            [counting]
            reset_on_chat_before_start = true
            reset_notice_seconds = 0
            milestone_notice_seconds = 30
            leaderboard_size = 5
        "#,
        );

        assert_eq!(config.bot.prefix(), "!");
        assert_eq!(config.bot.testing_server(), Some(GuildId::new(123)));
        assert_eq!(config.bot.status_channel(), Some(ChannelId::new(456)));
        assert_eq!(config.db.name(), "counting");
        assert_eq!(config.logs.flavor_text(), Some("one, two, three"));

        let activity = config.bot.activity().expect("activity should parse");
        assert_eq!(activity.kind, ActivityType::Listening);
        assert_eq!(activity.name, "the numbers");

        let counting = config.counting;
        assert!(counting.policy().reset_on_chat_before_start);
        assert_eq!(counting.reset_notice_ttl(), None);
        assert_eq!(counting.milestone_notice_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(counting.leaderboard_size(), 5);
    }

    #[test]
    fn counting_defaults() {
        let counting = CountingConfig::default();

        assert!(!counting.policy().reset_on_chat_before_start);
        assert_eq!(counting.reset_notice_ttl(), Some(Duration::from_secs(6)));
        assert_eq!(counting.milestone_notice_ttl(), Some(Duration::from_secs(10)));
        assert_eq!(counting.leaderboard_size(), 10);
    }

    #[test]
    fn unparseable_activity() {
        let config = parse(
            r#"
            [bot]
            token = "abc"
            activity = "dancing"

            [db]
            url = "mongodb://localhost:27017"
        "#,
        );

        assert!(config.bot.activity().is_none());
    }
}
