//! Durable storage behind the counting game.
//!
//! Two logical tables live here: guild-scoped settings (`key -> value`, typed
//! through [`Setting`]) and statistics (`key -> integer`, addressed with
//! [`StatKey`]). Every single-key operation is atomic with respect to other
//! operations on the same key; a backend must never implement an increment as
//! a separate read and write.

use std::{fmt, future::Future, sync::Arc};

use ::mongodb::bson::{self, Bson};
use poise::serenity_prelude::{GuildId, UserId};
use serde::{Deserialize, Serialize};

use super::settings::Setting;

mod hash_map;
pub use hash_map::HashMap;

mod mongodb;
pub use self::mongodb::MongoDb;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error from mongodb: {0}")]
    MongoDb(#[from] ::mongodb::error::Error),

    #[error("could not serialize `{key}`: {source}")]
    Serialize {
        key: String,
        source: bson::ser::Error,
    },

    #[error("could not deserialize `{key}`: {source}")]
    Deserialize {
        key: String,
        source: bson::de::Error,
    },

    #[error("upsert of `{0}` returned no record")]
    Missing(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<std::convert::Infallible> for Error {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}

/// A statistic tracked per user, and for `high` also globally.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, poise::ChoiceParameter,
)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    // accepted counts
    #[name = "total"]
    Total,

    // highest number reached
    #[name = "high"]
    High,

    // counts ruined
    #[name = "fail"]
    Fail,
}

impl Stat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::High => "high",
            Self::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Global,
    User(UserId),
}

impl Subject {
    pub const fn user(self) -> Option<UserId> {
        match self {
            Self::Global => None,
            Self::User(id) => Some(id),
        }
    }
}

/// Address of one statistic record.
///
/// Per-user keys render as `<stat>_<userId>`, global keys as `global_<stat>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatKey {
    pub stat: Stat,
    pub subject: Subject,
}

impl StatKey {
    pub const fn user(stat: Stat, id: UserId) -> Self {
        Self {
            stat,
            subject: Subject::User(id),
        }
    }

    pub const fn global(stat: Stat) -> Self {
        Self {
            stat,
            subject: Subject::Global,
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject {
            Subject::Global => write!(f, "global_{}", self.stat.as_str()),
            Subject::User(id) => write!(f, "{}_{id}", self.stat.as_str()),
        }
    }
}

pub trait Backend: Send + Sync {
    type Error: Into<Error> + Send;

    // settings
    fn setting(
        &self,
        key: &str,
    ) -> impl Future<Output = std::result::Result<Option<Bson>, Self::Error>> + Send;
    fn set_setting(
        &self,
        key: &str,
        value: Bson,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;

    // stats
    fn stat(
        &self,
        key: StatKey,
    ) -> impl Future<Output = std::result::Result<i64, Self::Error>> + Send;

    /// Adds `amount` and returns the new value.
    fn increment_stat(
        &self,
        key: StatKey,
        amount: i64,
    ) -> impl Future<Output = std::result::Result<i64, Self::Error>> + Send;

    /// Stores `candidate` only if it exceeds the current value. Returns the value
    /// held afterwards.
    fn raise_stat(
        &self,
        key: StatKey,
        candidate: i64,
    ) -> impl Future<Output = std::result::Result<i64, Self::Error>> + Send;

    /// Per-user records of `stat`, highest first, ties in insertion order.
    fn top_stats(
        &self,
        stat: Stat,
        limit: usize,
    ) -> impl Future<Output = std::result::Result<Vec<(UserId, i64)>, Self::Error>> + Send;
}

#[derive(Debug, Default)]
pub struct Store<Backend> {
    backend: Arc<Backend>,
}

impl<B> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B> From<B> for Store<B> {
    fn from(value: B) -> Self {
        Self {
            backend: Arc::new(value),
        }
    }
}

#[cfg(test)]
impl<B> Store<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: Backend> Store<B> {
    pub async fn get<S: Setting>(&self, guild: GuildId) -> Result<S::Value> {
        let key = S::key(guild);

        match self.backend.setting(&key).await.map_err(Into::<Error>::into)? {
            Some(value) => {
                bson::from_bson(value).map_err(|source| Error::Deserialize { key, source })
            }
            None => Ok(S::Value::default()),
        }
    }

    pub async fn set<S: Setting>(&self, guild: GuildId, value: &S::Value) -> Result<()> {
        let key = S::key(guild);
        let value = bson::to_bson(value).map_err(|source| Error::Serialize {
            key: key.clone(),
            source,
        })?;

        self.backend
            .set_setting(&key, value)
            .await
            .map_err(Into::into)
    }

    pub async fn stat(&self, key: StatKey) -> Result<i64> {
        self.backend.stat(key).await.map_err(Into::into)
    }

    pub async fn increment(&self, key: StatKey, amount: i64) -> Result<i64> {
        self.backend
            .increment_stat(key, amount)
            .await
            .map_err(Into::into)
    }

    pub async fn raise_to(&self, key: StatKey, candidate: i64) -> Result<i64> {
        self.backend
            .raise_stat(key, candidate)
            .await
            .map_err(Into::into)
    }

    pub async fn top(&self, stat: Stat, limit: usize) -> Result<Vec<(UserId, i64)>> {
        self.backend
            .top_stats(stat, limit)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{Stat, StatKey, Store};
    use crate::counting::settings::{AllowChat, CountState, CountingChannel, Paused};
    use crate::counting::GameState;

    type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

    mod consts {
        use poise::serenity_prelude as serenity;

        pub const GUILD: serenity::GuildId = serenity::GuildId::new(10);
        pub const OTHER_GUILD: serenity::GuildId = serenity::GuildId::new(11);
        pub const CHANNEL: serenity::ChannelId = serenity::ChannelId::new(20);

        pub const USER_ID_FOO: serenity::UserId = serenity::UserId::new(1);
        pub const USER_ID_BAR: serenity::UserId = serenity::UserId::new(2);
        pub const USER_ID_BAZ: serenity::UserId = serenity::UserId::new(3);
    }

    #[test]
    fn stat_keys() {
        use consts::*;

        assert_eq!(StatKey::user(Stat::High, USER_ID_FOO).to_string(), "high_1");
        assert_eq!(StatKey::user(Stat::Fail, USER_ID_BAR).to_string(), "fail_2");
        assert_eq!(StatKey::global(Stat::High).to_string(), "global_high");
    }

    macro_rules! test_backends {
        {$($backend:ty as $mod_name:ident $block:block)+} => {
            $(
            paste::paste! {
                mod [<$mod_name _ backend>] {
                    use super::consts::*;
                    use super::*;
                    use pretty_assertions::assert_eq;
                    type Store = super::Store<super::$backend>;

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn settings_default() -> Result {
                        let (store, _db): (Store, _) = $block;

                        assert_eq!(store.get::<CountingChannel>(GUILD).await?, None);
                        assert!(!store.get::<Paused>(GUILD).await?);
                        assert!(!store.get::<AllowChat>(GUILD).await?);
                        assert_eq!(store.get::<CountState>(GUILD).await?, GameState::default());

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn settings_round_trip() -> Result {
                        let (store, _db): (Store, _) = $block;

                        store.set::<CountingChannel>(GUILD, &Some(CHANNEL)).await?;
                        store.set::<Paused>(GUILD, &true).await?;

                        let state = GameState {
                            count: 41,
                            last_counter: Some(USER_ID_FOO),
                        };
                        store.set::<CountState>(GUILD, &state).await?;

                        assert_eq!(store.get::<CountingChannel>(GUILD).await?, Some(CHANNEL));
                        assert!(store.get::<Paused>(GUILD).await?);
                        assert_eq!(store.get::<CountState>(GUILD).await?, state);

                        // settings are scoped to their guild
                        assert_eq!(store.get::<CountingChannel>(OTHER_GUILD).await?, None);
                        assert!(!store.get::<Paused>(OTHER_GUILD).await?);

                        store.set::<CountState>(GUILD, &GameState::default()).await?;
                        assert_eq!(store.get::<CountState>(GUILD).await?, GameState::default());

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn increment() -> Result {
                        let (store, _db): (Store, _) = $block;
                        let key = StatKey::user(Stat::Total, USER_ID_FOO);

                        assert_eq!(store.stat(key).await?, 0);
                        assert_eq!(store.increment(key, 1).await?, 1);
                        assert_eq!(store.increment(key, 2).await?, 3);
                        assert_eq!(store.stat(key).await?, 3);

                        assert_eq!(store.stat(StatKey::user(Stat::Total, USER_ID_BAR)).await?, 0);

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn concurrent_increments() -> Result {
                        let (store, _db): (Store, _) = $block;
                        let key = StatKey::user(Stat::Fail, USER_ID_FOO);

                        let mut tasks = tokio::task::JoinSet::new();
                        for _ in 0..32 {
                            let store = store.clone();
                            tasks.spawn(async move { store.increment(key, 1).await });
                        }

                        while let Some(result) = tasks.join_next().await {
                            result??;
                        }

                        assert_eq!(store.stat(key).await?, 32);

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn raise_to() -> Result {
                        let (store, _db): (Store, _) = $block;
                        let key = StatKey::global(Stat::High);

                        assert_eq!(store.raise_to(key, 12).await?, 12);
                        assert_eq!(store.raise_to(key, 7).await?, 12);
                        assert_eq!(store.raise_to(key, 100).await?, 100);
                        assert_eq!(store.stat(key).await?, 100);

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn top() -> Result {
                        let (store, _db): (Store, _) = $block;

                        store.increment(StatKey::user(Stat::Total, USER_ID_FOO), 3).await?;
                        store.increment(StatKey::user(Stat::Total, USER_ID_BAR), 5).await?;
                        store.increment(StatKey::user(Stat::Total, USER_ID_BAZ), 3).await?;
                        store.increment(StatKey::user(Stat::Fail, USER_ID_BAZ), 9).await?;
                        store.raise_to(StatKey::global(Stat::Total), 50).await?;

                        assert_eq!(
                            store.top(Stat::Total, 10).await?,
                            vec![(USER_ID_BAR, 5), (USER_ID_FOO, 3), (USER_ID_BAZ, 3)]
                        );
                        assert_eq!(store.top(Stat::Total, 1).await?, vec![(USER_ID_BAR, 5)]);
                        assert_eq!(store.top(Stat::Fail, 10).await?, vec![(USER_ID_BAZ, 9)]);
                        assert!(store.top(Stat::High, 10).await?.is_empty());

                        Ok(())
                    }

                    #[tracing_test::traced_test]
                    #[tokio::test]
                    async fn top_ties_keep_first_seen_order() -> Result {
                        let (store, _db): (Store, _) = $block;

                        // written back to back, and in reverse key order
                        let users = [9, 10, 2].map(poise::serenity_prelude::UserId::new);
                        for user in users {
                            store.increment(StatKey::user(Stat::Fail, user), 1).await?;
                        }

                        assert_eq!(
                            store.top(Stat::Fail, 10).await?,
                            users.map(|user| (user, 1)).to_vec()
                        );

                        Ok(())
                    }
                }
            }
            )+
        };
    }

    test_backends! {
        super::HashMap as hash_map {
            (Store::default(), ())
        }

        super::MongoDb as mongodb {
            let mongodb = temp_mongo::TempMongo::new()
                .await
                .expect("setting up db should not fail");
            let db = mongodb.client().database("countbot_test");
            (Store::from(crate::counting::store::MongoDb::from_database(&db)), mongodb)
        }
    }
}
