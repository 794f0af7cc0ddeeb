use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, DateTime},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument, UpdateOptions},
    Collection, IndexModel,
};
use poise::serenity_prelude::{futures::TryStreamExt, UserId};
use serde::{Deserialize, Serialize};

use super::{Backend, Error, Stat, StatKey};

#[derive(Debug, Clone)]
pub struct MongoDb {
    settings: Collection<SettingRecord>,
    stats: Collection<StatRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SettingRecord {
    #[serde(rename = "_id")]
    key: String,
    value: Bson,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StatRecord {
    #[serde(rename = "_id")]
    key: String,
    stat: Stat,
    user: Option<UserId>,
    value: i64,
    created: DateTime,
    // ties on the leaderboard go to whoever was recorded first
    seq: ObjectId,
}

impl MongoDb {
    const SETTINGS_COLLECTION_NAME: &'static str = "settings";
    const STATS_COLLECTION_NAME: &'static str = "stats";

    pub fn from_database(db: &mongodb::Database) -> Self {
        Self {
            settings: db.collection(Self::SETTINGS_COLLECTION_NAME),
            stats: db.collection(Self::STATS_COLLECTION_NAME),
        }
    }

    /// Index backing the leaderboard query.
    pub async fn ensure_indexes(&self) -> Result<(), Error> {
        let index = IndexModel::builder()
            .keys(doc! { "stat": 1, "value": -1, "seq": 1 })
            .options(
                IndexOptions::builder()
                    .name("leaderboard".to_owned())
                    .build(),
            )
            .build();

        self.stats.create_index(index, None).await?;
        Ok(())
    }

    /// Fields written only when a statistic is first seen.
    fn on_insert(key: StatKey) -> Result<bson::Document, Error> {
        let stat = bson::to_bson(&key.stat).map_err(|source| Error::Serialize {
            key: key.to_string(),
            source,
        })?;
        let user = bson::to_bson(&key.subject.user()).map_err(|source| Error::Serialize {
            key: key.to_string(),
            source,
        })?;

        Ok(doc! {
            "stat": stat,
            "user": user,
            "created": DateTime::now(),
            "seq": ObjectId::new(),
        })
    }

    async fn upsert_stat(&self, key: StatKey, update: bson::Document) -> Result<i64, Error> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.stats
            .find_one_and_update(doc! { "_id": key.to_string() }, update, options)
            .await?
            .map(|record| record.value)
            .ok_or_else(|| Error::Missing(key.to_string()))
    }
}

impl Backend for MongoDb {
    type Error = Error;

    async fn setting(&self, key: &str) -> Result<Option<Bson>, Self::Error> {
        Ok(self
            .settings
            .find_one(doc! { "_id": key }, None)
            .await?
            .map(|record| record.value))
    }

    async fn set_setting(&self, key: &str, value: Bson) -> Result<(), Self::Error> {
        self.settings
            .update_one(
                doc! { "_id": key },
                doc! { "$set": { "value": value } },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;

        Ok(())
    }

    async fn stat(&self, key: StatKey) -> Result<i64, Self::Error> {
        Ok(self
            .stats
            .find_one(doc! { "_id": key.to_string() }, None)
            .await?
            .map_or(0, |record| record.value))
    }

    async fn increment_stat(&self, key: StatKey, amount: i64) -> Result<i64, Self::Error> {
        let update = doc! {
            "$inc": { "value": amount },
            "$setOnInsert": Self::on_insert(key)?,
        };

        self.upsert_stat(key, update).await
    }

    async fn raise_stat(&self, key: StatKey, candidate: i64) -> Result<i64, Self::Error> {
        let update = doc! {
            "$max": { "value": candidate },
            "$setOnInsert": Self::on_insert(key)?,
        };

        self.upsert_stat(key, update).await
    }

    async fn top_stats(&self, stat: Stat, limit: usize) -> Result<Vec<(UserId, i64)>, Self::Error> {
        let stat_bson = bson::to_bson(&stat).map_err(|source| Error::Serialize {
            key: stat.as_str().to_owned(),
            source,
        })?;

        let options = FindOptions::builder()
            .sort(doc! { "value": -1, "seq": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();

        self.stats
            .find(doc! { "stat": stat_bson, "user": { "$ne": Bson::Null } }, options)
            .await?
            .try_filter_map(|record| async move {
                Ok(record.user.map(|user| (user, record.value)))
            })
            .try_collect()
            .await
            .map_err(Error::from)
    }
}
