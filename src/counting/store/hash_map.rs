use std::collections::HashMap as StdHashMap;

use mongodb::bson::Bson;
use poise::serenity_prelude::UserId;
use tokio::sync::RwLock;

use super::{Backend, Stat, StatKey, Subject};

/// In-process backend. Nothing survives a restart of the process, but the
/// backend itself can be shared between several stores.
#[derive(Debug, Default)]
pub struct HashMap {
    settings: RwLock<StdHashMap<String, Bson>>,
    stats: RwLock<Stats>,
}

#[derive(Debug, Default)]
struct Stats {
    records: StdHashMap<StatKey, Record>,
    inserted: u64,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    value: i64,
    order: u64,
}

impl Stats {
    fn entry(&mut self, key: StatKey) -> &mut Record {
        let order = self.inserted;
        let record = self
            .records
            .entry(key)
            .or_insert(Record { value: 0, order });

        if record.order == order {
            self.inserted += 1;
        }

        record
    }
}

impl Backend for HashMap {
    type Error = std::convert::Infallible;

    async fn setting(&self, key: &str) -> Result<Option<Bson>, Self::Error> {
        let guard = self.settings.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: Bson) -> Result<(), Self::Error> {
        let mut guard = self.settings.write().await;
        guard.insert(key.to_owned(), value);
        Ok(())
    }

    async fn stat(&self, key: StatKey) -> Result<i64, Self::Error> {
        let guard = self.stats.read().await;
        Ok(guard.records.get(&key).map_or(0, |record| record.value))
    }

    async fn increment_stat(&self, key: StatKey, amount: i64) -> Result<i64, Self::Error> {
        let mut guard = self.stats.write().await;
        let record = guard.entry(key);
        record.value += amount;
        Ok(record.value)
    }

    async fn raise_stat(&self, key: StatKey, candidate: i64) -> Result<i64, Self::Error> {
        let mut guard = self.stats.write().await;
        let record = guard.entry(key);
        record.value = record.value.max(candidate);
        Ok(record.value)
    }

    async fn top_stats(&self, stat: Stat, limit: usize) -> Result<Vec<(UserId, i64)>, Self::Error> {
        let guard = self.stats.read().await;

        let mut records: Vec<_> = guard
            .records
            .iter()
            .filter(|(key, _)| key.stat == stat)
            .filter_map(|(key, record)| match key.subject {
                Subject::User(id) => Some((id, *record)),
                Subject::Global => None,
            })
            .collect();

        records.sort_by(|(_, a), (_, b)| b.value.cmp(&a.value).then(a.order.cmp(&b.order)));

        Ok(records
            .into_iter()
            .take(limit)
            .map(|(id, record)| (id, record.value))
            .collect())
    }
}
