use std::collections::HashSet;

use anyhow::Context;

use super::{
    cache::CacheStore,
    record::{FeatureRecord, Identifier},
};

/// A change to a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Add a record created by the server. Replaces an existing record with the same id.
    Create(FeatureRecord),
    /// Replace the data of a record. No-op if the record no longer exists.
    Update {
        id: Identifier,
        data: serde_json::Value,
    },
    /// Remove a record. No-op if the record does not exist.
    Delete(Identifier),
}

/// Session copy of the stored features, with write-through to a durable cache.
///
/// The store is the only writer of the cache. After every successful mutation (or mutation
/// batch) the full record set is written to the cache.
pub struct FeatureStore<C: CacheStore> {
    records: Vec<FeatureRecord>,
    cache: C,
}

impl<C: CacheStore> FeatureStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            records: Vec::new(),
            cache,
        }
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &Identifier) -> Option<&FeatureRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.get(id).is_some()
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Replace the whole record set with a freshly fetched list and persist it.
    pub fn hydrate_from_remote(&mut self, records: Vec<FeatureRecord>) -> anyhow::Result<()> {
        self.records = dedup_records(records);
        log::info!("Hydrated {} features from remote", self.records.len());
        self.persist()
    }

    /// Load the cached snapshot, if any, as a quick preview before the remote list arrives.
    ///
    /// Returns whether a snapshot was found. An unreadable cache is logged and ignored.
    pub fn hydrate_from_cache(&mut self) -> bool {
        match self.cache.load() {
            Ok(Some(records)) => {
                self.records = dedup_records(records);
                log::info!("Hydrated {} features from cache", self.records.len());
                true
            }
            Ok(None) => false,
            Err(err) => {
                log::warn!("Ignoring unreadable feature cache: {:?}", err);
                false
            }
        }
    }

    /// Apply a single mutation and write the snapshot through to the cache.
    pub fn apply(&mut self, mutation: Mutation) -> anyhow::Result<()> {
        self.apply_in_memory(mutation);
        self.persist()
    }

    /// Apply several mutations, then write a single snapshot.
    pub fn apply_batch<I>(&mut self, mutations: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = Mutation>,
    {
        for mutation in mutations {
            self.apply_in_memory(mutation);
        }
        self.persist()
    }

    fn apply_in_memory(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Create(record) => match self.position(&record.id) {
                Some(index) => {
                    log::warn!("Created record {} replaces an existing one", record.id);
                    self.records[index] = record;
                }
                None => self.records.push(record),
            },
            Mutation::Update { id, data } => match self.position(&id) {
                Some(index) => self.records[index].data = data,
                None => log::debug!("Skipping update of missing record {}", id),
            },
            Mutation::Delete(id) => self.records.retain(|record| record.id != id),
        }
    }

    fn position(&self, id: &Identifier) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        self.cache
            .save(&self.records)
            .context("Writing feature snapshot to cache")
    }
}

/// Keep the first record of each id.
fn dedup_records(records: Vec<FeatureRecord>) -> Vec<FeatureRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let first = seen.insert(record.id.clone());
            if !first {
                log::warn!("Dropping duplicate record with id {}", record.id);
            }
            first
        })
        .collect()
}
