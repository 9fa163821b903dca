use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::{remote::error::RemoteError, store::record::Identifier};

/// Result of one remote call within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome<T> {
    pub id: Identifier,
    pub result: Result<T, RemoteError>,
}

/// Outcomes of a batch of independent remote calls, in the order the items were given.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Identifier> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| &outcome.id)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Identifier, &RemoteError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|err| (&outcome.id, err)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Issue one call per item without waiting for siblings, then wait for all of them to settle.
///
/// A failing item never stops or undoes the others; every outcome is reported.
pub fn run_batch<I, T, F>(items: &[(Identifier, I)], call: F) -> BatchReport<T>
where
    I: Sync,
    T: Send,
    F: Fn(&Identifier, &I) -> Result<T, RemoteError> + Sync,
{
    let outcomes = items
        .par_iter()
        .map(|(id, item)| ItemOutcome {
            id: id.clone(),
            result: call(id, item),
        })
        .collect();
    BatchReport { outcomes }
}

/// What the store records after an edit batch.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Every edited layer whose record still exists is written to the store, including layers whose
    /// remote update failed. Failures are only logged.
    #[default]
    BestEffortBatch,
    /// Only layers whose remote update succeeded are written to the store.
    CommitSucceededOnly,
}

impl EditPolicy {
    pub fn commits(&self, remote_succeeded: bool) -> bool {
        match self {
            EditPolicy::BestEffortBatch => true,
            EditPolicy::CommitSucceededOnly => remote_succeeded,
        }
    }
}

/// Some deletes of a batch failed. The local removal has been applied regardless.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to delete {} shape(s): {}", .failures.len(), describe(.failures))]
pub struct DeleteBatchError {
    pub failures: Vec<(Identifier, RemoteError)>,
}

fn describe(failures: &[(Identifier, RemoteError)]) -> String {
    failures
        .iter()
        .map(|(id, err)| format!("shape {}: {}", id, err))
        .collect::<Vec<String>>()
        .join("; ")
}
