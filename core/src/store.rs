//! Completion store: which pause points the learner has already solved.
//!
//! The server is the source of truth. This is a session cache seeded from
//! the progress fetch and updated optimistically on a passing answer; a new
//! session always re-seeds from the server.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::api::ProgressSnapshot;
use crate::model::BlockKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    /// Server saw the block but it is not solved yet.
    Started,
    Completed,
}

/// Where the current value of a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Created lazily, nothing known yet.
    Local,
    /// Written by the client ahead of server confirmation.
    Optimistic,
    /// Last value came from a progress fetch.
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub key: BlockKey,
    pub status: CompletionStatus,
    pub correct_choice_ids: Option<Vec<String>>,
    pub origin: RecordOrigin,
}

impl CompletionRecord {
    pub fn not_started(key: BlockKey) -> Self {
        Self {
            key,
            status: CompletionStatus::NotStarted,
            correct_choice_ids: None,
            origin: RecordOrigin::Local,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}

/// Shared between the detector (reads) and the challenge controller (writes).
#[derive(Debug, Default)]
pub struct CompletionStore {
    records: RwLock<HashMap<BlockKey, CompletionRecord>>,
}

impl CompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a progress fetch.
    pub fn seeded(snapshot: &ProgressSnapshot) -> Self {
        let store = Self::new();
        store.reconcile(snapshot);
        store
    }

    /// Record for `key`, created as `NotStarted` on first access.
    pub fn get(&self, key: &BlockKey) -> CompletionRecord {
        if let Some(record) = self.records.read().get(key) {
            return record.clone();
        }
        self.records
            .write()
            .entry(key.clone())
            .or_insert_with(|| CompletionRecord::not_started(key.clone()))
            .clone()
    }

    pub fn set(&self, key: BlockKey, record: CompletionRecord) {
        self.records.write().insert(key, record);
    }

    pub fn is_completed(&self, key: &BlockKey) -> bool {
        self.records
            .read()
            .get(key)
            .is_some_and(CompletionRecord::is_completed)
    }

    /// Correct choices of a solved point, for highlighting without a replay.
    pub fn highlighted_choices(&self, key: &BlockKey) -> Option<Vec<String>> {
        self.records
            .read()
            .get(key)
            .filter(|r| r.is_completed())
            .and_then(|r| r.correct_choice_ids.clone())
    }

    /// Client-side completion after a passing answer, before the server
    /// confirms it.
    pub fn mark_completed(&self, key: &BlockKey, correct_choice_ids: Option<Vec<String>>) {
        log::debug!("Marking {} completed (optimistic)", key);
        self.set(
            key.clone(),
            CompletionRecord {
                key: key.clone(),
                status: CompletionStatus::Completed,
                correct_choice_ids,
                origin: RecordOrigin::Optimistic,
            },
        );
    }

    /// Merge a fresh progress fetch.
    ///
    /// Server values win, except that an optimistic completion is never
    /// downgraded by a reply that predates it: a completion only ever moves
    /// forward within a session.
    pub fn reconcile(&self, snapshot: &ProgressSnapshot) {
        let mut records = self.records.write();
        for (raw_key, entry) in &snapshot.blocks {
            let key = BlockKey::from(raw_key.as_str());
            let status = entry.status.unwrap_or(CompletionStatus::NotStarted);

            if let Some(existing) = records.get(&key) {
                if existing.is_completed() && status != CompletionStatus::Completed {
                    log::debug!("Keeping local completion of {} over stale server state", key);
                    continue;
                }
            }

            records.insert(
                key.clone(),
                CompletionRecord {
                    key,
                    status,
                    correct_choice_ids: entry.correct_ids.clone(),
                    origin: RecordOrigin::Server,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
