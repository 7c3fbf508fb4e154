//! Process-local memo store.
//!
//! Each record sits behind its own mutex; the id map lock is only held to look
//! up, insert or unlink a record, so writers on different memos never contend.
//! Delete clears the record under its mutex before unlinking it, so a writer
//! that already holds a handle observes `NotFound` instead of resurrecting it.
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, RwLock,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use crate::repos::error::StoreError;
use crate::repos::memo::store::{Memo, MemoPatch, MemoStore, NewMemo, check_owner};

type Record = Arc<Mutex<Option<Memo>>>;

#[derive(Debug)]
pub struct InMemoryMemoStore {
    next_id: AtomicI64,
    // BTreeMap keyed by an increasing id keeps creation order.
    records: RwLock<BTreeMap<i64, Record>>,
}

impl Default for InMemoryMemoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMemoStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    fn record(&self, memo_id: i64) -> Result<Record, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Unavailable)?;
        records.get(&memo_id).cloned().ok_or(StoreError::NotFound)
    }
}

fn lock(record: &Record) -> Result<MutexGuard<'_, Option<Memo>>, StoreError> {
    record.lock().map_err(|_| StoreError::Unavailable)
}

#[async_trait]
impl MemoStore for InMemoryMemoStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, owner_id: &str, memo: NewMemo) -> Result<Memo, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let memo = Memo {
            id,
            owner_id: owner_id.to_string(),
            title: memo.title,
            body: memo.body,
            created_at: now,
            updated_at: now,
        };

        self.records
            .write()
            .map_err(|_| StoreError::Unavailable)?
            .insert(id, Arc::new(Mutex::new(Some(memo.clone()))));
        Ok(memo)
    }

    async fn get(&self, caller_id: &str, memo_id: i64) -> Result<Memo, StoreError> {
        let record = self.record(memo_id)?;
        let guard = lock(&record)?;
        check_owner(guard.as_ref().map(|m| m.owner_id.as_str()), caller_id)?;
        guard.clone().ok_or(StoreError::NotFound)
    }

    async fn list(&self, caller_id: &str) -> Result<Vec<Memo>, StoreError> {
        let snapshot: Vec<Record> = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable)?
            .values()
            .cloned()
            .collect();

        let mut memos = Vec::new();
        for record in &snapshot {
            if let Some(memo) = lock(record)?.as_ref()
                && memo.owner_id == caller_id
            {
                memos.push(memo.clone());
            }
        }
        Ok(memos)
    }

    async fn update(
        &self,
        caller_id: &str,
        memo_id: i64,
        patch: MemoPatch,
    ) -> Result<Memo, StoreError> {
        let record = self.record(memo_id)?;
        let mut guard = lock(&record)?;
        check_owner(guard.as_ref().map(|m| m.owner_id.as_str()), caller_id)?;

        let memo = guard.as_mut().ok_or(StoreError::NotFound)?;
        patch.apply(memo, Utc::now());
        Ok(memo.clone())
    }

    async fn delete(&self, caller_id: &str, memo_id: i64) -> Result<(), StoreError> {
        let record = self.record(memo_id)?;
        {
            let mut guard = lock(&record)?;
            check_owner(guard.as_ref().map(|m| m.owner_id.as_str()), caller_id)?;
            *guard = None;
        }

        self.records
            .write()
            .map_err(|_| StoreError::Unavailable)?
            .remove(&memo_id);
        Ok(())
    }
}
