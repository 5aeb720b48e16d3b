//! In-memory persistence reader
//!
//! Backs the demo binary and the test suite. Groups hold a creator and a
//! member set; edits belong to a group and have a creator. All reads go
//! through an `RwLock` so unlimited concurrent resolutions can share one
//! store.

use crate::access_control::PersistenceReader;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct GroupRow {
    creator_id: i64,
    member_ids: HashSet<i64>,
}

#[derive(Debug, Clone)]
struct EditRow {
    group_id: String,
    creator_id: i64,
}

/// In-memory [`PersistenceReader`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: RwLock<HashMap<String, GroupRow>>,
    edits: RwLock<HashMap<i64, EditRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group; the creator is implicitly a member.
    pub fn add_group(&self, group_id: impl Into<String>, creator_id: i64) {
        let mut member_ids = HashSet::new();
        member_ids.insert(creator_id);
        self.groups.write().expect("store lock poisoned").insert(
            group_id.into(),
            GroupRow {
                creator_id,
                member_ids,
            },
        );
    }

    /// Add a member to an existing group; unknown groups are ignored.
    pub fn add_member(&self, group_id: &str, subject_id: i64) {
        if let Some(row) = self
            .groups
            .write()
            .expect("store lock poisoned")
            .get_mut(group_id)
        {
            row.member_ids.insert(subject_id);
        }
    }

    /// Reassign a group's creator; the new creator joins the member set.
    pub fn set_group_creator(&self, group_id: &str, creator_id: i64) {
        if let Some(row) = self
            .groups
            .write()
            .expect("store lock poisoned")
            .get_mut(group_id)
        {
            row.creator_id = creator_id;
            row.member_ids.insert(creator_id);
        }
    }

    /// Add an edit owned by `group_id`, created by `creator_id`.
    pub fn add_edit(&self, edit_id: i64, group_id: impl Into<String>, creator_id: i64) {
        self.edits.write().expect("store lock poisoned").insert(
            edit_id,
            EditRow {
                group_id: group_id.into(),
                creator_id,
            },
        );
    }
}

impl MemoryStore {
    fn read_groups(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, GroupRow>>> {
        self.groups
            .read()
            .map_err(|_| StoreError::Unavailable("group table lock poisoned".to_string()))
    }

    fn read_edits(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<i64, EditRow>>> {
        self.edits
            .read()
            .map_err(|_| StoreError::Unavailable("edit table lock poisoned".to_string()))
    }
}

#[async_trait]
impl PersistenceReader for MemoryStore {
    async fn is_group_member(&self, subject_id: i64, group_id: &str) -> StoreResult<bool> {
        Ok(self
            .read_groups()?
            .get(group_id)
            .is_some_and(|row| row.member_ids.contains(&subject_id)))
    }

    async fn is_group_creator(&self, subject_id: i64, group_id: &str) -> StoreResult<bool> {
        Ok(self
            .read_groups()?
            .get(group_id)
            .is_some_and(|row| row.creator_id == subject_id))
    }

    async fn is_edit_creator(&self, subject_id: i64, edit_id: i64) -> StoreResult<bool> {
        Ok(self
            .read_edits()?
            .get(&edit_id)
            .is_some_and(|row| row.creator_id == subject_id))
    }

    async fn group_id_for_edit(&self, edit_id: i64) -> StoreResult<Option<String>> {
        Ok(self
            .read_edits()?
            .get(&edit_id)
            .map(|row| row.group_id.clone()))
    }
}
