// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Editor (authorship) records.
//!
//! `uid` 0 is reserved to mean "unknown" (pre-upgrade documents that never
//! recorded an author). Names are compared case-sensitively and are unique
//! within a document's editor table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// uid reserved for nodes whose authorship was never recorded.
pub const UNKNOWN_EDITOR: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub uid: u32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered table of editors, keyed by a monotonically assigned `uid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorTable {
    editors: Vec<Editor>,
    next_uid: u32,
}

impl EditorTable {
    pub fn new() -> Self {
        Self {
            editors: Vec::new(),
            next_uid: 1,
        }
    }

    /// Idempotent by name: calling twice with the same name returns the same
    /// uid (invariant 4, §8).
    pub fn add(&mut self, name: &str, now: DateTime<Utc>) -> u32 {
        if let Some(existing) = self.editors.iter().find(|e| e.name == name) {
            return existing.uid;
        }
        let uid = self.next_uid;
        self.next_uid += 1;
        self.editors.push(Editor {
            uid,
            name: name.to_string(),
            created_at: now,
        });
        uid
    }

    pub fn find_by_id(&self, uid: u32) -> Option<&str> {
        if uid == UNKNOWN_EDITOR {
            return None;
        }
        self.editors.iter().find(|e| e.uid == uid).map(|e| e.name.as_str())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Editor> {
        self.editors.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Editor> {
        self.editors.iter()
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_by_name() {
        let mut table = EditorTable::new();
        let now = Utc::now();
        let a = table.add("alice", now);
        let b = table.add("alice", now);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn uid_zero_is_reserved() {
        let table = EditorTable::new();
        assert_eq!(table.find_by_id(UNKNOWN_EDITOR), None);
    }

    #[test]
    fn distinct_names_get_distinct_uids() {
        let mut table = EditorTable::new();
        let now = Utc::now();
        let a = table.add("alice", now);
        let b = table.add("bob", now);
        assert_ne!(a, b);
    }
}
