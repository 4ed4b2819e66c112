// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `Node`: the unit of content in the secrets tree (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::editor::UNKNOWN_EDITOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    pub comment: Option<String>,
    pub created_by: u32,
    pub created_at: DateTime<Utc>,
    pub modified_by: Option<u32>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Insertion order, preserved for serialisation stability; callers that
    /// display the tree sort by label instead (§3).
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(label: impl Into<String>, editor_uid: u32, now: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            comment: None,
            created_by: editor_uid,
            created_at: now,
            modified_by: None,
            modified_at: None,
            children: Vec::new(),
        }
    }

    /// Pre-0.2 files never stamped creation metadata; this marks that case.
    pub fn with_unknown_creation(label: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(label, UNKNOWN_EDITOR, now)
    }

    pub fn touch(&mut self, editor_uid: u32, now: DateTime<Utc>) {
        self.modified_by = Some(editor_uid);
        self.modified_at = Some(now);
    }

    pub fn child(&self, label: &str, case_sensitive: bool) -> Option<&Node> {
        self.children.iter().find(|n| labels_equal(&n.label, label, case_sensitive))
    }

    pub fn child_mut(&mut self, label: &str, case_sensitive: bool) -> Option<&mut Node> {
        self.children.iter_mut().find(|n| labels_equal(&n.label, label, case_sensitive))
    }

    /// Labels sorted for stable, user-facing display (§3, §4.4).
    pub fn children_sorted(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.children.iter().map(|n| n.label.as_str()).collect();
        labels.sort_unstable();
        labels
    }
}

pub fn labels_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_sorted_orders_by_label() {
        let now = Utc::now();
        let mut n = Node::new("root", 1, now);
        n.children.push(Node::new("zeta", 1, now));
        n.children.push(Node::new("alpha", 1, now));
        assert_eq!(n.children_sorted(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn case_insensitive_lookup() {
        let now = Utc::now();
        let mut n = Node::new("root", 1, now);
        n.children.push(Node::new("GitHub", 1, now));
        assert!(n.child("github", false).is_some());
        assert!(n.child("github", true).is_none());
    }
}
