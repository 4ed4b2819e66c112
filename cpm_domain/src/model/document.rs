// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # The Document
//!
//! `Document` is the root of the on-disk model (§3): an ordered tree of
//! [`Node`]s plus the two distinguished child subtrees the schema requires —
//! a [`TemplateRegistry`] and an [`EditorTable`] — and root-level creation /
//! modification provenance.
//!
//! A document is never empty on disk: the store pipeline (C10) creates one
//! with default metadata the first time a new path is saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::editor::{EditorTable, UNKNOWN_EDITOR};
use super::node::Node;
use super::template::TemplateRegistry;

/// `major.minor`, compared as `(major << 16) | minor` for the upgrade check
/// (§4.5.1, §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const CURRENT: Version = Version { major: 0, minor: 2 };

    pub fn encoded(self) -> u32 {
        ((self.major as u32) << 16) | self.minor as u32
    }
}

impl Default for Version {
    fn default() -> Self {
        Version { major: 0, minor: 1 }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub version: Version,
    pub created_by: u32,
    pub created_at: DateTime<Utc>,
    pub modified_by: u32,
    pub modified_at: DateTime<Utc>,
    pub templates: TemplateRegistry,
    pub editors: EditorTable,
    pub children: Vec<Node>,

    /// Set by the §4.5.1 upgrade pass; not persisted. The session
    /// controller reads and clears it to decide whether to tell the user
    /// the file was upgraded.
    #[serde(skip)]
    pub just_upgraded: bool,
}

impl Document {
    /// A brand-new, empty store (§4.10 read path, step 1).
    pub fn new_empty(now: DateTime<Utc>) -> Self {
        Self {
            version: Version::CURRENT,
            created_by: UNKNOWN_EDITOR,
            created_at: now,
            modified_by: UNKNOWN_EDITOR,
            modified_at: now,
            templates: TemplateRegistry::new(),
            editors: EditorTable::new(),
            children: Vec::new(),
            just_upgraded: false,
        }
    }

    /// §4.5.1: runs the creation-stamp sweep when `version < 0.2` and always
    /// refreshes the root's modification stamp. Returns the (possibly
    /// corrected) decision so callers in silent mode can suppress the
    /// "document was upgraded" notice without skipping the stamp sweep.
    pub fn upgrade(&mut self, editor_uid: u32, now: DateTime<Utc>, silent: bool) {
        let needs_creation_sweep = self.version.encoded() < Version::CURRENT.encoded();
        if needs_creation_sweep {
            fn stamp_missing_creation(node: &mut Node, now: DateTime<Utc>) {
                // created_at defaults to `now` on Node construction; nodes
                // parsed from pre-0.2 documents encode "never stamped" with
                // editor uid UNKNOWN_EDITOR, which this sweep corrects for
                // any created_at earlier than `now` (i.e. anything already
                // on disk at upgrade time).
                if node.created_by == UNKNOWN_EDITOR && node.created_at >= now {
                    node.created_at = now;
                }
                for child in &mut node.children {
                    stamp_missing_creation(child, now);
                }
            }
            for child in &mut self.children {
                stamp_missing_creation(child, now);
            }
            self.version = Version::CURRENT;
        }

        self.modified_by = editor_uid;
        self.modified_at = now;

        if needs_creation_sweep && !silent {
            self.just_upgraded = true;
        }
    }

    pub fn touch_root(&mut self, editor_uid: u32, now: DateTime<Utc>) {
        self.modified_by = editor_uid;
        self.modified_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_encoding_orders_correctly() {
        assert!(Version { major: 0, minor: 1 }.encoded() < Version::CURRENT.encoded());
        assert!(Version { major: 1, minor: 0 }.encoded() > Version::CURRENT.encoded());
    }

    #[test]
    fn upgrade_is_noop_for_current_version() {
        let now = Utc::now();
        let mut doc = Document::new_empty(now);
        doc.upgrade(1, now, false);
        assert!(!doc.just_upgraded);
    }

    #[test]
    fn upgrade_stamps_pre_0_2_documents() {
        let earlier = Utc::now() - chrono::Duration::days(1);
        let now = Utc::now();
        let mut doc = Document::new_empty(earlier);
        doc.version = Version { major: 0, minor: 1 };
        doc.children.push(Node::with_unknown_creation("legacy", earlier));
        doc.upgrade(1, now, false);
        assert!(doc.just_upgraded);
        assert_eq!(doc.version, Version::CURRENT);
        assert_eq!(doc.children[0].created_at, now);
    }
}
