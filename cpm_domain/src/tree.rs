// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tree Model (C4)
//!
//! The session controller holds one `Tree`, a cursor-stack ("walk list") of
//! labels from the document root down to wherever the UI currently is,
//! paired with a mutable borrow of the [`Document`] it navigates.
//!
//! This replaces the source implementation's XPath-less in-place traversal
//! (a raw pointer walked up and down a linked tree) with a plain
//! `Vec<String>` path re-resolved against the document on each call via
//! ordinary recursive borrows — no unsafe code, no dangling cursors after a
//! mutation invalidates a node.
//!
//! Every mutation stamps `modified_by`/`modified_at` on the affected node
//! with the caller-supplied editor uid and timestamp (§4.4); the session
//! controller is responsible for bubbling that stamp to the document root
//! on save (§8, invariant 2).

use chrono::{DateTime, Utc};

use crate::error::CpmError;
use crate::model::{labels_equal, Document, Node, TemplateStatus};

/// Navigates and mutates a [`Document`]'s tree via a path cursor.
pub struct Tree<'a> {
    document: &'a mut Document,
    path: Vec<String>,
    case_sensitive: bool,
}

impl<'a> Tree<'a> {
    pub fn new(document: &'a mut Document, case_sensitive: bool) -> Self {
        Self {
            document,
            path: Vec::new(),
            case_sensitive,
        }
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// 1-based, matching the spec's template `level` numbering.
    pub fn node_label_at(&self, level: usize) -> Option<&str> {
        self.path.get(level.checked_sub(1)?).map(|s| s.as_str())
    }

    // --- Navigation -----------------------------------------------------

    /// Pushes `label` onto the cursor. With no `label`, descends into the
    /// current node's first child in display order (used by TUI "enter").
    pub fn node_down(&mut self, label: Option<&str>) -> Result<(), CpmError> {
        let label = match label {
            Some(l) => l.to_string(),
            None => sorted_labels(self.current_children())
                .first()
                .map(|l| l.to_string())
                .ok_or_else(|| CpmError::NodeNotFound("<no children>".into()))?,
        };
        if !self.child_exists(&label) {
            return Err(CpmError::NodeNotFound(label));
        }
        self.path.push(label);
        Ok(())
    }

    pub fn node_up(&mut self) -> Result<(), CpmError> {
        if self.path.is_empty() {
            return Err(CpmError::AtRoot);
        }
        self.path.pop();
        Ok(())
    }

    // --- Resolution helpers ----------------------------------------------

    fn current_children(&self) -> &[Node] {
        if self.path.is_empty() {
            &self.document.children
        } else {
            &find_node(&self.document.children, &self.path, self.case_sensitive)
                .expect("cursor path must always resolve")
                .children
        }
    }

    fn current_children_mut(&mut self) -> &mut Vec<Node> {
        if self.path.is_empty() {
            &mut self.document.children
        } else {
            &mut find_node_mut(&mut self.document.children, &self.path, self.case_sensitive)
                .expect("cursor path must always resolve")
                .children
        }
    }

    // --- Query ------------------------------------------------------------

    pub fn list_children(&self) -> Vec<&str> {
        sorted_labels(self.current_children())
    }

    pub fn child_exists(&self, label: &str) -> bool {
        find_child(self.current_children(), label, self.case_sensitive).is_some()
    }

    pub fn get_comment(&self, label: &str) -> Option<&str> {
        find_child(self.current_children(), label, self.case_sensitive)?.comment.as_deref()
    }

    pub fn get_creation(&self, label: &str) -> Option<(u32, DateTime<Utc>)> {
        let n = find_child(self.current_children(), label, self.case_sensitive)?;
        Some((n.created_by, n.created_at))
    }

    pub fn get_modification(&self, label: &str) -> Option<(Option<u32>, Option<DateTime<Utc>>)> {
        let n = find_child(self.current_children(), label, self.case_sensitive)?;
        Some((n.modified_by, n.modified_at))
    }

    // --- Mutation -----------------------------------------------------------

    pub fn add_child(&mut self, label: &str, editor_uid: u32, now: DateTime<Utc>) -> Result<(), CpmError> {
        if self.child_exists(label) {
            return Err(CpmError::DuplicateLabel {
                parent: self.path.join("/"),
                label: label.to_string(),
            });
        }
        self.current_children_mut().push(Node::new(label, editor_uid, now));
        self.touch_current(editor_uid, now);
        Ok(())
    }

    pub fn rename_child(
        &mut self,
        old: &str,
        new: &str,
        editor_uid: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CpmError> {
        if !labels_equal(old, new, self.case_sensitive) && self.child_exists(new) {
            return Err(CpmError::DuplicateLabel {
                parent: self.path.join("/"),
                label: new.to_string(),
            });
        }
        let case_sensitive = self.case_sensitive;
        let node = find_child_mut(self.current_children_mut(), old, case_sensitive)
            .ok_or_else(|| CpmError::NodeNotFound(old.to_string()))?;
        node.label = new.to_string();
        node.touch(editor_uid, now);
        self.touch_current(editor_uid, now);
        Ok(())
    }

    /// Discards the whole subtree rooted at `label`. Deletion mutates the
    /// parent, so it stamps `editor_uid`/`now` on the current node like
    /// every other mutation (§3, §4.4).
    pub fn delete_child(&mut self, label: &str, editor_uid: u32, now: DateTime<Utc>) -> Result<(), CpmError> {
        let case_sensitive = self.case_sensitive;
        let children = self.current_children_mut();
        let before = children.len();
        children.retain(|n| !labels_equal(&n.label, label, case_sensitive));
        if children.len() == before {
            return Err(CpmError::NodeNotFound(label.to_string()));
        }
        self.touch_current(editor_uid, now);
        Ok(())
    }

    /// Empty text removes the comment child (§4.4).
    pub fn set_comment(&mut self, label: &str, text: &str, editor_uid: u32, now: DateTime<Utc>) -> Result<(), CpmError> {
        let case_sensitive = self.case_sensitive;
        let node = find_child_mut(self.current_children_mut(), label, case_sensitive)
            .ok_or_else(|| CpmError::NodeNotFound(label.to_string()))?;
        node.comment = if text.is_empty() { None } else { Some(text.to_string()) };
        node.touch(editor_uid, now);
        self.touch_current(editor_uid, now);
        Ok(())
    }

    fn touch_current(&mut self, editor_uid: u32, now: DateTime<Utc>) {
        if self.path.is_empty() {
            self.document.touch_root(editor_uid, now);
        } else {
            let case_sensitive = self.case_sensitive;
            let path = self.path.clone();
            find_node_mut(&mut self.document.children, &path, case_sensitive)
                .expect("cursor path must always resolve")
                .touch(editor_uid, now);
        }
    }

    // --- Templates (C6) ----------------------------------------------------

    pub fn template_get(&self, level: u32, defaults: &[String]) -> (String, bool) {
        self.document.templates.get(level, defaults)
    }

    pub fn template_set(&mut self, title: &str, status: TemplateStatus) {
        let level = self.depth() as u32 + 1;
        self.document.templates.set(level, title, status);
    }

    pub fn template_id_of(&self, title: &str) -> Option<u32> {
        self.document.templates.id_of(title)
    }

    // --- Editors ------------------------------------------------------------

    pub fn editor_add(&mut self, name: &str, now: DateTime<Utc>) -> u32 {
        self.document.editors.add(name, now)
    }

    pub fn editor_find_by_id(&self, uid: u32) -> Option<&str> {
        self.document.editors.find_by_id(uid)
    }
}

fn sorted_labels(children: &[Node]) -> Vec<&str> {
    let mut labels: Vec<&str> = children.iter().map(|n| n.label.as_str()).collect();
    labels.sort_unstable();
    labels
}

fn find_child<'a>(children: &'a [Node], label: &str, case_sensitive: bool) -> Option<&'a Node> {
    children.iter().find(|n| labels_equal(&n.label, label, case_sensitive))
}

fn find_child_mut<'a>(children: &'a mut [Node], label: &str, case_sensitive: bool) -> Option<&'a mut Node> {
    children.iter_mut().find(|n| labels_equal(&n.label, label, case_sensitive))
}

/// Recursively resolves a path of labels to the `Node` it names.
fn find_node<'a>(children: &'a [Node], path: &[String], case_sensitive: bool) -> Option<&'a Node> {
    let (label, rest) = path.split_first()?;
    let node = find_child(children, label, case_sensitive)?;
    if rest.is_empty() {
        Some(node)
    } else {
        find_node(&node.children, rest, case_sensitive)
    }
}

fn find_node_mut<'a>(children: &'a mut [Node], path: &[String], case_sensitive: bool) -> Option<&'a mut Node> {
    let (label, rest) = path.split_first()?;
    let node = find_child_mut(children, label, case_sensitive)?;
    if rest.is_empty() {
        Some(node)
    } else {
        find_node_mut(&mut node.children, rest, case_sensitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN_EDITOR;

    fn doc() -> Document {
        Document::new_empty(Utc::now())
    }

    #[test]
    fn add_navigate_and_comment_roundtrip() {
        let mut d = doc();
        let now = Utc::now();
        {
            let mut tree = Tree::new(&mut d, true);
            tree.add_child("cat1", 1, now).unwrap();
            tree.node_down(Some("cat1")).unwrap();
            tree.add_child("entry1", 1, now).unwrap();
            tree.node_down(Some("entry1")).unwrap();
            tree.add_child("password", 1, now).unwrap();
            tree.set_comment("password", "secret\nmore", 1, now).unwrap();
        }
        let mut tree = Tree::new(&mut d, true);
        tree.node_down(Some("cat1")).unwrap();
        tree.node_down(Some("entry1")).unwrap();
        assert_eq!(tree.get_comment("password"), Some("secret\nmore"));
    }

    #[test]
    fn duplicate_sibling_label_rejected() {
        let mut d = doc();
        let now = Utc::now();
        let mut tree = Tree::new(&mut d, true);
        tree.add_child("a", 1, now).unwrap();
        assert!(matches!(
            tree.add_child("a", 1, now),
            Err(CpmError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn delete_discards_subtree() {
        let mut d = doc();
        let now = Utc::now();
        let mut tree = Tree::new(&mut d, true);
        tree.add_child("a", 1, now).unwrap();
        tree.node_down(Some("a")).unwrap();
        tree.add_child("b", 1, now).unwrap();
        tree.node_up().unwrap();
        tree.delete_child("a", 1, now).unwrap();
        assert!(!tree.child_exists("a"));
    }

    #[test]
    fn node_up_at_root_errors() {
        let mut d = doc();
        let mut tree = Tree::new(&mut d, true);
        assert!(matches!(tree.node_up(), Err(CpmError::AtRoot)));
    }

    #[test]
    fn editor_add_idempotent_and_mutation_stamps_created_by() {
        let mut d = doc();
        let now = Utc::now();
        let mut tree = Tree::new(&mut d, true);
        let uid = tree.editor_add("alice", now);
        tree.add_child("a", uid, now).unwrap();
        assert_eq!(tree.get_creation("a"), Some((uid, now)));
        assert_ne!(uid, UNKNOWN_EDITOR);
    }

    #[test]
    fn rename_then_lookup_by_new_label() {
        let mut d = doc();
        let now = Utc::now();
        let mut tree = Tree::new(&mut d, true);
        tree.add_child("old", 1, now).unwrap();
        tree.rename_child("old", "new", 1, now).unwrap();
        assert!(!tree.child_exists("old"));
        assert!(tree.child_exists("new"));
    }
}
