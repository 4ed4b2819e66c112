// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-level templates (C6): a title and a `password` flag per tree depth.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateStatus {
    Normal,
    Password,
}

impl TemplateStatus {
    pub fn is_password(self) -> bool {
        matches!(self, TemplateStatus::Password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub level: u32,
    pub title: String,
    pub status: TemplateStatus,
}

/// At most one template per level (document invariant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateRegistry {
    by_level: BTreeMap<u32, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, level: u32, title: &str, status: TemplateStatus) {
        self.by_level.insert(
            level,
            Template {
                level,
                title: title.to_string(),
                status,
            },
        );
    }

    /// Falls back to `defaults[level-1]`, then to a synthesised `"level N"`.
    ///
    /// Returns `(title, is_static)`: `is_static` is true when the title came
    /// from the document's own template table or the configured defaults,
    /// false when it had to be synthesised.
    pub fn get(&self, level: u32, defaults: &[String]) -> (String, bool) {
        if let Some(t) = self.by_level.get(&level) {
            return (t.title.clone(), true);
        }
        if let Some(name) = defaults.get((level.saturating_sub(1)) as usize) {
            return (name.clone(), true);
        }
        (format!("level {}", level), false)
    }

    pub fn is_password_level(&self, level: u32) -> bool {
        self.by_level
            .get(&level)
            .map(|t| t.status.is_password())
            .unwrap_or(false)
    }

    pub fn id_of(&self, title: &str) -> Option<u32> {
        self.by_level.iter().find(|(_, t)| t.title == title).map(|(level, _)| *level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.by_level.values()
    }
}
