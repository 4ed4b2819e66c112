// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pattern engine (C7)
//!
//! A pattern string compiles once into a sequence of [`Segment`]s: runs of
//! literal text and `<NAME>` template references. `<NAME>` is resolved to a
//! tree depth via the template registry (falling back to a caller-supplied
//! default list) at compile time, not at projection time — projection only
//! ever substitutes `path[level - 1]`.
//!
//! Grammar: literal characters; `\` escapes the following character
//! (including `<`, `>`, and `\` itself); `<NAME>` opens and closes a
//! template reference. A compiled pattern is capped at 1024 bytes, counting
//! both segment kinds, to keep worst-case projected strings bounded.

use thiserror::Error;

const MAX_COMPILED_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("unclosed template tag starting at byte {0}")]
    UnclosedTag(usize),

    #[error("unexpected '>' with no open tag at byte {0}")]
    UnopenedTag(usize),

    #[error("unknown template name {0:?}")]
    UnknownTemplate(String),

    #[error("pattern ends with a dangling '\\' escape")]
    UnterminatedEscape,

    #[error("compiled pattern exceeds the {MAX_COMPILED_LEN}-byte limit")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// 1-based tree depth, matching [`crate::tree::Tree::node_label_at`].
    TemplateRef(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledPattern {
    segments: Vec<Segment>,
}

impl CompiledPattern {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Substitutes each `TemplateRef(level)` with `path[level - 1]`. Returns
    /// `None` if any referenced level is deeper than `path`, meaning this
    /// pattern does not apply at the current tree position (§4.8: "the node
    /// is skipped").
    pub fn project(&self, path: &[String]) -> Option<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::TemplateRef(level) => {
                    out.push_str(path.get((*level as usize).checked_sub(1)?)?);
                }
            }
        }
        Some(out)
    }
}

/// Resolves a `<NAME>` template name to the depth it is configured at.
/// `templates` lists names in order from level 1, as either the document's
/// own per-level titles or the runtime's configured defaults — the caller
/// is responsible for merging the two per C6's fallback rule.
fn resolve_level(name: &str, templates: &[String]) -> Result<u32, PatternError> {
    templates
        .iter()
        .position(|t| t == name)
        .map(|idx| (idx + 1) as u32)
        .ok_or_else(|| PatternError::UnknownTemplate(name.to_string()))
}

pub fn compile(pattern: &str, templates: &[String]) -> Result<CompiledPattern, PatternError> {
    let bytes = pattern.as_bytes();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut compiled_len = 0usize;
    let mut i = 0usize;

    let mut flush_literal = |literal: &mut String, segments: &mut Vec<Segment>, compiled_len: &mut usize| -> Result<(), PatternError> {
        if literal.is_empty() {
            return Ok(());
        }
        *compiled_len += literal.len();
        if *compiled_len > MAX_COMPILED_LEN {
            return Err(PatternError::Overflow);
        }
        segments.push(Segment::Literal(std::mem::take(literal)));
        Ok(())
    };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let next = i + 1;
                if next >= bytes.len() {
                    return Err(PatternError::UnterminatedEscape);
                }
                literal.push(bytes[next] as char);
                i = next + 1;
            }
            b'<' => {
                flush_literal(&mut literal, &mut segments, &mut compiled_len)?;
                let close = bytes[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| i + 1 + p)
                    .ok_or(PatternError::UnclosedTag(i))?;
                let name = &pattern[i + 1..close];
                let level = resolve_level(name, templates)?;
                compiled_len += 4; // fixed cost for a template reference, matching a "<NN>" worst case
                if compiled_len > MAX_COMPILED_LEN {
                    return Err(PatternError::Overflow);
                }
                segments.push(Segment::TemplateRef(level));
                i = close + 1;
            }
            b'>' => return Err(PatternError::UnopenedTag(i)),
            _ => {
                // Safe: pattern is valid UTF-8 and we only ever skip ASCII
                // control bytes ('<', '>', '\\') above, so slicing by byte
                // index here always lands on a char boundary.
                let ch_len = pattern[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                literal.push_str(&pattern[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    flush_literal(&mut literal, &mut segments, &mut compiled_len)?;

    Ok(CompiledPattern { segments })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Vec<String> {
        vec!["Category".into(), "Account".into(), "Field".into()]
    }

    #[test]
    fn literal_only_pattern() {
        let p = compile("hello world", &templates()).unwrap();
        assert_eq!(p.segments(), &[Segment::Literal("hello world".into())]);
    }

    #[test]
    fn template_reference_resolves_to_level() {
        let p = compile("<Category>/<Account>", &templates()).unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::TemplateRef(1),
                Segment::Literal("/".into()),
                Segment::TemplateRef(2),
            ]
        );
    }

    #[test]
    fn escapes_pass_through_literally() {
        let p = compile(r"a\<b\>c\\d", &templates()).unwrap();
        assert_eq!(p.segments(), &[Segment::Literal("a<b>c\\d".into())]);
    }

    #[test]
    fn unclosed_tag_is_rejected() {
        assert_eq!(compile("<Category", &templates()), Err(PatternError::UnclosedTag(0)));
    }

    #[test]
    fn stray_close_angle_is_rejected() {
        assert_eq!(compile("a>b", &templates()), Err(PatternError::UnopenedTag(1)));
    }

    #[test]
    fn unknown_template_name_is_rejected() {
        assert_eq!(
            compile("<Bogus>", &templates()),
            Err(PatternError::UnknownTemplate("Bogus".into()))
        );
    }

    #[test]
    fn dangling_escape_is_rejected() {
        assert_eq!(compile("abc\\", &templates()), Err(PatternError::UnterminatedEscape));
    }

    #[test]
    fn oversized_pattern_overflows() {
        let huge = "x".repeat(MAX_COMPILED_LEN + 1);
        assert_eq!(compile(&huge, &templates()), Err(PatternError::Overflow));
    }

    #[test]
    fn projection_substitutes_path_segments() {
        let p = compile("<Category>-<Account>", &templates()).unwrap();
        let path = vec!["Email".to_string(), "GitHub".to_string()];
        assert_eq!(p.project(&path), Some("Email-GitHub".to_string()));
    }

    #[test]
    fn projection_fails_when_path_is_shallower_than_reference() {
        let p = compile("<Field>", &templates()).unwrap();
        let path = vec!["Email".to_string()];
        assert_eq!(p.project(&path), None);
    }
}
