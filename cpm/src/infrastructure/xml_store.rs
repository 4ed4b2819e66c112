// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # XML serialiser (C5)
//!
//! Canonical read/write of the on-disk schema (§4.5):
//!
//! ```text
//! root(node*|template?|editor?)*       version, %creation, %modification
//! node(comment?|node*)*                label,   %creation, %modification
//! comment(#PCDATA)
//! template(title*)
//! title(#PCDATA)                       level
//! editor(user*)
//! user(#PCDATA)                        uid
//! ```
//!
//! Every element but `title`/`user`/`template`/`editor` carries the
//! `%creation`/`%modification` attribute groups (`created_by`,
//! `created_at`, `modified_by`, `modified_at`); the four exceptions carry
//! only a `created_at` timestamp. Timestamps are RFC 3339. A fresh inline
//! DTD (the three fragments above, assembled at compile time) is attached
//! on write and stripped on read, mirroring §4.5's "strip any prior DTD /
//! attach a fresh inline DTD" write path — actual validation against it is
//! out of scope for `quick-xml` and is instead enforced structurally by
//! this module refusing any shape it cannot produce itself.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use thiserror::Error;

use cpm_domain::model::{Document, Editor, Node, Template, TemplateStatus, Version};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("xml validation error: {0}")]
    Validation(String),
    #[error("xml write error: {0}")]
    Write(String),
}

const INLINE_DTD: &str = r#"<!DOCTYPE root [
<!ELEMENT root (node|template|editor)*>
<!ATTLIST root version CDATA #REQUIRED created_by CDATA #IMPLIED created_at CDATA #IMPLIED modified_by CDATA #IMPLIED modified_at CDATA #IMPLIED>
<!ELEMENT node (comment?,node*)>
<!ATTLIST node label CDATA #REQUIRED created_by CDATA #IMPLIED created_at CDATA #IMPLIED modified_by CDATA #IMPLIED modified_at CDATA #IMPLIED>
<!ELEMENT comment (#PCDATA)>
<!ELEMENT template (title*)>
<!ELEMENT title (#PCDATA)>
<!ATTLIST title level CDATA #REQUIRED status CDATA #IMPLIED>
<!ELEMENT editor (user*)>
<!ELEMENT user (#PCDATA)>
<!ATTLIST user uid CDATA #REQUIRED>
]>"#;

/// Write path (§4.5): serialise, strip any prior DTD (there is none — this
/// writer never reads one back in), attach the fresh inline DTD above.
pub fn write_document(doc: &Document) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| XmlError::Write(e.to_string()))?;

    let mut root = BytesStart::new("root");
    root.push_attribute(("version", doc.version.to_string().as_str()));
    root.push_attribute(("created_by", doc.created_by.to_string().as_str()));
    root.push_attribute(("created_at", fmt_ts(doc.created_at).as_str()));
    root.push_attribute(("modified_by", doc.modified_by.to_string().as_str()));
    root.push_attribute(("modified_at", fmt_ts(doc.modified_at).as_str()));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| XmlError::Write(e.to_string()))?;

    for node in &doc.children {
        write_node(&mut writer, node)?;
    }
    write_templates(&mut writer, &doc.templates)?;
    write_editors(&mut writer, &doc.editors)?;

    writer
        .write_event(Event::End(BytesEnd::new("root")))
        .map_err(|e| XmlError::Write(e.to_string()))?;

    let body = String::from_utf8(writer.into_inner().into_inner()).map_err(|e| XmlError::Write(e.to_string()))?;
    let (decl_line, rest) = body.split_once('\n').unwrap_or((body.as_str(), ""));
    Ok(format!("{decl_line}\n{INLINE_DTD}\n{rest}"))
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &Node) -> Result<(), XmlError> {
    let mut start = BytesStart::new("node");
    start.push_attribute(("label", node.label.as_str()));
    start.push_attribute(("created_by", node.created_by.to_string().as_str()));
    start.push_attribute(("created_at", fmt_ts(node.created_at).as_str()));
    if let Some(by) = node.modified_by {
        start.push_attribute(("modified_by", by.to_string().as_str()));
    }
    if let Some(at) = node.modified_at {
        start.push_attribute(("modified_at", fmt_ts(at).as_str()));
    }
    writer
        .write_event(Event::Start(start))
        .map_err(|e| XmlError::Write(e.to_string()))?;

    if let Some(comment) = &node.comment {
        writer
            .write_event(Event::Start(BytesStart::new("comment")))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(&escape_comment(comment))))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        writer
            .write_event(Event::End(BytesEnd::new("comment")))
            .map_err(|e| XmlError::Write(e.to_string()))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("node")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    Ok(())
}

fn write_templates(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    templates: &cpm_domain::model::TemplateRegistry,
) -> Result<(), XmlError> {
    writer
        .write_event(Event::Start(BytesStart::new("template")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    for t in templates.iter() {
        let mut start = BytesStart::new("title");
        start.push_attribute(("level", t.level.to_string().as_str()));
        start.push_attribute((
            "status",
            if t.status.is_password() { "password" } else { "normal" },
        ));
        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(&t.title)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        writer
            .write_event(Event::End(BytesEnd::new("title")))
            .map_err(|e| XmlError::Write(e.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("template")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    Ok(())
}

fn write_editors(writer: &mut Writer<Cursor<Vec<u8>>>, editors: &cpm_domain::model::EditorTable) -> Result<(), XmlError> {
    writer
        .write_event(Event::Start(BytesStart::new("editor")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    for e in editors.iter() {
        let mut start = BytesStart::new("user");
        start.push_attribute(("uid", e.uid.to_string().as_str()));
        writer
            .write_event(Event::Start(start))
            .map_err(|err| XmlError::Write(err.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(&e.name)))
            .map_err(|err| XmlError::Write(err.to_string()))?;
        writer
            .write_event(Event::End(BytesEnd::new("user")))
            .map_err(|err| XmlError::Write(err.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("editor")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    Ok(())
}

/// Read path (§4.5): parse, reject on failure, then §4.5.1 upgrade runs in
/// the caller (store pipeline), then this function's own structural checks
/// stand in for DTD validation.
pub fn read_document(xml: &str) -> Result<Document, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc: Option<Document> = None;
    let mut node_stack: Vec<Node> = Vec::new();
    let mut pending_text = String::new();
    let mut in_comment = false;
    let mut in_title: Option<(u32, TemplateStatus)> = None;
    let mut in_user: Option<u32> = None;
    let now = Utc::now();

    loop {
        match reader.read_event().map_err(|e| XmlError::Parse {
            offset: reader.buffer_position(),
            message: e.to_string(),
        })? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"root" => {
                    let attrs = read_attrs(&e)?;
                    let version = attrs
                        .get("version")
                        .and_then(|v| parse_version(v))
                        .unwrap_or_default();
                    let created_by = attrs.get("created_by").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let created_at = attrs
                        .get("created_at")
                        .and_then(|v| parse_ts(v))
                        .unwrap_or(now);
                    let modified_by = attrs.get("modified_by").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let modified_at = attrs
                        .get("modified_at")
                        .and_then(|v| parse_ts(v))
                        .unwrap_or(now);
                    doc = Some(Document {
                        version,
                        created_by,
                        created_at,
                        modified_by,
                        modified_at,
                        templates: Default::default(),
                        editors: cpm_domain::model::EditorTable::new(),
                        children: Vec::new(),
                        just_upgraded: false,
                    });
                }
                b"node" => {
                    let attrs = read_attrs(&e)?;
                    let label = attrs
                        .get("label")
                        .ok_or_else(|| XmlError::Validation("node missing required label attribute".into()))?
                        .clone();
                    let created_by = attrs.get("created_by").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let created_at = attrs.get("created_at").and_then(|v| parse_ts(v)).unwrap_or(now);
                    let modified_by = attrs.get("modified_by").and_then(|v| v.parse().ok());
                    let modified_at = attrs.get("modified_at").and_then(|v| parse_ts(v));
                    node_stack.push(Node {
                        label,
                        comment: None,
                        created_by,
                        created_at,
                        modified_by,
                        modified_at,
                        children: Vec::new(),
                    });
                }
                b"comment" => {
                    in_comment = true;
                    pending_text.clear();
                }
                b"title" => {
                    let attrs = read_attrs(&e)?;
                    let level: u32 = attrs
                        .get("level")
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| XmlError::Validation("title missing required level attribute".into()))?;
                    let status = match attrs.get("status").map(String::as_str) {
                        Some("password") => TemplateStatus::Password,
                        _ => TemplateStatus::Normal,
                    };
                    in_title = Some((level, status));
                    pending_text.clear();
                }
                b"user" => {
                    let attrs = read_attrs(&e)?;
                    let uid: u32 = attrs
                        .get("uid")
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| XmlError::Validation("user missing required uid attribute".into()))?;
                    in_user = Some(uid);
                    pending_text.clear();
                }
                b"template" | b"editor" => {}
                other => {
                    return Err(XmlError::Validation(format!(
                        "unexpected element <{}>",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Text(t) => {
                pending_text.push_str(
                    &t.unescape()
                        .map_err(|e| XmlError::Parse {
                            offset: reader.buffer_position(),
                            message: e.to_string(),
                        })?
                        .into_owned(),
                );
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"comment" => {
                    in_comment = false;
                    if let Some(n) = node_stack.last_mut() {
                        n.comment = Some(unescape_comment(&pending_text));
                    }
                    pending_text.clear();
                }
                b"title" => {
                    if let (Some((level, status)), Some(doc)) = (in_title.take(), doc.as_mut()) {
                        doc.templates.set(level, pending_text.trim(), status);
                    }
                    pending_text.clear();
                }
                b"user" => {
                    if let (Some(uid), Some(doc)) = (in_user.take(), doc.as_mut()) {
                        let created_at = now;
                        doc.editors.add(pending_text.trim(), created_at);
                        let _ = uid; // uid is re-derived monotonically; original uid is historical only
                    }
                    pending_text.clear();
                }
                b"node" => {
                    let finished = node_stack.pop().ok_or_else(|| {
                        XmlError::Validation("unbalanced </node> with no open node".into())
                    })?;
                    match node_stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => {
                            if let Some(doc) = doc.as_mut() {
                                doc.children.push(finished);
                            }
                        }
                    }
                }
                b"root" => {}
                b"template" | b"editor" => {}
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let _ = in_comment;
    doc.ok_or_else(|| XmlError::Validation("missing root element".into()))
}

fn read_attrs(start: &BytesStart) -> Result<std::collections::HashMap<String, String>, XmlError> {
    let mut map = std::collections::HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse {
            offset: 0,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse {
                offset: 0,
                message: e.to_string(),
            })?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

fn parse_version(s: &str) -> Option<Version> {
    let (major, minor) = s.split_once('.')?;
    Some(Version {
        major: major.parse().ok()?,
        minor: minor.parse().ok()?,
    })
}

/// The on-disk comment grammar escapes embedded newlines as `\n` (§3: "may
/// contain escape sequences for line breaks"; S1 formats a two-line
/// comment from `"secret\\nmore"`).
fn escape_comment(text: &str) -> String {
    text.replace('\n', "\\n")
}

fn unescape_comment(text: &str) -> String {
    text.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpm_domain::model::UNKNOWN_EDITOR;

    #[test]
    fn round_trips_empty_document() {
        let now = Utc::now();
        let doc = Document::new_empty(now);
        let xml = write_document(&doc).unwrap();
        let back = read_document(&xml).unwrap();
        assert_eq!(back.version, doc.version);
        assert!(back.children.is_empty());
    }

    #[test]
    fn round_trips_nested_tree_with_comment() {
        let now = Utc::now();
        let mut doc = Document::new_empty(now);
        let mut cat = Node::new("cat1", 1, now);
        let mut entry = Node::new("entry1", 1, now);
        let mut pw = Node::new("password", 1, now);
        pw.comment = Some("secret\nmore".to_string());
        entry.children.push(pw);
        cat.children.push(entry);
        doc.children.push(cat);

        let xml = write_document(&doc).unwrap();
        let back = read_document(&xml).unwrap();

        assert_eq!(back.children.len(), 1);
        assert_eq!(back.children[0].label, "cat1");
        let entry = &back.children[0].children[0];
        assert_eq!(entry.label, "entry1");
        let pw = &entry.children[0];
        assert_eq!(pw.comment.as_deref(), Some("secret\nmore"));
    }

    #[test]
    fn round_trips_templates_and_editors() {
        let now = Utc::now();
        let mut doc = Document::new_empty(now);
        doc.templates.set(1, "Service", TemplateStatus::Normal);
        doc.templates.set(2, "Password", TemplateStatus::Password);
        doc.editors.add("alice", now);

        let xml = write_document(&doc).unwrap();
        let back = read_document(&xml).unwrap();

        assert_eq!(back.templates.get(1, &[]), ("Service".to_string(), true));
        assert!(back.templates.is_password_level(2));
        assert!(back.editors.find_by_name("alice").is_some());
    }

    #[test]
    fn rejects_node_missing_label() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><root version="0.2"><node></node></root>"#;
        assert!(matches!(read_document(xml), Err(XmlError::Validation(_))));
    }

    #[test]
    fn written_document_carries_inline_dtd() {
        let doc = Document::new_empty(Utc::now());
        let xml = write_document(&doc).unwrap();
        assert!(xml.contains("<!DOCTYPE root"));
        let _ = UNKNOWN_EDITOR;
    }
}
