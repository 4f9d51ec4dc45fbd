//! Documentation and annotation parsing.
//!
//! A declaration's doc is built from every comment block attached to it
//! (declaration group doc, spec doc, trailing line comment, ...). Lines are
//! classified as:
//!
//! - **Tag lines** start with `+`: `+key` or `+key=value`. Repeated keys
//!   accumulate values in encounter order; empty values are dropped but the
//!   key is kept, meaning "present, no value".
//! - **Description lines**: every other non-blank line, in source order.
//!
//! A doc with neither tags nor description is absent: [`Doc::parse`] returns
//! `None` so callers can test presence.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::node::{Comment, CommentGroup};
use crate::position::Span;

/// Marker introducing a tag line.
pub const TAG_MARKER: char = '+';

/// Parsed documentation of one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doc {
    /// Tag key to values; keys iterate in sorted order.
    tags: BTreeMap<String, Vec<String>>,
    /// Description lines in source order.
    desc: Vec<String>,
    /// Span covering the comments this doc was parsed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    span: Option<Span>,
}

impl Doc {
    /// Parse the comment groups attached to one declaration.
    ///
    /// The same physical comment may be reachable through several groups (for
    /// example a declaration-level doc and a file's comment list); each comment
    /// is parsed once, in source order.
    pub fn parse<'a, I>(groups: I) -> Option<Doc>
    where
        I: IntoIterator<Item = &'a CommentGroup>,
    {
        let mut comments = unique_comments(groups);
        comments.sort_by_key(|c| c.span);
        Self::from_comments(&comments)
    }

    /// Like [`Doc::parse`], but keeps the order the groups are given in.
    ///
    /// Used when the groups come from different files, whose positions do
    /// not order them meaningfully.
    pub fn parse_in_order<'a, I>(groups: I) -> Option<Doc>
    where
        I: IntoIterator<Item = &'a CommentGroup>,
    {
        Self::from_comments(&unique_comments(groups))
    }

    fn from_comments(comments: &[&Comment]) -> Option<Doc> {
        let first = comments.first()?;
        let span = Span::new(
            comments.iter().map(|c| c.span.start).min().unwrap_or(first.span.start),
            comments.iter().map(|c| c.span.end).max().unwrap_or(first.span.end),
        );

        let lines = comments
            .iter()
            .flat_map(|c| c.text.split('\n'))
            .map(strip_comment_syntax)
            .filter(|line| !line.is_empty());

        let mut doc = Doc::from_lines(lines)?;
        doc.span = Some(span);
        Some(doc)
    }

    /// Build a doc from already-stripped text lines.
    pub fn from_lines<I, S>(lines: I) -> Option<Doc>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut desc = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            match parse_tag(line) {
                Some((key, value)) => {
                    let values = tags.entry(key.to_string()).or_default();
                    if !value.is_empty() {
                        values.push(value.to_string());
                    }
                }
                None => desc.push(line.to_string()),
            }
        }

        if tags.is_empty() && desc.is_empty() {
            return None;
        }
        Some(Doc {
            tags,
            desc,
            span: None,
        })
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tags
    }

    /// Tag keys in sorted order.
    pub fn tag_keys(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Values of a tag; empty for a value-less or missing tag.
    pub fn tag_values(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn desc(&self) -> &[String] {
        &self.desc
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl fmt::Display for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tags:")?;
        for (key, values) in &self.tags {
            if values.is_empty() {
                write!(f, "[{}]", key)?;
            } else {
                write!(f, "[{}:{}]", key, values.join(","))?;
            }
        }
        write!(f, " desc:")?;
        for line in &self.desc {
            write!(f, "[{}]", line)?;
        }
        Ok(())
    }
}

/// Comments of `groups` in iteration order, each physical comment once.
fn unique_comments<'a, I>(groups: I) -> Vec<&'a Comment>
where
    I: IntoIterator<Item = &'a CommentGroup>,
{
    let mut seen = HashSet::new();
    groups
        .into_iter()
        .flat_map(|g| g.list.iter())
        .filter(|c| seen.insert(c.span))
        .collect()
}

/// Remove `//`, `/*`, `*/` and surrounding whitespace from one comment line.
fn strip_comment_syntax(line: &str) -> &str {
    let line = line.trim();
    let line = line.strip_prefix("/*").unwrap_or(line);
    let line = line.strip_prefix("//").unwrap_or(line);
    let line = line.strip_suffix("*/").unwrap_or(line);
    line.trim()
}

/// Split a tag line into `(key, value)`; `None` for description lines.
fn parse_tag(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(TAG_MARKER)?;
    let (key, value) = match rest.split_once('=') {
        Some((k, v)) => (k.trim(), v.trim()),
        None => (rest.trim(), ""),
    };
    // "+" or "+=x" carries no key; keep it as prose
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

// ============================================================================
// Tests
// ============================================================================
