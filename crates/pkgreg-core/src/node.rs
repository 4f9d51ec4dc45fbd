//! Syntax leaves shared between the front end and the registry.
//!
//! Only the pieces the registry needs to reason about are modelled here:
//! identifiers (name + span) and raw comments. Full syntax trees belong to
//! the front end.

use serde::{Deserialize, Serialize};

use crate::position::{Pos, Span};

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }

    /// Start position; symbol tables are keyed by it.
    pub fn pos(&self) -> Pos {
        self.span.start
    }
}

/// A single comment exactly as written, including its `//` or `/* */` markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comment {
    pub span: Span,
    pub text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Comment {
            text: text.into(),
            span,
        }
    }
}

/// A run of comments with no blank line or code between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentGroup {
    pub list: Vec<Comment>,
}

impl CommentGroup {
    pub fn new(list: Vec<Comment>) -> Self {
        CommentGroup { list }
    }

    /// Span from the first comment's start to the last comment's end.
    pub fn span(&self) -> Option<Span> {
        let first = self.list.first()?;
        let last = self.list.last()?;
        Some(Span::new(first.span.start, last.span.end))
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
