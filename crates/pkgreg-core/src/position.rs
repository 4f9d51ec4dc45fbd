//! Source positions and the shared file set.
//!
//! Positions are global offsets into a [`FileSet`], in the style of a
//! compiler's token file set:
//! - Every registered file occupies the range `[base, base + size]`
//! - `Pos(0)` is reserved as "no position"
//! - All files of one set share a `u32` space, so their total size is
//!   limited to 4 GiB
//! - A [`Span`] (`start`, `end`) is the position key identifying a syntax node
//!
//! Offsets from different files are not comparable as integers. Use
//! [`FileSet::position`] to resolve a `Pos` into a file name, byte offset and
//! 1-indexed line/column before ordering across files.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::RwLock;

// ============================================================================
// Pos / Span
// ============================================================================

/// A global source position inside a [`FileSet`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pos(pub u32);

impl Pos {
    /// The invalid position.
    pub const NONE: Pos = Pos(0);

    /// Whether this position refers to a file in some file set.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Position `delta` bytes after this one.
    pub fn advance(self, delta: u32) -> Pos {
        Pos(self.0 + delta)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open position range `[start, end)` of a syntax node.
///
/// Two declarations with the same span are the same declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// First byte of the node.
    pub start: Pos,
    /// One past the last byte of the node.
    pub end: Pos,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: Pos, end: Pos) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Whether `pos` falls inside this span.
    pub fn contains(&self, pos: Pos) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ============================================================================
// Position
// ============================================================================

/// A resolved position: file name, byte offset and 1-indexed line/column.
///
/// Ordering is by file name, then offset, which is the deterministic order
/// used by registries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Name of the file as registered in the file set.
    pub filename: String,
    /// Byte offset from the start of the file.
    pub offset: u32,
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed column in bytes.
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

// ============================================================================
// FileSet
// ============================================================================

#[derive(Debug, Clone)]
struct FileEntry {
    name: String,
    base: u32,
    size: u32,
    /// Byte offsets of line starts; always begins with 0.
    lines: Vec<u32>,
}

impl FileEntry {
    fn position(&self, pos: Pos) -> Position {
        let offset = pos.0 - self.base;
        let line = self.lines.partition_point(|&start| start <= offset);
        let line_start = self.lines[line - 1];
        Position {
            filename: self.name.clone(),
            offset,
            line: line as u32,
            column: offset - line_start + 1,
        }
    }
}

/// Registry of source files sharing one global position space.
///
/// Safe for concurrent readers and writers; front ends register files while
/// the graph builder resolves positions.
#[derive(Debug)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

#[derive(Debug)]
struct FileSetInner {
    next_base: u32,
    /// Sorted by base (bases are handed out increasing).
    files: Vec<FileEntry>,
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSet {
    /// Create an empty file set. The first file starts at base 1.
    pub fn new() -> Self {
        FileSet {
            inner: RwLock::new(FileSetInner {
                next_base: 1,
                files: Vec::new(),
            }),
        }
    }

    /// Register a file and return its base position.
    ///
    /// Byte `i` of `content` is at `base.advance(i)`; the end-of-file
    /// position `base.advance(len)` is also valid.
    ///
    /// # Panics
    /// Panics if the files of one set exceed the 4 GiB `u32` position space.
    pub fn add_file(&self, name: impl Into<String>, content: &str) -> Pos {
        let size = u32::try_from(content.len()).expect("FileSet file exceeds 4 GiB");
        let mut lines = vec![0u32];
        lines.extend(
            content
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );

        let mut inner = self.inner.write().expect("FileSet RwLock poisoned");
        let base = inner.next_base;
        inner.next_base = base
            .checked_add(size)
            .and_then(|end| end.checked_add(1))
            .expect("FileSet position space exhausted");
        inner.files.push(FileEntry {
            name: name.into(),
            base,
            size,
            lines,
        });
        Pos(base)
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.inner.read().expect("FileSet RwLock poisoned").files.len()
    }

    /// Whether no file has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a position, or `None` if it belongs to no registered file.
    pub fn position(&self, pos: Pos) -> Option<Position> {
        if !pos.is_valid() {
            return None;
        }
        let inner = self.inner.read().expect("FileSet RwLock poisoned");
        let idx = inner.files.partition_point(|f| f.base <= pos.0);
        let file = inner.files.get(idx.checked_sub(1)?)?;
        if pos.0 > file.base + file.size {
            return None;
        }
        Some(file.position(pos))
    }

    /// Name of the file containing `pos`.
    pub fn file_name(&self, pos: Pos) -> Option<String> {
        self.position(pos).map(|p| p.filename)
    }

    /// Compare two spans by file name, then offset, then end offset.
    ///
    /// Spans that do not resolve sort after every resolvable span and fall back
    /// to raw position order among themselves.
    pub fn compare_spans(&self, a: &Span, b: &Span) -> Ordering {
        let key = |s: &Span| {
            self.position(s.start)
                .map(|p| (p.filename, p.offset, s.end.0.saturating_sub(s.start.0)))
        };
        match (key(a), key(b)) {
            (Some(ka), Some(kb)) => ka.cmp(&kb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    /// Render a position for diagnostics (`file:line:col`, or the raw pos).
    pub fn describe(&self, pos: Pos) -> String {
        match self.position(pos) {
            Some(p) => p.to_string(),
            None => format!("<pos {}>", pos),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod fileset_tests {
        use super::*;

        #[test]
        fn bases_do_not_overlap() {
            let fset = FileSet::new();
            let a = fset.add_file("a.go", "package a\n");
            let b = fset.add_file("b.go", "package a\n");
            assert_eq!(a, Pos(1));
            assert_eq!(b, Pos(1 + 10 + 1));
            assert_eq!(fset.len(), 2);
        }

        #[test]
        #[should_panic(expected = "position space exhausted")]
        fn exhausted_position_space_panics() {
            let fset = FileSet::new();
            fset.inner.write().unwrap().next_base = u32::MAX - 2;
            fset.add_file("big.go", "abc");
        }

        #[test]
        fn resolves_line_and_column() {
            let fset = FileSet::new();
            let base = fset.add_file("a.go", "package a\n\nconst X = 1\n");
            let pos = fset.position(base.advance(17)).unwrap();
            assert_eq!(pos.filename, "a.go");
            assert_eq!(pos.offset, 17);
            assert_eq!(pos.line, 3);
            assert_eq!(pos.column, 7);
            assert_eq!(pos.to_string(), "a.go:3:7");
        }

        #[test]
        fn end_of_file_position_is_valid() {
            let fset = FileSet::new();
            let base = fset.add_file("a.go", "abc");
            assert!(fset.position(base.advance(3)).is_some());
            assert!(fset.position(base.advance(4)).is_none());
        }

        #[test]
        fn no_position_resolves_to_none() {
            let fset = FileSet::new();
            fset.add_file("a.go", "abc");
            assert!(fset.position(Pos::NONE).is_none());
            assert_eq!(fset.describe(Pos(99)), "<pos 99>");
        }

        #[test]
        fn compare_orders_by_file_name_before_offset() {
            let fset = FileSet::new();
            // registered first, but sorts after "a.go"
            let z = fset.add_file("z.go", "0123456789");
            let a = fset.add_file("a.go", "0123456789");

            let in_z = Span::new(z, z.advance(2));
            let in_a = Span::new(a.advance(5), a.advance(6));
            assert!(in_z.start < in_a.start);
            assert_eq!(fset.compare_spans(&in_a, &in_z), Ordering::Less);
        }
    }

    mod span_tests {
        use super::*;

        #[test]
        #[should_panic(expected = "must be <= end")]
        fn inverted_span_panics() {
            let _ = Span::new(Pos(5), Pos(4));
        }

        #[test]
        fn contains_is_half_open() {
            let span = Span::new(Pos(3), Pos(6));
            assert!(span.contains(Pos(3)));
            assert!(span.contains(Pos(5)));
            assert!(!span.contains(Pos(6)));
        }
    }
}
