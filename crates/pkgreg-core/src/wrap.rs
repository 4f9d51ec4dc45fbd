//! Reversible escaping of qualified symbol paths into bare identifiers.
//!
//! A reference such as `example.com/path/to/pkg.Type` cannot be re-lexed as
//! an identifier. [`Wrapper::wrap`] turns it into one:
//!
//! ```text
//! example.com/path/to/pkg.Type  =>  xwrap_example_d_com_s_path_s_to_s_pkg_d_Type
//! ```
//!
//! Escape table (applied to the whole path, then [`PREFIX`] is prepended):
//!
//! | char | escape |
//! |------|--------|
//! | `_`  | `_u_`  |
//! | `.`  | `_d_`  |
//! | `/`  | `_s_`  |
//! | `-`  | `_k_`  |
//!
//! After escaping, every `_` of the body belongs to exactly one three-byte
//! escape, so the body is decoded by a single left-to-right scan. Decoding by
//! successive find-and-replace passes is not reversible: the body of
//! `x/a_s_b` contains `_s_` spanning two escapes.
//!
//! Strings with none of `.`, `/`, `-` are already bare and pass through
//! unchanged in both directions.

use std::collections::HashMap;
use std::sync::RwLock;

/// Literal prefix marking a wrapped identifier.
pub const PREFIX: &str = "xwrap_";

const ESCAPES: [(char, char); 4] = [('_', 'u'), ('.', 'd'), ('/', 's'), ('-', 'k')];

/// Characters that make a path non-bare.
fn is_structural(c: char) -> bool {
    matches!(c, '.' | '/' | '-')
}

fn has_structure(s: &str) -> bool {
    s.chars().any(is_structural)
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-')
}

/// Byte index just past the literal opened by `quote` at `start`.
fn literal_end(s: &str, start: usize, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in s[start + 1..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote != '`' {
            escaped = true;
        } else if c == quote {
            return start + 1 + i + c.len_utf8();
        }
    }
    s.len()
}

fn escape_code(c: char) -> Option<char> {
    ESCAPES.iter().find(|(raw, _)| *raw == c).map(|(_, code)| *code)
}

fn unescape_code(code: char) -> Option<char> {
    ESCAPES.iter().find(|(_, e)| *e == code).map(|(raw, _)| *raw)
}

/// Escape a path and prepend the prefix. Pure; no caching.
pub fn encode(path: &str) -> String {
    let mut out = String::with_capacity(PREFIX.len() + path.len() * 2);
    out.push_str(PREFIX);
    for c in path.chars() {
        match escape_code(c) {
            Some(code) => {
                out.push('_');
                out.push(code);
                out.push('_');
            }
            None => out.push(c),
        }
    }
    out
}

/// Decode an escaped body (without prefix).
///
/// Returns `None` if the body contains an `_` that does not start a valid
/// escape, i.e. it was not produced by [`encode`].
pub fn decode(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
            continue;
        }
        let code = chars.next()?;
        if chars.next()? != '_' {
            return None;
        }
        out.push(unescape_code(code)?);
    }
    Some(out)
}

/// Bidirectional, memoized mapping between paths and wrapped identifiers.
///
/// Both directions are written through on every resolution, so repeated
/// lookups are a single map read. Each graph owns its own wrapper.
#[derive(Debug, Default)]
pub struct Wrapper {
    /// path -> wrapped
    p2w: RwLock<HashMap<String, String>>,
    /// wrapped -> path
    w2p: RwLock<HashMap<String, String>>,
}

impl Wrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all memoized mappings.
    pub fn clear(&self) {
        self.p2w.write().expect("Wrapper RwLock poisoned").clear();
        self.w2p.write().expect("Wrapper RwLock poisoned").clear();
    }

    /// Wrap a path into a bare identifier.
    ///
    /// Bare identifiers, wrapped ones included, are returned unchanged. A
    /// prefixed string that still has structural characters is wrapped again.
    pub fn wrap(&self, path: &str) -> String {
        if let Some(x) = self.p2w.read().expect("Wrapper RwLock poisoned").get(path) {
            return x.clone();
        }
        if !has_structure(path) {
            return path.to_string();
        }

        let wrapped = encode(path);
        self.remember(path, &wrapped);
        wrapped
    }

    /// Recover the path from a wrapped identifier.
    ///
    /// Input that is not wrapped (no prefix, an invalid escape, or already
    /// containing structural characters) is returned unchanged.
    pub fn unwrap(&self, wrapped: &str) -> String {
        if let Some(p) = self.w2p.read().expect("Wrapper RwLock poisoned").get(wrapped) {
            return p.clone();
        }
        if self
            .p2w
            .read()
            .expect("Wrapper RwLock poisoned")
            .contains_key(wrapped)
        {
            return wrapped.to_string();
        }
        if has_structure(wrapped) {
            return wrapped.to_string();
        }

        let Some(path) = wrapped.strip_prefix(PREFIX).and_then(decode) else {
            return wrapped.to_string();
        };

        if has_structure(&path) {
            self.remember(&path, &encode(&path));
        } else {
            // a prefixed bare name: the path wraps to itself
            self.remember(&path, &path);
        }
        self.w2p
            .write()
            .expect("Wrapper RwLock poisoned")
            .insert(wrapped.to_string(), path.clone());
        path
    }

    /// Wrap every qualified reference (`example.com/pkg.Name`) in an
    /// expression, leaving the rest of the text alone.
    ///
    /// A reference is a run of identifier characters, `.`, `/` and `-` that
    /// holds a `/` followed by a `.`; it ends at the name after that `.`, so
    /// `example.com/pkg.T.Method` keeps `.Method` as a selector. String and
    /// rune literals are copied through. Division must be spaced (`a / b.C`)
    /// to not read as a path.
    pub fn wrap_expr(&self, expr: &str) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut chars = expr.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let end = if matches!(c, '"' | '`' | '\'') {
                let end = literal_end(expr, i, c);
                out.push_str(&expr[i..end]);
                end
            } else if is_path_char(c) {
                let end = expr[i..]
                    .find(|c: char| !is_path_char(c))
                    .map_or(expr.len(), |n| i + n);
                out.push_str(&self.wrap_reference(&expr[i..end]));
                end
            } else {
                out.push(c);
                continue;
            };
            while chars.peek().is_some_and(|(j, _)| *j < end) {
                chars.next();
            }
        }
        out
    }

    fn wrap_reference(&self, run: &str) -> String {
        let Some(slash) = run.rfind('/') else {
            return run.to_string();
        };
        let Some(dot) = run[slash..].find('.').map(|n| slash + n) else {
            return run.to_string();
        };
        let end = run[dot + 1..].find('.').map_or(run.len(), |n| dot + 1 + n);
        if end == dot + 1 {
            return run.to_string();
        }
        format!("{}{}", self.wrap(&run[..end]), &run[end..])
    }

    fn remember(&self, path: &str, wrapped: &str) {
        self.p2w
            .write()
            .expect("Wrapper RwLock poisoned")
            .insert(path.to_string(), wrapped.to_string());
        self.w2p
            .write()
            .expect("Wrapper RwLock poisoned")
            .insert(wrapped.to_string(), path.to_string());
    }
}

// ============================================================================
// Tests
// ============================================================================
