//! Ordered, position-keyed registries of declarations.
//!
//! A [`Registry`] collects the elements of one kind for one package:
//!
//! 1. `add` may be called from several scanning workers at once. Elements are
//!    keyed by the span of their syntax node; the first element stored under
//!    a span wins and later ones are logged and dropped.
//! 2. `init` finalizes the registry exactly once, sorting by (file name,
//!    offset, length). Raw positions are not used for ordering since offsets
//!    from different files are not comparable.
//! 3. After `init` the registry is read-only.
//!
//! Ordered accessors (`nodes`, `elements`, `element_by_name`) require `init`
//! to have run; before that they see an empty registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, warn};

use crate::object::Element;
use crate::position::{FileSet, Span};

/// The finalized view of a registry.
struct Finalized<V> {
    items: Vec<Arc<V>>,
    /// Name to index of its first occurrence in `items`.
    by_name: HashMap<String, usize>,
}

/// Position-indexed collection with deterministic finalization.
pub struct Registry<V> {
    /// Element kind, for diagnostics.
    kind: &'static str,
    fileset: Arc<FileSet>,
    entries: RwLock<HashMap<Span, Arc<V>>>,
    finalized: OnceLock<Finalized<V>>,
}

impl<V> fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl<V> Registry<V> {
    pub fn new(kind: &'static str, fileset: Arc<FileSet>) -> Self {
        Registry {
            kind,
            fileset,
            entries: RwLock::new(HashMap::new()),
            finalized: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.entries.read().expect("Registry RwLock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.finalized.get().is_some()
    }

    /// Element stored under `node`.
    pub fn element(&self, node: &Span) -> Option<Arc<V>> {
        self.entries
            .read()
            .expect("Registry RwLock poisoned")
            .get(node)
            .cloned()
    }

    /// Elements in finalized order.
    pub fn elements(&self) -> &[Arc<V>] {
        self.finalized
            .get()
            .map(|f| f.items.as_slice())
            .unwrap_or(&[])
    }

    /// Spans of the elements in finalized order.
    pub fn nodes(&self) -> impl Iterator<Item = Span> + '_
    where
        V: Element,
    {
        self.elements().iter().filter_map(|e| e.node())
    }

    /// First element named `name` in finalized order.
    ///
    /// Names are not unique keys: when several elements share a name, only
    /// the one at the earliest position is reachable here.
    pub fn element_by_name(&self, name: &str) -> Option<&Arc<V>> {
        let finalized = self.finalized.get()?;
        finalized.by_name.get(name).map(|&i| &finalized.items[i])
    }

    /// Visit every stored element in no particular order.
    ///
    /// Usable before `init`; holds the read lock while visiting.
    pub fn for_each_unordered<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<V>),
    {
        let entries = self.entries.read().expect("Registry RwLock poisoned");
        for element in entries.values() {
            f(element);
        }
    }
}

impl<V: Element> Registry<V> {
    /// Store elements, skipping zero elements and spans already taken.
    ///
    /// Returns the number of elements stored. Ignored after `init`.
    pub fn add<I>(&self, elements: I) -> usize
    where
        I: IntoIterator<Item = Arc<V>>,
    {
        if self.is_initialized() {
            warn!(kind = self.kind, "add after init ignored");
            return 0;
        }

        let mut entries = self.entries.write().expect("Registry RwLock poisoned");
        let mut added = 0;
        for element in elements {
            let Some(node) = element.node() else {
                continue;
            };
            if let Some(prev) = entries.get(&node) {
                debug!(
                    kind = self.kind,
                    name = element.name(),
                    pos = %self.fileset.describe(node.start),
                    prev = %self.fileset.describe(prev.node().unwrap_or(node).start),
                    "conflicting declaration dropped"
                );
                continue;
            }
            entries.insert(node, element);
            added += 1;
        }
        added
    }

    /// Finalize the order. Only the first call does any work; returns whether
    /// this call was it.
    pub fn init(&self) -> bool {
        let mut fired = false;
        self.finalized.get_or_init(|| {
            fired = true;
            self.finalize()
        });
        fired
    }

    fn finalize(&self) -> Finalized<V> {
        let entries = self.entries.read().expect("Registry RwLock poisoned");
        let mut keyed: Vec<(Span, Arc<V>)> = entries
            .iter()
            .map(|(span, v)| (*span, Arc::clone(v)))
            .collect();
        drop(entries);

        keyed.sort_by_cached_key(|(span, _)| self.order_key(span));

        let items: Vec<Arc<V>> = keyed.into_iter().map(|(_, v)| v).collect();
        let mut by_name = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            by_name.entry(item.name().to_string()).or_insert(i);
        }
        Finalized { items, by_name }
    }

    /// (unresolved, file name, offset, length, span): resolvable spans first,
    /// raw span as the final tie-break.
    fn order_key(&self, span: &Span) -> (bool, String, u32, u32, Span) {
        let len = span.end.0.saturating_sub(span.start.0);
        match self.fileset.position(span.start) {
            Some(p) => (false, p.filename, p.offset, len, *span),
            None => (true, String::new(), 0, len, *span),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
