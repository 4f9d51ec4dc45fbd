//! Declarations as registry elements.
//!
//! An [`Object`] wraps one top-level declaration: the span of its syntax node,
//! its defining identifier, the symbol the front end resolved it to and its
//! parsed [`Doc`]. Three kinds exist:
//!
//! - [`Constant`]: `Object<ConstSymbol>`
//! - [`Function`]: `Object<FuncSymbol>` (plain functions and methods)
//! - [`TypeName`]: a named type plus the methods bound to it
//!
//! An object without a node is the *zero* object. It has no identity and is
//! dropped by [`Registry::add`](crate::registry::Registry::add).

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use crate::doc::Doc;
use crate::node::Ident;
use crate::position::Span;
use crate::types::{ConstSymbol, ConstValue, FuncSymbol, Signature, Type, TypeNameSymbol};

// ============================================================================
// Element
// ============================================================================

/// Anything a [`Registry`](crate::registry::Registry) can hold.
pub trait Element: Send + Sync {
    /// Span of the owning syntax node; `None` for a zero element.
    fn node(&self) -> Option<Span>;

    /// Name used by `element_by_name`.
    fn name(&self) -> &str;

    fn is_zero(&self) -> bool {
        self.node().is_none()
    }
}

// ============================================================================
// Object
// ============================================================================

/// One declaration of kind `S`.
#[derive(Debug, Clone, PartialEq)]
pub struct Object<S> {
    node: Option<Span>,
    ident: Option<Ident>,
    symbol: Option<S>,
    doc: Option<Arc<Doc>>,
}

impl<S> Default for Object<S> {
    fn default() -> Self {
        Object {
            node: None,
            ident: None,
            symbol: None,
            doc: None,
        }
    }
}

impl<S> Object<S> {
    pub fn new(node: Span, ident: Ident, symbol: S, doc: Option<Arc<Doc>>) -> Self {
        Object {
            node: Some(node),
            ident: Some(ident),
            symbol: Some(symbol),
            doc,
        }
    }

    /// The zero object.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn node(&self) -> Option<Span> {
        self.node
    }

    pub fn ident(&self) -> Option<&Ident> {
        self.ident.as_ref()
    }

    /// Identifier name; empty for the zero object.
    pub fn name(&self) -> &str {
        self.ident.as_ref().map(|i| i.name.as_str()).unwrap_or("")
    }

    pub fn symbol(&self) -> Option<&S> {
        self.symbol.as_ref()
    }

    pub fn doc(&self) -> Option<&Arc<Doc>> {
        self.doc.as_ref()
    }

    pub fn is_zero(&self) -> bool {
        self.node.is_none()
    }
}

impl<S: Send + Sync> Element for Object<S> {
    fn node(&self) -> Option<Span> {
        self.node
    }

    fn name(&self) -> &str {
        Object::name(self)
    }
}

impl<S> fmt::Display for Object<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "{}@{}", self.name(), node),
            None => write!(f, "<zero>"),
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

pub type Constant = Object<ConstSymbol>;

impl Object<ConstSymbol> {
    pub fn value(&self) -> Option<&ConstValue> {
        self.symbol.as_ref().map(|c| &c.value)
    }

    pub fn ty(&self) -> Option<&Type> {
        self.symbol.as_ref().map(|c| &c.ty)
    }

    /// Name of the constant's type when that type is a named type.
    pub fn type_name(&self) -> Option<&str> {
        self.ty().and_then(Type::named_name)
    }
}

// ============================================================================
// Functions
// ============================================================================

pub type Function = Object<FuncSymbol>;

impl Object<FuncSymbol> {
    pub fn signature(&self) -> Option<&Signature> {
        self.symbol.as_ref().map(|f| &f.signature)
    }

    /// Receiver type as declared, for methods.
    pub fn recv(&self) -> Option<&Type> {
        self.signature().and_then(|s| s.recv.as_ref())
    }

    pub fn is_method(&self) -> bool {
        self.recv().is_some()
    }

    /// Whether the receiver is a pointer type.
    pub fn ptr_recv(&self) -> bool {
        self.recv().is_some_and(Type::is_pointer)
    }

    /// Whether a method value can be taken from a non-addressable receiver.
    ///
    /// True for plain functions and value-receiver methods.
    pub fn by_value(&self) -> bool {
        !self.ptr_recv()
    }

    /// Receiver type with pointers and aliases stripped; the key methods are
    /// bound by.
    pub fn recv_base(&self) -> Option<&Type> {
        self.recv().map(Type::deref)
    }
}

// ============================================================================
// Type names
// ============================================================================

/// A named type declaration and its bound methods.
///
/// Methods are attached once, after the whole package has been scanned.
#[derive(Debug, Default)]
pub struct TypeName {
    object: Object<TypeNameSymbol>,
    methods: OnceLock<BTreeMap<String, Arc<Function>>>,
}

impl TypeName {
    pub fn new(object: Object<TypeNameSymbol>) -> Self {
        TypeName {
            object,
            methods: OnceLock::new(),
        }
    }

    pub fn object(&self) -> &Object<TypeNameSymbol> {
        &self.object
    }

    /// The type this name denotes.
    pub fn ty(&self) -> Option<&Type> {
        self.object.symbol().map(|t| &t.ty)
    }

    /// Attach methods, in the given order.
    ///
    /// A later method with the same name replaces an earlier one; every
    /// replacement is returned as `(replaced, kept)`. Only the first call has
    /// an effect; later calls return nothing.
    pub fn attach_methods<I>(&self, methods: I) -> Vec<(Arc<Function>, Arc<Function>)>
    where
        I: IntoIterator<Item = Arc<Function>>,
    {
        if self.methods.get().is_some() {
            return Vec::new();
        }
        let mut map = BTreeMap::new();
        let mut replaced = Vec::new();
        for method in methods {
            if let Some(prev) = map.insert(method.name().to_string(), Arc::clone(&method)) {
                replaced.push((prev, method));
            }
        }
        if self.methods.set(map).is_err() {
            return Vec::new();
        }
        replaced
    }

    pub fn method(&self, name: &str) -> Option<&Arc<Function>> {
        self.methods.get().and_then(|m| m.get(name))
    }

    /// Bound methods sorted by name.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.methods.get().into_iter().flat_map(|m| m.values())
    }

    pub fn method_count(&self) -> usize {
        self.methods.get().map_or(0, BTreeMap::len)
    }
}

impl Deref for TypeName {
    type Target = Object<TypeNameSymbol>;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl Element for TypeName {
    fn node(&self) -> Option<Span> {
        self.object.node()
    }

    fn name(&self) -> &str {
        self.object.name()
    }
}

// ============================================================================
// Tests
// ============================================================================
