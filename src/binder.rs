//! Method binding.
//!
//! Methods are not registered as functions. The scan hands them here, and
//! once every type name of the package is registered they are joined to the
//! type name whose type is identical to the method's dereferenced receiver:
//!
//! 1. group methods by receiver identity (`*T` and `T` both key on `T`)
//! 2. sort each group by position
//! 3. attach each group to every type name denoting that identity
//!
//! Methods whose receiver type has no type name in the package stay unbound.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use pkgreg_core::object::{Function, TypeName};
use pkgreg_core::position::FileSet;
use pkgreg_core::registry::Registry;
use pkgreg_core::types::Type;

/// Attach `methods` to the type names in `typenames`.
///
/// Returns the number of methods bound to at least one type name.
pub(crate) fn bind_methods(
    package: &str,
    fileset: &FileSet,
    typenames: &Registry<TypeName>,
    methods: Vec<Arc<Function>>,
) -> usize {
    let mut by_recv: HashMap<Type, Vec<Arc<Function>>> = HashMap::new();
    for method in methods {
        if let Some(base) = method.recv_base() {
            by_recv.entry(base.clone()).or_default().push(method);
        }
    }
    for group in by_recv.values_mut() {
        group.sort_by(|a, b| match (a.node(), b.node()) {
            (Some(x), Some(y)) => fileset.compare_spans(&x, &y),
            _ => Ordering::Equal,
        });
    }

    let mut bound: HashSet<&Type> = HashSet::new();
    typenames.for_each_unordered(|typename| {
        let Some(ty) = typename.ty() else {
            return;
        };
        let Some((key, group)) = by_recv.get_key_value(ty.unalias()) else {
            return;
        };
        bound.insert(key);
        for (replaced, kept) in typename.attach_methods(group.iter().cloned()) {
            warn!(
                package,
                receiver = %key,
                method = kept.name(),
                replaced = %describe(fileset, &replaced),
                kept = %describe(fileset, &kept),
                "duplicate method, later declaration kept"
            );
        }
    });

    let mut count = 0;
    for (ty, group) in &by_recv {
        if bound.contains(ty) {
            count += group.len();
        } else {
            debug!(package, receiver = %ty, methods = group.len(), "no type name for receiver");
        }
    }
    count
}

fn describe(fileset: &FileSet, function: &Function) -> String {
    function
        .node()
        .map(|n| fileset.describe(n.start))
        .unwrap_or_else(|| "<zero>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgreg_core::node::Ident;
    use pkgreg_core::object::Object;
    use pkgreg_core::position::{Pos, Span};
    use pkgreg_core::types::{FuncSymbol, Signature, TypeNameSymbol};

    const PKG: &str = "example.com/m/a";

    fn typename(at: Pos, name: &str, ty: Type) -> Arc<TypeName> {
        let span = Span::new(at, at.advance(10));
        Arc::new(TypeName::new(Object::new(
            span,
            Ident::new(name, Span::new(at, at.advance(name.len() as u32))),
            TypeNameSymbol {
                name: name.into(),
                ty,
            },
            None,
        )))
    }

    fn method(at: Pos, name: &str, recv: Type) -> Arc<Function> {
        let span = Span::new(at, at.advance(20));
        Arc::new(Function::new(
            span,
            Ident::new(name, Span::new(at.advance(5), at.advance(5 + name.len() as u32))),
            FuncSymbol {
                name: name.into(),
                signature: Signature::default().with_recv(recv),
            },
            None,
        ))
    }

    fn setup() -> (Arc<FileSet>, Pos, Registry<TypeName>) {
        let fset = Arc::new(FileSet::new());
        let base = fset.add_file("a.go", &"x".repeat(500));
        let typenames = Registry::new("type", Arc::clone(&fset));
        typenames.add([
            typename(base, "T", Type::named(PKG, "T")),
            typename(base.advance(20), "U", Type::named(PKG, "U")),
        ]);
        (fset, base, typenames)
    }

    #[test]
    fn pointer_and_value_receivers_bind_to_same_type() {
        let (fset, base, typenames) = setup();
        let t = Type::named(PKG, "T");
        let bound = bind_methods(
            PKG,
            &fset,
            &typenames,
            vec![
                method(base.advance(100), "Ptr", Type::pointer(t.clone())),
                method(base.advance(200), "Val", t),
            ],
        );
        assert_eq!(bound, 2);
        typenames.init();

        let t = typenames.element_by_name("T").unwrap();
        assert_eq!(t.method_count(), 2);
        assert!(!t.method("Ptr").unwrap().by_value());
        assert!(t.method("Val").unwrap().by_value());
        assert_eq!(typenames.element_by_name("U").unwrap().method_count(), 0);
    }

    #[test]
    fn duplicate_names_keep_the_later_declaration() {
        let (fset, base, typenames) = setup();
        let t = Type::named(PKG, "T");
        let first = method(base.advance(300), "M", t.clone());
        let second = method(base.advance(100), "M", Type::pointer(t));
        // input order is irrelevant; position decides
        bind_methods(PKG, &fset, &typenames, vec![first.clone(), second]);
        typenames.init();

        let kept = typenames.element_by_name("T").unwrap().method("M").unwrap();
        assert_eq!(kept.node(), first.node());
    }

    #[test]
    fn methods_without_receiver_type_stay_unbound() {
        let (fset, base, typenames) = setup();
        let bound = bind_methods(
            PKG,
            &fset,
            &typenames,
            vec![method(base.advance(100), "M", Type::named("other", "X"))],
        );
        assert_eq!(bound, 0);
    }

    #[test]
    fn alias_type_names_share_target_methods() {
        let fset = Arc::new(FileSet::new());
        let base = fset.add_file("a.go", &"x".repeat(500));
        let typenames = Registry::new("type", Arc::clone(&fset));
        let t = Type::named(PKG, "T");
        typenames.add([
            typename(base, "T", t.clone()),
            typename(
                base.advance(20),
                "A",
                Type::Alias {
                    package: PKG.into(),
                    name: "A".into(),
                    target: Box::new(t.clone()),
                },
            ),
        ]);
        bind_methods(PKG, &fset, &typenames, vec![method(base.advance(100), "M", t)]);
        typenames.init();
        assert!(typenames.element_by_name("A").unwrap().method("M").is_some());
        assert!(typenames.element_by_name("T").unwrap().method("M").is_some());
    }
}
