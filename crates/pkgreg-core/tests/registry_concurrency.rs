//! Concurrent registry population

use std::sync::Arc;

use pkgreg_core::node::Ident;
use pkgreg_core::object::Constant;
use pkgreg_core::position::{FileSet, Pos, Span};
use pkgreg_core::registry::Registry;
use pkgreg_core::types::{ConstSymbol, ConstValue, Type};
use rayon::prelude::*;

fn constant(name: String, at: Pos) -> Arc<Constant> {
    let len = name.len() as u32;
    Arc::new(Constant::new(
        Span::new(at, at.advance(len + 4)),
        Ident::new(name.clone(), Span::new(at, at.advance(len))),
        ConstSymbol {
            name,
            ty: Type::basic("int"),
            value: ConstValue::Int(0),
        },
        None,
    ))
}

/// Eight files of 64 declarations each, registered in the given file order.
fn populate(file_order: &[usize]) -> Vec<String> {
    let fset = Arc::new(FileSet::new());
    let bases: Vec<Pos> = file_order
        .iter()
        .map(|i| fset.add_file(format!("f{}.go", i), &" ".repeat(1024)))
        .collect();

    let registry = Registry::new("const", Arc::clone(&fset));
    file_order
        .par_iter()
        .zip(bases.par_iter())
        .for_each(|(file, base)| {
            let items: Vec<_> = (0..64)
                .map(|j| constant(format!("C{}_{:02}", file, j), base.advance(j * 16)))
                .collect();
            // duplicates from a second worker must be dropped
            registry.add(items.iter().cloned());
            registry.add(items);
        });

    assert_eq!(registry.len(), 8 * 64);
    assert!(registry.init());
    registry
        .elements()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

#[test]
fn test_order_is_independent_of_file_and_thread_order() {
    let forward = populate(&[0, 1, 2, 3, 4, 5, 6, 7]);
    let shuffled = populate(&[5, 2, 7, 0, 3, 6, 1, 4]);
    assert_eq!(forward, shuffled);
    assert_eq!(forward.first().map(String::as_str), Some("C0_00"));
    assert_eq!(forward.last().map(String::as_str), Some("C7_63"));
}
