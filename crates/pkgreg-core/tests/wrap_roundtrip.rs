//! Exhaustive round-trip tests for identifier wrapping

use pkgreg_core::wrap::{Wrapper, PREFIX};

const ALPHABET: [char; 6] = ['a', 'x', '_', '.', '-', '/'];

/// Every string of length 0..=max over the alphabet.
fn all_strings(max: usize) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut frontier = vec![String::new()];
    for _ in 0..max {
        let mut next = Vec::with_capacity(frontier.len() * ALPHABET.len());
        for s in &frontier {
            for c in ALPHABET {
                let mut t = s.clone();
                t.push(c);
                next.push(t);
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

#[test]
fn test_unwrap_inverts_wrap_with_warm_cache() {
    let w = Wrapper::new();
    for path in all_strings(5) {
        let wrapped = w.wrap(&path);
        assert_eq!(w.unwrap(&wrapped), path, "wrapped={}", wrapped);
        assert_eq!(w.wrap(&w.unwrap(&wrapped)), wrapped);
    }
}

#[test]
fn test_unwrap_inverts_wrap_with_cold_cache() {
    let encoder = Wrapper::new();
    let decoder = Wrapper::new();
    for path in all_strings(5) {
        let wrapped = encoder.wrap(&path);
        assert_eq!(decoder.unwrap(&wrapped), path, "wrapped={}", wrapped);
    }
}

#[test]
fn test_wrapped_identifiers_are_bare() {
    let w = Wrapper::new();
    for path in all_strings(4) {
        let wrapped = w.wrap(&path);
        assert!(
            !wrapped.contains(['.', '/', '-']),
            "{:?} wrapped to {:?}",
            path,
            wrapped
        );
        if path.contains(['.', '/', '-']) {
            assert!(wrapped.starts_with(PREFIX));
        } else {
            assert_eq!(wrapped, path);
        }
    }
}

#[test]
fn test_wrap_is_idempotent() {
    let w = Wrapper::new();
    for path in all_strings(4) {
        let once = w.wrap(&path);
        assert_eq!(w.wrap(&once), once);
    }
}

#[test]
fn test_known_encodings() {
    let w = Wrapper::new();
    assert_eq!(w.wrap("a/b.C"), "xwrap_a_s_b_d_C");
    assert_eq!(Wrapper::new().unwrap("xwrap_a_s_b_d_C"), "a/b.C");
    assert_eq!(w.wrap("net"), "net");
    assert_eq!(w.wrap("encoding/json"), "xwrap_encoding_s_json");
    assert_eq!(
        w.wrap("github.com/path/to/pkg_test.Type"),
        "xwrap_github_d_com_s_path_s_to_s_pkg_u_test_d_Type"
    );
}
