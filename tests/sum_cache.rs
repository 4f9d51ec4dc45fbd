//! Integration tests for per-module sum caches built during graph construction.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use pkgreg::frontend::fixture::{FileFixture, MemoryFrontend, PackageFixture};
use pkgreg::sum::{HASH_PREFIX, SUM_FILENAME};
use pkgreg::types::ModuleInfo;
use pkgreg::{LoadConfig, Packages};

const MODULE: &str = "example.com/m";
const A: &str = "example.com/m/a";
const B: &str = "example.com/m/b";
const DEP: &str = "example.com/dep/c";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "go.mod", "module example.com/m\n");
    write(temp.path(), "a/a.go", "package a\n");
    write(temp.path(), "b/b.go", "package b\n");
    write(temp.path(), "b/testdata/input.txt", "fixture\n");
    temp
}

fn frontend(root: &Path) -> MemoryFrontend {
    let module = ModuleInfo::new(MODULE).with_dir(root);
    MemoryFrontend::new()
        .with_package(
            PackageFixture::new(A)
                .module(module.clone())
                .import(B)
                .import(DEP)
                .file(FileFixture::new("a.go")),
        )
        .with_package(PackageFixture::new(B).module(module).file(FileFixture::new("b.go")))
        .with_package(
            PackageFixture::new(DEP)
                .module(ModuleInfo::new("example.com/dep").with_dir(root.join("nonexistent")))
                .file(FileFixture::new("c.go")),
        )
}

fn build(root: &Path) -> Packages {
    Packages::build([A], &LoadConfig::new(), &frontend(root)).unwrap()
}

#[test]
fn test_direct_packages_are_hashed() {
    let temp = setup();
    let packages = build(temp.path());

    let sum = packages.module_sum(MODULE).unwrap();
    assert_eq!(sum.dir(), temp.path());
    assert_eq!(sum.paths(), [A, B]);
    for path in [A, B] {
        assert!(sum.hash(path).unwrap().starts_with(HASH_PREFIX));
    }
    assert_ne!(sum.hash(A), sum.hash(B));

    // transitive module: no sum
    assert!(packages.module_sum("example.com/dep").is_none());
}

#[test]
fn test_hashes_are_stable_across_builds() {
    let temp = setup();
    let first = build(temp.path());
    let second = build(temp.path());
    let (a, b) = (
        first.module_sum(MODULE).unwrap(),
        second.module_sum(MODULE).unwrap(),
    );
    assert!(b.changed(a).is_empty());
    assert_eq!(a.hash(B), b.hash(B));
}

#[test]
fn test_save_then_detect_changes() {
    let temp = setup();
    let packages = build(temp.path());
    assert!(packages.previous_sum(MODULE).is_none());

    packages.save_sums().unwrap();
    let saved = fs::read_to_string(temp.path().join(SUM_FILENAME)).unwrap();
    let lines: Vec<_> = saved.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("example.com/m/a h1:"));
    assert!(lines[1].starts_with("example.com/m/b h1:"));

    let previous = packages.previous_sum(MODULE).unwrap();
    let current = packages.module_sum(MODULE).unwrap();
    assert_eq!(previous.hash(A), current.hash(A));

    write(temp.path(), "b/testdata/input.txt", "changed\n");
    let rebuilt = build(temp.path());
    let changed = rebuilt.module_sum(MODULE).unwrap().changed(&previous);
    assert_eq!(changed, [B]);
}

#[test]
fn test_unhashable_package_is_left_out() {
    let temp = setup();
    fs::remove_dir_all(temp.path().join("b")).unwrap();
    let packages = build(temp.path());
    let sum = packages.module_sum(MODULE).unwrap();
    assert!(sum.hash(A).is_some());
    assert!(sum.hash(B).is_none());
}

#[test]
fn test_source_dir_follows_module_layout() {
    let temp = setup();
    let packages = build(temp.path());
    let b = packages.require_package(B).unwrap();
    assert_eq!(b.source_dir(), Some(temp.path().join("b").as_path()));
}
