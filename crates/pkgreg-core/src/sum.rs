//! Per-module content hash cache.
//!
//! A [`Sum`] maps package paths to a hash of the package's source directory.
//! It is persisted as [`SUM_FILENAME`] in the module's root directory, one
//! record per line, sorted by package path:
//!
//! ```text
//! example.com/m/a h1:5f1c...
//! example.com/m/b h1:09ab...
//! ```
//!
//! The cache is a change-detection hint for consumers. A missing or
//! unreadable file is not an error; it simply loads as no cache.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::types::ModuleInfo;

/// Name of the cache file inside a module root.
pub const SUM_FILENAME: &str = "pkg.xsum";

/// Prefix of the hash format produced by [`hash_dir`].
pub const HASH_PREFIX: &str = "h1:";

// ============================================================================
// Directory hashing
// ============================================================================

/// Hash every regular file below `dir`.
///
/// Each file contributes `"<sha256 hex>  <relative/path>\n"` to a summary,
/// in sorted path order; the result is `h1:` plus the hex SHA-256 of the
/// summary. The sum file itself is skipped so saving a cache does not change
/// the hash of the package at the module root.
pub fn hash_dir(dir: &Path) -> io::Result<String> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name() == SUM_FILENAME {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(io::Error::other)?
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        if rel.contains('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file name contains newline: {:?}", rel),
            ));
        }
        files.push((rel, entry.into_path()));
    }
    files.sort();

    let mut summary = Sha256::new();
    for (rel, path) in &files {
        let content = fs::read(path)?;
        let digest = Sha256::digest(&content);
        summary.update(hex::encode(digest).as_bytes());
        summary.update(b"  ");
        summary.update(rel.as_bytes());
        summary.update(b"\n");
    }
    Ok(format!("{}{}", HASH_PREFIX, hex::encode(summary.finalize())))
}

// ============================================================================
// Sum
// ============================================================================

/// Package hashes of one module.
#[derive(Debug)]
pub struct Sum {
    dir: PathBuf,
    hashes: RwLock<BTreeMap<String, String>>,
}

impl Sum {
    /// An empty cache for the module rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Sum {
            dir: dir.into(),
            hashes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load the persisted cache of `module`.
    ///
    /// `None` when there is no module, it has no directory, or the sum file
    /// cannot be read. Lines without exactly two fields are skipped.
    pub fn load(module: Option<&ModuleInfo>) -> Option<Sum> {
        let dir = module?.dir.as_ref()?;
        let data = fs::read_to_string(dir.join(SUM_FILENAME)).ok()?;
        Some(Sum {
            dir: dir.clone(),
            hashes: RwLock::new(parse(&data)),
        })
    }

    /// Module source directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the sum file this cache saves to.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(SUM_FILENAME)
    }

    /// Hash the package at `pkg_dir` and record it under `path`.
    ///
    /// Packages already present are not rehashed. A directory that cannot
    /// be hashed is logged and left out.
    pub fn add(&self, path: &str, pkg_dir: &Path) {
        if self.hash(path).is_some() {
            return;
        }
        match hash_dir(pkg_dir) {
            Ok(hash) => {
                self.hashes
                    .write()
                    .expect("Sum RwLock poisoned")
                    .entry(path.to_string())
                    .or_insert(hash);
            }
            Err(err) => {
                warn!(package = path, dir = %pkg_dir.display(), error = %err, "cannot hash package");
            }
        }
    }

    /// Record a hash directly.
    pub fn insert(&self, path: impl Into<String>, hash: impl Into<String>) {
        self.hashes
            .write()
            .expect("Sum RwLock poisoned")
            .insert(path.into(), hash.into());
    }

    pub fn hash(&self, path: &str) -> Option<String> {
        self.hashes
            .read()
            .expect("Sum RwLock poisoned")
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.hashes.read().expect("Sum RwLock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded package paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.hashes
            .read()
            .expect("Sum RwLock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Paths whose hash differs from, or is missing in, `previous`. Sorted.
    pub fn changed(&self, previous: &Sum) -> Vec<String> {
        let current = self.hashes.read().expect("Sum RwLock poisoned");
        let previous = previous.hashes.read().expect("Sum RwLock poisoned");
        current
            .iter()
            .filter(|(path, hash)| previous.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Write the cache to the module directory, replacing any previous file.
    pub fn save(&self) -> io::Result<()> {
        let content = render(&self.hashes.read().expect("Sum RwLock poisoned"));
        atomic_write(&self.file_path(), content.as_bytes())
    }
}

fn render(hashes: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (path, hash) in hashes {
        out.push_str(path);
        out.push(' ');
        out.push_str(hash);
        out.push('\n');
    }
    out
}

fn parse(data: &str) -> BTreeMap<String, String> {
    let mut hashes = BTreeMap::new();
    for line in data.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if let [path, hash] = fields.as_slice() {
            hashes.insert(path.to_string(), hash.to_string());
        }
    }
    hashes
}

/// Write via a sibling temp file and rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let temp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));
    fs::write(&temp_path, content)?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    mod hash_dir_tests {
        use super::*;

        #[test]
        fn stable_for_unchanged_contents() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), "a.go", "package a\n");
            write(tmp.path(), "b.go", "package a\n\nconst X = 1\n");

            let h1 = hash_dir(tmp.path()).unwrap();
            let h2 = hash_dir(tmp.path()).unwrap();
            assert_eq!(h1, h2);
            assert!(h1.starts_with(HASH_PREFIX));
            assert_eq!(h1.len(), HASH_PREFIX.len() + 64);
        }

        #[test]
        fn independent_of_creation_order() {
            let one = TempDir::new().unwrap();
            write(one.path(), "a.go", "A");
            write(one.path(), "b.go", "B");
            let two = TempDir::new().unwrap();
            write(two.path(), "b.go", "B");
            write(two.path(), "a.go", "A");
            assert_eq!(hash_dir(one.path()).unwrap(), hash_dir(two.path()).unwrap());
        }

        #[test]
        fn sensitive_to_content_and_names() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), "a.go", "A");
            let before = hash_dir(tmp.path()).unwrap();

            write(tmp.path(), "a.go", "A2");
            let edited = hash_dir(tmp.path()).unwrap();
            assert_ne!(before, edited);

            fs::rename(tmp.path().join("a.go"), tmp.path().join("c.go")).unwrap();
            assert_ne!(edited, hash_dir(tmp.path()).unwrap());
        }

        #[test]
        fn sum_file_is_ignored() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), "a.go", "A");
            let before = hash_dir(tmp.path()).unwrap();
            write(tmp.path(), SUM_FILENAME, "x h1:0\n");
            assert_eq!(before, hash_dir(tmp.path()).unwrap());
        }

        #[test]
        fn missing_dir_is_an_error() {
            let tmp = TempDir::new().unwrap();
            assert!(hash_dir(&tmp.path().join("nope")).is_err());
        }
    }

    mod persistence_tests {
        use super::*;

        #[test]
        fn save_then_load_round_trips() {
            let tmp = TempDir::new().unwrap();
            let sum = Sum::new(tmp.path());
            sum.insert("p2", "h2");
            sum.insert("p1", "h1");
            sum.save().unwrap();

            let content = fs::read_to_string(tmp.path().join(SUM_FILENAME)).unwrap();
            assert_eq!(content, "p1 h1\np2 h2\n");

            let module = ModuleInfo::new("example.com/m").with_dir(tmp.path());
            let loaded = Sum::load(Some(&module)).unwrap();
            assert_eq!(loaded.hash("p1").as_deref(), Some("h1"));
            assert_eq!(loaded.hash("p2").as_deref(), Some("h2"));
            assert_eq!(loaded.hash("p3"), None);
            assert_eq!(loaded.dir(), tmp.path());
        }

        #[test]
        fn save_overwrites_previous_file() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), SUM_FILENAME, "old h0\nstale h9\n");
            let sum = Sum::new(tmp.path());
            sum.insert("new", "h1");
            sum.save().unwrap();
            let content = fs::read_to_string(tmp.path().join(SUM_FILENAME)).unwrap();
            assert_eq!(content, "new h1\n");
        }

        #[test]
        fn malformed_lines_are_skipped() {
            let tmp = TempDir::new().unwrap();
            write(
                tmp.path(),
                SUM_FILENAME,
                "good h1\n\nonly-one-field\nthree fields here\n  spaced   h2  \n",
            );
            let module = ModuleInfo::new("m").with_dir(tmp.path());
            let loaded = Sum::load(Some(&module)).unwrap();
            assert_eq!(loaded.paths(), ["good", "spaced"]);
            assert_eq!(loaded.hash("spaced").as_deref(), Some("h2"));
        }

        #[test]
        fn absent_cache_loads_as_none() {
            assert!(Sum::load(None).is_none());
            assert!(Sum::load(Some(&ModuleInfo::new("m"))).is_none());

            let tmp = TempDir::new().unwrap();
            let module = ModuleInfo::new("m").with_dir(tmp.path());
            assert!(Sum::load(Some(&module)).is_none());
        }

        #[test]
        fn save_into_missing_dir_fails() {
            let tmp = TempDir::new().unwrap();
            let sum = Sum::new(tmp.path().join("gone"));
            sum.insert("p", "h");
            let err = sum.save().unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
        }

        #[cfg(unix)]
        #[test]
        fn save_propagates_permission_denied() {
            use std::os::unix::fs::PermissionsExt;

            let tmp = TempDir::new().unwrap();
            let locked = tmp.path().join("locked");
            fs::create_dir(&locked).unwrap();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

            // root ignores directory permissions
            if fs::write(locked.join("writable"), "x").is_ok() {
                return;
            }

            let sum = Sum::new(&locked);
            sum.insert("p", "h");
            let err = sum.save().unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    mod add_tests {
        use super::*;

        #[test]
        fn add_hashes_once() {
            let tmp = TempDir::new().unwrap();
            write(tmp.path(), "a/a.go", "package a\n");
            let sum = Sum::new(tmp.path());
            sum.add("m/a", &tmp.path().join("a"));
            let first = sum.hash("m/a").unwrap();

            write(tmp.path(), "a/a.go", "package a // edited\n");
            sum.add("m/a", &tmp.path().join("a"));
            assert_eq!(sum.hash("m/a").unwrap(), first);
        }

        #[test]
        fn unhashable_package_is_left_out() {
            let tmp = TempDir::new().unwrap();
            let sum = Sum::new(tmp.path());
            sum.add("m/missing", &tmp.path().join("missing"));
            assert!(sum.hash("m/missing").is_none());
            assert!(sum.is_empty());
        }

        #[test]
        fn changed_lists_new_and_edited_packages() {
            let previous = Sum::new("/m");
            previous.insert("m/a", "h1:aa");
            previous.insert("m/b", "h1:bb");

            let current = Sum::new("/m");
            current.insert("m/a", "h1:aa");
            current.insert("m/b", "h1:b2");
            current.insert("m/c", "h1:cc");

            assert_eq!(current.changed(&previous), ["m/b", "m/c"]);
            assert!(previous.changed(&previous).is_empty());
        }
    }
}
