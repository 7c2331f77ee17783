use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use walkdir::WalkDir;

const SOUND_PREFIX: &str = "sound/";

/// Canonical form of a resource path: forward slashes, lowercase, no
/// repeated or leading separators.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch.to_ascii_lowercase() };
        if ch == '/' && (normalized.is_empty() || normalized.ends_with('/')) {
            continue;
        }
        normalized.push(ch);
    }
    normalized
}

pub fn path_equal(a: &str, b: &str) -> bool {
    normalize_path(a) == normalize_path(b)
}

/// Replaces everything after the last `.` of the file name with `extension`.
pub fn change_extension(path: &str, extension: &str) -> String {
    let name_start = path.rfind('/').map(|index| index + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) => format!("{}{extension}", &path[..name_start + dot]),
        None => format!("{path}{extension}"),
    }
}

pub trait Vfs {
    /// `path` must already be normalized.
    fn exists(&self, path: &str) -> bool;
}

/// Index of the files below one or more data directories.
#[derive(Debug, Default)]
pub struct DirectoryVfs {
    files: BTreeSet<String>,
}

impl DirectoryVfs {
    pub fn from_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Self> {
        let mut files = BTreeSet::new();
        for root in roots {
            let root = root.as_ref();
            let mut count = 0usize;
            for entry in WalkDir::new(root) {
                let entry =
                    entry.with_context(|| format!("scanning data directory {}", root.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .with_context(|| format!("resolving {}", entry.path().display()))?;
                files.insert(normalize_path(&relative.to_string_lossy()));
                count += 1;
            }
            debug!("indexed {count} files under {}", root.display());
        }
        Ok(DirectoryVfs { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Vfs for DirectoryVfs {
    fn exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }
}

/// Resolves a sound reference from a content file to its resource path.
///
/// References are relative to the `sound` directory. Some shipped sounds
/// were converted to mp3 while the records still name the `.wav`; when a
/// VFS is available the mp3 is used if only it exists.
pub fn correct_sound_path(path: &str, vfs: Option<&dyn Vfs>) -> String {
    let mut resolved = normalize_path(path);
    if !resolved.starts_with(SOUND_PREFIX) {
        resolved.insert_str(0, SOUND_PREFIX);
    }
    if let Some(vfs) = vfs {
        if !vfs.exists(&resolved) {
            let mp3 = change_extension(&resolved, ".mp3");
            if vfs.exists(&mp3) {
                return mp3;
            }
        }
    }
    resolved
}
