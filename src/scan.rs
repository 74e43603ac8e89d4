/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

use std::io;
use std::path::{ Path, PathBuf };

use ignore::gitignore::{ Gitignore, GitignoreBuilder };
use tokio::fs;

use crate::error::WalkError;

/// patterns excluded on every walk, in gitignore syntax
pub const DEFAULT_EXCLUDES: &[&str] = &[".DS_Store", "Thumbs.db", ".git/"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

/// A classified directory entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

impl Entry {
    pub fn is_dir(&self) -> bool
    {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool
    {
        self.kind == EntryKind::File
    }
}

/// Errors from stat that mean "this entry went away or is not ours to
/// read": the entry is dropped instead of failing the walk
fn is_transient(err: &io::Error) -> bool
{
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => true,
        _ => is_symlink_loop(err),
    }
}

#[cfg(unix)]
fn is_symlink_loop(err: &io::Error) -> bool
{
    err.raw_os_error() == Some(nix::errno::Errno::ELOOP as i32)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &io::Error) -> bool
{
    false
}

/// stat a path (following symlinks) and classify it
pub async fn classify(path: PathBuf) -> io::Result<Option<Entry>>
{
    let md = match fs::metadata(&path).await {
        Ok(md) => md,
        Err(e) if is_transient(&e) => return Ok(None),
        Err(e) => return Err(e),
    };
    let kind = if md.is_dir() {
        EntryKind::Directory
    } else if md.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    Ok(Some(Entry { path, kind, size: md.len() }))
}

/// List the paths inside a directory, sorted so batches are processed
/// in a stable order
pub async fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>>
{
    let mut rd = fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(ent) = rd.next_entry().await? {
        paths.push(ent.path());
    }
    paths.sort();
    Ok(paths)
}

/// whether a listing failure below the root can be treated as an empty
/// directory
pub fn is_skippable_listing(err: &io::Error) -> bool
{
    matches!(err.kind(), io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound)
}

/// Build the exclude matcher rooted at the scan directory
pub fn build_excludes<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Gitignore, WalkError>
{
    let mut builder = GitignoreBuilder::new(root);
    for pat in DEFAULT_EXCLUDES.iter().copied().chain(patterns.iter().map(|p| p.as_ref())) {
        builder.add_line(None, pat).map_err(|source| WalkError::Exclude {
            pattern: pat.to_string(),
            source,
        })?;
    }
    builder.build().map_err(|source| WalkError::Exclude {
        pattern: String::new(),
        source,
    })
}
