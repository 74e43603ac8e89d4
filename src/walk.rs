/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! The directory walker.
//!
//! Work inside one directory runs with bounded concurrency; directories
//! are visited one at a time, depth first, so the amount of work in
//! flight does not grow with the fan-out of the tree.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use futures::stream::{ self, StreamExt };
use ignore::gitignore::Gitignore;
use tracing::{ debug, info, warn };

use crate::actions::{ Planned, Planner };
use crate::dedup::deduplicate;
use crate::error::WalkError;
use crate::events::EventSink;
use crate::exec::Executor;
use crate::metadata::MetadataReader;
use crate::options::Options;
use crate::scan::{ self, Entry };

pub struct Importer {
    input: PathBuf,
    jobs: usize,
    excludes: Gitignore,
    /// output and bucket roots, never walked
    fenced: Vec<PathBuf>,
    planner: Planner,
    executor: Executor,
}

impl Importer {
    pub fn new(opts: &Options, reader: Arc<dyn MetadataReader>, sink: Arc<dyn EventSink>) -> Result<Importer, WalkError>
    {
        let routes = opts.routes();
        let excludes = scan::build_excludes(&opts.in_dir, &opts.exclude)?;

        let fenced: Vec<PathBuf> = std::iter::once(opts.out_dir.as_path())
            .chain(routes.buckets())
            .map(Path::to_path_buf)
            .collect();

        Ok(Importer {
            input: opts.in_dir.clone(),
            jobs: opts.jobs.max(1),
            excludes,
            fenced,
            planner: Planner::new(opts.out_dir.clone(), routes, reader, opts.dry_run),
            executor: Executor::new(sink, opts.dry_run),
        })
    }

    /// Walk the whole input tree. Per-file problems become events; the
    /// error return is reserved for failures that stop the run.
    pub async fn run(&self) -> Result<(), WalkError>
    {
        info!(input = %self.input.display(), jobs = self.jobs, "import started");

        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending = vec![self.input.clone()];
        let mut is_root = true;

        while let Some(dir) = pending.pop() {
            let key = tokio::fs::canonicalize(&dir).await.unwrap_or_else(|_| dir.clone());
            if !visited.insert(key) {
                debug!(dir = %dir.display(), "already visited");
                continue;
            }

            let paths = match scan::list_dir(&dir).await {
                Ok(paths) => paths,
                Err(e) if !is_root && scan::is_skippable_listing(&e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot list directory, skipped");
                    Vec::new()
                },
                Err(source) => return Err(WalkError::List { path: dir, source }),
            };
            is_root = false;

            let subdirs = self.process(&dir, paths).await?;
            // reversed so the first subdirectory is the next one popped
            pending.extend(subdirs.into_iter().rev());
        }

        info!(directories = visited.len(), "import finished");
        Ok(())
    }

    /// Handle every file of one directory listing, returning the
    /// subdirectories still to visit
    async fn process(&self, dir: &Path, paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, WalkError>
    {
        let classified: Vec<Result<Option<Entry>, WalkError>> = stream::iter(paths)
            .map(|path| async move {
                let stat_path = path.clone();
                scan::classify(path).await
                    .map_err(|source| WalkError::Stat { path: stat_path, source })
            })
            .buffered(self.jobs)
            .collect()
            .await;

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in classified {
            let entry = match entry? {
                Some(entry) => entry,
                None => continue,
            };
            if self.excludes.matched(&entry.path, entry.is_dir()).is_ignore() {
                debug!(path = %entry.path.display(), "excluded");
                continue;
            }
            if entry.is_dir() {
                if self.is_fenced(&entry.path).await {
                    debug!(path = %entry.path.display(), "output directory, not scanned");
                } else {
                    dirs.push(entry.path);
                }
            } else if entry.is_file() {
                files.push(entry);
            }
        }
        info!(dir = %dir.display(), files = files.len(), subdirs = dirs.len(), "scanning");

        // order matters for deduplication, first come keeps its name
        let batch: Vec<Planned> = stream::iter(files)
            .map(|file| self.planner.plan(file))
            .buffered(self.jobs)
            .collect()
            .await;

        let (mut batch, renamed) = deduplicate(batch);
        for i in renamed.into_iter().rev() {
            let planned = batch.swap_remove(i);
            batch.push(self.planner.refresh(planned).await);
        }

        stream::iter(batch)
            .for_each_concurrent(self.jobs, |planned| self.executor.execute(planned))
            .await;

        Ok(dirs)
    }

    /// Whether `dir` is the output root or a bucket, however either was
    /// spelled. Roots are resolved on every check since the run itself
    /// may create them.
    async fn is_fenced(&self, dir: &Path) -> bool
    {
        let dir = match tokio::fs::canonicalize(dir).await {
            Ok(dir) => dir,
            Err(_) => return false,
        };
        for root in self.fenced.iter() {
            if let Ok(root) = tokio::fs::canonicalize(root).await {
                if root == dir {
                    return true;
                }
            }
        }
        false
    }
}
