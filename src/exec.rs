/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{ AsyncWriteExt, BufReader };
use tracing::{ debug, warn };

use crate::actions::{ ensure_dir, Action, Planned };
use crate::error::ImportError;
use crate::events::{ Event, EventSink };

const COPY_BUFFER: usize = 256 * 1024;

/// Stream `source` into `destination`, truncating whatever was there.
/// Returns the number of bytes written.
pub async fn copy_file(source: &Path, destination: &Path) -> Result<u64, ImportError>
{
    let src = File::open(source).await
        .map_err(|e| ImportError::io("open", source, e))?;
    let mut reader = BufReader::with_capacity(COPY_BUFFER, src);
    let mut writer = File::create(destination).await
        .map_err(|e| ImportError::io("create", destination, e))?;

    let nbytes = tokio::io::copy_buf(&mut reader, &mut writer).await
        .map_err(|e| ImportError::io("copy to", destination, e))?;
    writer.flush().await
        .map_err(|e| ImportError::io("flush", destination, e))?;
    Ok(nbytes)
}

/// Whether both paths resolve to the same existing file. Opening the
/// destination for writing would truncate the source.
async fn same_file(source: &Path, destination: &Path) -> bool
{
    match (tokio::fs::canonicalize(source).await, tokio::fs::canonicalize(destination).await) {
        (Ok(s), Ok(d)) => s == d,
        _ => false,
    }
}

/// Carries out planned actions, one event per action
pub struct Executor {
    sink: Arc<dyn EventSink>,
    dry_run: bool,
}

impl Executor {
    pub fn new(sink: Arc<dyn EventSink>, dry_run: bool) -> Executor
    {
        Executor { sink, dry_run }
    }

    pub async fn execute(&self, planned: Planned)
    {
        let Planned { source, action } = planned;
        let event = match action {
            Action::Fail(error) => Event::Failed { source, error },
            Action::Skip(destination) => Event::Skipped { source, destination },
            Action::Copy(destination) => {
                if destination.size > 0 {
                    warn!(source = %source.path.display(), destination = %destination.path.display(),
                        existing = destination.size, "overwriting a smaller file");
                }
                match self.transfer(&source.path, &destination.path, false).await {
                    Ok(()) => Event::Succeeded { source, destination },
                    Err(error) => Event::Failed { source, error },
                }
            },
            Action::Omit(destination, reason) => {
                match self.transfer(&source.path, &destination.path, true).await {
                    Ok(()) => Event::Omitted { source, destination, error: reason },
                    Err(error) => Event::Failed { source, error },
                }
            },
        };
        self.sink.emit(event);
    }

    async fn transfer(&self, source: &Path, destination: &Path, make_parent: bool) -> Result<(), ImportError>
    {
        if self.dry_run {
            return Ok(());
        }
        if make_parent {
            if let Some(parent) = destination.parent() {
                ensure_dir(parent).await?;
            }
        }
        if same_file(source, destination).await {
            return Err(ImportError::SameFile { path: source.to_path_buf() });
        }
        let nbytes = copy_file(source, destination).await?;
        debug!(source = %source.display(), destination = %destination.display(), nbytes, "copied");
        Ok(())
    }
}
