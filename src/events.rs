/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! Per-file outcomes, and the reporter that prints them.

use std::fmt;

use tokio::sync::mpsc;
use tracing::warn;

use crate::actions::Destination;
use crate::error::ImportError;
use crate::scan::Entry;

/// Terminal outcome for one source file
#[derive(Debug)]
pub enum Event {
    /// destination already current
    Skipped { source: Entry, destination: Destination },
    /// routed to a bucket
    Omitted { source: Entry, destination: Destination, error: ImportError },
    Failed { source: Entry, error: ImportError },
    Succeeded { source: Entry, destination: Destination },
}

impl Event {
    pub fn source(&self) -> &Entry
    {
        match self {
            Event::Skipped { source, .. }
            | Event::Omitted { source, .. }
            | Event::Failed { source, .. }
            | Event::Succeeded { source, .. } => source,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Event::Skipped { source, destination } => write!(f,
                "skipped {} -> {} ({} -> {})",
                source.path.display(), destination.path.display(), source.size, destination.size),
            Event::Omitted { source, destination, error } => write!(f,
                "copied {} -> {} ({})",
                source.path.display(), destination.path.display(), error),
            Event::Failed { source, error } => write!(f,
                "failed to copy {} due to {}", source.path.display(), error),
            Event::Succeeded { source, destination } => write!(f,
                "copied {} -> {}", source.path.display(), destination.path.display()),
        }
    }
}

/// Receives one event per processed file
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl EventSink for mpsc::UnboundedSender<Event> {
    fn emit(&self, event: Event)
    {
        if let Err(e) = self.send(event) {
            warn!(event = %e.0, "event dropped, reporter is gone");
        }
    }
}

/// Totals for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub skipped: usize,
    pub omitted: usize,
    pub failed: usize,
    pub succeeded: usize,
    /// bytes of successful and omitted copies
    pub bytes: u64,
    /// nothing was written, `bytes` is what a real run would copy
    pub dry_run: bool,
}

impl Summary {
    pub fn record(&mut self, event: &Event)
    {
        match event {
            Event::Skipped { .. } => self.skipped += 1,
            Event::Omitted { .. } => self.omitted += 1,
            Event::Failed { .. } => self.failed += 1,
            Event::Succeeded { .. } => self.succeeded += 1,
        }
        if let Event::Omitted { .. } | Event::Succeeded { .. } = event {
            self.bytes += event.source().size;
        }
    }

    pub fn total(&self) -> usize
    {
        self.skipped + self.omitted + self.failed + self.succeeded
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} files: {} copied, {} skipped, {} omitted, {} failed ({} bytes{})",
            self.total(), self.succeeded, self.skipped, self.omitted, self.failed, self.bytes,
            if self.dry_run { " planned" } else { "" })
    }
}

/// Print events as they arrive until every sender is dropped
pub async fn report(mut rx: mpsc::UnboundedReceiver<Event>, dry_run: bool) -> Summary
{
    let mut summary = Summary { dry_run, ..Summary::default() };
    while let Some(event) = rx.recv().await {
        summary.record(&event);
        match event {
            Event::Failed { .. } => eprintln!("{}", event),
            _ if dry_run => println!("(dry run) {}", event),
            _ => println!("{}", event),
        }
    }
    summary
}
