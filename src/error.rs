/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! Error types for the import pipeline.
//!
//! Per-file conditions (`ImportError`) end up inside events; only
//! `WalkError` stops a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Recoverable business conditions that may be routed to a bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Problem {
    NotPhoto,
    BadMetadata,
}

/// Failures of the metadata reader, or metadata missing required fields
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read header: {0}")]
    Read(#[from] io::Error),
    #[error("cannot decode exif: {0}")]
    Decode(#[from] exif::Error),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("metadata worker stopped: {0}")]
    Worker(String),
}

/// Everything that can go wrong with one file
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("not a photo")]
    NotPhoto,
    #[error("bad exif ({0})")]
    BadMetadata(MetadataError),
    #[error("cannot {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("{} is its own destination", path.display())]
    SameFile { path: PathBuf },
}

impl ImportError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self
    {
        ImportError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// the bucketable condition behind this error, if any
    pub fn problem(&self) -> Option<Problem>
    {
        match self {
            ImportError::NotPhoto => Some(Problem::NotPhoto),
            ImportError::BadMetadata(_) => Some(Problem::BadMetadata),
            ImportError::Io { .. } | ImportError::SameFile { .. } => None,
        }
    }
}

impl From<MetadataError> for ImportError {
    fn from(err: MetadataError) -> Self
    {
        ImportError::BadMetadata(err)
    }
}

/// Errors that abort the whole walk
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot list directory {}: {source}", path.display())]
    List { path: PathBuf, source: io::Error },
    #[error("cannot stat {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },
    #[error("invalid exclude pattern {pattern:?}: {source}")]
    Exclude {
        pattern: String,
        source: ignore::Error,
    },
}
