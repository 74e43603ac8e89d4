/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! capture metadata: what the resolver needs to know about a photo

use std::fs::File;
use std::io::{ Cursor, Read };
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{ Exif, In, Tag, Value };

use crate::error::MetadataError;

/// exif segments live near the start of the file, no need to read it all
const HEADER_PREFIX: u64 = 256 * 1024;

const EXIF_DATETIME: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// DateTimeOriginal
    pub original: Option<NaiveDateTime>,
    /// DateTime of the primary image, used when there is no original
    pub modified: Option<NaiveDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
}

impl Metadata {
    pub fn taken(&self) -> Option<NaiveDateTime>
    {
        self.original.or(self.modified)
    }
}

/// Source of capture metadata for a file.
///
/// Called from a blocking worker thread, implementations may do plain
/// synchronous I/O.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Metadata, MetadataError>;
}

impl<F> MetadataReader for F
where
    F: Fn(&Path) -> Result<Metadata, MetadataError> + Send + Sync,
{
    fn read(&self, path: &Path) -> Result<Metadata, MetadataError>
    {
        self(path)
    }
}

/// Reads exif tags out of the file header with kamadak-exif
#[derive(Clone, Copy, Debug, Default)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> Result<Metadata, MetadataError>
    {
        let mut header = Vec::new();
        File::open(path)?.take(HEADER_PREFIX).read_to_end(&mut header)?;

        let exif = exif::Reader::new().read_from_container(&mut Cursor::new(header))?;
        Ok(Metadata {
            original: timestamp(&exif, Tag::DateTimeOriginal),
            modified: timestamp(&exif, Tag::DateTime),
            make: ascii(&exif, Tag::Make),
            model: ascii(&exif, Tag::Model),
        })
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String>
{
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => {
            let raw = parts.first()?;
            let text = String::from_utf8_lossy(raw);
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        },
        _ => None,
    }
}

/// cameras with an unset clock write all zeroes, which fails to parse and
/// counts as absent
fn timestamp(exif: &Exif, tag: Tag) -> Option<NaiveDateTime>
{
    let text = ascii(exif, tag)?;
    NaiveDateTime::parse_from_str(&text, EXIF_DATETIME).ok()
}
