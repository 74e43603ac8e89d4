/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! Decide what to do with each source file: where it goes, and whether
//! it needs copying at all.

use std::io;
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use chrono::{ Datelike, Timelike };
use tokio::fs;
use tracing::debug;

use crate::error::{ ImportError, MetadataError, Problem };
use crate::metadata::{ Metadata, MetadataReader };
use crate::scan::Entry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    pub path: PathBuf,
    /// size of whatever is already at `path`, 0 if nothing
    pub size: u64,
}

#[derive(Debug)]
pub enum Action {
    Copy(Destination),
    Skip(Destination),
    /// recognized but unprocessable, copied into a bucket
    Omit(Destination, ImportError),
    Fail(ImportError),
}

impl Action {
    pub fn destination(&self) -> Option<&Destination>
    {
        match self {
            Action::Copy(d) | Action::Skip(d) | Action::Omit(d, _) => Some(d),
            Action::Fail(_) => None,
        }
    }

    pub fn destination_mut(&mut self) -> Option<&mut Destination>
    {
        match self {
            Action::Copy(d) | Action::Skip(d) | Action::Omit(d, _) => Some(d),
            Action::Fail(_) => None,
        }
    }
}

/// One source file and the decision made for it
#[derive(Debug)]
pub struct Planned {
    pub source: Entry,
    pub action: Action,
}

/// Where a bucketable problem ends up
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Bucket(PathBuf),
    Fail,
}

/// Problem to route table, fixed at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub not_photo: Route,
    pub bad_metadata: Route,
}

impl Routes {
    pub fn strict() -> Routes
    {
        Routes {
            not_photo: Route::Fail,
            bad_metadata: Route::Fail,
        }
    }

    pub fn route(&self, problem: Problem) -> &Route
    {
        match problem {
            Problem::NotPhoto => &self.not_photo,
            Problem::BadMetadata => &self.bad_metadata,
        }
    }

    /// bucket directories in use
    pub fn buckets(&self) -> Vec<&Path>
    {
        [&self.not_photo, &self.bad_metadata]
            .iter()
            .copied()
            .filter_map(|r| match r {
                Route::Bucket(dir) => Some(dir.as_path()),
                Route::Fail => None,
            })
            .collect()
    }
}

pub fn is_photo(path: &Path) -> bool
{
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg"))
        .unwrap_or(false)
}

/// Camera identifier from make and model: whitespace separated tokens,
/// sanitized, first occurrence of each kept, joined with '-'
pub fn camera_name(make: &str, model: &str) -> String
{
    let mut tokens: Vec<String> = Vec::new();
    for tok in make.split_whitespace().chain(model.split_whitespace()) {
        let clean: String = tok.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if !clean.is_empty() && !tokens.contains(&clean) {
            tokens.push(clean);
        }
    }
    tokens.join("-")
}

/// `{output}/{year}/{month}-{day}/{hour}-{minute}-{second}-{camera}.jpg`
pub fn destination_path(output: &Path, md: &Metadata) -> Result<PathBuf, MetadataError>
{
    let taken = md.taken().ok_or(MetadataError::Missing("timestamp"))?;
    let make = md.make.as_deref().ok_or(MetadataError::Missing("make"))?;
    let model = md.model.as_deref().ok_or(MetadataError::Missing("model"))?;
    let camera = camera_name(make, model);
    if camera.is_empty() {
        return Err(MetadataError::Missing("camera name"));
    }

    let mut pdst = PathBuf::from(output);
    pdst.push(format!("{:04}", taken.year()));
    pdst.push(format!("{:02}-{:02}", taken.month(), taken.day()));
    pdst.push(format!("{:02}-{:02}-{:02}-{}.jpg",
        taken.hour(), taken.minute(), taken.second(), camera));
    Ok(pdst)
}

/// create a directory and its parents, fine if someone else got there first
pub async fn ensure_dir(dir: &Path) -> Result<(), ImportError>
{
    match fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(ImportError::io("create directory", dir, e)),
    }
}

async fn existing_size(path: &Path) -> Result<u64, ImportError>
{
    match fs::metadata(path).await {
        Ok(md) => Ok(md.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(ImportError::io("stat", path, e)),
    }
}

/// already-copied heuristic: a destination at least as large as the
/// source is taken to be a complete earlier copy
fn decide(source: &Entry, destination: Destination) -> Action
{
    if source.size > destination.size {
        Action::Copy(destination)
    } else {
        Action::Skip(destination)
    }
}

/// The destination resolver
pub struct Planner {
    output: PathBuf,
    routes: Routes,
    reader: Arc<dyn MetadataReader>,
    dry_run: bool,
}

impl Planner {
    pub fn new(output: PathBuf, routes: Routes, reader: Arc<dyn MetadataReader>, dry_run: bool) -> Planner
    {
        Planner { output, routes, reader, dry_run }
    }

    pub async fn plan(&self, source: Entry) -> Planned
    {
        let action = match self.locate(&source).await {
            Ok(dst) => decide(&source, dst),
            Err(err) => self.reroute(&source, err),
        };
        debug!(source = %source.path.display(), ?action, "planned");
        Planned { source, action }
    }

    /// After a rename the size check has to be redone against the new path
    pub async fn refresh(&self, planned: Planned) -> Planned
    {
        let Planned { source, action } = planned;
        let action = match action {
            Action::Copy(dst) | Action::Skip(dst) => {
                match existing_size(&dst.path).await {
                    Ok(size) => decide(&source, Destination { path: dst.path, size }),
                    Err(err) => Action::Fail(err),
                }
            },
            other => other,
        };
        Planned { source, action }
    }

    async fn locate(&self, source: &Entry) -> Result<Destination, ImportError>
    {
        if !is_photo(&source.path) {
            return Err(ImportError::NotPhoto);
        }

        let md = self.read_metadata(&source.path).await?;
        let path = destination_path(&self.output, &md)?;

        if !self.dry_run {
            if let Some(parent) = path.parent() {
                ensure_dir(parent).await?;
            }
        }
        let size = existing_size(&path).await?;
        Ok(Destination { path, size })
    }

    async fn read_metadata(&self, path: &Path) -> Result<Metadata, MetadataError>
    {
        let reader = Arc::clone(&self.reader);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || reader.read(&path))
            .await
            .map_err(|e| MetadataError::Worker(e.to_string()))?
    }

    fn reroute(&self, source: &Entry, err: ImportError) -> Action
    {
        let route = err.problem().map(|p| self.routes.route(p));
        match (route, source.path.file_name()) {
            (Some(Route::Bucket(dir)), Some(name)) => {
                let dst = Destination { path: dir.join(name), size: 0 };
                Action::Omit(dst, err)
            },
            _ => Action::Fail(err),
        }
    }
}


#[cfg(test)]
pub mod test {
    use super::*;
    use crate::scan::EntryKind;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use tempfile::TempDir;

    pub fn acme(stamp: &str) -> Metadata
    {
        Metadata {
            original: Some(NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap()),
            modified: None,
            make: Some("Acme".to_string()),
            model: Some("X100".to_string()),
        }
    }

    /// a reader that reports the same metadata for every file
    pub fn fixed(md: Metadata) -> Arc<dyn MetadataReader>
    {
        Arc::new(move |_: &Path| -> Result<Metadata, MetadataError> { Ok(md.clone()) })
    }

    fn entry(path: PathBuf, size: u64) -> Entry
    {
        Entry { path, kind: EntryKind::File, size }
    }

    fn buckets(root: &Path) -> Routes
    {
        Routes {
            not_photo: Route::Bucket(root.join("other")),
            bad_metadata: Route::Bucket(root.join("no-exif")),
        }
    }

    #[test]
    fn t_camera_name() {
        assert_eq!(camera_name("Acme", "X100"), "Acme-X100");
        assert_eq!(camera_name("Canon", "Canon EOS 5D"), "Canon-EOS-5D");
        assert_eq!(camera_name("  NIKON CORPORATION ", "NIKON D750"), "NIKON-CORPORATION-D750");
        assert_eq!(camera_name("Acme, Inc.", "Model/2"), "Acme-Inc-Model2");
        assert_eq!(camera_name("&&", "!!"), "");
    }

    #[test]
    fn t_destination_path() {
        let out = Path::new("/out");
        let md = acme("2020-05-01 10:20:30");
        let p = destination_path(out, &md).unwrap();
        assert_eq!(p, Path::new("/out/2020/05-01/10-20-30-Acme-X100.jpg"));
        // pure function of its inputs
        assert_eq!(destination_path(out, &md.clone()).unwrap(), p);

        // modified only
        let mut md2 = md.clone();
        md2.modified = md2.original.take();
        assert_eq!(destination_path(out, &md2).unwrap(), p);
    }

    #[test]
    fn t_destination_needs_all_fields() {
        let out = Path::new("/out");
        let full = acme("2020-05-01 10:20:30");

        let mut md = full.clone();
        md.original = None;
        assert!(matches!(destination_path(out, &md), Err(MetadataError::Missing("timestamp"))));

        let mut md = full.clone();
        md.make = None;
        assert!(matches!(destination_path(out, &md), Err(MetadataError::Missing("make"))));

        let mut md = full.clone();
        md.model = None;
        assert!(matches!(destination_path(out, &md), Err(MetadataError::Missing("model"))));
    }

    #[test]
    fn t_is_photo() {
        assert!(is_photo(Path::new("a/b.jpg")));
        assert!(is_photo(Path::new("a/b.JPG")));
        assert!(is_photo(Path::new("a/b.Jpg")));
        assert!(!is_photo(Path::new("a/b.txt")));
        assert!(!is_photo(Path::new("a/jpg")));
        assert!(!is_photo(Path::new("a/b.jpg.txt")));
    }

    #[tokio::test]
    async fn t_plan_copy_then_skip() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let src = dir.path().join("a.jpg");
        std::fs::write(&src, b"0123456789").unwrap();

        let reader = fixed(acme("2020-05-01 10:20:30"));
        let planner = Planner::new(out.clone(), Routes::strict(), reader, false);

        let planned = planner.plan(entry(src.clone(), 10)).await;
        let expect = out.join("2020/05-01/10-20-30-Acme-X100.jpg");
        match planned.action {
            Action::Copy(ref d) => {
                assert_eq!(d.path, expect);
                assert_eq!(d.size, 0);
            },
            ref other => panic!("expected copy, got {:?}", other),
        }
        // parent directory was prepared
        assert!(expect.parent().unwrap().is_dir());

        // partial copy gets re-attempted
        std::fs::write(&expect, b"01234").unwrap();
        let planned = planner.plan(entry(src.clone(), 10)).await;
        assert!(matches!(planned.action, Action::Copy(Destination { size: 5, .. })));

        std::fs::write(&expect, b"0123456789").unwrap();
        let planned = planner.plan(entry(src, 10)).await;
        assert!(matches!(planned.action, Action::Skip(Destination { size: 10, .. })));
    }

    #[tokio::test]
    async fn t_not_photo_skips_reader() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let reader: Arc<dyn MetadataReader> = Arc::new(move |_: &Path| -> Result<Metadata, MetadataError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(acme("2020-05-01 10:20:30"))
        });

        let planner = Planner::new(dir.path().join("out"), buckets(dir.path()), reader.clone(), false);
        let planned = planner.plan(entry(dir.path().join("b.txt"), 3)).await;
        match planned.action {
            Action::Omit(ref d, ImportError::NotPhoto) => {
                assert_eq!(d.path, dir.path().join("other/b.txt"));
            },
            ref other => panic!("expected omit, got {:?}", other),
        }

        let planner = Planner::new(dir.path().join("out"), Routes::strict(), reader, false);
        let planned = planner.plan(entry(dir.path().join("b.txt"), 3)).await;
        assert!(matches!(planned.action, Action::Fail(ImportError::NotPhoto)));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn t_bad_metadata_never_copies() {
        let dir = TempDir::new().unwrap();
        let partials = vec![
            Metadata { original: None, ..acme("2020-05-01 10:20:30") },
            Metadata { make: None, ..acme("2020-05-01 10:20:30") },
            Metadata { model: None, ..acme("2020-05-01 10:20:30") },
        ];
        for md in partials {
            let reader = fixed(md);

            let planner = Planner::new(dir.path().join("out"), buckets(dir.path()), reader.clone(), false);
            let planned = planner.plan(entry(dir.path().join("x.jpg"), 3)).await;
            match planned.action {
                Action::Omit(ref d, ImportError::BadMetadata(_)) => {
                    assert_eq!(d.path, dir.path().join("no-exif/x.jpg"));
                },
                ref other => panic!("expected omit, got {:?}", other),
            }

            let planner = Planner::new(dir.path().join("out"), Routes::strict(), reader, false);
            let planned = planner.plan(entry(dir.path().join("x.jpg"), 3)).await;
            assert!(matches!(planned.action, Action::Fail(ImportError::BadMetadata(_))));
        }
        // nothing was created for them in the date tree
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn t_reader_error_is_bad_metadata() {
        let dir = TempDir::new().unwrap();
        let reader: Arc<dyn MetadataReader> =
            Arc::new(|_: &Path| -> Result<Metadata, MetadataError> { Err(MetadataError::Missing("exif segment")) });
        let planner = Planner::new(dir.path().join("out"), Routes::strict(), reader, false);
        let planned = planner.plan(entry(dir.path().join("x.JPG"), 3)).await;
        assert!(matches!(planned.action, Action::Fail(ImportError::BadMetadata(_))));
    }

    #[tokio::test]
    async fn t_dry_run_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let reader = fixed(acme("2020-05-01 10:20:30"));
        let planner = Planner::new(dir.path().join("out"), Routes::strict(), reader, true);
        let planned = planner.plan(entry(dir.path().join("a.jpg"), 3)).await;
        assert!(matches!(planned.action, Action::Copy(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn t_refresh_renamed() {
        let dir = TempDir::new().unwrap();
        let reader = fixed(acme("2020-05-01 10:20:30"));
        let planner = Planner::new(dir.path().join("out"), Routes::strict(), reader, false);

        let renamed = dir.path().join("x__1.jpg");
        std::fs::write(&renamed, b"abc").unwrap();
        let planned = Planned {
            source: entry(dir.path().join("a.jpg"), 3),
            action: Action::Copy(Destination { path: renamed.clone(), size: 0 }),
        };
        let planned = planner.refresh(planned).await;
        assert!(matches!(planned.action, Action::Skip(Destination { size: 3, .. })));
    }
}
