/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

//! Keep destination names unique inside one directory batch. Two copies
//! racing onto the same path would leave one of them corrupt.

use std::borrow::Cow;
use std::collections::{ HashMap, HashSet };
use std::path::{ Path, PathBuf };

use crate::actions::Planned;

/// `dir/name.ext` -> `dir/name__{n}.ext`
fn suffixed(path: &Path, n: u32) -> PathBuf
{
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}__{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}__{}", stem, n),
    };
    path.with_file_name(name)
}

/// Resolve collisions in an ordered list of destination paths.
///
/// The first occurrence of a path keeps it; every later occurrence gets
/// the next free `__n` suffix. When nothing collides the input comes back
/// borrowed.
pub fn unique_paths(paths: &[PathBuf]) -> Cow<'_, [PathBuf]>
{
    let distinct: HashSet<&PathBuf> = paths.iter().collect();
    if distinct.len() == paths.len() {
        return Cow::Borrowed(paths);
    }

    // every name in use, so a suffix never lands on another file's path
    let mut taken: HashSet<PathBuf> = paths.iter().cloned().collect();
    let mut seen: HashSet<&PathBuf> = HashSet::new();
    let mut next: HashMap<&PathBuf, u32> = HashMap::new();

    let out = paths.iter().map(|p| {
        if seen.insert(p) {
            return p.clone();
        }
        let n = next.entry(p).or_insert(1);
        loop {
            let candidate = suffixed(p, *n);
            *n += 1;
            if taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }).collect();
    Cow::Owned(out)
}

/// Apply `unique_paths` to a batch. Returns the batch and the indices of
/// the entries whose destination was renamed.
pub fn deduplicate(mut batch: Vec<Planned>) -> (Vec<Planned>, Vec<usize>)
{
    let (index, paths): (Vec<usize>, Vec<PathBuf>) = batch.iter()
        .enumerate()
        .filter_map(|(i, p)| p.action.destination().map(|d| (i, d.path.clone())))
        .unzip();

    let unique = match unique_paths(&paths) {
        Cow::Borrowed(_) => return (batch, Vec::new()),
        Cow::Owned(v) => v,
    };

    let mut renamed = Vec::new();
    for ((i, old), new) in index.into_iter().zip(paths.iter()).zip(unique) {
        if *old == new {
            continue;
        }
        if let Some(dst) = batch[i].action.destination_mut() {
            dst.path = new;
            dst.size = 0;
            renamed.push(i);
        }
    }
    (batch, renamed)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::actions::{ Action, Destination };
    use crate::error::ImportError;
    use crate::scan::{ Entry, EntryKind };

    fn pb(s: &str) -> PathBuf
    {
        PathBuf::from(s)
    }

    #[test]
    fn t_unique_passthrough() {
        let paths = vec![pb("/o/a.jpg"), pb("/o/b.jpg"), pb("/o/c.jpg")];
        let out = unique_paths(&paths);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, &paths[..]);

        assert!(matches!(unique_paths(&[]), Cow::Borrowed(_)));
    }

    #[test]
    fn t_suffixes() {
        let paths = vec![
            pb("/o/x.jpg"), pb("/o/y.jpg"), pb("/o/x.jpg"), pb("/o/x.jpg"), pb("/o/y.jpg"),
        ];
        let out = unique_paths(&paths).into_owned();
        assert_eq!(out, vec![
            pb("/o/x.jpg"), pb("/o/y.jpg"), pb("/o/x__1.jpg"), pb("/o/x__2.jpg"), pb("/o/y__1.jpg"),
        ]);
    }

    #[test]
    fn t_m_collisions() {
        let m = 7;
        let paths = vec![pb("/o/2020/05-01/10-20-30-Acme-X100.jpg"); m];
        let out = unique_paths(&paths).into_owned();

        assert_eq!(out[0], paths[0]);
        let distinct: HashSet<&PathBuf> = out.iter().collect();
        assert_eq!(distinct.len(), m);
        for (k, p) in out.iter().enumerate().skip(1) {
            let expect = format!("/o/2020/05-01/10-20-30-Acme-X100__{}.jpg", k);
            assert_eq!(p, &pb(&expect));
        }
    }

    #[test]
    fn t_suffix_avoids_existing_names() {
        let paths = vec![pb("/o/x.jpg"), pb("/o/x__1.jpg"), pb("/o/x.jpg")];
        let out = unique_paths(&paths).into_owned();
        assert_eq!(out, vec![pb("/o/x.jpg"), pb("/o/x__1.jpg"), pb("/o/x__2.jpg")]);
    }

    #[test]
    fn t_no_extension() {
        assert_eq!(suffixed(Path::new("/o/README"), 3), pb("/o/README__3"));
    }

    fn planned(src: &str, action: Action) -> Planned
    {
        Planned {
            source: Entry { path: pb(src), kind: EntryKind::File, size: 1 },
            action,
        }
    }

    #[test]
    fn t_deduplicate_batch() {
        let dst = |p: &str, size| Destination { path: pb(p), size };
        let batch = vec![
            planned("/i/a.jpg", Action::Skip(dst("/o/x.jpg", 9))),
            planned("/i/b.txt", Action::Fail(ImportError::NotPhoto)),
            planned("/i/c.jpg", Action::Skip(dst("/o/x.jpg", 9))),
            planned("/i/d.jpg", Action::Copy(dst("/o/z.jpg", 0))),
        ];
        let (batch, renamed) = deduplicate(batch);
        assert_eq!(renamed, vec![2]);
        assert_eq!(batch[0].action.destination(), Some(&dst("/o/x.jpg", 9)));
        assert!(batch[1].action.destination().is_none());
        assert_eq!(batch[2].action.destination(), Some(&dst("/o/x__1.jpg", 0)));
        assert_eq!(batch[3].action.destination(), Some(&dst("/o/z.jpg", 0)));
    }

    #[test]
    fn t_deduplicate_unique_batch() {
        let batch = vec![
            planned("/i/a.jpg", Action::Copy(Destination { path: pb("/o/a.jpg"), size: 0 })),
            planned("/i/b.jpg", Action::Copy(Destination { path: pb("/o/b.jpg"), size: 0 })),
        ];
        let (batch, renamed) = deduplicate(batch);
        assert!(renamed.is_empty());
        assert_eq!(batch.len(), 2);
    }
}
