/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

 //! spec and manage utility options

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ value_parser, Arg, ArgAction, ArgMatches, Command };

use crate::actions::{ Route, Routes };

/// store options selections parsed by args_to_opts()
#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
    /// bucket for photos without usable exif, default `{out_dir}/no-exif`
    pub no_exif_dir: Option<PathBuf>,
    /// bucket for anything that is not a photo, default `{out_dir}/other`
    pub other_dir: Option<PathBuf>,
    /// no buckets, unsortable files are failures
    pub strict: bool,
    pub dry_run: bool,
    /// per-directory concurrency bound
    pub jobs: usize,
    pub exclude: Vec<String>,
    pub log_level: String,
}

pub fn default_jobs() -> usize
{
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

impl Default for Options {
    fn default() -> Options
    {
        Options {
            in_dir: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            no_exif_dir: None,
            other_dir: None,
            strict: false,
            dry_run: false,
            jobs: default_jobs(),
            exclude: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Options {
    /// Build the problem routing table used for the whole run
    pub fn routes(&self) -> Routes
    {
        if self.strict {
            return Routes::strict();
        }
        let bucket = |dir: &Option<PathBuf>, name: &str| {
            Route::Bucket(dir.clone().unwrap_or_else(|| self.out_dir.join(name)))
        };
        Routes {
            not_photo: bucket(&self.other_dir, "other"),
            bad_metadata: bucket(&self.no_exif_dir, "no-exif"),
        }
    }
}

pub fn command() -> Command
{
    Command::new("picsort")
        .version(env!("CARGO_PKG_VERSION"))
        .about("picsort copies piles of photo files into a destination \n\
            directory organized by capture date and camera")
        .arg(Arg::new("dir")
            .value_name("SCAN_DIR")
            .help("directory to scan (default: current directory)")
            .value_parser(value_parser!(PathBuf))
            )
        .arg(Arg::new("outdir")
            .value_name("OUTPUT_DIR")
            .help("output directory (default: current directory)")
            .value_parser(value_parser!(PathBuf))
            )
        .arg(Arg::new("no_exif")
            .long("no-exif")
            .value_name("DIR")
            .help("where photos without usable exif go (default: OUTPUT_DIR/no-exif)")
            .value_parser(value_parser!(PathBuf))
            )
        .arg(Arg::new("other")
            .long("other")
            .value_name("DIR")
            .help("where files that are not photos go (default: OUTPUT_DIR/other)")
            .value_parser(value_parser!(PathBuf))
            )
        .arg(Arg::new("strict")
            .long("strict")
            .help("report unsortable files as failures instead of copying them to a bucket")
            .action(ArgAction::SetTrue)
            .conflicts_with_all(["no_exif", "other"])
            )
        .arg(Arg::new("dry_run")
            .short('n')
            .long("dry-run")
            .help("show what would be copied without writing anything")
            .action(ArgAction::SetTrue)
            )
        .arg(Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .help("files processed concurrently (default: twice the cpu count)")
            .value_parser(value_parser!(usize))
            )
        .arg(Arg::new("exclude")
            .short('x')
            .long("exclude")
            .value_name("PATTERN")
            .help("gitignore style pattern to leave out, may be repeated")
            .action(ArgAction::Append)
            )
        .arg(Arg::new("log_level")
            .long("log-level")
            .value_name("LEVEL")
            .help("error, warn, info, debug or trace; RUST_LOG takes precedence")
            .default_value("info")
            )
}

/// Turn parsed matches into options. Fails when neither directory is
/// given, so a bare invocation does not silently sort the current
/// directory into itself.
pub fn opts_from_matches(amats: &ArgMatches) -> Result<Options, clap::Error>
{
    let in_dir = amats.get_one::<PathBuf>("dir").cloned();
    let out_dir = amats.get_one::<PathBuf>("outdir").cloned();
    if in_dir.is_none() && out_dir.is_none() {
        return Err(command().error(
            clap::error::ErrorKind::MissingRequiredArgument,
            "neither input nor output path is specified",
        ));
    }

    let mut opts = Options::default();
    opts.in_dir = in_dir.unwrap_or_else(|| PathBuf::from("."));
    opts.out_dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
    opts.no_exif_dir = amats.get_one::<PathBuf>("no_exif").cloned();
    opts.other_dir = amats.get_one::<PathBuf>("other").cloned();
    opts.strict = amats.get_flag("strict");
    opts.dry_run = amats.get_flag("dry_run");
    if let Some(jobs) = amats.get_one::<usize>("jobs") {
        opts.jobs = (*jobs).max(1);
    }
    opts.exclude = amats.get_many::<String>("exclude")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if let Some(level) = amats.get_one::<String>("log_level") {
        opts.log_level = level.clone();
    }
    Ok(opts)
}

pub fn try_opts_from<I, T>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let amats = command().try_get_matches_from(args)?;
    opts_from_matches(&amats)
}

/// parse the process arguments, exiting with usage on error
pub fn args_to_opts() -> Options
{
    match try_opts_from(std::env::args_os()) {
        Ok(opts) => opts,
        Err(e) => e.exit(),
    }
}
