/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

mod actions;
mod dedup;
mod error;
mod events;
mod exec;
mod logging;
mod metadata;
mod options;
mod scan;
mod walk;

use events::Summary;
use metadata::ExifReader;
use options::Options;
use walk::Importer;

async fn run(opts: Options) -> anyhow::Result<Summary>
{
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(events::report(rx, opts.dry_run));

    let importer = Importer::new(&opts, Arc::new(ExifReader), Arc::new(tx))
        .context("bad configuration")?;
    let walked = importer.run().await;
    // closes the event channel so the reporter can finish
    drop(importer);

    let summary = reporter.await.context("reporter stopped")?;
    walked.with_context(|| format!("scan of {} stopped", opts.in_dir.display()))?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode
{
    let opts = options::args_to_opts();
    if let Err(e) = logging::init(&opts.log_level) {
        eprintln!("logging disabled: {:#}", e);
    }

    println!("scan {}", opts.in_dir.display());
    if opts.dry_run {
        println!("  dry run, no output\n");
    } else {
        println!("  output to: {}\n", opts.out_dir.display());
    }

    match run(opts).await {
        Ok(summary) => {
            info!(%summary, "done");
            println!("\n{}", summary);
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("import stopped due to unexpected error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}
