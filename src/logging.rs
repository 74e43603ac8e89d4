/*
 * Copyright (c) 2017, Alan Chen
 * See LICENCE file for BSD-2 terms
 */

use anyhow::{ anyhow, Context };
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level when it parses
fn filter_for(env: Option<&str>, level: &str) -> anyhow::Result<EnvFilter>
{
    if let Some(Ok(filter)) = env.map(EnvFilter::try_new) {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .with_context(|| format!("bad log level {:?}", level))
}

/// Install the stderr subscriber
pub fn init(level: &str) -> anyhow::Result<()>
{
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(env.as_deref(), level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
        .context("subscriber already installed")
}
