use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use catsync::app::{CatalogSession, Command};
use catsync::config::Settings;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catsync=info".parse().context("Invalid log directive")?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(root) = args.next().map(PathBuf::from) else {
        bail!("usage: catsync <dir> [command...]");
    };
    let commands = args
        .map(|arg| arg.parse::<Command>().with_context(|| format!("Bad command {:?}", arg)))
        .collect::<Result<Vec<_>>>()?;

    let settings = Settings::from_env();
    let session = CatalogSession::new(&settings)?;
    let count = session
        .load_directory(&root)
        .with_context(|| format!("Failed to load {}", root.display()))?;
    info!(count, root = %root.display(), "Catalog loaded");

    for command in commands {
        session.apply(command);
        info!(?command, "{}", session.summary());
    }

    let summary = session.summary();
    info!(preview = summary.preview.as_deref(), "Final: {}", summary);
    Ok(())
}
