//! Entry point for the `fusion_main` binary.

use anyhow::Result;
use clap::Parser;
use runtime::app::{self, Args};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let summary = app::run(&args)?;
    tracing::info!(
        frames = summary.frames,
        resident = summary.resident_blocks,
        swapped_out = summary.swapped_out_blocks,
        exported = summary.exported.len(),
        "Fusion run finished."
    );
    Ok(())
}
