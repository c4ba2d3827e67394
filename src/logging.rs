//! Tracing subscriber setup

use crate::Result;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Map `-v` occurrences to a default filter
fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "proxygrab=info",
        1 => "proxygrab=debug",
        _ => "proxygrab=trace",
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)))
}

/// Log to stderr. `RUST_LOG` overrides the verbosity.
pub fn init(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Log to a file instead of the terminal, for when the TUI owns the screen
pub fn init_to_file(verbosity: u8, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
