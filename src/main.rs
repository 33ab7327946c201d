mod catalog;
mod config;
mod convert;
mod errors;
mod logging;
mod security;
mod server;

use crate::config::Config;
use crate::convert::{Encoder, FfmpegEncoder};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("cnc-viewer.toml");
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = PathBuf::from(&args[i]);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    cfg.validate().context("validating config")?;
    logging::init(cfg.logging.format);

    if cfg.root_dir().is_dir() {
        info!(root = %cfg.root_dir().display(), "program root");
    } else {
        warn!(root = %cfg.root_dir().display(), "program root not found; requests will report NotFound until it exists");
    }

    let encoder = FfmpegEncoder::new(&cfg);
    if encoder.available() {
        info!(encoder = encoder.name(), "video conversion available");
    } else {
        warn!(encoder = encoder.name(), "encoder not found; video conversion disabled");
    }

    info!(
        addr = %format!("{}:{}", cfg.server.bind_addr, cfg.server.port),
        base_path = %cfg.server.base_path,
        "cnc-viewer ready"
    );
    server::serve(cfg, Arc::new(encoder)).await
}
