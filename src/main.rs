mod browse;
mod config;
mod errors;
mod logging;
mod metadata;
mod security;
mod server;
mod upstream;


use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("deskops.toml");
    let mut explicit = false;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = PathBuf::from(&args[i]);
                explicit = true;
            }
            _ => {}
        }
        i += 1;
    }

    // the default file is optional; an explicit one must load
    let mut cfg = if explicit || config_path.exists() {
        Config::load(&config_path).with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        Config::default()
    };
    cfg.apply_env(|key| std::env::var(key).ok()).context("reading environment")?;
    cfg.validate().context("validating config")?;

    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);
    let roots: Vec<&str> = cfg.files.roots.iter().map(|r| r.id.as_str()).collect();
    info!(
        addr = %addr,
        files_enabled = cfg.files.base_dir.is_some(),
        roots = ?roots,
        backtest_url = %cfg.upstream.backtest_url,
        analytics_url = %cfg.upstream.analytics_url,
        "deskops-gateway ready"
    );

    server::serve(cfg).await
}
