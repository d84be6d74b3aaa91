use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 6;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub files: Files,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}
fn default_bind_addr() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5174 }

impl Default for Server {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), port: default_port(), allowed_origins: Vec::new() }
    }
}

/// Filesystem-backed features. Everything here is anchored at `base_dir`;
/// without it the docs and metadata routes answer `Unconfigured`.
#[derive(Debug, Deserialize, Clone)]
pub struct Files {
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_root_id")]
    pub default_root: String,
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_roots")]
    pub roots: Vec<RootSpec>,
    #[serde(default = "default_metadata_subdir")]
    pub metadata_subdir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RootSpec {
    pub id: String,
    pub name: String,
    pub subdir: PathBuf,
}

fn default_root_id() -> String { "docs".to_string() }
fn default_extensions() -> Vec<String> { vec!["md".to_string(), "txt".to_string()] }
fn default_max_file_bytes() -> u64 { DEFAULT_MAX_FILE_BYTES }
fn default_max_depth() -> usize { DEFAULT_MAX_DEPTH }
fn default_metadata_subdir() -> PathBuf { PathBuf::from("DeskOps/apps/metadata_indices") }
fn default_roots() -> Vec<RootSpec> {
    vec![
        RootSpec { id: "docs".into(), name: "Docs".into(), subdir: "docs".into() },
        RootSpec {
            id: "backtest-reports".into(),
            name: "Backtest Reports".into(),
            subdir: "multigate-backtest/runs/artifacts/reports".into(),
        },
        RootSpec {
            id: "backtest-docs".into(),
            name: "Backtest Docs".into(),
            subdir: "multigate-backtest/docs".into(),
        },
    ]
}

impl Default for Files {
    fn default() -> Self {
        Self {
            base_dir: None,
            default_root: default_root_id(),
            allowed_extensions: default_extensions(),
            max_file_bytes: default_max_file_bytes(),
            max_depth: default_max_depth(),
            roots: default_roots(),
            metadata_subdir: default_metadata_subdir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Upstream {
    #[serde(default = "default_backtest_url")]
    pub backtest_url: String,
    #[serde(default = "default_analytics_url")]
    pub analytics_url: String,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}
fn default_backtest_url() -> String { "http://127.0.0.1:9090".to_string() }
fn default_analytics_url() -> String { "http://127.0.0.1:8090".to_string() }
fn default_timeout_s() -> u64 { 20 }

impl Default for Upstream {
    fn default() -> Self {
        Self {
            backtest_url: default_backtest_url(),
            analytics_url: default_analytics_url(),
            timeout_s: default_timeout_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_max_request_kb")]
    pub max_request_kb: usize,
}
fn default_max_request_kb() -> usize { 1024 }

impl Default for Limits {
    fn default() -> Self { Self { max_request_kb: default_max_request_kb() } }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    /// Applies environment overrides on top of the file values. `lookup` is
    /// `std::env::var` in `main`; tests pass a closure over a fixed map.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("DESKOPS_ROOT") {
            self.files.base_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DESKOPS_API_BASE_URL") {
            self.upstream.backtest_url = v;
        }
        if let Some(v) = get("DESKOPS_ANALYTICS_BASE_URL") {
            self.upstream.analytics_url = v;
        }
        if let Some(v) = get("DESKOPS_BIND") {
            self.server.bind_addr = v;
        }
        if let Some(v) = get("DESKOPS_PORT") {
            self.server.port = v.trim().parse().map_err(|_| anyhow::anyhow!("DESKOPS_PORT is not a port: {v}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(base) = &self.files.base_dir {
            if !base.is_dir() {
                anyhow::bail!("base_dir does not exist or is not a directory: {}", base.display());
            }
        }
        if self.files.roots.is_empty() { anyhow::bail!("at least one root must be configured"); }
        let mut seen = HashSet::new();
        for root in &self.files.roots {
            if root.id.trim().is_empty() { anyhow::bail!("root id must not be empty"); }
            if !seen.insert(root.id.as_str()) { anyhow::bail!("duplicate root id: {}", root.id); }
            if !is_plain_relative(&root.subdir) {
                anyhow::bail!("root {} subdir must be relative without '..': {}", root.id, root.subdir.display());
            }
        }
        if !seen.contains(self.files.default_root.as_str()) {
            anyhow::bail!("default_root is not a configured root: {}", self.files.default_root);
        }
        if !is_plain_relative(&self.files.metadata_subdir) {
            anyhow::bail!("metadata_subdir must be relative without '..': {}", self.files.metadata_subdir.display());
        }
        if self.files.allowed_extensions.is_empty() { anyhow::bail!("allowed_extensions must not be empty"); }
        if self.files.max_file_bytes == 0 { anyhow::bail!("max_file_bytes must be > 0"); }
        if self.files.max_depth == 0 { anyhow::bail!("max_depth must be > 0"); }
        if self.upstream.timeout_s == 0 { anyhow::bail!("timeout_s must be > 0"); }
        if self.limits.max_request_kb == 0 { anyhow::bail!("max_request_kb must be > 0"); }
        for url in [&self.upstream.backtest_url, &self.upstream.analytics_url] {
            reqwest::Url::parse(url).map_err(|e| anyhow::anyhow!("invalid upstream url {url}: {e}"))?;
        }
        Ok(())
    }
}

/// True when `p` only descends: no root, prefix or `..` components.
fn is_plain_relative(p: &Path) -> bool {
    p.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
