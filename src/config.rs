use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub root: Root,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub cors: Cors,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub convert: Convert,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Root { pub root_dir: PathBuf }

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Directory holding the browser front-end; nothing is served when unset.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}
fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_base_path() -> String { "/api".to_string() }

impl Default for Server {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), port: default_port(), base_path: default_base_path(), static_dir: None }
    }
}

/// An empty origin list allows any origin.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Cors {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_search_max_dirs")]
    pub search_max_dirs: usize,
    #[serde(default = "default_search_budget_ms")]
    pub search_budget_ms: u64,
    #[serde(default = "default_max_upload_kb")]
    pub max_upload_kb: usize,
    #[serde(default = "default_convert_timeout_s")]
    pub convert_timeout_s: u64,
}
fn default_search_max_dirs() -> usize { 20_000 }
fn default_search_budget_ms() -> u64 { 5_000 }
fn default_max_upload_kb() -> usize { 512 * 1024 }
fn default_convert_timeout_s() -> u64 { 600 }

impl Default for Limits {
    fn default() -> Self {
        Self {
            search_max_dirs: default_search_max_dirs(),
            search_budget_ms: default_search_budget_ms(),
            max_upload_kb: default_max_upload_kb(),
            convert_timeout_s: default_convert_timeout_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Convert {
    /// Program name (looked up on PATH) or path of the external encoder.
    #[serde(default = "default_encoder")]
    pub encoder: String,
    #[serde(default)]
    pub pass_env: Vec<String>,
}
fn default_encoder() -> String { "ffmpeg".to_string() }

impl Default for Convert {
    fn default() -> Self { Self { encoder: default_encoder(), pass_env: Vec::new() } }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Logging {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw, path.extension().map(|e| e == "json").unwrap_or(false))
    }

    pub fn parse(raw: &str, json: bool) -> anyhow::Result<Self> {
        if json {
            Ok(serde_json::from_str(raw)?)
        } else {
            Ok(toml::from_str(raw)?)
        }
    }

    /// A missing root is not an error here: the service starts and reports NotFound.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.root.root_dir.as_os_str().is_empty() { anyhow::bail!("root_dir must not be empty"); }
        if !self.server.base_path.starts_with('/') { anyhow::bail!("base_path must start with '/'"); }
        if self.limits.search_max_dirs == 0 { anyhow::bail!("search_max_dirs must be > 0"); }
        if self.limits.search_budget_ms == 0 { anyhow::bail!("search_budget_ms must be > 0"); }
        if self.limits.max_upload_kb == 0 { anyhow::bail!("max_upload_kb must be > 0"); }
        if self.limits.convert_timeout_s == 0 { anyhow::bail!("convert_timeout_s must be > 0"); }
        if self.convert.encoder.trim().is_empty() { anyhow::bail!("convert.encoder must not be empty"); }
        Ok(())
    }

    pub fn root_dir(&self) -> &Path { &self.root.root_dir }

    /// Config pointing at `root_dir` with every other section defaulted.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: Root { root_dir: root_dir.into() },
            server: Server::default(),
            cors: Cors::default(),
            limits: Limits::default(),
            convert: Convert::default(),
            logging: Logging::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let cfg = Config::parse("[root]\nroot_dir = \"/srv/cnc\"\n", false).unwrap();
        assert_eq!(cfg.root_dir(), Path::new("/srv/cnc"));
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.base_path, "/api");
        assert_eq!(cfg.convert.encoder, "ffmpeg");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        cfg.validate().unwrap();
    }

    #[test]
    fn json_config_parses() {
        let raw = r#"{"root":{"root_dir":"/srv/cnc"},"server":{"port":8080,"static_dir":"web"},"logging":{"format":"text"}}"#;
        let cfg = Config::parse(raw, true).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind_addr, "0.0.0.0");
        assert_eq!(cfg.server.static_dir.as_deref(), Some(Path::new("web")));
        assert_eq!(cfg.logging.format, LogFormat::Text);
    }

    #[test]
    fn missing_root_dir_still_validates() {
        let cfg = Config::with_root("/definitely/not/here");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut cfg = Config::with_root("/srv/cnc");
        cfg.limits.search_max_dirs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::with_root("/srv/cnc");
        cfg.convert.encoder = "  ".into();
        assert!(cfg.validate().is_err());
    }
}
