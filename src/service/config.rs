//! HTTP service configuration from `HWP_SERVICE_*` environment variables.
//!
//! A `.env` file in the working directory (or a parent) is loaded first; it
//! never overrides a variable that is already set. Built once at startup and
//! injected into the router; nothing reads the environment after that.

use serde::Serialize;

/// Service settings.
///
/// | Variable | Default |
/// |----------|---------|
/// | `HWP_SERVICE_NAME` | `hwp-parser` |
/// | `HWP_SERVICE_HOST` | `0.0.0.0` |
/// | `HWP_SERVICE_PORT` | `3000` |
/// | `HWP_SERVICE_TIMEOUT` | `300.0` seconds |
/// | `HWP_SERVICE_WORKERS` | `1` runtime worker thread |
/// | `HWP_SERVICE_MAX_CONCURRENCY` | `50` conversions |
/// | `HWP_SERVICE_CORS_ENABLED` | `false` (`true`/`1`/`yes`/`on` enable) |
/// | `HWP_SERVICE_CORS_ORIGINS` | `*` (comma-separated) |
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Per-request conversion timeout in seconds.
    pub timeout: f64,
    /// Worker threads for the server's tokio runtime.
    pub workers: usize,
    /// Conversions allowed in flight at once.
    pub max_concurrency: usize,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "hwp-parser".into(),
            host: "0.0.0.0".into(),
            port: 3000,
            timeout: 300.0,
            workers: 1,
            max_concurrency: 50,
            cors_enabled: false,
            cors_origins: vec!["*".into()],
        }
    }
}

impl ServiceConfig {
    /// Load `.env` (without overriding) and read the process environment.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        Self {
            name: lookup("HWP_SERVICE_NAME").unwrap_or(d.name),
            host: lookup("HWP_SERVICE_HOST").unwrap_or(d.host),
            port: lookup("HWP_SERVICE_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(d.port),
            timeout: lookup("HWP_SERVICE_TIMEOUT")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|t| t.is_finite() && *t > 0.0)
                .unwrap_or(d.timeout),
            workers: num("HWP_SERVICE_WORKERS").filter(|n| *n > 0).unwrap_or(d.workers),
            max_concurrency: num("HWP_SERVICE_MAX_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_concurrency),
            cors_enabled: lookup("HWP_SERVICE_CORS_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(d.cors_enabled),
            cors_origins: lookup("HWP_SERVICE_CORS_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or(d.cors_origins),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when the origin list allows any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
