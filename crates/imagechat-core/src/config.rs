//! Configuration loader and the explicit query policy.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars. The routing thresholds live here as a typed, documented
//! `QueryPolicy` rather than as constants scattered through the engine.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables that decide how a query is routed and ranked.
///
/// Defaults: `top_k = 5` similar images per query, `min_confidence = 0.5`
/// below which a generated answer falls back to the similarity path,
/// `feedback_weight = 0.1` per aggregate rating point, and a 10 s bound
/// on each upstream call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryPolicy {
    pub top_k: usize,
    pub min_confidence: f32,
    pub feedback_weight: f32,
    pub upstream_timeout_ms: u64,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_confidence: 0.5,
            feedback_weight: 0.1,
            upstream_timeout_ms: 10_000,
        }
    }
}

impl QueryPolicy {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        let config = Self { figment };
        config.policy_checked()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[policy]` section, or documented defaults when absent.
    pub fn policy(&self) -> QueryPolicy {
        self.get("policy").unwrap_or_default()
    }

    fn policy_checked(&self) -> anyhow::Result<QueryPolicy> {
        let policy = self.policy();
        if policy.top_k == 0 {
            anyhow::bail!("policy.top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&policy.min_confidence) {
            anyhow::bail!("policy.min_confidence must be within [0.0, 1.0]");
        }
        Ok(policy)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
