use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::criteria::AmbiguityPrecedence;

const DEFAULT_CONTACT_TEMPLATE: &str =
    "您好，{name}，我们看到了您的简历，希望与您进一步沟通合适的岗位机会，方便的话请回复，谢谢！";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or a numeric option is invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_api_key: String,
    pub llm_api_base: String,
    pub llm_query_model: String,
    pub llm_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub port: u16,
    pub rust_log: String,
    pub engine: EngineSettings,
    pub max_workers: usize,
    pub state_sweep_interval_secs: u64,
    /// Empty means every user is authorized.
    pub authorized_user_ids: HashSet<String>,
    pub scoring_rules_path: Option<PathBuf>,
    pub resume_link_ttl_secs: u64,
}

/// The options the conversation core consumes directly.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub initial_candidate_pool_size: usize,
    pub top_n: usize,
    pub ttl_seconds: i64,
    pub ambiguity_precedence: AmbiguityPrecedence,
    pub contact_template: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_candidate_pool_size: 30,
            top_n: 5,
            ttl_seconds: 180,
            ambiguity_precedence: AmbiguityPrecedence::default(),
            contact_template: DEFAULT_CONTACT_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let engine = EngineSettings {
            initial_candidate_pool_size: positive_env("INITIAL_CANDIDATE_POOL_SIZE", 30)?,
            top_n: positive_env("TOP_N_CANDIDATES", 5)?,
            ttl_seconds: positive_env("STATE_TTL_SECONDS", 180)?,
            ambiguity_precedence: optional_env("AMBIGUITY_PRECEDENCE")
                .map(|raw| raw.parse::<AmbiguityPrecedence>())
                .transpose()
                .map_err(anyhow::Error::msg)?
                .unwrap_or_default(),
            contact_template: optional_env("CONTACT_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_CONTACT_TEMPLATE.to_string()),
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_api_base: optional_env("LLM_API_BASE")
                .unwrap_or_else(|| "https://api.deepseek.com/v1".to_string()),
            llm_query_model: optional_env("LLM_QUERY_MODEL")
                .unwrap_or_else(|| "deepseek-chat".to_string()),
            llm_timeout_secs: positive_env("LLM_TIMEOUT_SECS", 30)?,
            store_timeout_secs: positive_env("STORE_TIMEOUT_SECS", 10)?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            engine,
            max_workers: positive_env("MAX_WORKERS", 5)?,
            state_sweep_interval_secs: parse_env("STATE_SWEEP_INTERVAL_SECS", 60)?,
            authorized_user_ids: parse_user_ids(&optional_env("AUTHORIZED_USER_IDS").unwrap_or_default()),
            scoring_rules_path: optional_env("SCORING_RULES_PATH").map(PathBuf::from),
            resume_link_ttl_secs: positive_env("RESUME_LINK_TTL_SECS", 600)?,
        })
    }

    pub fn is_authorized(&self, user_id: &str) -> bool {
        user_allowed(&self.authorized_user_ids, user_id)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn positive_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default + Copy,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_env(key, default)?;
    if value <= T::default() {
        bail!("Environment variable '{key}' must be greater than zero");
    }
    Ok(value)
}

fn user_allowed(allow_list: &HashSet<String>, user_id: &str) -> bool {
    allow_list.is_empty() || allow_list.contains(user_id)
}

fn parse_user_ids(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}
