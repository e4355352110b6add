mod clock;
mod config;
mod conversation;
mod criteria;
mod db;
mod dispatch;
mod errors;
mod llm_client;
mod models;
mod outreach;
mod routes;
mod scoring;
mod state;
mod store;
#[cfg(test)]
mod testkit;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::conversation::engine::{Collaborators, ConversationEngine};
use crate::criteria::understand::LlmQueryUnderstander;
use crate::db::create_pool;
use crate::dispatch::{spawn_state_sweeper, WorkerPool};
use crate::llm_client::LlmClient;
use crate::outreach::RedisContactSender;
use crate::routes::build_router;
use crate::scoring::rules::RuleSet;
use crate::state::AppState;
use crate::store::postgres::PgCandidateStore;
use crate::store::resume::S3ResumeStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting recruiter v{}", env!("CARGO_PKG_VERSION"));

    // Scoring rules are validated before anything else connects
    let rules = match &config.scoring_rules_path {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::builtin()?,
    };
    info!("Loaded {} scoring dimensions", rules.dimensions().len());

    // Initialize PostgreSQL
    let store_timeout = Duration::from_secs(config.store_timeout_secs);
    let db = create_pool(&config.database_url, store_timeout).await?;
    let candidates = Arc::new(PgCandidateStore::new(db, store_timeout));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let resumes = S3ResumeStore::new(
        s3,
        config.s3_bucket.clone(),
        Duration::from_secs(config.resume_link_ttl_secs),
    );
    info!("S3 client initialized");

    // Initialize LLM client
    let llm_timeout = Duration::from_secs(config.llm_timeout_secs);
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_api_base.clone(),
        config.llm_query_model.clone(),
        llm_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let engine = Arc::new(ConversationEngine::new(
        config.engine.clone(),
        rules,
        llm_timeout,
        Collaborators {
            understander: Arc::new(LlmQueryUnderstander::new(llm)),
            candidates: candidates.clone(),
            resumes: Arc::new(resumes),
            contacts: Arc::new(RedisContactSender::new(redis)),
            clock: Arc::new(SystemClock),
        },
    ));
    info!(
        "Conversation engine ready (top_n={}, pool={}, ttl={}s, workers={})",
        config.engine.top_n,
        config.engine.initial_candidate_pool_size,
        config.engine.ttl_seconds,
        config.max_workers
    );

    let _sweeper = spawn_state_sweeper(engine.clone(), config.state_sweep_interval_secs);

    // Build app state
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
        workers: WorkerPool::new(config.max_workers),
        candidates,
    };

    // Build router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "recruiter-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
