//! Contact action: hands an invitation off to the outbound delivery worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Redis list the delivery worker consumes.
pub const CONTACT_OUTBOX: &str = "recruiter:contact_outbox";

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode contact job: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactJob {
    pub candidate_id: Uuid,
    pub message: String,
    pub queued_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContactSender: Send + Sync {
    async fn send_contact_message(&self, candidate_id: Uuid, message: &str)
        -> Result<(), ContactError>;
}

pub struct RedisContactSender {
    redis: redis::Client,
}

impl RedisContactSender {
    pub fn new(redis: redis::Client) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ContactSender for RedisContactSender {
    async fn send_contact_message(
        &self,
        candidate_id: Uuid,
        message: &str,
    ) -> Result<(), ContactError> {
        let job = ContactJob {
            candidate_id,
            message: message.to_string(),
            queued_at: Utc::now(),
        };
        let payload = serde_json::to_string(&job)?;

        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let depth: i64 = conn.lpush(CONTACT_OUTBOX, payload).await?;

        info!("Queued contact job for candidate {candidate_id} (outbox depth {depth})");
        Ok(())
    }
}

/// Fills the `{name}` placeholder of the invitation template.
pub fn render_invitation(template: &str, candidate_name: &str) -> String {
    template.replace("{name}", candidate_name)
}
