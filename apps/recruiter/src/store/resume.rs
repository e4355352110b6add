use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("no résumé on file for candidate {0}")]
    NotFound(Uuid),

    #[error("résumé storage error: {0}")]
    Storage(String),
}

/// A time-limited link to one résumé file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeHandle {
    pub candidate_id: Uuid,
    pub file_name: String,
    pub url: String,
    pub expires_in_secs: u64,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// `resume_path` is the object key recorded on the candidate at ingestion time.
    async fn fetch_resume(
        &self,
        candidate_id: Uuid,
        resume_path: Option<&str>,
    ) -> Result<ResumeHandle, ResumeError>;
}

/// Résumé files in S3 / MinIO, handed out as presigned GET links.
pub struct S3ResumeStore {
    s3: aws_sdk_s3::Client,
    bucket: String,
    link_ttl: Duration,
}

impl S3ResumeStore {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String, link_ttl: Duration) -> Self {
        Self {
            s3,
            bucket,
            link_ttl,
        }
    }
}

fn file_name(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

#[async_trait]
impl ResumeStore for S3ResumeStore {
    async fn fetch_resume(
        &self,
        candidate_id: Uuid,
        resume_path: Option<&str>,
    ) -> Result<ResumeHandle, ResumeError> {
        let key = resume_path
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ResumeError::NotFound(candidate_id))?;

        if let Err(err) = self
            .s3
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                warn!("Résumé object s3://{}/{key} is missing", self.bucket);
                return Err(ResumeError::NotFound(candidate_id));
            }
            return Err(ResumeError::Storage(format!("S3 head failed: {err}")));
        }

        let presign = PresigningConfig::expires_in(self.link_ttl)
            .map_err(|e| ResumeError::Storage(format!("invalid presign config: {e}")))?;
        let request = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| ResumeError::Storage(format!("S3 presign failed: {e}")))?;

        info!("Issued résumé link for candidate {candidate_id}");
        Ok(ResumeHandle {
            candidate_id,
            file_name: file_name(key),
            url: request.uri().to_string(),
            expires_in_secs: self.link_ttl.as_secs(),
        })
    }
}
