//! In-memory collaborators and fixtures shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{Config, EngineSettings};
use crate::conversation::engine::{Collaborators, ConversationEngine};
use crate::criteria::understand::{QueryUnderstander, StructuredQuery, UnderstandContext};
use crate::criteria::SearchCriteria;
use crate::llm_client::LlmError;
use crate::models::candidate::{Candidate, CandidateTags, ContactInfo, NewCandidate};
use crate::outreach::{ContactError, ContactSender};
use crate::scoring::rules::RuleSet;
use crate::store::resume::{ResumeError, ResumeHandle, ResumeStore};
use crate::store::{CandidateStore, RetrievalFilter, StoreError};

pub const LLM_TIMEOUT: Duration = Duration::from_secs(30);

// ── Clock ───────────────────────────────────────────────────────────────────

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ── Query understanding ─────────────────────────────────────────────────────

/// Answers known texts with canned JSON; anything else gets `{}`.
#[derive(Default)]
pub struct FakeUnderstander {
    answers: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
}

impl FakeUnderstander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, text: &str, structured: Value) -> Self {
        self.answers.insert(text.to_string(), structured);
        self
    }

    pub fn slow(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    pub fn failing(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }
}

#[async_trait]
impl QueryUnderstander for FakeUnderstander {
    async fn understand(
        &self,
        text: &str,
        _context: &UnderstandContext,
    ) -> Result<StructuredQuery, LlmError> {
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(text) {
            return Err(LlmError::EmptyContent);
        }
        Ok(self
            .answers
            .get(text)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }
}

// ── Stores ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCandidateStore {
    candidates: Mutex<Vec<Candidate>>,
    unavailable: AtomicBool,
}

impl MemoryCandidateStore {
    pub fn with(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.candidates.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(10));
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for MemoryCandidateStore {
    async fn retrieve(
        &self,
        criteria: &SearchCriteria,
        pool_size: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        self.check()?;
        let filter = RetrievalFilter::from_criteria(criteria);
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.matches(c))
            .take(pool_size)
            .cloned()
            .collect())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        self.check()?;
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn upsert(&self, record: NewCandidate) -> Result<Uuid, StoreError> {
        self.check()?;
        let mut candidates = self.candidates.lock().unwrap();
        let contact_info = ContactInfo {
            phone: record.phone.clone(),
            email: record.email.clone(),
        };
        if let Some(existing) = candidates
            .iter_mut()
            .find(|c| c.name == record.name && c.contact_info.phone == record.phone)
        {
            existing.tags = record.tags;
            existing.resume_path = record.resume_path;
            existing.contact_info = contact_info;
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        candidates.push(Candidate {
            id,
            name: record.name,
            tags: record.tags,
            resume_path: record.resume_path,
            contact_info,
        });
        Ok(id)
    }
}

pub struct FakeResumeStore;

#[async_trait]
impl ResumeStore for FakeResumeStore {
    async fn fetch_resume(
        &self,
        candidate_id: Uuid,
        resume_path: Option<&str>,
    ) -> Result<ResumeHandle, ResumeError> {
        let key = resume_path.ok_or(ResumeError::NotFound(candidate_id))?;
        Ok(ResumeHandle {
            candidate_id,
            file_name: key.rsplit('/').next().unwrap_or(key).to_string(),
            url: format!("https://files.test/{key}"),
            expires_in_secs: 600,
        })
    }
}

#[derive(Default)]
pub struct RecordingContactSender {
    pub sent: Mutex<Vec<(Uuid, String)>>,
}

#[async_trait]
impl ContactSender for RecordingContactSender {
    async fn send_contact_message(
        &self,
        candidate_id: Uuid,
        message: &str,
    ) -> Result<(), ContactError> {
        self.sent
            .lock()
            .unwrap()
            .push((candidate_id, message.to_string()));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn candidate(name: &str, location: &str, years: f64) -> Candidate {
    Candidate {
        id: Uuid::new_v4(),
        name: name.to_string(),
        tags: CandidateTags {
            positions: vec!["建筑师".to_string()],
            location: Some(location.to_string()),
            min_experience_years: Some(years),
            ..Default::default()
        },
        resume_path: Some(format!("resumes/{name}.pdf")),
        contact_info: ContactInfo::default(),
    }
}

pub fn settings(top_n: usize, pool_size: usize) -> EngineSettings {
    EngineSettings {
        top_n,
        initial_candidate_pool_size: pool_size,
        ..EngineSettings::default()
    }
}

pub struct Harness {
    pub engine: Arc<ConversationEngine>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCandidateStore>,
    pub contacts: Arc<RecordingContactSender>,
}

pub fn harness(
    understander: FakeUnderstander,
    candidates: Vec<Candidate>,
    settings: EngineSettings,
) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(MemoryCandidateStore::with(candidates));
    let contacts = Arc::new(RecordingContactSender::default());
    let collaborators = Collaborators {
        understander: Arc::new(understander),
        candidates: store.clone(),
        resumes: Arc::new(FakeResumeStore),
        contacts: contacts.clone(),
        clock: clock.clone(),
    };
    let rules = RuleSet::builtin().unwrap();
    let engine = Arc::new(ConversationEngine::new(
        settings,
        rules,
        LLM_TIMEOUT,
        collaborators,
    ));
    Harness {
        engine,
        clock,
        store,
        contacts,
    }
}

pub fn test_config(authorized: &[&str]) -> Config {
    Config {
        database_url: "postgres://localhost/recruiter_test".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        s3_bucket: "resumes".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        llm_api_key: "test".to_string(),
        llm_api_base: "http://localhost:1".to_string(),
        llm_query_model: "test-model".to_string(),
        llm_timeout_secs: LLM_TIMEOUT.as_secs(),
        store_timeout_secs: 10,
        port: 0,
        rust_log: "info".to_string(),
        engine: EngineSettings::default(),
        max_workers: 2,
        state_sweep_interval_secs: 0,
        authorized_user_ids: authorized.iter().map(|id| id.to_string()).collect(),
        scoring_rules_path: None,
        resume_link_ttl_secs: 600,
    }
}
