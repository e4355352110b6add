//! Conversation engine: routes each inbound message through the command grammar, the query
//! pipeline, and the per-key state registry.
//!
//! A new query runs in two short critical sections around the unlocked pipeline (understanding,
//! normalization, retrieval, scoring, ranking). The first records a ticket on the state; the
//! second installs the ranked set only if that ticket is still the newest, so a slow query never
//! overwrites a newer one and "end" wins over anything in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::command::{self, Command, CommandKind};
use super::registry::StateRegistry;
use super::render;
use super::state::{Awaiting, ConversationKey};
use super::{Reply, ReplyKind};
use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::criteria::normalizer;
use crate::criteria::understand::{QueryUnderstander, UnderstandContext};
use crate::errors::{AssistantError, SelectionProblem};
use crate::models::candidate::CandidateCard;
use crate::outreach::{render_invitation, ContactSender};
use crate::scoring::engine::score_pool;
use crate::scoring::ranker::RankedResultSet;
use crate::scoring::rules::RuleSet;
use crate::store::resume::ResumeStore;
use crate::store::CandidateStore;

/// External capabilities the engine calls.
pub struct Collaborators {
    pub understander: Arc<dyn QueryUnderstander>,
    pub candidates: Arc<dyn CandidateStore>,
    pub resumes: Arc<dyn ResumeStore>,
    pub contacts: Arc<dyn ContactSender>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConversationEngine {
    settings: EngineSettings,
    rules: RuleSet,
    llm_timeout: Duration,
    collaborators: Collaborators,
    registry: StateRegistry,
    tickets: AtomicU64,
}

type Outcome = Result<Reply, AssistantError>;

impl ConversationEngine {
    pub fn new(
        settings: EngineSettings,
        rules: RuleSet,
        llm_timeout: Duration,
        collaborators: Collaborators,
    ) -> Self {
        let registry = StateRegistry::new(settings.ttl_seconds);
        Self {
            settings,
            rules,
            llm_timeout,
            collaborators,
            registry,
            tickets: AtomicU64::new(0),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.collaborators.clock.now()
    }

    /// Processes one message and always produces a reply.
    pub async fn handle(&self, key: &ConversationKey, text: &str) -> Reply {
        let outcome = match command::parse(text) {
            Ok(Command::Query(query)) => self.run_query(key, &query).await,
            Ok(Command::More) => self.show_more(key).await,
            Ok(Command::End) => Ok(self.end(key).await),
            Ok(Command::Select { kind, index }) => self.follow_up(key, kind, index).await,
            Err(problem) => self.reject(key, problem).await,
        };

        match outcome {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_user_error() {
                    warn!("Conversation {key}: {err}");
                } else {
                    error!("Conversation {key}: {err}");
                }
                Reply::error(&err)
            }
        }
    }

    /// Drops expired states. Returns how many slots were removed.
    pub fn sweep(&self) -> usize {
        self.registry.sweep(self.now())
    }

    pub fn active_conversations(&self) -> usize {
        self.registry.len()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    async fn run_query(&self, key: &ConversationKey, text: &str) -> Outcome {
        let (ticket, context) = {
            let now = self.now();
            let mut guard = self.registry.lock(key).await;
            let state = guard.state(now);
            // taken under the key's lock so ticket order matches lock order
            let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
            state.latest_ticket = ticket;
            state.awaiting = Awaiting::Query;
            state.touch(now);
            let context = UnderstandContext {
                previous_criteria: state.result_set.as_ref().map(|set| set.criteria.clone()),
            };
            (ticket, context)
        };

        let outcome = self.pipeline(text, &context).await;

        let now = self.now();
        let mut guard = self.registry.lock(key).await;
        let Some(state) = guard
            .current(now)
            .filter(|state| state.latest_ticket == ticket)
        else {
            info!("Conversation {key}: query {ticket} superseded, result discarded");
            return Ok(Reply::new(ReplyKind::Superseded, render::superseded()));
        };

        state.touch(now);
        match outcome {
            Ok(set) => {
                let top_n = self.settings.top_n;
                let reply = if set.is_empty() {
                    state.awaiting = Awaiting::Query;
                    Reply::new(ReplyKind::NoCandidates, render::no_candidates(&set.criteria))
                } else {
                    state.awaiting = Awaiting::FollowUp;
                    Reply::new(ReplyKind::Results, render::results(&set, top_n))
                };
                info!(
                    "Conversation {key}: query {ticket} ranked {} candidates",
                    set.len()
                );
                state.result_set = Some(set);
                Ok(reply)
            }
            Err(err) => {
                state.settle();
                Err(err)
            }
        }
    }

    /// Understanding → normalization → retrieval → scoring → ranking. Holds no lock.
    async fn pipeline(
        &self,
        text: &str,
        context: &UnderstandContext,
    ) -> Result<RankedResultSet, AssistantError> {
        let structured = tokio::time::timeout(
            self.llm_timeout,
            self.collaborators.understander.understand(text, context),
        )
        .await
        .map_err(|_| AssistantError::QueryUnderstandingTimeout {
            seconds: self.llm_timeout.as_secs(),
        })?
        .map_err(|e| AssistantError::QueryUnderstanding(e.to_string()))?;

        let criteria = normalizer::normalize(&structured, self.settings.ambiguity_precedence)?;

        let pool = self
            .collaborators
            .candidates
            .retrieve(&criteria, self.settings.initial_candidate_pool_size)
            .await
            .map_err(|e| AssistantError::StoreUnavailable(e.to_string()))?;
        debug!("Retrieved {} candidates for [{criteria}]", pool.len());

        let scored = score_pool(&criteria, &pool, &self.rules)?;
        Ok(RankedResultSet::build(criteria, &pool, &scored, self.now()))
    }

    // ── Paging and teardown ─────────────────────────────────────────────────

    async fn show_more(&self, key: &ConversationKey) -> Outcome {
        let now = self.now();
        let top_n = self.settings.top_n;
        let mut guard = self.registry.lock(key).await;
        let state = guard.state(now);
        state.touch(now);
        state.settle();

        let set = state
            .result_set
            .as_mut()
            .ok_or(AssistantError::InvalidSelection(
                SelectionProblem::NoActiveResults,
            ))?;
        if set.advance(top_n) {
            Ok(Reply::new(ReplyKind::Results, render::results(set, top_n)))
        } else {
            Ok(Reply::new(ReplyKind::NoMore, render::no_more()))
        }
    }

    async fn end(&self, key: &ConversationKey) -> Reply {
        let guard = self.registry.lock(key).await;
        let existed = self.registry.end(guard, self.now());
        info!("Conversation {key} ended (active: {existed})");
        Reply::new(ReplyKind::Ended, render::ended())
    }

    async fn reject(&self, key: &ConversationKey, problem: SelectionProblem) -> Outcome {
        let now = self.now();
        let mut guard = self.registry.lock(key).await;
        let state = guard.state(now);
        state.touch(now);
        state.settle();
        Err(AssistantError::InvalidSelection(problem))
    }

    // ── Follow-ups ──────────────────────────────────────────────────────────

    /// Resolves the index under the key's lock, then calls the collaborator without it.
    async fn follow_up(&self, key: &ConversationKey, kind: CommandKind, index: usize) -> Outcome {
        let card = {
            let now = self.now();
            let mut guard = self.registry.lock(key).await;
            let state = guard.state(now);
            state.touch(now);
            state.settle();
            let set = state
                .result_set
                .as_ref()
                .ok_or(AssistantError::InvalidSelection(
                    SelectionProblem::NoActiveResults,
                ))?;
            set.select(index, self.settings.top_n)
                .map_err(AssistantError::InvalidSelection)?
                .clone()
        };
        debug!("Conversation {key}: {kind:?} {index} -> {}", card.id);

        match kind {
            CommandKind::Detail => self.detail(&card).await,
            CommandKind::Resume => self.resume(&card).await,
            CommandKind::Contact => self.contact(&card).await,
        }
    }

    async fn detail(&self, card: &CandidateCard) -> Outcome {
        let candidate = self
            .collaborators
            .candidates
            .fetch(card.id)
            .await
            .map_err(|e| AssistantError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| AssistantError::CandidateNotFound(card.id.to_string()))?;
        Ok(Reply::new(ReplyKind::Detail, render::detail(&candidate)))
    }

    async fn resume(&self, card: &CandidateCard) -> Outcome {
        let handle = self
            .collaborators
            .resumes
            .fetch_resume(card.id, card.resume_path.as_deref())
            .await
            .map_err(|e| AssistantError::ResumeUnavailable(e.to_string()))?;
        Ok(Reply {
            kind: ReplyKind::Resume,
            text: render::resume(&card.name, &handle),
            resume: Some(handle),
        })
    }

    async fn contact(&self, card: &CandidateCard) -> Outcome {
        let message = render_invitation(&self.settings.contact_template, &card.name);
        self.collaborators
            .contacts
            .send_contact_message(card.id, &message)
            .await
            .map_err(|e| AssistantError::ContactFailed(e.to_string()))?;
        info!("Contact invitation queued for candidate {}", card.id);
        Ok(Reply::new(
            ReplyKind::ContactSent,
            render::contact_sent(&card.name),
        ))
    }
}
