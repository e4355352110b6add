use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::ranker::RankedResultSet;

/// Identity a conversation is tracked under: a user in a direct chat, or a user inside one
/// group thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub group_id: Option<String>,
}

impl ConversationKey {
    pub fn direct(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            group_id: None,
        }
    }

    pub fn in_group(user_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            group_id: Some(group_id.into()),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group_id {
            Some(group) => write!(f, "{}@{group}", self.user_id),
            None => write!(f, "{}", self.user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Awaiting {
    None,
    Query,
    FollowUp,
}

#[derive(Debug, Clone)]
pub struct ConversationState {
    pub key: ConversationKey,
    pub result_set: Option<RankedResultSet>,
    pub awaiting: Awaiting,
    pub last_activity_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    /// Ticket of the newest query started on this state. A query result is installed only while
    /// its ticket is still the newest.
    pub latest_ticket: u64,
    /// Transitions applied since the state was created.
    pub transitions: u64,
}

impl ConversationState {
    pub fn new(key: ConversationKey, now: DateTime<Utc>, ttl_seconds: i64) -> Self {
        Self {
            key,
            result_set: None,
            awaiting: Awaiting::None,
            last_activity_at: now,
            ttl_seconds,
            latest_ticket: 0,
            transitions: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_activity_at > Duration::seconds(self.ttl_seconds)
    }

    /// Records one applied transition.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
        self.transitions += 1;
    }

    /// Awaiting state after a failed query: previous results stay usable.
    pub fn settle(&mut self) {
        self.awaiting = if self.result_set.is_some() {
            Awaiting::FollowUp
        } else {
            Awaiting::Query
        };
    }
}
