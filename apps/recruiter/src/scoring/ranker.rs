//! Ranker: orders scored candidates and keeps the full ranked set for paging.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::engine::ScoredCandidate;
use crate::criteria::SearchCriteria;
use crate::errors::SelectionProblem;
use crate::models::candidate::{Candidate, CandidateCard};

/// Positions into `scored`, best first. Equal totals keep retrieval order.
pub fn rank(scored: &[ScoredCandidate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    // sort_by is stable, so ties fall back to the original index
    order.sort_by(|&a, &b| scored[b].total_score.total_cmp(&scored[a].total_score));
    order
}

/// One conversation's ranked shortlist. Owned by exactly one conversation state.
#[derive(Debug, Clone)]
pub struct RankedResultSet {
    pub ordered_candidate_ids: Vec<Uuid>,
    /// Display data, parallel to `ordered_candidate_ids`.
    pub cards: Vec<CandidateCard>,
    pub criteria: SearchCriteria,
    pub created_at: DateTime<Utc>,
    pub cursor: usize,
}

impl RankedResultSet {
    /// `pool` and `scored` are parallel: `scored[i]` is the score of `pool[i]`.
    pub fn build(
        criteria: SearchCriteria,
        pool: &[Candidate],
        scored: &[ScoredCandidate],
        created_at: DateTime<Utc>,
    ) -> Self {
        let order = rank(scored);
        let cards: Vec<CandidateCard> = order
            .iter()
            .map(|&i| CandidateCard::new(&pool[i], scored[i].total_score))
            .collect();

        RankedResultSet {
            ordered_candidate_ids: cards.iter().map(|c| c.id).collect(),
            cards,
            criteria,
            created_at,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// The slice currently on screen: `[cursor, cursor + n)`, clipped to the set.
    pub fn page(&self, n: usize) -> &[CandidateCard] {
        let start = self.cursor.min(self.cards.len());
        let end = self.cursor.saturating_add(n).min(self.cards.len());
        &self.cards[start..end]
    }

    /// Resolves a 1-based index against the displayed page.
    pub fn select(&self, index: usize, n: usize) -> Result<&CandidateCard, SelectionProblem> {
        let page = self.page(n);
        index
            .checked_sub(1)
            .and_then(|i| page.get(i))
            .ok_or(SelectionProblem::OutOfRange {
                index,
                page_len: page.len(),
            })
    }

    /// Moves to the next page. Returns false, leaving the cursor where it was, when nothing
    /// remains past the current page.
    pub fn advance(&mut self, n: usize) -> bool {
        let next = self.cursor.saturating_add(n);
        if next >= self.cards.len() {
            return false;
        }
        self.cursor = next;
        true
    }
}
