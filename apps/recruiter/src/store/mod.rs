//! Candidate and résumé stores: the document-store collaborators the conversation core reads.

pub mod postgres;
pub mod resume;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::criteria::vocab::{self, GENERIC_TITLE};
use crate::criteria::{Degree, SearchCriteria};
use crate::models::candidate::{Candidate, NewCandidate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store call timed out after {0}s")]
    Timeout(u64),

    #[error("invalid candidate record: {0}")]
    InvalidRecord(String),
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Up to `pool_size` candidates matching [`RetrievalFilter`], in a stable store order. An
    /// empty result is not an error.
    async fn retrieve(
        &self,
        criteria: &SearchCriteria,
        pool_size: usize,
    ) -> Result<Vec<Candidate>, StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Candidate>, StoreError>;

    /// Inserts or replaces the record with the same `(name, phone)`, returning its id.
    async fn upsert(&self, record: NewCandidate) -> Result<Uuid, StoreError>;
}

/// Tag values derived from criteria.
///
/// Candidates overlapping any hard family (position, skill with its synonyms, location,
/// certificate name) are retrieved. A query without hard families falls back to the soft ones:
/// experience at or above the floor, an acceptable degree, or a listed former employer. The
/// experience ceiling always applies. With nothing stated the filter is open and only the pool
/// bound applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalFilter {
    pub positions: Vec<String>,
    pub skills: Vec<String>,
    pub locations: Vec<String>,
    pub cert_names: Vec<String>,
    pub hard: bool,
    pub experience_min: Option<f64>,
    pub experience_max: Option<f64>,
    /// Serialized names of every acceptable degree.
    pub degrees: Vec<String>,
    /// Company names with legal-form suffixes removed.
    pub companies: Vec<String>,
}

impl RetrievalFilter {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        let skills: BTreeSet<String> = criteria
            .skills
            .iter()
            .flat_map(|s| vocab::expand_skill(s))
            .collect();
        let degrees: Vec<String> = Degree::ALL
            .into_iter()
            .filter(|d| match (criteria.degree_min, &criteria.degree_exact) {
                (Some(min), _) => *d >= min,
                (None, Some(exact)) => exact.contains(d),
                (None, None) => false,
            })
            .map(|d| d.key().to_string())
            .collect();

        RetrievalFilter {
            positions: criteria.positions.iter().cloned().collect(),
            skills: skills.into_iter().collect(),
            locations: criteria.locations.iter().cloned().collect(),
            cert_names: criteria
                .certifications
                .iter()
                .filter(|c| c.name != GENERIC_TITLE)
                .map(|c| c.name.clone())
                .collect(),
            hard: criteria.has_hard_filter(),
            experience_min: criteria.experience_years_min,
            experience_max: criteria.experience_years_max,
            degrees,
            companies: criteria
                .companies
                .iter()
                .map(|c| vocab::company_key(c))
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }

    fn has_soft_filter(&self) -> bool {
        self.experience_min.is_some() || !self.degrees.is_empty() || !self.companies.is_empty()
    }

    /// Whether only the ceiling and the pool bound restrict retrieval.
    pub fn is_open(&self) -> bool {
        !self.hard && !self.has_soft_filter()
    }

    /// Whether the soft families decide membership.
    pub fn soft_only(&self) -> bool {
        !self.hard && self.has_soft_filter()
    }

    /// In-process equivalent of the SQL predicate, used by the in-memory test store.
    #[cfg(test)]
    pub fn matches(&self, candidate: &Candidate) -> bool {
        fn contains(held: &str, wanted: &str) -> bool {
            held.to_lowercase().contains(&wanted.to_lowercase())
        }
        let tags = &candidate.tags;

        if let Some(max) = self.experience_max {
            if !tags.min_experience_years.is_some_and(|years| years <= max) {
                return false;
            }
        }
        if self.is_open() {
            return true;
        }
        if self.soft_only() {
            return self
                .experience_min
                .is_some_and(|min| tags.min_experience_years.is_some_and(|years| years >= min))
                || tags
                    .degree
                    .is_some_and(|degree| self.degrees.iter().any(|d| d == degree.key()))
                || self.companies.iter().any(|want| {
                    tags.companies
                        .iter()
                        .any(|held| contains(&vocab::fold(held), want))
                });
        }

        self.positions
            .iter()
            .any(|want| tags.positions.iter().any(|p| contains(p, want)))
            || self
                .skills
                .iter()
                .any(|want| tags.skills_normalized.iter().any(|s| s == want))
            || self.locations.iter().any(|want| {
                tags.location
                    .as_deref()
                    .is_some_and(|location| contains(location, want))
            })
            || self
                .cert_names
                .iter()
                .any(|want| tags.certifications.iter().any(|c| contains(&c.name, want)))
    }
}
