//! Scoring Engine: pure, deterministic scoring of one candidate against criteria and rules.
//!
//! total_score = Σ(score_i × weight_i) / Σ(weight_i), both sums over the enabled dimensions whose
//! requirement the query actually states. A dimension the query leaves empty is skipped for every
//! candidate; a candidate missing a value on an evaluated dimension scores 0 there.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use uuid::Uuid;

use super::rules::{
    Dimension, ExactParams, Field, Logic, OverlapParams, PresenceParams, RangeParams, RuleSet,
};
use crate::criteria::vocab::{self, GENERIC_TITLE};
use crate::criteria::{CertRequirement, Degree, SearchCriteria};
use crate::errors::AssistantError;
use crate::models::candidate::{Candidate, HeldCertification};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate_id: Uuid,
    /// Raw (unweighted) score of every evaluated dimension.
    pub dimension_scores: BTreeMap<String, f64>,
    pub total_score: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Logic kinds
// ────────────────────────────────────────────────────────────────────────────

pub fn range_match(required_min: f64, candidate_value: Option<f64>, params: &RangeParams) -> f64 {
    let Some(value) = candidate_value else {
        return 0.0;
    };
    if value >= required_min {
        (1.0 + params.bonus_rate * (value - required_min)).min(params.max_score_factor)
    } else if value >= required_min - params.tolerance {
        (1.0 - params.decay_rate * (required_min - value)).max(params.min_score)
    } else {
        0.0
    }
}

pub fn keyword_overlap(matches: usize, params: &OverlapParams) -> f64 {
    let score = params.score_per_match * matches as f64;
    params.max_score.map_or(score, |cap| score.min(cap))
}

pub fn exact_match(matched: bool, params: &ExactParams) -> f64 {
    if matched {
        params.match_score
    } else {
        params.mismatch_score
    }
}

pub fn keyword_presence(held: usize, params: &PresenceParams) -> f64 {
    (params.score_per_match * held as f64).min(params.max_score)
}

// ────────────────────────────────────────────────────────────────────────────
// Field semantics
// ────────────────────────────────────────────────────────────────────────────

/// Lowest acceptable degree stated by the query, if any.
fn degree_floor(criteria: &SearchCriteria) -> Option<Degree> {
    criteria
        .degree_min
        .or_else(|| criteria.degree_exact.as_ref()?.iter().next().copied())
}

fn degree_satisfies(held: Degree, criteria: &SearchCriteria) -> bool {
    match (criteria.degree_min, &criteria.degree_exact) {
        (Some(min), _) => held >= min,
        (None, Some(exact)) => exact.contains(&held),
        (None, None) => false,
    }
}

fn requirement_present(field: Field, criteria: &SearchCriteria) -> bool {
    match field {
        Field::Experience => {
            criteria.experience_years_min.is_some() || criteria.experience_years_max.is_some()
        }
        Field::Degree => degree_floor(criteria).is_some(),
        Field::Location => !criteria.locations.is_empty(),
        Field::Skills => !criteria.skills.is_empty(),
        Field::Positions => !criteria.positions.is_empty(),
        Field::Companies => !criteria.companies.is_empty(),
        Field::Certifications => !criteria.certifications.is_empty(),
    }
}

fn folded_overlap(required: &BTreeSet<String>, held: &[String]) -> usize {
    let held: BTreeSet<String> = held.iter().map(|h| vocab::fold(h)).collect();
    required
        .iter()
        .filter(|r| held.contains(&vocab::fold(r)))
        .count()
}

/// Requested skills satisfied by the candidate. Each request counts once however many of its
/// synonyms the candidate lists.
fn skill_overlap(required: &BTreeSet<String>, held: &[String]) -> usize {
    let held: BTreeSet<String> = held.iter().map(|h| vocab::skill_key(h)).collect();
    let required: BTreeSet<String> = required.iter().map(|r| vocab::skill_key(r)).collect();
    required.intersection(&held).count()
}

/// A candidate above the stated ceiling scores 0. Below it, a stated floor is scored with
/// `range_match`; a ceiling alone is met by any known value.
fn experience_score(criteria: &SearchCriteria, held: Option<f64>, params: &RangeParams) -> f64 {
    if let (Some(max), Some(years)) = (criteria.experience_years_max, held) {
        if years > max {
            return 0.0;
        }
    }
    match criteria.experience_years_min {
        Some(required) => range_match(required, held, params),
        None if held.is_some() && criteria.experience_years_max.is_some() => 1.0,
        None => 0.0,
    }
}

fn location_matches(held: &str, required: &BTreeSet<String>) -> bool {
    let held = vocab::fold(held);
    required.iter().any(|r| {
        let r = vocab::fold(r);
        !r.is_empty() && held.contains(&r)
    })
}

fn holds_certificate(requirement: &CertRequirement, held: &[HeldCertification]) -> bool {
    held.iter().any(|cert| {
        let (name, rank) = vocab::resolve_held_cert(&cert.name, cert.level.as_deref());
        let name_ok = if requirement.name == GENERIC_TITLE {
            rank.is_some()
        } else {
            vocab::fold(&name) == vocab::fold(&requirement.name)
        };
        name_ok
            && requirement
                .level_min
                .map_or(true, |min| rank.is_some_and(|r| r >= min))
    })
}

/// Score of one evaluated dimension. Callers have already checked the requirement is present.
fn evaluate(dim: &Dimension, criteria: &SearchCriteria, candidate: &Candidate) -> f64 {
    let tags = &candidate.tags;
    match (&dim.logic, dim.field) {
        (Logic::RangeMatch(p), Field::Experience) => {
            experience_score(criteria, tags.min_experience_years, p)
        }
        (Logic::RangeMatch(p), Field::Degree) => match degree_floor(criteria) {
            Some(floor) => range_match(
                f64::from(floor.ordinal()),
                tags.degree.map(|d| f64::from(d.ordinal())),
                p,
            ),
            None => 0.0,
        },
        (Logic::ExactMatch(p), Field::Location) => exact_match(
            tags.location
                .as_deref()
                .is_some_and(|loc| location_matches(loc, &criteria.locations)),
            p,
        ),
        (Logic::ExactMatch(p), Field::Degree) => exact_match(
            tags.degree.is_some_and(|d| degree_satisfies(d, criteria)),
            p,
        ),
        (Logic::KeywordOverlap(p), Field::Skills) => {
            keyword_overlap(skill_overlap(&criteria.skills, &tags.skills_normalized), p)
        }
        (Logic::KeywordOverlap(p), Field::Positions) => {
            keyword_overlap(folded_overlap(&criteria.positions, &tags.positions), p)
        }
        (Logic::KeywordOverlap(p), Field::Companies) => {
            let matches = criteria
                .companies
                .iter()
                .filter(|wanted| {
                    tags.companies
                        .iter()
                        .any(|held| vocab::companies_match(wanted, held))
                })
                .count();
            keyword_overlap(matches, p)
        }
        (Logic::KeywordPresence(p), Field::Certifications) => {
            let held = criteria
                .certifications
                .iter()
                .filter(|req| holds_certificate(req, &tags.certifications))
                .count();
            keyword_presence(held, p)
        }
        // Rule validation rejects every other pairing.
        _ => 0.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

pub fn score(criteria: &SearchCriteria, candidate: &Candidate, rules: &RuleSet) -> ScoredCandidate {
    let mut dimension_scores = BTreeMap::new();
    let mut weighted = 0.0;
    let mut weights = 0.0;

    for dim in rules
        .enabled()
        .filter(|d| requirement_present(d.field, criteria))
    {
        let value = evaluate(dim, criteria, candidate);
        weighted += value * dim.weight;
        weights += dim.weight;
        dimension_scores.insert(dim.name.clone(), value);
    }

    ScoredCandidate {
        candidate_id: candidate.id,
        dimension_scores,
        total_score: if weights > 0.0 { weighted / weights } else { 0.0 },
    }
}

/// Scores a retrieved pool, preserving pool order.
///
/// An empty pool is a valid outcome. Fails with `InvalidRuleConfig` when no enabled dimension
/// with positive weight applies to the query, since every total would be undefined.
pub fn score_pool(
    criteria: &SearchCriteria,
    pool: &[Candidate],
    rules: &RuleSet,
) -> Result<Vec<ScoredCandidate>, AssistantError> {
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let evaluated_weight: f64 = rules
        .enabled()
        .filter(|d| requirement_present(d.field, criteria))
        .map(|d| d.weight)
        .sum();
    if evaluated_weight <= 0.0 {
        return Err(AssistantError::InvalidRuleConfig(format!(
            "no enabled dimension scores the requested criteria ({criteria})"
        )));
    }

    Ok(pool.iter().map(|c| score(criteria, c, rules)).collect())
}
