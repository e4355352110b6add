//! Declarative scoring rules: an ordered list of dimensions, each a typed logic kind with its
//! parameter struct. Rules are validated when loaded, never on first use.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::AssistantError;

const BUILTIN_RULES: &str = include_str!("../../config/scoring_rules.toml");

/// Candidate/criteria attribute a dimension reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Experience,
    Skills,
    Positions,
    Location,
    Degree,
    Certifications,
    Companies,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default)]
    pub decay_rate: f64,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default)]
    pub bonus_rate: f64,
    #[serde(default = "one")]
    pub max_score_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapParams {
    #[serde(default = "one")]
    pub score_per_match: f64,
    #[serde(default)]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactParams {
    #[serde(default = "one")]
    pub match_score: f64,
    #[serde(default)]
    pub mismatch_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceParams {
    #[serde(default = "one")]
    pub score_per_match: f64,
    #[serde(default = "one")]
    pub max_score: f64,
}

fn one() -> f64 {
    1.0
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Logic {
    RangeMatch(RangeParams),
    KeywordOverlap(OverlapParams),
    ExactMatch(ExactParams),
    KeywordPresence(PresenceParams),
}

impl Logic {
    pub fn kind(&self) -> &'static str {
        match self {
            Logic::RangeMatch(_) => "range_match",
            Logic::KeywordOverlap(_) => "keyword_overlap",
            Logic::ExactMatch(_) => "exact_match",
            Logic::KeywordPresence(_) => "keyword_presence",
        }
    }

    fn supports(&self, field: Field) -> bool {
        matches!(
            (self, field),
            (Logic::RangeMatch(_), Field::Experience | Field::Degree)
                | (Logic::ExactMatch(_), Field::Location | Field::Degree)
                | (
                    Logic::KeywordOverlap(_),
                    Field::Skills | Field::Positions | Field::Companies
                )
                | (Logic::KeywordPresence(_), Field::Certifications)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub field: Field,
    pub weight: f64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub logic: Logic,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    dimensions: Vec<Dimension>,
}

/// A validated, ordered dimension table.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    dimensions: Vec<Dimension>,
}

fn invalid(message: impl Into<String>) -> AssistantError {
    AssistantError::InvalidRuleConfig(message.into())
}

impl RuleSet {
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, AssistantError> {
        validate(&dimensions)?;
        Ok(Self { dimensions })
    }

    /// The rules shipped in `config/scoring_rules.toml`.
    pub fn builtin() -> Result<Self, AssistantError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AssistantError> {
        let file: RuleFile =
            toml::from_str(raw).map_err(|e| invalid(format!("cannot parse rules: {e}")))?;
        Self::new(file.dimensions)
    }

    pub fn load(path: &Path) -> Result<Self, AssistantError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter().filter(|d| d.enabled)
    }
}

fn validate(dimensions: &[Dimension]) -> Result<(), AssistantError> {
    if dimensions.is_empty() {
        return Err(invalid("at least one dimension is required"));
    }

    let mut names = HashSet::new();
    for dim in dimensions {
        let name = dim.name.trim();
        if name.is_empty() {
            return Err(invalid("dimension name must not be empty"));
        }
        if !names.insert(name) {
            return Err(invalid(format!("duplicate dimension '{name}'")));
        }
        if !dim.weight.is_finite() || dim.weight < 0.0 {
            return Err(invalid(format!(
                "dimension '{name}': weight must be a finite non-negative number"
            )));
        }
        if !dim.logic.supports(dim.field) {
            return Err(invalid(format!(
                "dimension '{name}': {} cannot score field {:?}",
                dim.logic.kind(),
                dim.field
            )));
        }
        validate_params(name, &dim.logic)?;
    }

    let enabled_weight: f64 = dimensions.iter().filter(|d| d.enabled).map(|d| d.weight).sum();
    if enabled_weight <= 0.0 {
        return Err(invalid("enabled dimension weights sum to zero"));
    }
    Ok(())
}

fn validate_params(name: &str, logic: &Logic) -> Result<(), AssistantError> {
    let check = |ok: bool, what: &str| {
        if ok {
            Ok(())
        } else {
            Err(invalid(format!("dimension '{name}': {what}")))
        }
    };
    match logic {
        Logic::RangeMatch(p) => {
            check(p.tolerance.is_finite() && p.tolerance >= 0.0, "tolerance must be >= 0")?;
            check(p.decay_rate.is_finite() && p.decay_rate >= 0.0, "decay_rate must be >= 0")?;
            check(p.bonus_rate.is_finite() && p.bonus_rate >= 0.0, "bonus_rate must be >= 0")?;
            check((0.0..=1.0).contains(&p.min_score), "min_score must be within [0, 1]")?;
            check(
                p.max_score_factor.is_finite() && p.max_score_factor >= 1.0,
                "max_score_factor must be >= 1",
            )
        }
        Logic::KeywordOverlap(p) => {
            check(
                p.score_per_match.is_finite() && p.score_per_match > 0.0,
                "score_per_match must be > 0",
            )?;
            check(
                p.max_score.map_or(true, |m| m.is_finite() && m > 0.0),
                "max_score must be > 0",
            )
        }
        Logic::ExactMatch(p) => check(
            p.match_score.is_finite()
                && p.mismatch_score.is_finite()
                && p.match_score >= 0.0
                && p.mismatch_score >= 0.0,
            "match_score and mismatch_score must be finite and non-negative",
        ),
        Logic::KeywordPresence(p) => {
            check(
                p.score_per_match.is_finite() && p.score_per_match > 0.0,
                "score_per_match must be > 0",
            )?;
            check(p.max_score.is_finite() && p.max_score > 0.0, "max_score must be > 0")
        }
    }
}
