use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::criteria::Degree;

/// A certificate as deposited by the ingestion pipeline. `level` is the ladder keyword
/// ("中级", "一级") when the title is not already spelled out in `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldCertification {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Indexed tag fields the ranking engine reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTags {
    #[serde(default)]
    pub positions: Vec<String>,
    #[serde(default)]
    pub skills_normalized: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_experience_years: Option<f64>,
    #[serde(default)]
    pub degree: Option<Degree>,
    #[serde(default)]
    pub certifications: Vec<HeldCertification>,
    #[serde(default)]
    pub companies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Read-only candidate view. The core never mutates candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    pub tags: CandidateTags,
    pub resume_path: Option<String>,
    pub contact_info: ContactInfo,
}

#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub tags: Json<CandidateTags>,
    pub resume_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            id: row.id,
            name: row.name,
            tags: row.tags.0,
            resume_path: row.resume_path,
            contact_info: ContactInfo {
                phone: Some(row.phone).filter(|p| !p.is_empty()),
                email: row.email,
            },
        }
    }
}

/// Record submitted by the ingestion pipeline. Upserts are keyed on `(name, phone)`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tags: CandidateTags,
    #[serde(default)]
    pub resume_path: Option<String>,
}

impl NewCandidate {
    /// Trims text fields and lowercases skills so retrieval can match them exactly.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if let Some(years) = self.tags.min_experience_years {
            if !years.is_finite() || years < 0.0 {
                return Err(format!("min_experience_years must be non-negative, got {years}"));
            }
        }
        self.phone = self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        self.tags.skills_normalized = self
            .tags
            .skills_normalized
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self.tags.positions.retain(|p| !p.trim().is_empty());
        Ok(self)
    }
}

/// What a conversation keeps per ranked candidate so pages render without another store query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateCard {
    pub id: Uuid,
    pub name: String,
    pub score: f64,
    pub experience_years: Option<f64>,
    pub certifications: Vec<String>,
    pub resume_path: Option<String>,
}

impl CandidateCard {
    pub fn new(candidate: &Candidate, score: f64) -> Self {
        CandidateCard {
            id: candidate.id,
            name: candidate.name.clone(),
            score,
            experience_years: candidate.tags.min_experience_years,
            certifications: candidate
                .tags
                .certifications
                .iter()
                .map(|c| match &c.level {
                    Some(level) if !c.name.starts_with(level.as_str()) => {
                        format!("{level}{}", c.name)
                    }
                    _ => c.name.clone(),
                })
                .collect(),
            resume_path: candidate.resume_path.clone(),
        }
    }
}
