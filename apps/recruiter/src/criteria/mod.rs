//! Search criteria: the canonical, immutable form of one hiring query.
//!
//! Built once per query turn by [`normalizer::normalize`] from the loosely typed output of the
//! language-understanding step, consumed by retrieval and scoring, then dropped.

pub mod normalizer;
mod prompts;
pub mod understand;
pub mod vocab;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordinal degree scale: none < associate < bachelor < master < doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    None,
    Associate,
    Bachelor,
    Master,
    Doctor,
}

impl Degree {
    pub const ALL: [Degree; 5] = [
        Degree::None,
        Degree::Associate,
        Degree::Bachelor,
        Degree::Master,
        Degree::Doctor,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Name used in stored tags and JSON.
    pub fn key(self) -> &'static str {
        match self {
            Degree::None => "none",
            Degree::Associate => "associate",
            Degree::Bachelor => "bachelor",
            Degree::Master => "master",
            Degree::Doctor => "doctor",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Degree::None => "不限",
            Degree::Associate => "大专",
            Degree::Bachelor => "本科",
            Degree::Master => "硕士",
            Degree::Doctor => "博士",
        }
    }
}

/// One required certificate. `level_min` is a rank on the certificate family's ladder;
/// unleveled certificates always carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertRequirement {
    pub name: String,
    pub level_min: Option<u8>,
}

/// Which reading the normalizer picked for a token that names both a position and a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    Position,
    Certificate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub token: String,
    pub chosen: Interpretation,
}

/// Fixed precedence applied to position/certificate collisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPrecedence {
    #[default]
    PreferPosition,
    PreferCertificate,
}

impl AmbiguityPrecedence {
    pub fn interpretation(self) -> Interpretation {
        match self {
            AmbiguityPrecedence::PreferPosition => Interpretation::Position,
            AmbiguityPrecedence::PreferCertificate => Interpretation::Certificate,
        }
    }
}

impl FromStr for AmbiguityPrecedence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "prefer_position" => Ok(AmbiguityPrecedence::PreferPosition),
            "certificate" | "prefer_certificate" => Ok(AmbiguityPrecedence::PreferCertificate),
            other => Err(format!(
                "AMBIGUITY_PRECEDENCE must be 'position' or 'certificate', got '{other}'"
            )),
        }
    }
}

/// Canonical query. Sets are ordered so every derived artifact (SQL parameters, prompts,
/// scoring iteration) is deterministic for identical input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub positions: BTreeSet<String>,
    pub skills: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub degree_min: Option<Degree>,
    pub degree_exact: Option<BTreeSet<Degree>>,
    pub experience_years_min: Option<f64>,
    pub experience_years_max: Option<f64>,
    pub companies: BTreeSet<String>,
    pub certifications: Vec<CertRequirement>,
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl SearchCriteria {
    /// True when no field constrains the search. The normalizer never emits such a value.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
            && self.skills.is_empty()
            && self.locations.is_empty()
            && self.degree_min.is_none()
            && self.degree_exact.as_ref().map_or(true, |set| set.is_empty())
            && self.experience_years_min.is_none()
            && self.experience_years_max.is_none()
            && self.companies.is_empty()
            && self.certifications.is_empty()
    }

    /// Whether any indexed tag family can narrow retrieval. The generic title names no
    /// certificate, so it does not count.
    pub fn has_hard_filter(&self) -> bool {
        !self.positions.is_empty()
            || !self.locations.is_empty()
            || !self.skills.is_empty()
            || self
                .certifications
                .iter()
                .any(|c| c.name != vocab::GENERIC_TITLE)
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.positions.is_empty() {
            parts.push(format!("职位: {}", join(&self.positions)));
        }
        if !self.locations.is_empty() {
            parts.push(format!("地点: {}", join(&self.locations)));
        }
        match (self.experience_years_min, self.experience_years_max) {
            (Some(min), Some(max)) => parts.push(format!("经验: {min}-{max}年")),
            (Some(min), None) => parts.push(format!("经验: {min}年以上")),
            (None, Some(max)) => parts.push(format!("经验: {max}年以内")),
            (None, None) => {}
        }
        if let Some(min) = self.degree_min {
            parts.push(format!("学历: {}及以上", min.label()));
        } else if let Some(exact) = &self.degree_exact {
            let labels: Vec<&str> = exact.iter().map(|d| d.label()).collect();
            parts.push(format!("学历: {}", labels.join("/")));
        }
        if !self.skills.is_empty() {
            parts.push(format!("技能: {}", join(&self.skills)));
        }
        if !self.certifications.is_empty() {
            let certs: Vec<String> = self
                .certifications
                .iter()
                .map(|c| match c.level_min {
                    Some(level) => format!("{}(等级≥{level})", c.name),
                    None => c.name.clone(),
                })
                .collect();
            parts.push(format!("证书: {}", certs.join("、")));
        }
        if !self.companies.is_empty() {
            parts.push(format!("曾任职: {}", join(&self.companies)));
        }
        write!(f, "{}", parts.join("；"))
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join("、")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_scale_is_ordered() {
        assert!(Degree::None < Degree::Associate);
        assert!(Degree::Associate < Degree::Bachelor);
        assert!(Degree::Bachelor < Degree::Master);
        assert!(Degree::Master < Degree::Doctor);
        assert_eq!(Degree::Doctor.ordinal(), 4);
    }

    #[test]
    fn test_degree_key_matches_serialized_form() {
        for degree in Degree::ALL {
            assert_eq!(serde_json::to_value(degree).unwrap(), degree.key());
        }
    }

    #[test]
    fn test_default_criteria_is_empty() {
        assert!(SearchCriteria::default().is_empty());
    }

    #[test]
    fn test_experience_only_criteria_is_not_empty_but_has_no_hard_filter() {
        let criteria = SearchCriteria {
            experience_years_min: Some(3.0),
            ..Default::default()
        };
        assert!(!criteria.is_empty());
        assert!(!criteria.has_hard_filter());
    }

    #[test]
    fn test_precedence_parses_from_env_values() {
        assert_eq!(
            "certificate".parse::<AmbiguityPrecedence>().unwrap(),
            AmbiguityPrecedence::PreferCertificate
        );
        assert_eq!(
            "Position".parse::<AmbiguityPrecedence>().unwrap(),
            AmbiguityPrecedence::PreferPosition
        );
        assert!("either".parse::<AmbiguityPrecedence>().is_err());
    }

    #[test]
    fn test_display_summarizes_requirements() {
        let criteria = SearchCriteria {
            positions: ["电气工程师".to_string()].into_iter().collect(),
            experience_years_min: Some(5.0),
            degree_min: Some(Degree::Bachelor),
            ..Default::default()
        };
        let text = criteria.to_string();
        assert!(text.contains("职位: 电气工程师"));
        assert!(text.contains("经验: 5年以上"));
        assert!(text.contains("本科及以上"));
    }
}
