//! Raw structured query → [`SearchCriteria`].
//!
//! The language-understanding step returns loosely typed JSON: single strings where lists are
//! expected, free-text qualifiers ("本科及以上", "5年以上"), certificate objects with level
//! keywords. Normalization is a pure function of that JSON, the configured ambiguity precedence,
//! and the static tables in [`super::vocab`].

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::debug;

use super::vocab::{self, Bound, GENERIC_TITLE};
use super::{
    AmbiguityPrecedence, CertRequirement, Degree, Interpretation, Resolution, SearchCriteria,
};
use crate::errors::AssistantError;

const LIST_SEPARATORS: &[char] = &[',', '，', '、', ';', '；'];
const RANGE_SEPARATORS: &[char] = &['-', '~', '～', '到', '至'];
const NULL_WORDS: &[&str] = &["", "不限", "无", "null", "none", "n/a", "任意"];

const RECOGNIZED_KEYS: &[&str] = &[
    "position",
    "positions",
    "location",
    "locations",
    "skills",
    "skill",
    "previous_companies",
    "companies",
    "company",
    "experience_years",
    "experience_years_min",
    "experience_years_max",
    "degree",
    "degree_min",
    "education",
    "education_levels",
    "certifications",
    "certificates",
];

type Result<T> = std::result::Result<T, AssistantError>;

fn ambiguous(reason: impl Into<String>) -> AssistantError {
    AssistantError::AmbiguousQuery {
        reason: reason.into(),
    }
}

/// Normalizes one raw structured query.
///
/// Fails with `EmptyQuery` when the model recognized nothing (an empty object or no known keys),
/// and with `AmbiguousQuery` when values are present but unusable or contradictory.
pub fn normalize(raw: &Value, precedence: AmbiguityPrecedence) -> Result<SearchCriteria> {
    let Some(fields) = raw.as_object() else {
        return Err(AssistantError::EmptyQuery);
    };
    let mentioned = RECOGNIZED_KEYS
        .iter()
        .any(|key| fields.get(*key).is_some_and(|v| !v.is_null()));
    if !mentioned {
        return Err(AssistantError::EmptyQuery);
    }

    let mut criteria = SearchCriteria {
        positions: text_list(fields, &["position", "positions"]).into_iter().collect(),
        locations: text_list(fields, &["location", "locations"]).into_iter().collect(),
        skills: text_list(fields, &["skills", "skill"])
            .iter()
            .map(|skill| skill.trim().to_lowercase())
            .collect(),
        companies: text_list(fields, &["previous_companies", "companies", "company"])
            .into_iter()
            .collect(),
        ..Default::default()
    };

    resolve_experience(fields, &mut criteria)?;
    resolve_degree(fields, &mut criteria)?;
    criteria.certifications = resolve_certifications(fields)?;
    resolve_ambiguity(&mut criteria, precedence);

    if criteria.is_empty() {
        return Err(ambiguous("未包含有效的筛选条件"));
    }

    debug!(criteria = %criteria, resolutions = criteria.resolutions.len(), "Query normalized");
    Ok(criteria)
}

// ── Lists ───────────────────────────────────────────────────────────────────

fn is_null_word(token: &str) -> bool {
    let folded = vocab::fold(token);
    NULL_WORDS.iter().any(|w| *w == folded)
}

fn split_tokens(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(LIST_SEPARATORS)
        .map(str::trim)
        .filter(|t| !is_null_word(t))
        .map(String::from)
}

/// Collects string tokens from every listed key, accepting a single string or an array.
fn text_list(fields: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let mut tokens = Vec::new();
    for key in keys {
        match fields.get(*key) {
            Some(Value::String(s)) => tokens.extend(split_tokens(s)),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        tokens.extend(split_tokens(s));
                    }
                }
            }
            _ => {}
        }
    }
    tokens
}

// ── Experience ──────────────────────────────────────────────────────────────

fn parse_years(raw: &str) -> Result<f64> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits
        .parse::<f64>()
        .map_err(|_| ambiguous(format!("无法识别的工作年限：{raw}")))
}

/// Parses an experience value into `(min, max)` bounds. `default_upper` tells whether a bare
/// number is an upper bound (the `_max` key) or a lower bound.
fn experience_bounds(value: &Value, default_upper: bool) -> Result<(Option<f64>, Option<f64>)> {
    let text = match value {
        Value::Null => return Ok((None, None)),
        Value::Number(n) => {
            let years = n
                .as_f64()
                .ok_or_else(|| ambiguous("无法识别的工作年限"))?;
            return Ok(if default_upper {
                (None, Some(years))
            } else {
                (Some(years), None)
            });
        }
        Value::String(s) if is_null_word(s) => return Ok((None, None)),
        Value::String(s) => s.trim(),
        other => return Err(ambiguous(format!("无法识别的工作年限：{other}"))),
    };

    if let Some(idx) = text.find(RANGE_SEPARATORS).filter(|idx| *idx > 0) {
        let (low, high) = text.split_at(idx);
        let high = high.trim_start_matches(RANGE_SEPARATORS);
        return Ok((Some(parse_years(low)?), Some(parse_years(high)?)));
    }

    let (core, bound) = vocab::split_bound(text);
    let years = parse_years(core)?;
    Ok(match bound {
        Bound::AtLeast => (Some(years), None),
        Bound::AtMost => (None, Some(years)),
        Bound::Exact if default_upper => (None, Some(years)),
        Bound::Exact => (Some(years), None),
    })
}

fn resolve_experience(fields: &Map<String, Value>, criteria: &mut SearchCriteria) -> Result<()> {
    let mut min = None;
    let mut max = None;
    for (key, upper) in [
        ("experience_years", false),
        ("experience_years_min", false),
        ("experience_years_max", true),
    ] {
        if let Some(value) = fields.get(key) {
            let (lo, hi) = experience_bounds(value, upper)?;
            min = lo.or(min);
            max = hi.or(max);
        }
    }

    for years in [min, max].into_iter().flatten() {
        if !years.is_finite() || years < 0.0 {
            return Err(ambiguous("工作年限必须是非负数"));
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if hi < lo {
            return Err(ambiguous(format!("工作年限上限 {hi} 低于下限 {lo}")));
        }
    }

    criteria.experience_years_min = min;
    criteria.experience_years_max = max;
    Ok(())
}

// ── Degree ──────────────────────────────────────────────────────────────────

enum DegreeRequirement {
    AtLeast(Degree),
    OneOf(BTreeSet<Degree>),
}

fn degree_token(raw: &str) -> Result<(Degree, Bound)> {
    let (core, bound) = vocab::split_bound(raw);
    vocab::degree_from_token(core)
        .map(|degree| (degree, bound))
        .ok_or_else(|| ambiguous(format!("无法识别的学历要求：{raw}")))
}

fn at_most(degree: Degree) -> BTreeSet<Degree> {
    Degree::ALL
        .into_iter()
        .filter(|d| *d != Degree::None && *d <= degree)
        .collect()
}

/// A single token follows its qualifier; a list spanning X..=doctor is "at least X".
fn degree_requirement(tokens: &[String]) -> Result<Option<DegreeRequirement>> {
    let parsed = tokens
        .iter()
        .map(|t| degree_token(t))
        .collect::<Result<Vec<_>>>()?;
    let parsed: Vec<(Degree, Bound)> = parsed
        .into_iter()
        .filter(|(degree, _)| *degree != Degree::None)
        .collect();

    match parsed.as_slice() {
        [] => Ok(None),
        [(degree, Bound::AtLeast)] => Ok(Some(DegreeRequirement::AtLeast(*degree))),
        [(degree, Bound::AtMost)] => Ok(Some(DegreeRequirement::OneOf(at_most(*degree)))),
        _ => {
            let set: BTreeSet<Degree> = parsed.iter().map(|(degree, _)| *degree).collect();
            let lowest = *set.iter().next().unwrap_or(&Degree::Doctor);
            let tail: BTreeSet<Degree> =
                Degree::ALL.into_iter().filter(|d| *d >= lowest).collect();
            if set.len() > 1 && set == tail {
                Ok(Some(DegreeRequirement::AtLeast(lowest)))
            } else {
                Ok(Some(DegreeRequirement::OneOf(set)))
            }
        }
    }
}

fn resolve_degree(fields: &Map<String, Value>, criteria: &mut SearchCriteria) -> Result<()> {
    let mut min: Option<Degree> = None;
    let mut exact: Option<BTreeSet<Degree>> = None;

    if let Some(Value::String(raw)) = fields.get("degree_min") {
        if !is_null_word(raw) {
            let (core, _) = vocab::split_bound(raw);
            let (degree, _) = degree_token(core)?;
            if degree != Degree::None {
                min = Some(degree);
            }
        }
    }

    for key in ["education", "degree", "education_levels"] {
        let tokens = text_list(fields, &[key]);
        match degree_requirement(&tokens)? {
            Some(DegreeRequirement::AtLeast(degree)) => {
                min = Some(min.map_or(degree, |current| current.max(degree)));
            }
            Some(DegreeRequirement::OneOf(set)) => {
                exact.get_or_insert_with(BTreeSet::new).extend(set);
            }
            None => {}
        }
    }

    match (min, exact) {
        (Some(floor), Some(set)) => {
            let kept: BTreeSet<Degree> = set.into_iter().filter(|d| *d >= floor).collect();
            if kept.is_empty() {
                return Err(ambiguous("学历要求相互矛盾"));
            }
            criteria.degree_exact = Some(kept);
        }
        (min, exact) => {
            criteria.degree_min = min;
            criteria.degree_exact = exact;
        }
    }
    Ok(())
}

// ── Certifications ──────────────────────────────────────────────────────────

fn apply_modifier(rank: Option<u8>, modifier: Option<&str>) -> Option<u8> {
    match modifier.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        Some("gt") => rank.map(|r| r.saturating_add(1)),
        Some("lt") | Some("le") => None,
        _ => rank,
    }
}

fn cert_from_object(object: &Map<String, Value>) -> Option<CertRequirement> {
    let name = object.get("name").and_then(Value::as_str).unwrap_or("").trim();
    let keyword = object.get("level_keyword").and_then(Value::as_str);
    let modifier = object.get("modifier").and_then(Value::as_str);

    if name.is_empty() || name == GENERIC_TITLE {
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty())?;
        let (_, rank) = vocab::resolve_cert(GENERIC_TITLE, Some(keyword));
        return Some(CertRequirement {
            name: GENERIC_TITLE.to_string(),
            level_min: apply_modifier(rank, modifier),
        });
    }

    let (core, bound) = vocab::split_bound(name);
    let modifier = match bound {
        Bound::AtLeast if modifier.is_none() => Some("ge"),
        _ => modifier,
    };
    let (family, rank) = vocab::resolve_cert(core, keyword);
    Some(CertRequirement {
        name: family,
        level_min: apply_modifier(rank, modifier),
    })
}

fn cert_from_text(raw: &str) -> CertRequirement {
    let (core, _) = vocab::split_bound(raw);
    let (family, rank) = vocab::resolve_cert(core, None);
    CertRequirement {
        name: family,
        level_min: rank,
    }
}

fn resolve_certifications(fields: &Map<String, Value>) -> Result<Vec<CertRequirement>> {
    let mut certs = BTreeSet::new();
    for key in ["certifications", "certificates"] {
        match fields.get(key) {
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::Object(object) => certs.extend(cert_from_object(object)),
                        Value::String(s) => certs.extend(split_tokens(s).map(|t| cert_from_text(&t))),
                        Value::Null => {}
                        other => {
                            return Err(ambiguous(format!("无法识别的证书要求：{other}")));
                        }
                    }
                }
            }
            Some(Value::String(s)) => certs.extend(split_tokens(s).map(|t| cert_from_text(&t))),
            _ => {}
        }
    }
    Ok(certs.into_iter().collect())
}

// ── Position / certificate ambiguity ────────────────────────────────────────

/// Applies the fixed precedence to every token that names both a position and a certificate.
/// Leveled requirements are never ambiguous: the level marks them as titles.
fn resolve_ambiguity(criteria: &mut SearchCriteria, precedence: AmbiguityPrecedence) {
    let chosen = precedence.interpretation();
    let mut decisions: BTreeMap<String, Interpretation> = BTreeMap::new();

    let ambiguous_positions: Vec<String> = criteria
        .positions
        .iter()
        .filter(|p| vocab::is_ambiguous_token(p))
        .cloned()
        .collect();
    let ambiguous_certs: Vec<String> = criteria
        .certifications
        .iter()
        .filter(|c| c.level_min.is_none() && vocab::is_ambiguous_token(&c.name))
        .map(|c| c.name.clone())
        .collect();

    for token in ambiguous_positions.into_iter().chain(ambiguous_certs) {
        decisions.insert(token, chosen);
    }
    if decisions.is_empty() {
        return;
    }

    match chosen {
        Interpretation::Position => {
            criteria
                .certifications
                .retain(|c| !(c.level_min.is_none() && decisions.contains_key(&c.name)));
            criteria.positions.extend(decisions.keys().cloned());
        }
        Interpretation::Certificate => {
            criteria.positions.retain(|p| !decisions.contains_key(p));
            let mut certs: BTreeSet<CertRequirement> =
                criteria.certifications.drain(..).collect();
            certs.extend(decisions.keys().map(|token| CertRequirement {
                name: token.clone(),
                level_min: None,
            }));
            criteria.certifications = certs.into_iter().collect();
        }
    }

    criteria.resolutions = decisions
        .into_iter()
        .map(|(token, chosen)| Resolution { token, chosen })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(raw: Value) -> Result<SearchCriteria> {
        normalize(&raw, AmbiguityPrecedence::PreferPosition)
    }

    #[test]
    fn test_at_least_qualifier_sets_degree_min() {
        let criteria = norm(json!({ "education": "学士及以上" })).unwrap();
        assert_eq!(criteria.degree_min, Some(Degree::Bachelor));
        assert_eq!(criteria.degree_exact, None);
    }

    #[test]
    fn test_bare_degree_sets_exact() {
        let criteria = norm(json!({ "education": "研究生" })).unwrap();
        assert_eq!(criteria.degree_min, None);
        assert_eq!(
            criteria.degree_exact,
            Some([Degree::Master].into_iter().collect())
        );
    }

    #[test]
    fn test_degree_list_up_to_doctor_means_at_least() {
        let criteria = norm(json!({ "education_levels": ["本科", "硕士", "博士"] })).unwrap();
        assert_eq!(criteria.degree_min, Some(Degree::Bachelor));

        let criteria = norm(json!({ "education_levels": ["本科", "博士"] })).unwrap();
        assert_eq!(criteria.degree_min, None);
        assert_eq!(criteria.degree_exact.map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_unknown_degree_is_ambiguous() {
        let err = norm(json!({ "education": "小学" })).unwrap_err();
        assert!(matches!(err, AssistantError::AmbiguousQuery { .. }));
    }

    #[test]
    fn test_certificate_levels_use_ladders_and_modifiers() {
        let criteria = norm(json!({
            "certifications": [
                { "name": "工程师", "level_keyword": "中级", "modifier": "ge" },
                { "name": "一级建造师及以上" },
                { "name": "PMP", "level_keyword": null, "modifier": "eq" }
            ]
        }))
        .unwrap();
        assert!(criteria.certifications.contains(&CertRequirement {
            name: "工程师".to_string(),
            level_min: Some(2)
        }));
        assert!(criteria.certifications.contains(&CertRequirement {
            name: "建造师".to_string(),
            level_min: Some(2)
        }));
        assert!(criteria.certifications.contains(&CertRequirement {
            name: "PMP".to_string(),
            level_min: None
        }));

        let strict = norm(json!({
            "certifications": [{ "name": "工程师", "level_keyword": "中级", "modifier": "gt" }]
        }))
        .unwrap();
        assert_eq!(strict.certifications[0].level_min, Some(3));
    }

    #[test]
    fn test_generic_title_query_keeps_level() {
        let criteria = norm(json!({
            "certifications": [{ "name": "职称", "level_keyword": "高级", "modifier": "ge" }]
        }))
        .unwrap();
        assert_eq!(
            criteria.certifications,
            vec![CertRequirement {
                name: GENERIC_TITLE.to_string(),
                level_min: Some(3)
            }]
        );
    }

    #[test]
    fn test_ambiguous_token_follows_precedence_and_is_recorded() {
        let raw = json!({ "position": "造价工程师", "location": "上海" });

        let as_position = normalize(&raw, AmbiguityPrecedence::PreferPosition).unwrap();
        assert!(as_position.positions.contains("造价工程师"));
        assert!(as_position.certifications.is_empty());
        assert_eq!(
            as_position.resolutions,
            vec![Resolution {
                token: "造价工程师".to_string(),
                chosen: Interpretation::Position
            }]
        );

        let as_cert = normalize(&raw, AmbiguityPrecedence::PreferCertificate).unwrap();
        assert!(as_cert.positions.is_empty());
        assert_eq!(as_cert.certifications[0].name, "造价工程师");
        assert_eq!(as_cert.resolutions[0].chosen, Interpretation::Certificate);

        let again = normalize(&raw, AmbiguityPrecedence::PreferCertificate).unwrap();
        assert_eq!(as_cert, again);
    }

    #[test]
    fn test_leveled_certificate_is_not_ambiguous() {
        let criteria = norm(json!({ "certifications": ["高级工程师"] })).unwrap();
        assert!(criteria.positions.is_empty());
        assert!(criteria.resolutions.is_empty());
        assert_eq!(criteria.certifications[0].level_min, Some(3));
    }

    #[test]
    fn test_companies_are_kept_verbatim() {
        let criteria = norm(json!({ "previous_companies": ["中建三局集团有限公司"] })).unwrap();
        assert!(criteria.companies.contains("中建三局集团有限公司"));
    }

    #[test]
    fn test_experience_qualifiers_and_ranges() {
        let criteria = norm(json!({ "experience_years_min": "5年以上" })).unwrap();
        assert_eq!(criteria.experience_years_min, Some(5.0));

        let criteria = norm(json!({ "experience_years": "3-5年" })).unwrap();
        assert_eq!(criteria.experience_years_min, Some(3.0));
        assert_eq!(criteria.experience_years_max, Some(5.0));

        let err = norm(json!({ "experience_years_min": 8, "experience_years_max": 3 })).unwrap_err();
        assert!(matches!(err, AssistantError::AmbiguousQuery { .. }));

        let err = norm(json!({ "experience_years_min": "几年" })).unwrap_err();
        assert!(matches!(err, AssistantError::AmbiguousQuery { .. }));
    }

    #[test]
    fn test_skills_are_lowercased_but_not_expanded() {
        let criteria = norm(json!({ "skills": "AutoCAD， Revit" })).unwrap();
        assert_eq!(
            criteria.skills,
            ["autocad", "revit"].into_iter().map(String::from).collect()
        );
    }

    #[test]
    fn test_level_keyword_on_unleveled_certificate_is_dropped() {
        let criteria = norm(json!({
            "certifications": [{ "name": "PMP", "level_keyword": "高级", "modifier": "ge" }]
        }))
        .unwrap();
        assert_eq!(
            criteria.certifications,
            vec![CertRequirement {
                name: "PMP".to_string(),
                level_min: None
            }]
        );
    }

    #[test]
    fn test_experience_ceiling_alone_is_kept() {
        let criteria = norm(json!({ "experience_years": "5年以内" })).unwrap();
        assert_eq!(criteria.experience_years_min, None);
        assert_eq!(criteria.experience_years_max, Some(5.0));
    }

    #[test]
    fn test_empty_inputs_fail() {
        assert!(matches!(norm(json!({})), Err(AssistantError::EmptyQuery)));
        assert!(matches!(norm(json!("hello")), Err(AssistantError::EmptyQuery)));
        assert!(matches!(
            norm(json!({ "position": null, "skills": [] })),
            Err(AssistantError::AmbiguousQuery { .. })
        ));
        assert!(matches!(
            norm(json!({ "education": "不限" })),
            Err(AssistantError::AmbiguousQuery { .. })
        ));
    }
}
