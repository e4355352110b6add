//! Static vocabulary shared by the normalizer and the scoring engine: degree synonyms, certificate
//! rank ladders, known position/certificate names, skill synonym groups, and company-name folding.

use super::Degree;

/// Name used by queries such as "中级以上职称": any leveled professional title.
pub const GENERIC_TITLE: &str = "职称";

/// How a qualifier bounds the value it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    AtLeast,
    AtMost,
    Exact,
}

const AT_LEAST_SUFFIXES: &[&str] = &["及以上", "或以上", "以上", "起", "+"];
const AT_LEAST_PREFIXES: &[&str] = &["至少", "不低于", "最低", "最少"];
const AT_MOST_SUFFIXES: &[&str] = &["及以下", "或以下", "以下", "以内"];
const AT_MOST_PREFIXES: &[&str] = &["最多", "不超过", "不高于"];

/// Splits a qualifier such as "本科及以上" or "至少5年" into its core text and bound.
pub fn split_bound(raw: &str) -> (&str, Bound) {
    let text = raw.trim();
    for suffix in AT_LEAST_SUFFIXES {
        if let Some(core) = text.strip_suffix(suffix) {
            return (core.trim(), Bound::AtLeast);
        }
    }
    for suffix in AT_MOST_SUFFIXES {
        if let Some(core) = text.strip_suffix(suffix) {
            return (core.trim(), Bound::AtMost);
        }
    }
    for prefix in AT_LEAST_PREFIXES {
        if let Some(core) = text.strip_prefix(prefix) {
            return (core.trim(), Bound::AtLeast);
        }
    }
    for prefix in AT_MOST_PREFIXES {
        if let Some(core) = text.strip_prefix(prefix) {
            return (core.trim(), Bound::AtMost);
        }
    }
    (text, Bound::Exact)
}

/// Case-folds and removes whitespace so "Java 开发" and "java开发" compare equal.
pub fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Degrees ─────────────────────────────────────────────────────────────────

const DEGREE_SYNONYMS: &[(&str, Degree)] = &[
    ("不限", Degree::None),
    ("学历不限", Degree::None),
    ("无要求", Degree::None),
    ("无", Degree::None),
    ("none", Degree::None),
    ("大专", Degree::Associate),
    ("专科", Degree::Associate),
    ("大学专科", Degree::Associate),
    ("高职", Degree::Associate),
    ("associate", Degree::Associate),
    ("本科", Degree::Bachelor),
    ("学士", Degree::Bachelor),
    ("大学本科", Degree::Bachelor),
    ("统招本科", Degree::Bachelor),
    ("学士学位", Degree::Bachelor),
    ("bachelor", Degree::Bachelor),
    ("硕士", Degree::Master),
    ("研究生", Degree::Master),
    ("硕士研究生", Degree::Master),
    ("硕士学位", Degree::Master),
    ("master", Degree::Master),
    ("mba", Degree::Master),
    ("博士", Degree::Doctor),
    ("博士研究生", Degree::Doctor),
    ("博士学位", Degree::Doctor),
    ("phd", Degree::Doctor),
    ("doctor", Degree::Doctor),
];

/// Maps one degree word to the ordinal scale. Unknown words yield `None`.
pub fn degree_from_token(raw: &str) -> Option<Degree> {
    let folded = fold(raw);
    DEGREE_SYNONYMS
        .iter()
        .find(|(word, _)| *word == folded)
        .map(|(_, degree)| *degree)
}

// ── Certificates ────────────────────────────────────────────────────────────

struct CertFamily {
    name: &'static str,
    /// Full leveled titles, longest first so prefix-free lookups stay unambiguous.
    titles: &'static [(&'static str, u8)],
    keywords: &'static [(&'static str, u8)],
    /// Rank implied when a candidate lists the bare family name.
    base_rank: Option<u8>,
}

const TITLE_KEYWORDS: &[(&str, u8)] = &[
    ("教授级高级", 4),
    ("正高级", 4),
    ("高级", 3),
    ("中级", 2),
    ("助理", 1),
    ("初级", 1),
];

const CERT_FAMILIES: &[CertFamily] = &[
    CertFamily {
        name: "建筑师",
        titles: &[
            ("教授级高级建筑师", 4),
            ("高级建筑师", 3),
            ("中级建筑师", 2),
            ("助理建筑师", 1),
        ],
        keywords: TITLE_KEYWORDS,
        base_rank: None,
    },
    CertFamily {
        name: "建造师",
        titles: &[
            ("一级注册建造师", 2),
            ("二级注册建造师", 1),
            ("一级建造师", 2),
            ("二级建造师", 1),
        ],
        keywords: &[("一级", 2), ("二级", 1)],
        base_rank: None,
    },
    CertFamily {
        name: "工程师",
        titles: &[
            ("教授级高级工程师", 4),
            ("高级工程师", 3),
            ("中级工程师", 2),
            ("助理工程师", 1),
        ],
        keywords: TITLE_KEYWORDS,
        base_rank: Some(2),
    },
];

/// Ladders for certificates outside the known families.
const GENERIC_LEVELS: &[(&str, u8)] = &[
    ("教授级高级", 4),
    ("正高级", 4),
    ("高级", 3),
    ("中级", 2),
    ("助理", 1),
    ("初级", 1),
    ("一级", 3),
    ("二级", 2),
    ("三级", 1),
];

fn family(name: &str) -> Option<&'static CertFamily> {
    CERT_FAMILIES.iter().find(|f| f.name == name)
}

fn family_name(raw: &str) -> &str {
    let name = raw.trim();
    match name.strip_prefix("注册") {
        Some(rest) if family(rest).is_some() => rest,
        _ => name,
    }
}

fn generic_rank(keyword: &str) -> Option<u8> {
    GENERIC_LEVELS
        .iter()
        .find(|(word, _)| *word == keyword)
        .map(|(_, rank)| *rank)
}

/// Rank of a level keyword on the certificate's ladder. Names outside the known families only
/// have a ladder when the level is spelled into the name ("一级造价工程师") or the name is the
/// generic title; any other certificate is unleveled and the keyword is dropped.
fn keyword_rank(family_name: &str, keyword: &str, prefixed: bool) -> Option<u8> {
    match family(family_name) {
        Some(f) => f
            .keywords
            .iter()
            .find(|(word, _)| *word == keyword)
            .map(|(_, rank)| *rank)
            .or_else(|| generic_rank(keyword)),
        None if prefixed || family_name == GENERIC_TITLE => generic_rank(keyword),
        None => None,
    }
}

fn split_level_prefix(title: &str) -> Option<(&'static str, &str)> {
    GENERIC_LEVELS.iter().find_map(|(keyword, _)| {
        title
            .strip_prefix(keyword)
            .filter(|rest| !rest.is_empty())
            .map(|rest| (*keyword, rest))
    })
}

/// Resolves a required certificate mention into its family name and ladder rank.
///
/// "中级工程师" and ("工程师", "中级") both resolve to `("工程师", Some(2))`; a bare family name or an
/// unleveled certificate resolves to no rank.
pub fn resolve_cert(raw_name: &str, level_keyword: Option<&str>) -> (String, Option<u8>) {
    let name = raw_name.trim();
    let keyword = level_keyword.map(str::trim).filter(|k| !k.is_empty());

    if let Some(keyword) = keyword {
        let stripped = name.strip_prefix(keyword).filter(|rest| !rest.is_empty());
        let base = family_name(stripped.unwrap_or(name));
        return (base.to_string(), keyword_rank(base, keyword, stripped.is_some()));
    }

    for family in CERT_FAMILIES {
        if let Some((_, rank)) = family.titles.iter().find(|(title, _)| *title == name) {
            return (family.name.to_string(), Some(*rank));
        }
    }

    match split_level_prefix(name) {
        Some((keyword, rest)) => {
            let base = family_name(rest);
            (base.to_string(), keyword_rank(base, keyword, true))
        }
        None => (family_name(name).to_string(), None),
    }
}

/// Like [`resolve_cert`] but for certificates a candidate holds: a bare family name with an
/// implied rank (a plain "工程师" title) carries that rank.
pub fn resolve_held_cert(raw_name: &str, level: Option<&str>) -> (String, Option<u8>) {
    let (name, rank) = resolve_cert(raw_name, level);
    let rank = rank.or_else(|| family(&name).and_then(|f| f.base_rank));
    (name, rank)
}

// ── Positions vs certificates ───────────────────────────────────────────────

const KNOWN_POSITIONS: &[&str] = &[
    "工程师",
    "建筑师",
    "设计师",
    "项目经理",
    "施工员",
    "安全员",
    "资料员",
    "造价工程师",
    "监理工程师",
    "电气工程师",
    "结构工程师",
    "给排水工程师",
    "暖通工程师",
    "室内设计师",
    "景观设计师",
    "ui设计师",
    "java开发",
    "前端开发",
    "测试工程师",
    "产品经理",
];

const KNOWN_CERTIFICATES: &[&str] = &[
    "工程师",
    "建筑师",
    "建造师",
    "注册建造师",
    "造价工程师",
    "监理工程师",
    "安全员",
    "注册结构工程师",
    "注册电气工程师",
    "注册设计师证",
    "pmp",
];

pub fn is_known_position(token: &str) -> bool {
    let folded = fold(token);
    KNOWN_POSITIONS.iter().any(|p| *p == folded)
}

pub fn is_known_certificate(token: &str) -> bool {
    let folded = fold(token);
    KNOWN_CERTIFICATES.iter().any(|c| *c == folded)
}

/// A token that reads both as a job title and as a certificate name.
pub fn is_ambiguous_token(token: &str) -> bool {
    is_known_position(token) && is_known_certificate(token)
}

// ── Skills ──────────────────────────────────────────────────────────────────

const SKILL_SYNONYMS: &[&[&str]] = &[
    &["cad", "autocad", "cad制图"],
    &["k8s", "kubernetes"],
    &["js", "javascript"],
    &["ps", "photoshop"],
];

/// Lowercased skill plus every synonym in its group.
pub fn expand_skill(raw: &str) -> Vec<String> {
    let skill = raw.trim().to_lowercase();
    if skill.is_empty() {
        return Vec::new();
    }
    match SKILL_SYNONYMS.iter().find(|group| group.contains(&skill.as_str())) {
        Some(group) => group.iter().map(|s| s.to_string()).collect(),
        None => vec![skill],
    }
}

/// Canonical member of the skill's synonym group, so "AutoCAD" and "cad" compare equal.
pub fn skill_key(raw: &str) -> String {
    let skill = fold(raw);
    match SKILL_SYNONYMS.iter().find(|group| group.contains(&skill.as_str())) {
        Some(group) => group[0].to_string(),
        None => skill,
    }
}

// ── Companies ───────────────────────────────────────────────────────────────

const COMPANY_SUFFIXES: &[&str] = &[
    "股份有限公司",
    "有限责任公司",
    "有限公司",
    "集团",
    "公司",
    "co.,ltd.",
    "co.,ltd",
    "ltd.",
    "ltd",
    "inc.",
    "inc",
    "corporation",
    "corp.",
    "corp",
];

/// Folded company name with legal-form suffixes removed.
pub fn company_key(raw: &str) -> String {
    let is_punct = |c: char| c == ',' || c == '.';
    let mut key = fold(raw).trim_end_matches(is_punct).to_string();
    loop {
        let stripped = COMPANY_SUFFIXES
            .iter()
            .find_map(|suffix| key.strip_suffix(suffix))
            .map(|rest| rest.trim_end_matches(is_punct).to_string());
        match stripped {
            Some(rest) if rest != key => key = rest,
            _ => return key,
        }
    }
}

/// Fuzzy company equivalence: one folded name contains the other.
pub fn companies_match(required: &str, held: &str) -> bool {
    let required = company_key(required);
    let held = company_key(held);
    !required.is_empty() && !held.is_empty() && (held.contains(&required) || required.contains(&held))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bound_recognizes_qualifiers() {
        assert_eq!(split_bound("本科及以上"), ("本科", Bound::AtLeast));
        assert_eq!(split_bound("至少 5年"), ("5年", Bound::AtLeast));
        assert_eq!(split_bound("10年以内"), ("10年", Bound::AtMost));
        assert_eq!(split_bound("硕士"), ("硕士", Bound::Exact));
    }

    #[test]
    fn test_degree_synonyms_share_an_ordinal() {
        assert_eq!(degree_from_token("学士"), Some(Degree::Bachelor));
        assert_eq!(degree_from_token("本科"), Some(Degree::Bachelor));
        assert_eq!(degree_from_token("研究生"), Some(Degree::Master));
        assert_eq!(degree_from_token("PhD"), Some(Degree::Doctor));
        assert_eq!(degree_from_token("小学"), None);
    }

    #[test]
    fn test_resolve_cert_uses_family_ladders() {
        assert_eq!(resolve_cert("中级工程师", None), ("工程师".to_string(), Some(2)));
        assert_eq!(resolve_cert("工程师", Some("高级")), ("工程师".to_string(), Some(3)));
        assert_eq!(resolve_cert("一级注册建造师", None), ("建造师".to_string(), Some(2)));
        assert_eq!(resolve_cert("注册建造师", Some("二级")), ("建造师".to_string(), Some(1)));
        assert_eq!(resolve_cert("一级建造师", Some("一级")), ("建造师".to_string(), Some(2)));
        assert_eq!(resolve_cert("工程师", None), ("工程师".to_string(), None));
    }

    #[test]
    fn test_resolve_cert_falls_back_to_generic_ladder() {
        assert_eq!(resolve_cert("一级造价工程师", None), ("造价工程师".to_string(), Some(3)));
        assert_eq!(resolve_cert("三级心理咨询师", None), ("心理咨询师".to_string(), Some(1)));
        assert_eq!(resolve_cert("PMP", None), ("PMP".to_string(), None));
    }

    #[test]
    fn test_unleveled_certificate_drops_level_keyword() {
        assert_eq!(resolve_cert("PMP", Some("高级")), ("PMP".to_string(), None));
        assert_eq!(resolve_cert("安全员", Some("中级")), ("安全员".to_string(), None));
        assert_eq!(
            resolve_cert("高级经济师", Some("高级")),
            ("经济师".to_string(), Some(3))
        );
        assert_eq!(resolve_cert(GENERIC_TITLE, Some("中级")), (GENERIC_TITLE.to_string(), Some(2)));
        assert_eq!(resolve_held_cert("PMP", Some("高级")), ("PMP".to_string(), None));
    }

    #[test]
    fn test_held_bare_engineer_title_implies_intermediate_rank() {
        assert_eq!(resolve_held_cert("工程师", None), ("工程师".to_string(), Some(2)));
        assert_eq!(resolve_held_cert("建筑师", None), ("建筑师".to_string(), None));
    }

    #[test]
    fn test_ambiguous_tokens_are_detected() {
        assert!(is_ambiguous_token("造价工程师"));
        assert!(is_ambiguous_token("建筑师"));
        assert!(!is_ambiguous_token("项目经理"));
        assert!(!is_ambiguous_token("PMP"));
    }

    #[test]
    fn test_expand_skill_uses_synonym_group() {
        let expanded = expand_skill(" AutoCAD ");
        assert!(expanded.contains(&"cad".to_string()));
        assert!(expanded.contains(&"cad制图".to_string()));
        assert_eq!(expand_skill("Revit"), vec!["revit".to_string()]);
        assert!(expand_skill("  ").is_empty());
    }

    #[test]
    fn test_skill_key_is_shared_by_synonyms() {
        assert_eq!(skill_key("AutoCAD"), "cad");
        assert_eq!(skill_key("CAD制图"), "cad");
        assert_eq!(skill_key("Revit"), "revit");
    }

    #[test]
    fn test_company_matching_ignores_legal_suffixes() {
        assert_eq!(company_key("中建三局集团有限公司"), "中建三局");
        assert!(companies_match("中建三局", "中建三局集团有限公司"));
        assert!(companies_match("Acme Co., Ltd.", "acme inc"));
        assert!(!companies_match("万科", "碧桂园"));
        assert!(!companies_match("有限公司", "万科"));
    }
}
