//! User-facing reply text.

use crate::criteria::SearchCriteria;
use crate::models::candidate::{Candidate, CandidateCard};
use crate::scoring::ranker::RankedResultSet;
use crate::store::resume::ResumeHandle;

pub const MENU: &str = "回复「简历 X」查看简历，「信息 X」查看详情，「联系 X」发送邀约，\
「A」查看更多，「B」结束本次查询。";

fn years(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}年"),
        None => "未知".to_string(),
    }
}

fn card_line(position: usize, card: &CandidateCard) -> String {
    let certificates = if card.certifications.is_empty() {
        "无".to_string()
    } else {
        card.certifications.join("、")
    };
    format!(
        "{position}. {}（匹配分 {:.2}）\n   经验: {} | 证书: {certificates}",
        card.name,
        card.score,
        years(card.experience_years)
    )
}

/// The page at the set's cursor.
pub fn results(set: &RankedResultSet, top_n: usize) -> String {
    let page = set.page(top_n);
    let first = set.cursor + 1;
    let last = set.cursor + page.len();

    let mut lines = vec![
        format!("筛选条件: {}", set.criteria),
        format!(
            "共找到 {} 位候选人，当前显示第 {first}-{last} 位：",
            set.len()
        ),
    ];
    lines.extend(
        page.iter()
            .enumerate()
            .map(|(i, card)| card_line(i + 1, card)),
    );
    lines.push(MENU.to_string());
    lines.join("\n")
}

pub fn no_candidates(criteria: &SearchCriteria) -> String {
    format!("没有找到符合条件的候选人（{criteria}），请调整条件后重新发送。")
}

pub fn no_more() -> String {
    format!("没有更多候选人了。\n{MENU}")
}

pub fn detail(candidate: &Candidate) -> String {
    fn list(items: &[String]) -> String {
        if items.is_empty() {
            "无".to_string()
        } else {
            items.join("、")
        }
    }
    let tags = &candidate.tags;
    let certificates: Vec<String> = tags
        .certifications
        .iter()
        .map(|c| match &c.level {
            Some(level) if !c.name.starts_with(level.as_str()) => format!("{level}{}", c.name),
            _ => c.name.clone(),
        })
        .collect();

    [
        format!("姓名: {}", candidate.name),
        format!("职位: {}", list(&tags.positions)),
        format!("地点: {}", tags.location.as_deref().unwrap_or("未知")),
        format!("经验: {}", years(tags.min_experience_years)),
        format!(
            "学历: {}",
            tags.degree.map_or("未知", |degree| degree.label())
        ),
        format!("技能: {}", list(&tags.skills_normalized)),
        format!("证书: {}", list(&certificates)),
        format!("曾任职: {}", list(&tags.companies)),
    ]
    .join("\n")
}

pub fn resume(name: &str, handle: &ResumeHandle) -> String {
    format!(
        "{name} 的简历「{}」：{}\n链接 {} 分钟内有效。",
        handle.file_name,
        handle.url,
        (handle.expires_in_secs / 60).max(1)
    )
}

pub fn contact_sent(name: &str) -> String {
    format!("已向 {name} 发送联系邀请。")
}

pub fn ended() -> String {
    "本次查询已结束，欢迎随时发送新的招聘需求。".to_string()
}

pub fn superseded() -> String {
    "该需求已被更新的请求取代，结果未保存。".to_string()
}
