use super::SearchCriteria;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub fn query_system_prompt() -> String {
    format!(
        "{JSON_ONLY_SYSTEM} You extract candidate search requirements from a recruiter's \
         message. If the message is not a request to find candidates, return {{}}."
    )
}

/// Builds the extraction prompt. `previous` is the conversation's last criteria so follow-up
/// refinements ("再加一个条件：上海") can be merged by the model.
pub fn build_query_prompt(text: &str, previous: Option<&SearchCriteria>) -> String {
    let context = match previous {
        Some(criteria) => format!(
            "The recruiter's previous search was:\n{}\nIf the new message refines that search, \
             return the merged requirements; if it starts a new search, ignore it.\n\n",
            serde_json::to_string(criteria).unwrap_or_default()
        ),
        None => String::new(),
    };

    format!(
        r#"{context}Extract the requirements from this message:
"""
{text}
"""

Return a JSON object with these keys (use null or [] when not mentioned):
{{
  "position": "job title",
  "experience_years_min": number,
  "experience_years_max": number,
  "skills": ["skill", ...],
  "location": "city",
  "education_levels": ["本科", "硕士", ...],
  "certifications": [{{"name": "certificate", "level_keyword": "中级 | 一级 | null", "modifier": "ge | gt | eq"}}],
  "previous_companies": ["company", ...]
}}

Rules:
- "本科及以上" means every level from 本科 up: ["本科", "硕士", "博士"].
- For "中级工程师及以上" return {{"name": "工程师", "level_keyword": "中级", "modifier": "ge"}}.
- For a generic title such as "高级职称" use the name "职称".
- Keep company names exactly as written."#
    )
}
