use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::conversation::command::CommandKind;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "The candidate store is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation-level failures
// ────────────────────────────────────────────────────────────────────────────

/// Why an index-addressed command could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionProblem {
    /// No live result set for this conversation (never queried, expired, or ended).
    NoActiveResults,
    /// Index is outside the currently displayed page.
    OutOfRange { index: usize, page_len: usize },
    /// Command word recognized but the argument was not a positive integer.
    Malformed { command: CommandKind },
}

/// Failures surfaced by the query pipeline and the conversation state machine.
///
/// None of these are fatal for the service: each one is rendered back to the user
/// through [`AssistantError::user_message`] and logged by the engine.
#[derive(Debug, Clone, Error)]
pub enum AssistantError {
    #[error("ambiguous query: {reason}")]
    AmbiguousQuery { reason: String },

    #[error("query carries no usable criteria")]
    EmptyQuery,

    #[error("candidate store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid scoring rule configuration: {0}")]
    InvalidRuleConfig(String),

    #[error("invalid selection: {0:?}")]
    InvalidSelection(SelectionProblem),

    #[error("query understanding timed out after {seconds}s")]
    QueryUnderstandingTimeout { seconds: u64 },

    #[error("query understanding failed: {0}")]
    QueryUnderstanding(String),

    #[error("candidate {0} not found")]
    CandidateNotFound(String),

    #[error("resume unavailable: {0}")]
    ResumeUnavailable(String),

    #[error("contact failed: {0}")]
    ContactFailed(String),
}

impl AssistantError {
    /// User-facing corrective text for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::AmbiguousQuery { reason } => {
                format!("抱歉，您的需求存在歧义（{reason}），请换一种方式描述。")
            }
            AssistantError::EmptyQuery => {
                "抱歉，我不太理解您的需求，请换一种方式描述，或者更具体一些。".to_string()
            }
            AssistantError::StoreUnavailable(_) => {
                "候选人库暂时不可用，请稍后再试。".to_string()
            }
            AssistantError::InvalidRuleConfig(_) => {
                "评分规则配置有误，请联系管理员。".to_string()
            }
            AssistantError::InvalidSelection(problem) => match problem {
                SelectionProblem::NoActiveResults => {
                    "当前没有可操作的候选人列表（可能已超时或已结束），请重新发送招聘需求。"
                        .to_string()
                }
                SelectionProblem::OutOfRange { page_len, .. } if *page_len == 0 => {
                    "当前页没有候选人，请重新发送招聘需求。".to_string()
                }
                SelectionProblem::OutOfRange { index, page_len } => {
                    format!("无效的序号 {index}。请输入 1 到 {page_len} 之间的数字。")
                }
                SelectionProblem::Malformed { command } => {
                    format!(
                        "请使用格式 '{} X'，例如 '{} 1'。",
                        command.keyword(),
                        command.keyword()
                    )
                }
            },
            AssistantError::QueryUnderstandingTimeout { .. } => {
                "需求解析超时，请稍后重试。".to_string()
            }
            AssistantError::QueryUnderstanding(_) => {
                "需求解析失败，请稍后重试。".to_string()
            }
            AssistantError::CandidateNotFound(_) => "未找到该候选人的信息。".to_string(),
            AssistantError::ResumeUnavailable(_) => "抱歉，无法获取该候选人的简历。".to_string(),
            AssistantError::ContactFailed(_) => "发送联系邀请失败，请稍后重试。".to_string(),
        }
    }

    /// User input problems are logged at warn; everything else is a fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AssistantError::AmbiguousQuery { .. }
                | AssistantError::EmptyQuery
                | AssistantError::InvalidSelection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_names_page_bounds() {
        let err = AssistantError::InvalidSelection(SelectionProblem::OutOfRange {
            index: 4,
            page_len: 3,
        });
        assert!(err.user_message().contains("1 到 3"));
    }

    #[test]
    fn test_malformed_message_uses_command_keyword() {
        let err = AssistantError::InvalidSelection(SelectionProblem::Malformed {
            command: CommandKind::Resume,
        });
        assert!(err.user_message().contains("简历 X"));
    }

    #[test]
    fn test_user_errors_are_classified() {
        assert!(AssistantError::EmptyQuery.is_user_error());
        assert!(!AssistantError::StoreUnavailable("down".to_string()).is_user_error());
    }
}
