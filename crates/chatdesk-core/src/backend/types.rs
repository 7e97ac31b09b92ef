use serde::{Deserialize, Serialize};

use crate::auto_reply::ReplyStyle;
use crate::error::{CoreError, Result};
use crate::models::Expert;

/// One role-tagged entry of the history sent with a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateReplyRequest {
    pub session_id: String,
    pub customer_message: String,
    pub conversation_history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<i64>,
}

/// The three drafted reply variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplySuggestions {
    #[serde(default)]
    pub aggressive: Option<String>,
    #[serde(default)]
    pub conservative: Option<String>,
    #[serde(default)]
    pub professional: Option<String>,
}

impl ReplySuggestions {
    /// Variant for `style`; blank text counts as missing.
    pub fn get(&self, style: ReplyStyle) -> Option<&str> {
        let text = match style {
            ReplyStyle::Aggressive => self.aggressive.as_deref(),
            ReplyStyle::Conservative => self.conservative.as_deref(),
            ReplyStyle::Professional => self.professional.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReplyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub suggestions: Option<ReplySuggestions>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateReplyResponse {
    /// `success=false` or absent suggestions is a generation failure.
    pub fn into_result(self) -> Result<ReplySuggestions> {
        match (self.success, self.suggestions) {
            (true, Some(suggestions)) => Ok(suggestions),
            _ => Err(CoreError::Generation(
                self.error
                    .unwrap_or_else(|| "AI generation failed".to_string()),
            )),
        }
    }
}

/// Body of the send endpoint; the backend calls the recipient `who`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest {
    pub who: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SendMessageResponse {
    pub fn into_result(self) -> Result<()> {
        if self.status.as_deref() == Some("success") {
            Ok(())
        } else {
            Err(CoreError::Send(
                self.message.unwrap_or_else(|| "send failed".to_string()),
            ))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpertListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub prompts: Vec<Expert>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExpertListResponse {
    pub fn into_result(self) -> Result<Vec<Expert>> {
        if self.success {
            Ok(self.prompts)
        } else {
            Err(CoreError::Backend {
                endpoint: "list experts",
                message: self
                    .error
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            })
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub deleted_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeleteSessionResponse {
    pub fn into_result(self) -> Result<u64> {
        if self.success {
            Ok(self.deleted_count.unwrap_or(0))
        } else {
            Err(CoreError::Backend {
                endpoint: "delete session",
                message: self.error.unwrap_or_else(|| "delete failed".to_string()),
            })
        }
    }
}
