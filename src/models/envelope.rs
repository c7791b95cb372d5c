//! Response envelope returned by every successful schema operation.

use serde::{Deserialize, Serialize};

/// One tagged unit of response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}

/// Ordered content blocks of one response. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    content: Vec<ContentBlock>,
}

impl ResponseEnvelope {
    /// An envelope holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    pub fn into_content(self) -> Vec<ContentBlock> {
        self.content
    }

    /// All text payloads joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<ResponseEnvelope> for rmcp::model::CallToolResult {
    fn from(envelope: ResponseEnvelope) -> Self {
        let content = envelope
            .into_content()
            .into_iter()
            .map(|block| match block {
                ContentBlock::Text { text } => rmcp::model::Content::text(text),
            })
            .collect();
        rmcp::model::CallToolResult::success(content)
    }
}
