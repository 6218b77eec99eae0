// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool call payloads and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swarm_core::ToolDescriptor;

/// Params of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

/// Known content kinds, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KnownContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// One element of a tool result's content list.
///
/// Unknown kinds deserialize into `Other` and serialize back unchanged,
/// so content the supervisor does not understand passes through intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Known(KnownContent),
    Other(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Known(KnownContent::Text { text: text.into() })
    }

    /// The `type` tag, or `"unknown"` when absent.
    pub fn kind(&self) -> &str {
        match self {
            ContentBlock::Known(KnownContent::Text { .. }) => "text",
            ContentBlock::Known(KnownContent::Image { .. }) => "image",
            ContentBlock::Known(KnownContent::Audio { .. }) => "audio",
            ContentBlock::Other(value) => {
                value.get("type").and_then(Value::as_str).unwrap_or("unknown")
            }
        }
    }

    /// Text payload, when this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Known(KnownContent::Text { text }) => Some(text),
            _ => None,
        }
    }
}

/// Result of a `tools/call`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful single-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ContentBlock::text(text)], is_error: false }
    }

    /// A failed single-text result.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self { content: vec![ContentBlock::text(text)], is_error: true }
    }

    /// First text block, for logs and summaries.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| c.as_text())
    }
}

/// Result of a `tools/list`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

#[cfg(test)]
#[path = "content_tests.rs"]
mod tests;
