//! Decoding agent replies from gateway responses and splitting them into a
//! comment and an optional document.

use serde_json::Value;

use crate::models::document::DocumentType;

use super::gateway::GatewayResponse;

/// Marker opening the comment section of a structured reply.
pub const COMMENT_MARKER: &str = "---COMMENT---";
/// Marker opening the optional document title section.
pub const TITLE_MARKER: &str = "---DOCUMENT_TITLE---";
/// Marker opening the document body section.
pub const DOCUMENT_MARKER: &str = "---DOCUMENT---";

/// A document body must be longer than this many characters to be stored.
pub const MIN_DOCUMENT_CHARS: usize = 50;

/// Characters of the raw reply used when the comment section is empty.
const COMMENT_FALLBACK_CHARS: usize = 200;

/// Replies that mean "nothing to post".
const SILENT_REPLIES: [&str; 2] = ["NO_REPLY", "HEARTBEAT_OK"];

/// The reply text carried by a `sessions_send` response, by the shape it
/// was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReply {
    /// `result.details.reply`.
    Details(String),
    /// First text block of a content array, either its JSON `reply` field or
    /// its raw text.
    ContentBlock(String),
    /// `result` (or `result.content`) as a plain string.
    Raw(String),
    /// The agent run ended with an error or timeout status.
    Rejected {
        /// Reported status, `error` or `timeout`.
        status: String,
        /// Reported error text.
        error: Option<String>,
    },
    /// No reply text in any known shape.
    None,
}

impl GatewayReply {
    /// Decode a response, trying each known shape in order.
    #[must_use]
    pub fn decode(response: &GatewayResponse) -> Self {
        if !response.ok {
            return Self::None;
        }
        let result = &response.result;

        if let Some(reply) = result
            .pointer("/details/reply")
            .and_then(Value::as_str)
            .filter(|reply| !reply.is_empty())
        {
            return Self::Details(reply.to_owned());
        }

        let content = match result.get("content") {
            Some(content) if !content.is_null() => content,
            _ => result,
        };

        if let Some(blocks) = content.as_array() {
            return Self::from_blocks(blocks);
        }

        match content.as_str() {
            Some(text) if !text.trim_start().starts_with('{') => Self::Raw(text.to_owned()),
            _ => Self::None,
        }
    }

    fn from_blocks(blocks: &[Value]) -> Self {
        let Some(text) = blocks
            .iter()
            .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        else {
            return Self::None;
        };

        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            if let Some(status) = parsed
                .get("status")
                .and_then(Value::as_str)
                .filter(|status| matches!(*status, "error" | "timeout"))
            {
                return Self::Rejected {
                    status: status.to_owned(),
                    error: parsed
                        .get("error")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                };
            }
            if let Some(reply) = parsed
                .get("reply")
                .and_then(Value::as_str)
                .filter(|reply| !reply.is_empty())
            {
                return Self::ContentBlock(reply.to_owned());
            }
        }

        if text.trim_start().starts_with('{') {
            Self::None
        } else {
            Self::ContentBlock(text.to_owned())
        }
    }

    /// Reply text, if any shape carried one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Details(text) | Self::ContentBlock(text) | Self::Raw(text) => Some(text),
            Self::Rejected { .. } | Self::None => None,
        }
    }

    /// Trimmed reply text that calls for a post, skipping empty and silent
    /// replies.
    #[must_use]
    pub fn actionable(&self) -> Option<&str> {
        self.text()
            .map(str::trim)
            .filter(|text| !text.is_empty() && !SILENT_REPLIES.contains(text))
    }
}

/// A document extracted from a structured reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftDocument {
    /// Title, explicit or defaulted.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Type inferred from the body.
    pub kind: DocumentType,
}

/// A reply split into what gets posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Comment text.
    pub comment: String,
    /// Document to store, when the reply carried a long enough body.
    pub document: Option<DraftDocument>,
}

/// Split a reply using the section markers.
///
/// The marked form is used only when both [`COMMENT_MARKER`] and
/// [`DOCUMENT_MARKER`] are present; otherwise the whole reply becomes the
/// comment. A missing or empty title defaults to
/// `<agent>'s deliverable for: <task title>`.
#[must_use]
pub fn parse_reply(reply: &str, agent_name: &str, task_title: &str) -> ParsedReply {
    let reply = reply.trim();
    if !(reply.contains(COMMENT_MARKER) && reply.contains(DOCUMENT_MARKER)) {
        return ParsedReply {
            comment: reply.to_owned(),
            document: None,
        };
    }

    let comment = section_after(reply, COMMENT_MARKER, &[TITLE_MARKER, DOCUMENT_MARKER])
        .filter(|comment| !comment.is_empty())
        .map_or_else(
            || reply.chars().take(COMMENT_FALLBACK_CHARS).collect(),
            str::to_owned,
        );

    let title = section_after(reply, TITLE_MARKER, &[DOCUMENT_MARKER])
        .filter(|title| !title.is_empty())
        .map_or_else(
            || format!("{agent_name}'s deliverable for: {task_title}"),
            str::to_owned,
        );

    let document = section_after(reply, DOCUMENT_MARKER, &[])
        .filter(|body| body.chars().count() > MIN_DOCUMENT_CHARS)
        .map(|body| DraftDocument {
            title,
            body: body.to_owned(),
            kind: infer_document_type(body),
        });

    ParsedReply { comment, document }
}

/// Text following the first `marker`, up to the nearest of `terminators`,
/// trimmed.
fn section_after<'a>(text: &'a str, marker: &str, terminators: &[&str]) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = terminators
        .iter()
        .filter_map(|terminator| rest.find(terminator))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Classify a document by keywords in its body; first match wins.
#[must_use]
pub fn infer_document_type(body: &str) -> DocumentType {
    const RULES: [(DocumentType, &[&str]); 3] = [
        (
            DocumentType::Research,
            &["competitor", "analysis", "research", "findings"],
        ),
        (DocumentType::Report, &["report", "summary", "results"]),
        (
            DocumentType::Protocol,
            &["spec", "plan", "architecture", "protocol"],
        ),
    ];

    let lower = body.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map_or(DocumentType::Deliverable, |(kind, _)| *kind)
}
