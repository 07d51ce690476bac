//! Backend response types: AnalysisResult and TutorialChunk.
//!
//! The analyze endpoint returns JSON that deserializes into `AnalyzeResponse`;
//! the tutorial endpoint streams units that decode into `TutorialChunk`.

use serde::Deserialize;

/// Components and project ideas detected in one uploaded image.
///
/// Replaced wholesale by every successful analyze call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    pub components: Vec<String>,
    pub ideas: Vec<String>,
}

impl AnalysisResult {
    pub fn has_idea(&self, idea: &str) -> bool {
        self.ideas.iter().any(|i| i == idea)
    }
}

/// Wire shape of the analyze response. Missing or null arrays count as empty.
#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeResponse {
    #[serde(default)]
    components: Option<Vec<String>>,
    #[serde(default)]
    project_ideas: Option<Vec<String>>,
}

impl From<AnalyzeResponse> for AnalysisResult {
    fn from(resp: AnalyzeResponse) -> Self {
        Self {
            components: resp.components.unwrap_or_default(),
            ideas: resp.project_ideas.unwrap_or_default(),
        }
    }
}

/// One decoded unit of the tutorial stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TutorialChunk {
    Overview { text: String },
    Section { title: String, content: String },
}

impl TutorialChunk {
    /// Map a raw stream record onto a chunk.
    ///
    /// A non-empty `project_overview` wins; otherwise both `section` and
    /// `content` must be non-empty strings. Anything else is not a chunk.
    pub fn from_record(record: &serde_json::Value) -> Option<Self> {
        let field = |name: &str| {
            record
                .get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        };

        if let Some(overview) = field("project_overview") {
            return Some(TutorialChunk::Overview {
                text: overview.to_string(),
            });
        }
        match (field("section"), field("content")) {
            (Some(title), Some(content)) => Some(TutorialChunk::Section {
                title: title.to_string(),
                content: content.to_string(),
            }),
            _ => None,
        }
    }

    /// The text this chunk contributes to the tutorial buffer.
    pub fn text(&self) -> &str {
        match self {
            TutorialChunk::Overview { text } => text,
            TutorialChunk::Section { content, .. } => content,
        }
    }
}
