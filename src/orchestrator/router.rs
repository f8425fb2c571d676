use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::llm_client::SharedLlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Generic,
    RepoOverview,
    ApiEndpoints,
    DeepDive,
}

impl Intent {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "generic" => Some(Self::Generic),
            "repo_overview" => Some(Self::RepoOverview),
            "api_endpoints" => Some(Self::ApiEndpoints),
            "deep_dive" => Some(Self::DeepDive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::RepoOverview => "repo_overview",
            Self::ApiEndpoints => "api_endpoints",
            Self::DeepDive => "deep_dive",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Always within [0, 1].
    pub confidence: f32,
}

impl Classification {
    pub fn fallback() -> Self {
        Self {
            intent: Intent::DeepDive,
            confidence: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterParseError {
    #[error("router reply contains no JSON object")]
    NoJson,
    #[error("router reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("router confidence is not a number: {0}")]
    Confidence(String),
}

/// Reads the JSON object between the first `{` and the last `}` of a router reply.
pub fn parse_classification(reply: &str) -> Result<Classification, RouterParseError> {
    let start = reply.find('{').ok_or(RouterParseError::NoJson)?;
    let end = reply.rfind('}').ok_or(RouterParseError::NoJson)?;
    if end < start {
        return Err(RouterParseError::NoJson);
    }

    let value: Value = serde_json::from_str(&reply[start..=end])?;
    let intent = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(Intent::parse)
        .unwrap_or(Intent::DeepDive);

    let confidence = match value.get("confidence") {
        None => 0.5,
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.5),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| RouterParseError::Confidence(raw.clone()))?,
        Some(other) => return Err(RouterParseError::Confidence(other.to_string())),
    };
    let confidence = if confidence.is_nan() {
        0.5
    } else {
        confidence.clamp(0.0, 1.0) as f32
    };

    Ok(Classification { intent, confidence })
}

/// Only confident overview and API classifications keep their own mode.
pub fn select_mode(classification: &Classification, threshold: f32) -> Intent {
    match classification.intent {
        Intent::RepoOverview | Intent::ApiEndpoints
            if classification.confidence >= threshold =>
        {
            classification.intent
        }
        // TODO: generic questions get a deep-dive answer until small talk has its own mode
        _ => Intent::DeepDive,
    }
}

pub struct QuestionRouter {
    llm: SharedLlmClient,
}

impl QuestionRouter {
    pub fn new(llm: SharedLlmClient) -> Self {
        Self { llm }
    }

    /// One completion call; any failure yields the fallback classification.
    #[instrument(skip_all)]
    pub async fn classify(&self, question: &str) -> Classification {
        let reply = match self.llm.complete(&router_prompt(question)).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(?err, "Router completion failed");
                return Classification::fallback();
            }
        };

        match parse_classification(reply.trim()) {
            Ok(classification) => {
                debug!(
                    intent = %classification.intent,
                    confidence = classification.confidence,
                    "Classified question"
                );
                classification
            }
            Err(err) => {
                warn!(%err, "Router reply unusable");
                Classification::fallback()
            }
        }
    }
}

fn router_prompt(question: &str) -> String {
    format!(
        r#"You classify questions sent to a repository Q&A assistant.
Pick exactly ONE intent:

1. "generic" - greetings, small talk, or anything unrelated to a codebase
   Examples: "Hello", "How are you?", "Thanks", "What is the weather?"

2. "repo_overview" - what the repository does, its purpose or responsibilities
   Examples: "What does this repository do?", "What is this service in charge of?",
   "Give me an overview of this system"

3. "api_endpoints" - API routes, endpoints, request or response schemas
   Examples: "What endpoints does this service expose?", "List all API routes",
   "Show me the API documentation"

4. "deep_dive" - specific modules, functions, bugs or implementation details
   Examples: "How does the authentication module work?", "Where is the login function defined?",
   "What causes error X?", "How do I configure feature Y?"

Reply with ONLY a JSON object in exactly this shape:
{{
  "type": "generic" | "repo_overview" | "api_endpoints" | "deep_dive",
  "confidence": 0.0-1.0
}}

Question: {question}

JSON Response:"#
    )
}
