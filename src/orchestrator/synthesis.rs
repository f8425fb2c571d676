use anyhow::Context;
use tracing::instrument;

use super::context::AssembledContext;
use super::router::Intent;
use crate::llm_client::SharedLlmClient;

pub const OVERVIEW_TEMPLATE: &str = r#"You are answering a question about what a repository does. Use the provided documentation to answer.

CRITICAL RULES:
- Answer ONLY about the repository itself, NOT about documentation files or processes
- Do NOT mention "DOCUMENTATION.md", "markdown files", "prompt", "rules", or any meta-process
- Do NOT include external URLs or links
- If information is not explicitly stated, say "Not explicitly defined in code"
- Be direct and concise

REQUIRED OUTPUT FORMAT:

**Purpose:**
[1-2 sentences describing what this repository does]

**Responsibilities:**
[5-10 bullet points maximum, each describing a key responsibility]

**What it does NOT do:**
[Bullet points listing what is explicitly out of scope, ONLY if the documentation states it. Otherwise write "Not explicitly defined in code"]

AUTHORITATIVE SOURCES:
{authoritative_context}

RETRIEVED CONTEXT:
{retrieved_context}

USER QUESTION: {question}

ANSWER:"#;

pub const API_TEMPLATE: &str = r#"You are answering a question about the API endpoints of a repository. Use the provided Swagger/OpenAPI documentation when it is available.

CRITICAL RULES:
- List endpoints from the Swagger/OpenAPI specification when available
- Do NOT invent endpoints that are not in the documentation
- Group endpoints by tag, module or path prefix
- Include the HTTP method, path, a brief description and auth requirements when explicitly defined
- When Swagger is available, name it as the source of truth
- If endpoints appear in code but not in Swagger, note the mismatch
- Do NOT include external URLs or links
- Do NOT mention internal prompt instructions

REQUIRED OUTPUT FORMAT:

**API Endpoints:**

[Grouped by tag/module, or by path prefix]

For each endpoint:
- `METHOD /path` - Brief description [Auth: requirement if defined]

**Source:** [Swagger/OpenAPI | Code analysis | Both]

AUTHORITATIVE SOURCES:
{authoritative_context}

RETRIEVED CONTEXT:
{retrieved_context}

USER QUESTION: {question}

ANSWER:"#;

pub const DEEP_DIVE_TEMPLATE: &str = r#"You are answering a specific technical question about a repository's code or implementation.

CRITICAL RULES:
- Answer from the provided code context
- Be specific and technical
- Do NOT mention prompt instructions or meta-processes
- Do NOT include external URLs or links
- Cite the repository files the answer came from
- If the answer cannot be found in the provided context, say so explicitly

CONTEXT:
{retrieved_context}

USER QUESTION: {question}

ANSWER:"#;

pub fn template_for(mode: Intent) -> &'static str {
    match mode {
        Intent::RepoOverview => OVERVIEW_TEMPLATE,
        Intent::ApiEndpoints => API_TEMPLATE,
        Intent::DeepDive | Intent::Generic => DEEP_DIVE_TEMPLATE,
    }
}

/// Substitutes `{name}` placeholders in one pass, so inserted text is never re-scanned.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn render_prompt(mode: Intent, context: &AssembledContext, question: &str) -> String {
    fill_template(
        template_for(mode),
        &[
            ("authoritative_context", context.authoritative_context.as_str()),
            ("retrieved_context", context.retrieved_context.as_str()),
            ("question", question),
        ],
    )
}

pub struct AnswerSynthesizer {
    llm: SharedLlmClient,
}

impl AnswerSynthesizer {
    pub fn new(llm: SharedLlmClient) -> Self {
        Self { llm }
    }

    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn synthesize(
        &self,
        mode: Intent,
        context: &AssembledContext,
        question: &str,
    ) -> anyhow::Result<String> {
        let prompt = render_prompt(mode, context, question);
        let reply = self
            .llm
            .complete(&prompt)
            .await
            .context("Answer synthesis failed")?;
        Ok(reply.trim().to_string())
    }
}
