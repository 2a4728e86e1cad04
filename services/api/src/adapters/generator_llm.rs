//! services/api/src/adapters/generator_llm.rs
//!
//! This module contains the adapter for the asset-generating LLM.
//! It implements the `AssetGenerator` port from the `core` crate: parsing is
//! done locally, every other stage is one chat completion whose reply must be JSON.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use learning_module_core::{
    domain::{FlashcardDraft, QuizQuestionDraft},
    ports::{Artifact, AssetGenerator, PortError, PortResult, Stage},
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AssetGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAssetAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAssetAdapter {
    /// Creates a new `OpenAiAssetAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends one system/user exchange and returns the text of the first choice.
    async fn complete(&self, system_prompt: &str, content: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("LESSON CONTENT:\n{}", content))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Generation LLM returned no text content.".to_string())
            })
    }
}

//=========================================================================================
// Prompts and Reply Shapes
//=========================================================================================

const SUMMARY_PROMPT: &str = "You are a teaching assistant. Summarize the lesson content in \
    one to three short paragraphs of plain prose for a student. Respond with JSON only: \
    {\"summary\": \"...\"}";

const CONCEPTS_PROMPT: &str = "You are a teaching assistant. List the key concepts a student \
    must understand from the lesson content, each as a short noun phrase. Respond with JSON \
    only: {\"concepts\": [\"...\"]}";

const FLASHCARDS_PROMPT: &str = "You are a teaching assistant. Write between three and ten \
    flashcards covering the lesson content. Each card has a question on the front and a \
    one-sentence answer on the back. Respond with JSON only: \
    {\"flashcards\": [{\"front\": \"...\", \"back\": \"...\"}]}";

const QUIZ_PROMPT: &str = "You are a teaching assistant. Write between three and ten \
    multiple-choice questions about the lesson content. Each question has exactly four \
    options and `correct` is the zero-based index of the right option. Respond with JSON \
    only: {\"quiz\": [{\"question\": \"...\", \"options\": [\"...\"], \"correct\": 0}]}";

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
}

#[derive(Deserialize)]
struct ConceptsReply {
    concepts: Vec<String>,
}

#[derive(Deserialize)]
struct FlashcardsReply {
    flashcards: Vec<FlashcardDraft>,
}

#[derive(Deserialize)]
struct QuizReply {
    quiz: Vec<QuizQuestionDraft>,
}

/// Collapses runs of blank lines and trims every line.
fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Parses a JSON reply, tolerating a surrounding Markdown code fence.
fn parse_reply<T: DeserializeOwned>(stage: Stage, reply: &str) -> PortResult<T> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|e| {
        PortError::Unexpected(format!("The {} reply was not valid JSON: {}", stage, e))
    })
}

//=========================================================================================
// `AssetGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssetGenerator for OpenAiAssetAdapter {
    async fn generate(&self, stage: Stage, content: &str) -> PortResult<Artifact> {
        debug!(%stage, model = %self.model, "Running generation stage");
        match stage {
            Stage::Parsing => Ok(Artifact::ParsedText(normalize_text(content))),
            Stage::Summary => {
                let reply = self.complete(SUMMARY_PROMPT, content).await?;
                let parsed: SummaryReply = parse_reply(stage, &reply)?;
                Ok(Artifact::Summary(parsed.summary))
            }
            Stage::Concepts => {
                let reply = self.complete(CONCEPTS_PROMPT, content).await?;
                let parsed: ConceptsReply = parse_reply(stage, &reply)?;
                Ok(Artifact::Concepts(parsed.concepts))
            }
            Stage::Flashcards => {
                let reply = self.complete(FLASHCARDS_PROMPT, content).await?;
                let parsed: FlashcardsReply = parse_reply(stage, &reply)?;
                Ok(Artifact::Flashcards(parsed.flashcards))
            }
            Stage::Quiz => {
                let reply = self.complete(QUIZ_PROMPT, content).await?;
                let parsed: QuizReply = parse_reply(stage, &reply)?;
                Ok(Artifact::Quiz(parsed.quiz))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_collapses_blank_lines() {
        let raw = "\n\n# Title  \n\n\n\nFirst paragraph.\nSecond line.   \n\n";
        assert_eq!(normalize_text(raw), "# Title\n\nFirst paragraph.\nSecond line.");
    }

    #[test]
    fn replies_may_be_fenced() {
        let reply = "```json\n{\"concepts\": [\"Light\", \"Glucose\"]}\n```";
        let parsed: ConceptsReply = parse_reply(Stage::Concepts, reply).unwrap();
        assert_eq!(parsed.concepts, vec!["Light", "Glucose"]);
    }

    #[test]
    fn malformed_replies_are_port_errors() {
        let result: PortResult<QuizReply> = parse_reply(Stage::Quiz, "Sure! Here is a quiz.");
        assert!(matches!(result, Err(PortError::Unexpected(msg)) if msg.contains("quiz")));
    }
}
