use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CartesianQuestions;
use crate::error::NarrationError;

const USER_AGENT: &str = "CartesianCoach/0.1";

const SYSTEM_PROMPT: &str = "You are an NLP coach using the Cartesian Logic pattern. \
Given a limiting belief, write exactly four short, gentle, second-person questions in this order: \
Theorem (What would happen if you did X?), Converse (What wouldn't happen if you did X?), \
Inverse (What would happen if you didn't do X?), Non-Mirror Reverse (What wouldn't happen if you didn't do X?). \
Reply with a JSON object of the form {\"questions\": [\"...\", \"...\", \"...\", \"...\"]} and nothing else.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuestionSet {
    questions: Vec<String>,
}

/// Generates the question set through an OpenAI-compatible chat endpoint
pub struct QuestionGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl QuestionGenerator {
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub async fn generate(&self, belief: &str) -> Result<CartesianQuestions, NarrationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0.4,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Limiting belief: {belief}") },
            ],
        });

        let resp = self.client.post(&url)
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NarrationError::remote(Some(status.as_u16()), message));
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NarrationError::remote(Some(status.as_u16()), "response had no content"))?;

        parse_question_set(&content)
    }
}

fn parse_question_set(content: &str) -> Result<CartesianQuestions, NarrationError> {
    // Some models wrap JSON in a code fence despite the instructions
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let set: QuestionSet = serde_json::from_str(trimmed)
        .map_err(|e| NarrationError::remote(None, format!("malformed question set: {e}")))?;

    let questions: Vec<String> = set
        .questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    let count = questions.len();
    CartesianQuestions::from_list(questions)
        .ok_or_else(|| NarrationError::remote(None, format!("expected 4 questions, got {count}")))
}
