//! Field suggestions from an OpenAI compatible chat completions API.
//!
//! The model is asked to answer with a JSON object, the object is cut out of
//! the reply (models like to wrap it in code fences or prose) and only fields
//! known for the entity are passed on.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestEntity {
    Band,
    Song,
    Show,
    Member,
}

impl SuggestEntity {
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            SuggestEntity::Band => &["nome", "genero", "descricao"],
            SuggestEntity::Song => &[
                "titulo",
                "artista",
                "tom",
                "bpm",
                "genero",
                "observacoes",
                "links",
            ],
            SuggestEntity::Show => &[
                "data",
                "local",
                "contato",
                "cache_bruto",
                "status",
                "observacoes",
            ],
            SuggestEntity::Member => &["nome", "instrumento", "apelido"],
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            SuggestEntity::Band => "a music band",
            SuggestEntity::Song => {
                "a song in a band's repertoire (tom is the musical key, bpm an integer tempo, links a list of URLs)"
            }
            SuggestEntity::Show => {
                "a live show (data as YYYY-MM-DD, cache_bruto a non-negative number, status one of confirmado, negociacao, reservado, cancelado)"
            }
            SuggestEntity::Member => "a band member (instrumento is the instrument played)",
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You help to fill in a record describing {}. Answer only with a single JSON object \
            using these keys: {}. Leave out keys you cannot infer.",
            self.describe(),
            self.fields().join(", ")
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned {0}: {1}")]
    Upstream(u16, String),

    #[error("Invalid reply: {0}")]
    InvalidReply(String),
}

#[derive(Debug, Clone)]
pub struct SuggestConfig {
    pub api_url: Url,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct Suggester {
    client: reqwest::Client,
    config: SuggestConfig,
}

impl Suggester {
    pub fn new(config: SuggestConfig) -> Result<Self, SuggestError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn suggest(
        &self,
        entity: SuggestEntity,
        prompt: &str,
    ) -> Result<Map<String, Value>, SuggestError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: entity.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.2,
        };

        debug!(url = %self.config.api_url, model = %self.config.model, ?entity, "Requesting suggestion");
        let response = self
            .client
            .post(self.config.api_url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SuggestError::Upstream(status.as_u16(), text));
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SuggestError::InvalidReply("empty reply".to_string()))?;

        let object = extract_json_object(&content)
            .ok_or_else(|| SuggestError::InvalidReply("no JSON object in reply".to_string()))?;
        Ok(known_fields(entity, object))
    }
}

/// First JSON object in `text`, starting positions are tried left to right so
/// braces in surrounding prose are skipped.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Drops unknown keys and nulls.
pub fn known_fields(entity: SuggestEntity, object: Map<String, Value>) -> Map<String, Value> {
    let fields = entity.fields();
    object
        .into_iter()
        .filter(|(key, value)| fields.contains(&key.as_str()) && !value.is_null())
        .collect()
}
