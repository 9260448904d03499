// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenAI-compatible chat-completions backend.
//
// Works against any server speaking the `/chat/completions` dialect; the
// base URL and model come from configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use satzwerk_core::config::OpenAiSettings;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::PromptTemplate;

use crate::backend::{TranslationBackend, check_status, http_client, transport_error};

const SERVICE_ID: &str = "openai";
const USER_AGENT: &str = concat!("satzwerk/", env!("CARGO_PKG_VERSION"));
const OFFICIAL_HOST: &str = "api.openai.com";

const DEFAULT_PROMPT: &str = "You are a professional translation engine. \
Translate the following text from ${lang_in} to ${lang_out}. \
Keep formula placeholders such as {v1} unchanged. \
Output only the translation, without any other text.\n\n\
Source text: ${text}\n\nTranslation:";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    prompt: PromptTemplate,
}

impl OpenAiBackend {
    pub fn new(settings: &OpenAiSettings, prompt: Option<PromptTemplate>) -> Result<Self> {
        let base_url = settings.base_url.trim_end_matches('/');
        if settings.api_key.is_empty() && base_url.contains(OFFICIAL_HOST) {
            return Err(SatzwerkError::config(
                "services.openai.api_key",
                "not set (use the config file or OPENAI_API_KEY)",
            ));
        }
        if settings.model.trim().is_empty() {
            return Err(SatzwerkError::config("services.openai.model", "must not be empty"));
        }

        Ok(Self {
            client: http_client(SERVICE_ID, USER_AGENT)?,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            url: format!("{base_url}/chat/completions"),
            prompt: prompt.unwrap_or_else(|| PromptTemplate::new(DEFAULT_PROMPT)),
        })
    }

    fn request<'a>(&'a self, text: &str, source_lang: &str, target_lang: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: self.prompt.render(text, source_lang, target_lang),
            }],
        }
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn service_id(&self) -> &str {
        SERVICE_ID
    }

    /// Chat models take any language name or code.
    fn supported_languages(&self) -> &[&str] {
        &[]
    }

    async fn do_translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        debug!(model = %self.model, chars = text.len(), "sending chat completion request");

        let mut request = self
            .client
            .post(&self.url)
            .json(&self.request(text, source_lang, target_lang));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;
        let body: ChatResponse = check_status(SERVICE_ID, response)
            .await?
            .json()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| SatzwerkError::Translation("openai: empty completion".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OpenAiSettings {
        OpenAiSettings {
            api_key: "sk-test".into(),
            ..Default::default()
        }
    }

    #[test]
    fn official_endpoint_needs_a_key() {
        let result = OpenAiBackend::new(&OpenAiSettings::default(), None);
        assert!(matches!(result, Err(SatzwerkError::Configuration { .. })));
    }

    #[test]
    fn local_endpoint_works_without_key() {
        let settings = OpenAiSettings {
            base_url: "http://localhost:11434/v1/".into(),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(&settings, None).unwrap();
        assert_eq!(backend.url, "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn default_prompt_carries_languages_and_text() {
        let backend = OpenAiBackend::new(&settings(), None).unwrap();
        let request = backend.request("Hello", "en", "de");
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, 0.0);
        let content = &request.messages[0].content;
        assert!(content.contains("from en to de"));
        assert!(content.contains("Source text: Hello"));
    }

    #[test]
    fn custom_prompt_replaces_default() {
        let prompt = PromptTemplate::new("Render into $lang_out: $text");
        let backend = OpenAiBackend::new(&settings(), Some(prompt)).unwrap();
        let request = backend.request("Hi", "en", "ja");
        assert_eq!(request.messages[0].content, "Render into ja: Hi");
    }

    #[test]
    fn response_parses() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":" Hallo \n"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.trim(), "Hallo");
    }
}
