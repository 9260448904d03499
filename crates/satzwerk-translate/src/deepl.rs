// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DeepL REST API backend (`/v2/translate`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use satzwerk_core::config::DeepLSettings;
use satzwerk_core::error::{Result, SatzwerkError};

use crate::backend::{TranslationBackend, check_status, http_client, transport_error};

const SERVICE_ID: &str = "deepl";
const USER_AGENT: &str = concat!("satzwerk/", env!("CARGO_PKG_VERSION"));
const FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
const PRO_ENDPOINT: &str = "https://api.deepl.com/v2/translate";

const LANGUAGES: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "id", "it", "ja",
    "ko", "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "uk", "zh",
];

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: [&'a str; 1],
    source_lang: String,
    target_lang: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

pub struct DeepLBackend {
    client: reqwest::Client,
    api_key: String,
    endpoint: &'static str,
}

impl DeepLBackend {
    pub fn new(settings: &DeepLSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(SatzwerkError::config(
                "services.deepl.api_key",
                "not set (use the config file or DEEPL_API_KEY)",
            ));
        }
        // Free-tier keys end in ":fx" and only work against the free host.
        let endpoint = if settings.api_key.ends_with(":fx") {
            FREE_ENDPOINT
        } else {
            PRO_ENDPOINT
        };
        Ok(Self {
            client: http_client(SERVICE_ID, USER_AGENT)?,
            api_key: settings.api_key.clone(),
            endpoint,
        })
    }
}

/// Source languages are bare upper-case primary subtags.
fn source_code(code: &str) -> String {
    primary(code).to_ascii_uppercase()
}

/// Target languages need a regional variant for English and Portuguese.
fn target_code(code: &str) -> String {
    let upper = code.replace('_', "-").to_ascii_uppercase();
    match upper.as_str() {
        "EN" => "EN-US".into(),
        "PT" => "PT-PT".into(),
        "EN-GB" | "EN-US" | "PT-BR" | "PT-PT" => upper,
        _ => primary(code).to_ascii_uppercase(),
    }
}

fn primary(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

#[async_trait]
impl TranslationBackend for DeepLBackend {
    fn service_id(&self) -> &str {
        SERVICE_ID
    }

    fn supported_languages(&self) -> &[&str] {
        LANGUAGES
    }

    async fn do_translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let body = TranslateRequest {
            text: [text],
            source_lang: source_code(source_lang),
            target_lang: target_code(target_lang),
        };
        debug!(target = %body.target_lang, chars = text.len(), "sending deepl request");

        let response = self
            .client
            .post(self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;
        let parsed: TranslateResponse = check_status(SERVICE_ID, response)
            .await?
            .json()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| SatzwerkError::Translation("deepl: empty response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_keys_use_free_host() {
        let free = DeepLBackend::new(&DeepLSettings {
            api_key: "abc:fx".into(),
        })
        .unwrap();
        assert_eq!(free.endpoint, FREE_ENDPOINT);

        let pro = DeepLBackend::new(&DeepLSettings {
            api_key: "abc".into(),
        })
        .unwrap();
        assert_eq!(pro.endpoint, PRO_ENDPOINT);
    }

    #[test]
    fn language_codes_are_mapped() {
        assert_eq!(source_code("zh-CN"), "ZH");
        assert_eq!(target_code("zh-CN"), "ZH");
        assert_eq!(target_code("en"), "EN-US");
        assert_eq!(target_code("pt_br"), "PT-BR");
        assert_eq!(target_code("de"), "DE");
    }

    #[test]
    fn request_body_shape() {
        let body = TranslateRequest {
            text: ["Hallo"],
            source_lang: "DE".into(),
            target_lang: "EN-US".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"][0], "Hallo");
        assert_eq!(json["target_lang"], "EN-US");
    }
}
