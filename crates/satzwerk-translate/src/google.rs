// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Google Translate via the public mobile web endpoint.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use satzwerk_core::config::GoogleSettings;
use satzwerk_core::error::{Result, SatzwerkError};

use crate::backend::{TranslationBackend, check_status, http_client, transport_error};

const SERVICE_ID: &str = "google";

/// The endpoint rejects longer queries.
pub const MAX_CHARS: usize = 5000;

const USER_AGENT: &str = "Mozilla/4.0 (compatible;MSIE 6.0;Windows NT 5.1;SV1;.NET CLR 1.1.4322;.NET CLR 2.0.50727;.NET CLR 3.0.04506.30)";

const RESULT_PATTERN: &str = r#"(?s)class="(?:t0|result-container)">(.*?)<"#;

const LANGUAGES: &[&str] = &[
    "auto", "af", "ar", "bg", "bn", "ca", "cs", "cy", "da", "de", "el", "en", "eo", "es", "et",
    "fa", "fi", "fr", "ga", "gl", "gu", "he", "hi", "hr", "hu", "hy", "id", "is", "it", "ja",
    "ka", "kk", "km", "kn", "ko", "la", "lt", "lv", "mk", "ml", "mn", "mr", "ms", "my", "nb",
    "ne", "nl", "no", "pa", "pl", "pt", "ro", "ru", "si", "sk", "sl", "sq", "sr", "sv", "sw",
    "ta", "te", "th", "tl", "tr", "uk", "ur", "uz", "vi", "zh", "zh-CN", "zh-TW",
];

pub struct GoogleBackend {
    client: reqwest::Client,
    endpoint: String,
    result_re: Regex,
}

impl GoogleBackend {
    pub fn new(settings: &GoogleSettings) -> Result<Self> {
        let result_re = Regex::new(RESULT_PATTERN)
            .map_err(|err| SatzwerkError::Translation(format!("google result pattern: {err}")))?;
        Ok(Self {
            client: http_client(SERVICE_ID, USER_AGENT)?,
            endpoint: settings.endpoint.clone(),
            result_re,
        })
    }

    /// Pull the translated text out of the returned HTML page.
    fn extract(&self, html: &str) -> Option<String> {
        let captured = self.result_re.captures(html)?.get(1)?.as_str();
        Some(html_escape::decode_html_entities(captured).trim().to_string())
    }
}

/// The endpoint wants `zh-CN` rather than bare `zh`.
fn google_code(code: &str) -> &str {
    if code.eq_ignore_ascii_case("zh") { "zh-CN" } else { code }
}

#[async_trait]
impl TranslationBackend for GoogleBackend {
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
        let chars = text.chars().count();
        if chars > MAX_CHARS {
            return Err(SatzwerkError::Translation(format!(
                "google: text too long ({chars} chars, max {MAX_CHARS})"
            )));
        }

        debug!(chars, "sending google translate request");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("tl", google_code(target_lang)),
                ("sl", google_code(source_lang)),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;

        let body = check_status(SERVICE_ID, response)
            .await?
            .text()
            .await
            .map_err(|err| transport_error(SERVICE_ID, err))?;

        self.extract(&body).ok_or_else(|| {
            SatzwerkError::Translation("google: no translation found in response".into())
        })
    }
}
