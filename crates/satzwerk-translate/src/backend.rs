// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Translation backend abstraction.
//
// A backend performs exactly one network call per `do_translate`. Caching,
// retries, timeouts and concurrency limits live in `Translator`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use tracing::info;

use satzwerk_core::config::ServiceSettings;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::{PromptTemplate, ServiceKind};

use crate::deepl::DeepLBackend;
use crate::google::GoogleBackend;
use crate::openai::OpenAiBackend;

/// Transport-level timeout; the translator applies its own per-attempt
/// timeout on top.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in an `Api` error message.
const MAX_ERROR_BODY: usize = 300;

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Stable identifier, part of every cache fingerprint.
    fn service_id(&self) -> &str;

    /// Accepted language codes. An empty slice accepts any code.
    fn supported_languages(&self) -> &[&str];

    /// Translate `text` with a single request.
    async fn do_translate(&self, text: &str, source_lang: &str, target_lang: &str)
    -> Result<String>;

    fn supports_language(&self, code: &str) -> bool {
        language_listed(self.supported_languages(), code)
    }
}

/// Match a code against a list by full code or by primary subtag.
pub fn language_listed(list: &[&str], code: &str) -> bool {
    if list.is_empty() {
        return true;
    }
    let primary = code.split(['-', '_']).next().unwrap_or(code);
    list.iter()
        .any(|l| l.eq_ignore_ascii_case(code) || l.eq_ignore_ascii_case(primary))
}

/// Build the backend selected by `kind`.
pub fn build_backend(
    kind: ServiceKind,
    settings: &ServiceSettings,
    prompt: Option<PromptTemplate>,
) -> Result<Arc<dyn TranslationBackend>> {
    let backend: Arc<dyn TranslationBackend> = match kind {
        ServiceKind::Google => Arc::new(GoogleBackend::new(&settings.google)?),
        ServiceKind::OpenAi => Arc::new(OpenAiBackend::new(&settings.openai, prompt)?),
        ServiceKind::DeepL => Arc::new(DeepLBackend::new(&settings.deepl)?),
    };
    info!(service = backend.service_id(), "translation backend ready");
    Ok(backend)
}

// -- HTTP helpers -------------------------------------------------------------

pub(crate) fn http_client(service: &str, user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| SatzwerkError::Network(format!("{service}: building HTTP client: {err}")))
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> SatzwerkError {
    if err.is_timeout() {
        SatzwerkError::Timeout(format!("{service}: {err}"))
    } else if err.is_decode() {
        SatzwerkError::Translation(format!("{service}: malformed response: {err}"))
    } else {
        SatzwerkError::Network(format!("{service}: {err}"))
    }
}

/// Pass successful responses through; turn error statuses into errors.
///
/// 429 becomes `RateLimited` (honouring `Retry-After` in seconds), everything
/// else becomes `Api` and is classified by status later.
pub(crate) async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        return Err(SatzwerkError::RateLimited {
            service: service.to_string(),
            retry_after_secs,
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(SatzwerkError::Api {
        service: service.to_string(),
        status: status.as_u16(),
        message: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_accepts_everything() {
        assert!(language_listed(&[], "tlh"));
    }

    #[test]
    fn primary_subtag_matches() {
        let list = ["en", "de", "zh"];
        assert!(language_listed(&list, "zh-CN"));
        assert!(language_listed(&list, "EN"));
        assert!(!language_listed(&list, "fr"));
    }

    #[test]
    fn factory_rejects_missing_deepl_key() {
        let settings = ServiceSettings::default();
        assert!(matches!(
            build_backend(ServiceKind::DeepL, &settings, None),
            Err(SatzwerkError::Configuration { .. })
        ));
    }

    #[test]
    fn factory_builds_google_without_credentials() {
        let backend = build_backend(ServiceKind::Google, &ServiceSettings::default(), None).unwrap();
        assert_eq!(backend.service_id(), "google");
        assert!(backend.supports_language("zh-CN"));
    }
}
