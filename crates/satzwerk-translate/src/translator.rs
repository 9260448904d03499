// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Translator: cache, in-flight deduplication, concurrency bound, timeouts and
// retries wrapped around a single backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use satzwerk_core::config::RetrySettings;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::types::{PromptTemplate, TranslationTask};

use crate::backend::TranslationBackend;
use crate::cache::{CacheEntry, TranslationCache};
use crate::fingerprint::{Fingerprint, normalize_text};
use crate::retry::RetryPolicy;

/// Settings for one translator instance.
#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub source_lang: String,
    pub target_lang: String,
    /// Maximum concurrent backend calls.
    pub thread_count: usize,
    /// Skip cache lookups (results are still stored).
    pub ignore_cache: bool,
    pub prompt: Option<PromptTemplate>,
    pub retry: RetryPolicy,
    pub attempt_timeout: Duration,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            source_lang: "en".into(),
            target_lang: "zh-CN".into(),
            thread_count: 4,
            ignore_cache: false,
            prompt: None,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl TranslatorOptions {
    pub fn from_task(task: &TranslationTask, retry: &RetrySettings) -> Self {
        Self {
            source_lang: task.source_lang.clone(),
            target_lang: task.target_lang.clone(),
            thread_count: task.thread_count,
            ignore_cache: task.ignore_cache,
            prompt: task.prompt.clone(),
            retry: RetryPolicy::from(retry),
            attempt_timeout: Duration::from_secs(retry.attempt_timeout_secs.max(1)),
        }
    }
}

type InflightMap = HashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>;

pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    cache: Arc<dyn TranslationCache>,
    options: TranslatorOptions,
    permits: Arc<Semaphore>,
    /// One lock per fingerprint with a request outstanding.
    inflight: Mutex<InflightMap>,
}

impl Translator {
    /// Create a translator, rejecting language pairs the backend cannot
    /// handle.
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        cache: Arc<dyn TranslationCache>,
        options: TranslatorOptions,
    ) -> Result<Self> {
        for (key, code) in [
            ("lang_in", &options.source_lang),
            ("lang_out", &options.target_lang),
        ] {
            if code.trim().is_empty() || !backend.supports_language(code) {
                return Err(SatzwerkError::config(
                    key,
                    format!("'{code}' is not supported by {}", backend.service_id()),
                ));
            }
        }
        if options.thread_count == 0 {
            return Err(SatzwerkError::config("thread", "must be at least 1"));
        }

        Ok(Self {
            permits: Arc::new(Semaphore::new(options.thread_count)),
            backend,
            cache,
            options,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn service_id(&self) -> &str {
        self.backend.service_id()
    }

    pub fn options(&self) -> &TranslatorOptions {
        &self.options
    }

    /// Translate one text. Blank input comes back unchanged without a call.
    #[instrument(skip_all, fields(service = %self.service_id(), chars = text.len()))]
    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if normalize_text(text).is_empty() {
            return Ok(text.to_string());
        }

        let fingerprint = Fingerprint::compute(
            text,
            source_lang,
            target_lang,
            self.service_id(),
            self.options.prompt.as_ref(),
        );

        if let Some(hit) = self.lookup(&fingerprint) {
            return Ok(hit);
        }

        let slot = self.inflight_slot(&fingerprint);
        let result = {
            let _guard = slot.lock().await;
            // An identical request may have completed while we waited.
            match self.lookup(&fingerprint) {
                Some(hit) => Ok(hit),
                None => self.call_backend(&fingerprint, text, source_lang, target_lang).await,
            }
        };
        self.release_slot(&fingerprint, slot);
        result
    }

    /// Translate many texts concurrently; results keep the input order.
    #[instrument(skip_all, fields(service = %self.service_id(), count = texts.len()))]
    pub async fn batch_translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<Result<String>> {
        join_all(
            texts
                .iter()
                .map(|text| self.translate(text, source_lang, target_lang)),
        )
        .await
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        if self.options.ignore_cache {
            return None;
        }
        match self.cache.get(fingerprint) {
            Ok(Some(hit)) => {
                debug!(%fingerprint, "cache hit");
                Some(hit)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn call_backend(
        &self,
        fingerprint: &Fingerprint,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| SatzwerkError::Translation(format!("worker pool closed: {err}")))?;

        let translated = self
            .options
            .retry
            .run(self.service_id(), |_| self.attempt(text, source_lang, target_lang))
            .await?;

        let entry = CacheEntry::new(fingerprint.clone(), text, translated.as_str(), self.service_id());
        if let Err(err) = self.cache.set(&entry) {
            warn!(error = %err, "failed to store translation in cache");
        }
        Ok(translated)
    }

    /// One backend call bounded by the per-attempt timeout.
    async fn attempt(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let timeout = self.options.attempt_timeout;
        match tokio::time::timeout(timeout, self.backend.do_translate(text, source_lang, target_lang)).await {
            Ok(result) => result,
            Err(_) => Err(SatzwerkError::Timeout(format!(
                "{} did not answer within {}s",
                self.service_id(),
                timeout.as_secs_f32()
            ))),
        }
    }

    fn inflight_slot(&self, fingerprint: &Fingerprint) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(fingerprint.clone()).or_default().clone()
    }

    fn release_slot(&self, fingerprint: &Fingerprint, slot: Arc<tokio::sync::Mutex<()>>) {
        let mut map = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // The map holds one reference and we hold the other; anyone else is
        // still waiting on the lock.
        if Arc::strong_count(&slot) <= 2 {
            map.remove(fingerprint);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rand::Rng;

    use super::*;
    use crate::cache::MemoryCache;

    /// Backend that fails the first `failures` calls, then echoes.
    #[derive(Default)]
    struct MockBackend {
        calls: AtomicUsize,
        failures: usize,
        delay_ms: u64,
        random_latency: bool,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TranslationBackend for MockBackend {
        fn service_id(&self) -> &str {
            "mock"
        }

        fn supported_languages(&self) -> &[&str] {
            &["en", "de", "zh"]
        }

        async fn do_translate(&self, text: &str, _src: &str, tgt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = if self.random_latency {
                rand::rng().random_range(1..15u64)
            } else {
                self.delay_ms
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if call < self.failures {
                Err(SatzwerkError::Network(format!("mock failure {call}")))
            } else {
                Ok(format!("[{tgt}] {text}"))
            }
        }
    }

    fn fast_options() -> TranslatorOptions {
        TranslatorOptions {
            target_lang: "de".into(),
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn translator(backend: Arc<MockBackend>, cache: Arc<MemoryCache>) -> Translator {
        Translator::new(backend, cache, fast_options()).unwrap()
    }

    #[tokio::test]
    async fn second_identical_request_hits_cache() {
        let backend = Arc::new(MockBackend::default());
        let cache = Arc::new(MemoryCache::new());
        let t = translator(backend.clone(), cache.clone());

        let first = t.translate("Hello world", "en", "de").await.unwrap();
        let second = t.translate("Hello world", "en", "de").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn ignore_cache_always_calls_backend() {
        let backend = Arc::new(MockBackend::default());
        let cache = Arc::new(MemoryCache::new());
        let options = TranslatorOptions {
            ignore_cache: true,
            ..fast_options()
        };
        let t = Translator::new(backend.clone(), cache.clone(), options).unwrap();

        t.translate("Hello", "en", "de").await.unwrap();
        t.translate("Hello", "en", "de").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_cached() {
        let backend = Arc::new(MockBackend {
            failures: 2,
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        let t = translator(backend.clone(), cache.clone());

        let result = t.translate("Retry me", "en", "de").await.unwrap();
        assert_eq!(result, "[de] Retry me");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn always_failing_backend_exhausts_attempts() {
        let backend = Arc::new(MockBackend {
            failures: usize::MAX,
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        let t = translator(backend.clone(), cache.clone());

        let err = t.translate("Never", "en", "de").await.unwrap_err();
        assert!(matches!(err, SatzwerkError::Translation(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn slow_backend_times_out_per_attempt() {
        let backend = Arc::new(MockBackend {
            delay_ms: 200,
            ..Default::default()
        });
        let options = TranslatorOptions {
            attempt_timeout: Duration::from_millis(10),
            ..fast_options()
        };
        let t = Translator::new(backend.clone(), Arc::new(MemoryCache::new()), options).unwrap();

        let err = t.translate("Slow", "en", "de").await.unwrap_err();
        match err {
            SatzwerkError::Translation(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn batch_preserves_order_under_random_latency() {
        let backend = Arc::new(MockBackend {
            random_latency: true,
            ..Default::default()
        });
        let t = translator(backend.clone(), Arc::new(MemoryCache::new()));

        let texts: Vec<String> = (0..40).map(|i| format!("sentence number {i}")).collect();
        let results = t.batch_translate(&texts, "en", "de").await;

        assert_eq!(results.len(), texts.len());
        for (text, result) in texts.iter().zip(results) {
            assert_eq!(result.unwrap(), format!("[de] {text}"));
        }
        assert!(backend.peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn concurrent_duplicates_make_one_call() {
        let backend = Arc::new(MockBackend {
            delay_ms: 20,
            ..Default::default()
        });
        let t = translator(backend.clone(), Arc::new(MemoryCache::new()));

        let texts = vec!["same text".to_string(); 6];
        let results = t.batch_translate(&texts, "en", "de").await;

        assert!(
            results
                .iter()
                .all(|r| matches!(r, Ok(text) if text == "[de] same text"))
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_text_is_not_sent() {
        let backend = Arc::new(MockBackend::default());
        let t = translator(backend.clone(), Arc::new(MemoryCache::new()));
        assert_eq!(t.translate("  \n", "en", "de").await.unwrap(), "  \n");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsupported_language_is_a_configuration_error() {
        let options = TranslatorOptions {
            target_lang: "fr".into(),
            ..fast_options()
        };
        let result = Translator::new(
            Arc::new(MockBackend::default()),
            Arc::new(MemoryCache::new()),
            options,
        );
        assert!(matches!(result, Err(SatzwerkError::Configuration { .. })));
    }
}
