// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Satzwerk Translate: translation backends (Google, OpenAI-compatible,
// DeepL), the retry engine, and the persistent translation cache that sits in
// front of them.

pub mod backend;
pub mod cache;
pub mod deepl;
pub mod fingerprint;
pub mod google;
pub mod openai;
pub mod retry;
pub mod translator;

pub use backend::{TranslationBackend, build_backend};
pub use cache::{CacheEntry, MemoryCache, SqliteCache, TranslationCache};
pub use fingerprint::Fingerprint;
pub use retry::{RetryPolicy, classify_error};
pub use translator::{Translator, TranslatorOptions};
