// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Translation request fingerprints: SHA-256 over the normalised request.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use satzwerk_core::types::PromptTemplate;

/// Field separator (ASCII unit separator), never present in normalised text.
const SEP: &[u8] = b"\x1f";

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic key for one translation request.
///
/// Two requests with the same normalised text, language pair, service and
/// prompt always produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(
        text: &str,
        source_lang: &str,
        target_lang: &str,
        service_id: &str,
        prompt: Option<&PromptTemplate>,
    ) -> Self {
        let prompt_hash = prompt
            .map(|p| hash_bytes(p.as_str().as_bytes()))
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        for (i, field) in [
            normalize_text(text).as_str(),
            source_lang,
            target_lang,
            service_id,
            prompt_hash.as_str(),
        ]
        .iter()
        .enumerate()
        {
            if i > 0 {
                hasher.update(SEP);
            }
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed hex digest (as read back from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
