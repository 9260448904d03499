// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Satzwerk.

use thiserror::Error;

/// Top-level error type for all Satzwerk operations.
#[derive(Debug, Error)]
pub enum SatzwerkError {
    // -- Page pipeline errors --
    #[error("layout analysis failed: {0}")]
    LayoutAnalysis(String),

    #[error("content extraction failed: {0}")]
    ContentExtraction(String),

    // -- Translation errors --
    #[error("translation failed: {0}")]
    Translation(String),

    #[error("{service}: rate limit exceeded")]
    RateLimited {
        service: String,
        /// Server-suggested wait, if the response carried one.
        retry_after_secs: Option<u64>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    // -- Configuration --
    #[error("configuration error for {key}: {reason}")]
    Configuration { key: String, reason: String },

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SatzwerkError {
    /// Shorthand for building a [`SatzwerkError::Configuration`].
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SatzwerkError>;
