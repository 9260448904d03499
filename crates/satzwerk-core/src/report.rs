// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document outcome reports.
//
// Page and run failures are recovered locally; this is where they end up so
// the caller can see what was degraded.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// Layout and content decoded normally.
    Translated,
    /// Layout detection failed; the page was treated as one text region.
    Degraded { reason: String },
    /// The content stream could not be decoded; the page was copied unchanged.
    Skipped { reason: String },
    /// Outside the page selection.
    Untouched,
}

/// A text run whose translation failed and kept its original glyphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Index of the run within its page.
    pub run_index: usize,
    /// Leading characters of the source text.
    pub excerpt: String,
    pub error: String,
}

impl RunFailure {
    const EXCERPT_CHARS: usize = 40;

    pub fn new(run_index: usize, text: &str, error: impl std::fmt::Display) -> Self {
        let mut excerpt: String = text.chars().take(Self::EXCERPT_CHARS).collect();
        if text.chars().count() > Self::EXCERPT_CHARS {
            excerpt.push('…');
        }
        Self {
            run_index,
            excerpt,
            error: error.to_string(),
        }
    }
}

/// Outcome for one page (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    pub status: PageStatus,
    pub runs_total: usize,
    pub runs_translated: usize,
    pub failures: Vec<RunFailure>,
}

impl PageReport {
    pub fn untouched(page: u32) -> Self {
        Self {
            page,
            status: PageStatus::Untouched,
            runs_total: 0,
            runs_translated: 0,
            failures: Vec::new(),
        }
    }

    pub fn skipped(page: u32, reason: impl Into<String>) -> Self {
        Self {
            status: PageStatus::Skipped {
                reason: reason.into(),
            },
            ..Self::untouched(page)
        }
    }

    /// Whether anything on the page fell back to original content.
    pub fn has_problems(&self) -> bool {
        !self.failures.is_empty()
            || matches!(
                self.status,
                PageStatus::Degraded { .. } | PageStatus::Skipped { .. }
            )
    }
}

/// Aggregated outcome for one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: PathBuf,
    pub pages: Vec<PageReport>,
    pub mono_output: Option<PathBuf>,
    pub bilingual_output: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DocumentReport {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            pages: Vec::new(),
            mono_output: None,
            bilingual_output: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time from start to [`finish`](Self::finish).
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.finished_at?.signed_duration_since(self.started_at).to_std().ok()
    }

    pub fn runs_total(&self) -> usize {
        self.pages.iter().map(|p| p.runs_total).sum()
    }

    pub fn runs_translated(&self) -> usize {
        self.pages.iter().map(|p| p.runs_translated).sum()
    }

    pub fn failed_runs(&self) -> usize {
        self.pages.iter().map(|p| p.failures.len()).sum()
    }

    /// Pages that were degraded, skipped, or lost runs.
    pub fn problem_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.has_problems())
    }
}
