// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Satzwerk core: shared types, run configuration, and error definitions.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod pages;
pub mod report;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, SatzwerkError};
pub use pages::PageSelector;
pub use report::{DocumentReport, PageReport, PageStatus, RunFailure};
pub use types::*;
