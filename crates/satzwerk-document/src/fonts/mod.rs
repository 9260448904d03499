// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output fonts: Base-14 metrics, CJK fonts, and the per-document registry.

pub mod cjk;
pub mod registry;
pub mod standard;

pub use cjk::{AdobeCjkFont, EmbeddedFont};
pub use registry::{FontKey, FontRegistry, FontUsage, merge_usage};
pub use standard::StandardFont;
