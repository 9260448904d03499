// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-supplied protection patterns. A glyph whose font name or character
// matches is never translated. Patterns match at the start of the subject.

use regex::Regex;

use satzwerk_core::error::{Result, SatzwerkError};

#[derive(Debug, Clone, Default)]
pub struct ProtectionRules {
    font: Option<Regex>,
    chars: Option<Regex>,
}

fn compile(key: &str, pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^(?:{pattern})"))
        .map(Some)
        .map_err(|e| SatzwerkError::config(key, format!("invalid regular expression: {e}")))
}

impl ProtectionRules {
    /// Empty patterns protect nothing. Invalid ones are configuration errors
    /// keyed `vfont` / `vchar`.
    pub fn new(font_pattern: &str, char_pattern: &str) -> Result<Self> {
        Ok(Self {
            font: compile("vfont", font_pattern)?,
            chars: compile("vchar", char_pattern)?,
        })
    }

    pub fn font_protected(&self, font_name: &str) -> bool {
        self.font.as_ref().is_some_and(|re| re.is_match(font_name))
    }

    pub fn char_protected(&self, text: &str) -> bool {
        self.chars.as_ref().is_some_and(|re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patterns_protect_nothing() {
        let rules = ProtectionRules::new("", "").unwrap();
        assert!(!rules.font_protected("CMMI10"));
        assert!(!rules.char_protected("∑"));
    }

    #[test]
    fn patterns_are_anchored_at_start() {
        let rules = ProtectionRules::new("CM[^R]", r"[∑∫]|\d").unwrap();
        assert!(rules.font_protected("CMMI10"));
        assert!(!rules.font_protected("CMR10"));
        assert!(!rules.font_protected("XCMMI10"));
        assert!(rules.char_protected("∫"));
        assert!(rules.char_protected("7"));
        assert!(!rules.char_protected("a"));
    }

    #[test]
    fn bad_regex_names_the_option() {
        match ProtectionRules::new("(", "") {
            Err(SatzwerkError::Configuration { key, .. }) => assert_eq!(key, "vfont"),
            other => panic!("expected configuration error, got {other:?}"),
        }
        match ProtectionRules::new("", "[") {
            Err(SatzwerkError::Configuration { key, .. }) => assert_eq!(key, "vchar"),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
