// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page selection: `1,3,5-7` style selections.
//
// Parsing happens in two steps. `PageSelector::parse` checks syntax before any
// document is opened; `PageSelector::resolve` checks the numbers against the
// page count of a concrete document.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatzwerkError};

const KEY: &str = "pages";

/// An inclusive, 1-indexed page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// A syntactically valid page selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelector {
    ranges: Vec<PageRange>,
}

impl PageSelector {
    /// Parse a comma-separated list of page numbers and inclusive ranges.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut ranges = Vec::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(SatzwerkError::config(
                    KEY,
                    format!("empty entry in page selection '{spec}'"),
                ));
            }

            let range = match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_page_number(start, spec)?;
                    let end = parse_page_number(end, spec)?;
                    if end < start {
                        return Err(SatzwerkError::config(
                            KEY,
                            format!("range {part} ends before it starts"),
                        ));
                    }
                    PageRange { start, end }
                }
                None => {
                    let page = parse_page_number(part, spec)?;
                    PageRange {
                        start: page,
                        end: page,
                    }
                }
            };
            ranges.push(range);
        }

        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    /// Expand to a set of 1-indexed page numbers, rejecting pages beyond
    /// `page_count`.
    pub fn resolve(&self, page_count: u32) -> Result<BTreeSet<u32>> {
        let mut pages = BTreeSet::new();
        for range in &self.ranges {
            if range.end > page_count {
                return Err(SatzwerkError::config(
                    KEY,
                    format!(
                        "page {} out of range (document has {} pages)",
                        range.end, page_count
                    ),
                ));
            }
            pages.extend(range.start..=range.end);
        }
        Ok(pages)
    }
}

impl std::str::FromStr for PageSelector {
    type Err = SatzwerkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_page_number(raw: &str, spec: &str) -> Result<u32> {
    let page: u32 = raw.trim().parse().map_err(|_| {
        SatzwerkError::config(KEY, format!("'{}' is not a page number in '{spec}'", raw.trim()))
    })?;
    if page == 0 {
        return Err(SatzwerkError::config(KEY, "page numbers start at 1"));
    }
    Ok(page)
}

/// Resolve an optional selector: `None` means every page.
pub fn select_pages(selector: Option<&PageSelector>, page_count: u32) -> Result<BTreeSet<u32>> {
    match selector {
        Some(selector) => selector.resolve(page_count),
        None => Ok((1..=page_count).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_config_error(result: Result<PageSelector>) -> bool {
        matches!(result, Err(SatzwerkError::Configuration { .. }))
    }

    #[test]
    fn mixed_list_and_ranges() {
        let selector = PageSelector::parse("1,3,5-7").unwrap();
        let pages = selector.resolve(10).unwrap();
        assert_eq!(pages.into_iter().collect::<Vec<_>>(), vec![1, 3, 5, 6, 7]);
    }

    #[test]
    fn whitespace_and_overlap_are_tolerated() {
        let pages = PageSelector::parse(" 2 , 1-3,3 ").unwrap().resolve(4).unwrap();
        assert_eq!(pages.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_start_is_rejected() {
        assert!(is_config_error(PageSelector::parse("0-2")));
        assert!(is_config_error(PageSelector::parse("0")));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(is_config_error(PageSelector::parse("abc")));
        assert!(is_config_error(PageSelector::parse("1,,2")));
        assert!(is_config_error(PageSelector::parse("3-x")));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(is_config_error(PageSelector::parse("7-5")));
    }

    #[test]
    fn out_of_range_page_fails_on_resolve() {
        let selector = PageSelector::parse("9-11").unwrap();
        assert!(matches!(
            selector.resolve(10),
            Err(SatzwerkError::Configuration { .. })
        ));
    }

    #[test]
    fn missing_selector_selects_everything() {
        let pages = select_pages(None, 3).unwrap();
        assert_eq!(pages.len(), 3);
    }
}
