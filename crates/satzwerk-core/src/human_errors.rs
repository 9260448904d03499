// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command-line summary.
//
// Every technical error is mapped to a plain sentence plus a suggestion the
// user can act on.

use crate::error::SatzwerkError;
use crate::types::ErrorClass;

/// A human-readable error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the user should try next.
    pub suggestion: String,
    /// Whether simply running again may help.
    pub retriable: bool,
    pub class: ErrorClass,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: class == ErrorClass::Transient,
            class,
        }
    }
}

/// Convert a `SatzwerkError` into a `HumanError`.
pub fn humanize_error(err: &SatzwerkError) -> HumanError {
    match err {
        SatzwerkError::LayoutAnalysis(_) => HumanError::new(
            "Page layout could not be analysed.",
            "Check that the layout model path points at a valid .rten file. Affected pages are translated as plain text.",
            ErrorClass::Permanent,
        ),

        SatzwerkError::ContentExtraction(_) => HumanError::new(
            "A page's drawing instructions could not be read.",
            "The page was copied unchanged. Re-saving the PDF with another tool may repair it.",
            ErrorClass::Permanent,
        ),

        SatzwerkError::Translation(detail) => humanize_translation_detail(detail),

        SatzwerkError::RateLimited {
            service,
            retry_after_secs,
        } => HumanError::new(
            format!("{service} is limiting how fast we can translate."),
            match retry_after_secs {
                Some(secs) => format!("Wait about {secs} seconds, or lower --thread, then try again."),
                None => "Wait a minute, or lower --thread, then try again.".to_string(),
            },
            ErrorClass::Transient,
        ),

        SatzwerkError::Network(_) => HumanError::new(
            "The translation service could not be reached.",
            "Check your internet connection and any proxy settings.",
            ErrorClass::Transient,
        ),

        SatzwerkError::Timeout(_) => HumanError::new(
            "The translation service took too long to answer.",
            "Try again later; already translated text is cached and will not be requested twice.",
            ErrorClass::Transient,
        ),

        SatzwerkError::Api {
            service, status, ..
        } => match *status {
            401 | 403 => HumanError::new(
                format!("{service} rejected our credentials."),
                "Check the API key in the configuration file or environment.",
                ErrorClass::UserAction,
            ),
            status if status >= 500 => HumanError::new(
                format!("{service} had an internal problem."),
                "This is usually temporary. Try again in a few minutes.",
                ErrorClass::Transient,
            ),
            _ => HumanError::new(
                format!("{service} refused the request."),
                "The text may be too long or the language pair unsupported by this service.",
                ErrorClass::Permanent,
            ),
        },

        SatzwerkError::Configuration { key, reason } => HumanError::new(
            format!("The setting '{key}' is invalid."),
            format!("Fix it and run again ({reason})."),
            ErrorClass::UserAction,
        ),

        SatzwerkError::Pdf(_) => HumanError::new(
            "There's a problem with this PDF file.",
            "The file may be damaged or encrypted. Try opening it in a viewer first.",
            ErrorClass::Permanent,
        ),

        SatzwerkError::Font(_) => HumanError::new(
            "A font could not be loaded.",
            "Check the CJK font path; it must point at a TrueType (.ttf) file.",
            ErrorClass::UserAction,
        ),

        SatzwerkError::Image(_) => HumanError::new(
            "A page could not be rendered for layout analysis.",
            "Make sure the pdfium library is installed, or run without a layout model.",
            ErrorClass::Permanent,
        ),

        SatzwerkError::Database(_) => HumanError::new(
            "The translation cache could not be used.",
            "Another run may hold the cache; try again, or pass --ignore-cache.",
            ErrorClass::Transient,
        ),

        SatzwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "A file could not be found.",
                "Check the input path and output directory.",
                ErrorClass::UserAction,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "Permission denied while reading or writing a file.",
                "Choose an output directory you can write to.",
                ErrorClass::UserAction,
            ),
            _ => HumanError::new(
                "A file operation failed.",
                format!("Try again. (Detail: {io_err})"),
                ErrorClass::Transient,
            ),
        },

        SatzwerkError::Serialization(_) => HumanError::new(
            "Data could not be read or written.",
            "A configuration or response file may be malformed.",
            ErrorClass::Permanent,
        ),
    }
}

/// Translation errors carry the last underlying cause as text.
fn humanize_translation_detail(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") || lower.contains("network") || lower.contains("rate limit") {
        HumanError::new(
            "Some text could not be translated after several attempts.",
            "Those passages were left in the original language. Run again later to fill them in.",
            ErrorClass::Transient,
        )
    } else if lower.contains("too long") {
        HumanError::new(
            "A passage was too long for the translation service.",
            "It was left untranslated. A service with a larger limit may handle it.",
            ErrorClass::Permanent,
        )
    } else {
        HumanError::new(
            "The translation service returned an error.",
            format!("Affected text was left untranslated. (Detail: {detail})"),
            ErrorClass::Permanent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retriable() {
        let human = humanize_error(&SatzwerkError::Timeout("attempt after 30s".into()));
        assert_eq!(human.class, ErrorClass::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn bad_key_needs_user_action() {
        let err = SatzwerkError::Api {
            service: "deepl".into(),
            status: 403,
            message: "forbidden".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.class, ErrorClass::UserAction);
        assert!(!human.retriable);
    }

    #[test]
    fn configuration_mentions_key() {
        let human = humanize_error(&SatzwerkError::config("pages", "page numbers start at 1"));
        assert!(human.message.contains("pages"));
        assert!(human.suggestion.contains("start at 1"));
    }

    #[test]
    fn exhausted_retries_after_timeouts_are_transient() {
        let err = SatzwerkError::Translation("3 attempts failed; last: timed out: google".into());
        assert_eq!(humanize_error(&err).class, ErrorClass::Transient);
    }

    #[test]
    fn rate_limit_suggests_wait() {
        let err = SatzwerkError::RateLimited {
            service: "openai".into(),
            retry_after_secs: Some(20),
        };
        assert!(humanize_error(&err).suggestion.contains("20 seconds"));
    }
}
