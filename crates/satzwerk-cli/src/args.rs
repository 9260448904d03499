// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and their translation into a `TranslationTask`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use satzwerk_core::config::AppConfig;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::pages::PageSelector;
use satzwerk_core::types::{OutputMode, PromptTemplate, ServiceKind, TranslationTask};
use satzwerk_document::ProtectionRules;

/// Translate PDF documents while keeping their layout.
#[derive(Debug, Parser)]
#[command(name = "satzwerk", version, about)]
pub struct Cli {
    /// PDF files to translate.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Output directory.
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    pub output: PathBuf,

    /// Page selection, e.g. 1,3,5-7.
    #[arg(short, long, value_name = "SPEC")]
    pub pages: Option<String>,

    /// Translation service: google, openai or deepl.
    #[arg(short, long, value_name = "NAME")]
    pub service: Option<String>,

    /// Source language code.
    #[arg(long, value_name = "CODE")]
    pub lang_in: Option<String>,

    /// Target language code.
    #[arg(long, value_name = "CODE")]
    pub lang_out: Option<String>,

    /// Concurrent translation requests.
    #[arg(short, long, value_name = "N")]
    pub thread: Option<usize>,

    /// Font names matching this pattern are never translated.
    #[arg(short = 'f', long, value_name = "REGEX", default_value = "")]
    pub vfont: String,

    /// Characters matching this pattern are never translated.
    #[arg(short = 'c', long, value_name = "REGEX", default_value = "")]
    pub vchar: String,

    /// Custom prompt template file for LLM services.
    #[arg(long, value_name = "FILE")]
    pub prompt: Option<PathBuf>,

    /// Which documents to write.
    #[arg(long, value_enum, default_value_t = OutputModeArg::Both)]
    pub output_mode: OutputModeArg,

    /// Do not read cached translations.
    #[arg(long)]
    pub ignore_cache: bool,

    /// Embed full font tables instead of the used characters only.
    #[arg(long)]
    pub skip_subset_fonts: bool,

    /// Layout model in .rten format.
    #[arg(long, value_name = "PATH")]
    pub layout_model: Option<PathBuf>,

    /// Also write the per-document reports to this file as JSON.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    Mono,
    Bilingual,
    Both,
}

impl From<OutputModeArg> for OutputMode {
    fn from(arg: OutputModeArg) -> Self {
        match arg {
            OutputModeArg::Mono => Self::Mono,
            OutputModeArg::Bilingual => Self::Bilingual,
            OutputModeArg::Both => Self::Both,
        }
    }
}

impl Cli {
    /// The task template shared by every input file. Everything that can be
    /// checked without opening a document is checked here.
    pub fn task(&self, config: &AppConfig) -> Result<TranslationTask> {
        let service = match &self.service {
            Some(name) => name.parse::<ServiceKind>()?,
            None => config.default_service,
        };
        let page_selector = self.pages.as_deref().map(PageSelector::parse).transpose()?;
        let thread_count = self.thread.unwrap_or(config.thread_count);
        if thread_count == 0 {
            return Err(SatzwerkError::config("thread", "must be at least 1"));
        }
        ProtectionRules::new(&self.vfont, &self.vchar)?;

        let prompt = match &self.prompt {
            Some(path) => {
                let template = std::fs::read_to_string(path).map_err(|err| {
                    SatzwerkError::config("prompt", format!("cannot read {}: {err}", path.display()))
                })?;
                Some(PromptTemplate::new(template))
            }
            None => None,
        };

        let template = self.files.first().cloned().unwrap_or_default();
        Ok(TranslationTask {
            page_selector,
            source_lang: self.lang_in.clone().unwrap_or_else(|| config.source_lang.clone()),
            target_lang: self.lang_out.clone().unwrap_or_else(|| config.target_lang.clone()),
            service,
            thread_count,
            protected_font_pattern: self.vfont.clone(),
            protected_char_pattern: self.vchar.clone(),
            ignore_cache: self.ignore_cache,
            skip_subset_fonts: self.skip_subset_fonts,
            prompt,
            output_mode: self.output_mode.into(),
            ..TranslationTask::new(template)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("satzwerk").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_come_from_config() {
        let cli = parse(&["paper.pdf"]);
        let task = cli.task(&AppConfig::default()).unwrap();
        assert_eq!(cli.output, PathBuf::from("output"));
        assert_eq!(task.source_lang, "en");
        assert_eq!(task.target_lang, "zh-CN");
        assert_eq!(task.service, ServiceKind::Google);
        assert_eq!(task.thread_count, 4);
        assert_eq!(task.output_mode, OutputMode::Both);
        assert!(task.page_selector.is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "-s", "deepl", "--lang-out", "de", "-t", "8", "-p", "1,3-4", "--output-mode", "mono",
            "-f", "CM.*", "--ignore-cache", "a.pdf", "b.pdf",
        ]);
        let task = cli.task(&AppConfig::default()).unwrap();
        assert_eq!(cli.files.len(), 2);
        assert_eq!(task.service, ServiceKind::DeepL);
        assert_eq!(task.target_lang, "de");
        assert_eq!(task.thread_count, 8);
        assert_eq!(task.output_mode, OutputMode::Mono);
        assert_eq!(task.protected_font_pattern, "CM.*");
        assert!(task.ignore_cache);
        let pages = task.page_selector.unwrap().resolve(10).unwrap();
        assert_eq!(pages.into_iter().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn invalid_options_are_configuration_errors() {
        let config = AppConfig::default();
        for args in [
            &["-p", "0-2", "a.pdf"][..],
            &["-p", "abc", "a.pdf"],
            &["-s", "babelfish", "a.pdf"],
            &["-c", "[", "a.pdf"],
            &["-t", "0", "a.pdf"],
            &["--prompt", "/nonexistent/prompt.txt", "a.pdf"],
        ] {
            let err = parse(args).task(&config).unwrap_err();
            assert!(
                matches!(err, SatzwerkError::Configuration { .. }),
                "{args:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn prompt_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Translate $text into $lang_out").unwrap();
        let cli = parse(&["--prompt", path.to_str().unwrap(), "a.pdf"]);
        let task = cli.task(&AppConfig::default()).unwrap();
        assert_eq!(task.prompt.unwrap().as_str(), "Translate $text into $lang_out");
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["satzwerk"]).is_err());
    }
}
