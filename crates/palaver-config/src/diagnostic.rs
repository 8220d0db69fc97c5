// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment errors rendered as miette diagnostics.
//!
//! A misspelled key is the common failure, so it is the only one that gets a
//! source span and a Jaro-Winkler "did you mean" hint.

#![allow(unused_assignments)] // generated by miette's Diagnostic derive

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", table_name(.section.as_deref()))]
    #[diagnostic(
        code(palaver::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), section.as_deref()))
    )]
    UnknownKey {
        key: String,
        section: Option<String>,
        suggestion: Option<String>,
        #[label("not a palaver setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` is {found}, expected {expected}")]
    #[diagnostic(code(palaver::config::invalid_value))]
    InvalidValue {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(palaver::config::missing_key),
        help("every [[providers]] entry needs `kind` and `model`")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense.
    #[error("validation error: {message}")]
    #[diagnostic(code(palaver::config::validation))]
    Validation { message: String },

    /// Syntax errors, unreadable files and anything else figment reports.
    #[error("could not read configuration: {0}")]
    #[diagnostic(code(palaver::config::unreadable))]
    Unreadable(String),
}

impl From<ConfigError> for palaver_core::PalaverError {
    fn from(err: ConfigError) -> Self {
        palaver_core::PalaverError::Config(err.to_string())
    }
}

fn table_name(section: Option<&str>) -> String {
    match section {
        Some(section) => format!("[{section}]"),
        None => "the top level".to_string(),
    }
}

fn unknown_key_help(suggestion: Option<&str>, section: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`?"),
        None => format!("{} has no setting with this name", table_name(section)),
    }
}

/// Flattens a figment error (which may hold several) into diagnostics.
///
/// `toml_sources` pairs a file path with its contents; unknown keys found in
/// one of them get a labelled span.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let section = error.path.first().cloned();
                let located = source_for(&error, toml_sources).and_then(|(path, content)| {
                    let offset = key_offset(content, section.as_deref(), field)?;
                    Some((
                        SourceSpan::new(offset.into(), field.len()),
                        NamedSource::new(path, content.clone()),
                    ))
                });
                let (span, src) = located.unzip();
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    section,
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => {
                let mut path = error.path.clone();
                path.push(field.to_string());
                ConfigError::MissingKey {
                    key: path.join("."),
                }
            }
            Kind::InvalidType(found, expected) => ConfigError::InvalidValue {
                key: error.path.join("."),
                found: found.to_string(),
                expected: expected.clone(),
            },
            _ => ConfigError::Unreadable(error.to_string()),
        })
        .collect()
}

/// The source text the error came from. Inline strings carry no file
/// metadata, so a lone candidate is assumed to be it.
fn source_for<'a>(
    error: &figment::error::Error,
    toml_sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    }
}

/// Byte offset of a `field =` line, searched after the `[section]` or
/// `[[section]]` header when one is given.
pub fn key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let start = match section {
        None => 0,
        Some(section) => {
            let array = format!("[[{section}]]");
            let table = format!("[{section}]");
            content
                .find(&array)
                .map(|pos| pos + array.len())
                .or_else(|| content.find(&table).map(|pos| pos + table.len()))?
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Closest valid key above the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
