//! Supported recognition languages.
//!
//! Internal codes are two-letter ISO 639-1 codes. The remote recognizer uses
//! its own three-letter vocabulary, mapped through a static table.

use crate::error::{OcrDeskError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One built-in language: internal code, display name, remote code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub code: &'static str,
    pub display_name: &'static str,
    pub remote_code: &'static str,
}

const fn lang(code: &'static str, display_name: &'static str, remote_code: &'static str) -> LanguageSpec {
    LanguageSpec {
        code,
        display_name,
        remote_code,
    }
}

pub const BUILTIN_LANGUAGES: [LanguageSpec; 14] = [
    lang("en", "English", "eng"),
    lang("ru", "Russian", "rus"),
    lang("de", "German", "ger"),
    lang("fr", "French", "fre"),
    lang("es", "Spanish", "spa"),
    lang("it", "Italian", "ita"),
    lang("pt", "Portuguese", "por"),
    lang("nl", "Dutch", "dut"),
    lang("pl", "Polish", "pol"),
    lang("uk", "Ukrainian", "ukr"),
    lang("ja", "Japanese", "jpn"),
    lang("ko", "Korean", "kor"),
    lang("zh", "Chinese", "chi_sim"),
    lang("ar", "Arabic", "ara"),
];

fn find(code: &str) -> Option<&'static LanguageSpec> {
    let code = code.trim();
    BUILTIN_LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

pub fn is_supported(code: &str) -> bool {
    find(code).is_some()
}

/// Map an internal code to the remote recognizer's code.
///
/// # Errors
///
/// `OcrDeskError::UnsupportedLanguage` for codes outside the built-in table.
pub fn remote_language_code(code: &str) -> Result<&'static str> {
    find(code)
        .map(|l| l.remote_code)
        .ok_or_else(|| OcrDeskError::UnsupportedLanguage(code.to_string()))
}

/// Display name for an internal code.
pub fn display_name(code: &str) -> Result<&'static str> {
    find(code)
        .map(|l| l.display_name)
        .ok_or_else(|| OcrDeskError::UnsupportedLanguage(code.to_string()))
}

/// Normalize an accepted code to its canonical lowercase form.
pub fn normalize_code(code: &str) -> Result<&'static str> {
    find(code)
        .map(|l| l.code)
        .ok_or_else(|| OcrDeskError::UnsupportedLanguage(code.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Builtin,
    Remote,
}

/// Code to display-name mapping shown to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageCatalog {
    pub languages: BTreeMap<String, String>,
    pub source: CatalogSource,
}

impl LanguageCatalog {
    pub fn builtin() -> Self {
        Self {
            languages: BUILTIN_LANGUAGES
                .iter()
                .map(|l| (l.code.to_string(), l.display_name.to_string()))
                .collect(),
            source: CatalogSource::Builtin,
        }
    }

    /// Fetch the catalog from `url`, falling back to the built-in table on any failure.
    pub async fn fetch(url: &str, timeout: Duration) -> Self {
        match Self::try_fetch(url, timeout).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(url, error = %e, "Language catalog unavailable, using built-in table");
                Self::builtin()
            }
        }
    }

    async fn try_fetch(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrDeskError::remote_with_source("Failed to build HTTP client", e))?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(OcrDeskError::remote(format!(
                "Language catalog returned status {}",
                response.status()
            )));
        }

        let languages: BTreeMap<String, String> = response.json().await?;
        if languages.is_empty() {
            return Err(OcrDeskError::remote("Language catalog is empty"));
        }

        Ok(Self {
            languages,
            source: CatalogSource::Remote,
        })
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.languages.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
