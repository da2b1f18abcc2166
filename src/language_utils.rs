//! Language utilities for caption track codes
//!
//! Caption sources report BCP-47 style tags (`en`, `pt-BR`, `zh-Hans`) plus an
//! `-orig` suffix marking the original-audio automatic track. This module
//! handles variant expansion, code comparison and human-readable names.

use anyhow::{Result, anyhow};
use isolang::Language;

// @const: Suffix marking a regional "original audio" variant
pub const ORIGINAL_SUFFIX: &str = "-orig";

// @const: Display names for the languages offered by default
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("tr", "Türkçe (Turkish)"),
    ("es", "Español (Spanish)"),
    ("fr", "Français (French)"),
    ("de", "Deutsch (German)"),
    ("it", "Italiano (Italian)"),
    ("pt", "Português (Portuguese)"),
    ("ru", "Русский (Russian)"),
    ("ja", "日本語 (Japanese)"),
    ("ko", "한국어 (Korean)"),
    ("zh-Hans", "中文简体 (Chinese Simplified)"),
    ("zh-Hant", "中文繁體 (Chinese Traditional)"),
    ("ar", "العربية (Arabic)"),
    ("hi", "हिन्दी (Hindi)"),
    ("nl", "Nederlands (Dutch)"),
    ("pl", "Polski (Polish)"),
    ("sv", "Svenska (Swedish)"),
    ("no", "Norsk (Norwegian)"),
    ("da", "Dansk (Danish)"),
    ("fi", "Suomi (Finnish)"),
    ("cs", "Čeština (Czech)"),
    ("el", "Ελληνικά (Greek)"),
    ("he", "עברית (Hebrew)"),
    ("id", "Bahasa Indonesia (Indonesian)"),
    ("th", "ไทย (Thai)"),
    ("vi", "Tiếng Việt (Vietnamese)"),
    ("uk", "Українська (Ukrainian)"),
    ("ro", "Română (Romanian)"),
    ("hu", "Magyar (Hungarian)"),
    ("bg", "Български (Bulgarian)"),
    ("sr", "Српски (Serbian)"),
    ("hr", "Hrvatski (Croatian)"),
    ("sk", "Slovenčina (Slovak)"),
    ("ca", "Català (Catalan)"),
];

/// Codes interchangeable with `code` for matching, the code itself first
///
/// A code without a region suffix also matches its `-orig` variant, and an
/// `-orig` code also matches its base.
pub fn language_variants(code: &str) -> Vec<String> {
    let code = code.trim();
    let mut variants = vec![code.to_string()];

    if let Some(base) = code.strip_suffix(ORIGINAL_SUFFIX) {
        variants.push(base.to_string());
    } else if !code.contains('-') {
        variants.push(format!("{}{}", code, ORIGINAL_SUFFIX));
    }

    variants
}

/// Whether a code is an original-audio variant
pub fn is_original_variant(code: &str) -> bool {
    code.ends_with(ORIGINAL_SUFFIX)
}

/// Check if a catalog code satisfies a requested code (exact or variant)
pub fn language_codes_match(requested: &str, available: &str) -> bool {
    language_variants(requested)
        .iter()
        .any(|variant| variant.eq_ignore_ascii_case(available.trim()))
}

/// Validate a caption language code
///
/// Accepts BCP-47 shaped tags: a 2 or 3 letter primary subtag followed by
/// optional alphanumeric subtags.
pub fn validate_language_code(code: &str) -> Result<()> {
    let code = code.trim();
    let mut parts = code.split('-');
    let primary = parts.next().unwrap_or_default();

    let primary_ok = (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic());
    let rest_ok = parts.all(|p| !p.is_empty() && p.len() <= 8 && p.chars().all(|c| c.is_ascii_alphanumeric()));

    if primary_ok && rest_ok {
        Ok(())
    } else {
        Err(anyhow!("Invalid language code: {}", code))
    }
}

/// Get the English language name from an ISO 639-1 or 639-3 primary subtag
pub fn get_language_name(code: &str) -> Result<String> {
    let primary = code.trim().split('-').next().unwrap_or_default().to_lowercase();

    let lang = match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => Language::from_639_3(&primary),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Unknown language code: {}", code))?;

    Ok(lang.to_name().to_string())
}

/// Human-readable label for a code, as shown in listings and messages
///
/// Falls back to the ISO name, then to the upper-cased code.
pub fn format_language_option(code: &str) -> String {
    if let Some((_, name)) = LANGUAGE_NAMES.iter().find(|(c, _)| *c == code) {
        return name.to_string();
    }

    if let Some(base) = code.strip_suffix(ORIGINAL_SUFFIX) {
        return format!("{} (original)", format_language_option(base));
    }

    match get_language_name(code) {
        Ok(name) if code.contains('-') => format!("{} ({})", name, code),
        Ok(name) => name,
        Err(_) => code.to_uppercase(),
    }
}
