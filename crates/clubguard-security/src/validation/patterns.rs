//! Compiled detection and shape patterns

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Tag-like sequences: `<...>`
pub(crate) static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Stray angle brackets
pub(crate) static ANGLE_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[<>]").expect("valid regex"));

/// Script schemes and inline handlers removed by sanitization
pub(crate) static SCRIPT_FRAGMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)javascript:|vbscript:|onload=|onerror=").expect("valid regex")
});

pub(crate) static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub(crate) static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,30}$").expect("valid regex"));

/// SQL keywords matched as whole words
pub(crate) static SQL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT|OBJECT|TABLE|FROM|WHERE|HAVING)\b",
    )
    .expect("valid regex")
});

pub(crate) static XSS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?is)<script\b[^>]*>.*?</script\s*>",
        r#"(?i)\bon[a-z]+\s*=\s*["']"#,
        r"(?i)javascript:",
        r"(?i)vbscript:",
        r"(?i)<iframe\b",
        r"(?i)<object\b",
    ])
    .expect("valid regex set")
});
