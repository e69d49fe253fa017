//! Input validation and sanitization
//!
//! Every check here is pure and total: malformed input produces a
//! [`ValidationOutcome`] or `false`, never an error or a panic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use clubguard_common::config::{PasswordPolicy, ValidationConfig};

mod patterns;

use patterns::{ANGLE_BRACKETS, EMAIL, SCRIPT_FRAGMENTS, SQL_KEYWORDS, TAG, USERNAME, XSS};

const MAX_EMAIL_LENGTH: usize = 254;
const MIN_AGE: i64 = 5;
const MAX_AGE: i64 = 100;

/// Result of validating a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// Build an outcome from collected errors; valid iff there are none
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self::from_errors(vec![error.into()])
    }
}

/// Kind of user-supplied value being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Email,
    Password,
    Username,
    Text,
    Age,
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "password" => Ok(Self::Password),
            "username" => Ok(Self::Username),
            "text" => Ok(Self::Text),
            "age" => Ok(Self::Age),
            other => Err(format!("unknown input kind: {other}")),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Email => "email",
            Self::Password => "password",
            Self::Username => "username",
            Self::Text => "text",
            Self::Age => "age",
        };
        f.write_str(name)
    }
}

/// Stateless validator for user-supplied strings
#[derive(Debug, Clone)]
pub struct InputValidator {
    max_input_length: usize,
    password_policy: PasswordPolicy,
}

impl InputValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_input_length: config.max_input_length,
            password_policy: config.password.clone(),
        }
    }

    /// Strip markup and script fragments, trim, and cap the length.
    ///
    /// Removal repeats until nothing matches, so fragments that only appear
    /// after an inner removal are also stripped and the output is stable
    /// under a second pass.
    pub fn sanitize(&self, input: &str) -> String {
        let mut current = input.to_string();
        loop {
            let stripped = TAG.replace_all(&current, "");
            let stripped = ANGLE_BRACKETS.replace_all(&stripped, "");
            let stripped = SCRIPT_FRAGMENTS.replace_all(&stripped, "").into_owned();
            if stripped == current {
                break;
            }
            current = stripped;
        }

        let truncated: String = current
            .trim()
            .chars()
            .take(self.max_input_length)
            .collect();
        truncated.trim_end().to_string()
    }

    /// Sanitize an untyped value; anything but a string yields `""`
    pub fn sanitize_value(&self, input: &serde_json::Value) -> String {
        match input {
            serde_json::Value::String(s) => self.sanitize(s),
            _ => String::new(),
        }
    }

    pub fn validate_email(&self, input: &str) -> bool {
        input.chars().count() <= MAX_EMAIL_LENGTH && EMAIL.is_match(input)
    }

    /// Check a password against the configured policy, collecting every violation
    pub fn validate_password(&self, input: &str) -> ValidationOutcome {
        let policy = &self.password_policy;
        let length = input.chars().count();
        let mut errors = Vec::new();

        if length < policy.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                policy.min_length
            ));
        }
        if length > policy.max_length {
            errors.push(format!(
                "Password must be at most {} characters long",
                policy.max_length
            ));
        }
        if policy.require_uppercase && !input.chars().any(char::is_uppercase) {
            errors.push("Password must contain an uppercase letter".to_string());
        }
        if policy.require_lowercase && !input.chars().any(char::is_lowercase) {
            errors.push("Password must contain a lowercase letter".to_string());
        }
        if policy.require_digit && !input.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain a digit".to_string());
        }
        if policy.require_special && !input.chars().any(|c| !c.is_alphanumeric()) {
            errors.push("Password must contain a special character".to_string());
        }

        ValidationOutcome::from_errors(errors)
    }

    pub fn validate_username(&self, input: &str) -> bool {
        USERNAME.is_match(input)
    }

    /// Whole number in [5, 100]
    pub fn validate_age(&self, input: &str) -> bool {
        input
            .trim()
            .parse::<i64>()
            .is_ok_and(|age| (MIN_AGE..=MAX_AGE).contains(&age))
    }

    /// Keyword heuristic; legitimate prose using these words is flagged too
    pub fn contains_sql_injection(&self, input: &str) -> bool {
        SQL_KEYWORDS.is_match(input)
    }

    pub fn contains_xss(&self, input: &str) -> bool {
        XSS.is_match(input)
    }

    /// Validate `value` according to `kind`
    pub fn validate(&self, value: &str, kind: InputKind) -> ValidationOutcome {
        match kind {
            InputKind::Email => {
                if self.validate_email(value) {
                    ValidationOutcome::valid()
                } else {
                    ValidationOutcome::invalid("Invalid email address format")
                }
            }
            InputKind::Password => self.validate_password(value),
            InputKind::Username => {
                if self.validate_username(value) {
                    ValidationOutcome::valid()
                } else {
                    ValidationOutcome::invalid(
                        "Username must be 3-30 characters of letters, digits, '_' or '-'",
                    )
                }
            }
            InputKind::Age => {
                if self.validate_age(value) {
                    ValidationOutcome::valid()
                } else {
                    ValidationOutcome::invalid(format!(
                        "Age must be a whole number between {MIN_AGE} and {MAX_AGE}"
                    ))
                }
            }
            InputKind::Text => self.validate_text(value),
        }
    }

    fn validate_text(&self, value: &str) -> ValidationOutcome {
        let mut errors = Vec::new();
        if value.chars().count() > self.max_input_length {
            errors.push(format!(
                "Input must be at most {} characters long",
                self.max_input_length
            ));
        }
        if self.contains_xss(value) {
            errors.push("Input contains potentially malicious script content".to_string());
        }
        if self.contains_sql_injection(value) {
            errors.push("Input contains disallowed SQL keywords".to_string());
        }
        ValidationOutcome::from_errors(errors)
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}
