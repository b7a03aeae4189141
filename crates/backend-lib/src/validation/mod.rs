// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation and sanitization.

use dingfeng_common::Record;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_MESSAGE_LENGTH: usize = 500;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

// Regex patterns for validation
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,20}$").unwrap());
static ACCOUNT_EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
/// Mainland China mobile numbers, optionally prefixed with +86 or 0086
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((\+|00)86)?(1[3-9]|9[28])\d{9}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username, email and password are required")]
    MissingAccountFields,

    #[error("Username must be 3-20 letters, digits or underscores")]
    InvalidUsername,

    #[error("Invalid email address format")]
    InvalidEmail,

    #[error("Name must be at least {MIN_NAME_LENGTH} characters")]
    InvalidName,

    #[error("Please enter a valid mobile phone number")]
    InvalidPhone,

    #[error("Message cannot exceed {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an admin username
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(username)
}

/// Validate the email of an admin account
pub fn validate_account_email(email: &str) -> ValidationResult<&str> {
    if email.len() > MAX_EMAIL_LENGTH || !ACCOUNT_EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Validate an email typed into a public form
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Validate a mobile phone number
pub fn validate_phone(phone: &str) -> ValidationResult<&str> {
    if !PHONE_REGEX.is_match(phone) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(phone)
}

/// Validate a person's name
pub fn validate_name(name: &str) -> ValidationResult<&str> {
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::InvalidName);
    }
    Ok(name)
}

/// Escape HTML-significant characters
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim and escape a string from a public form
pub fn sanitize_string(input: &str) -> String {
    escape_html(input.trim())
}

/// Sanitize every string nested in a JSON value
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(sanitize_record(map)),
        other => other,
    }
}

/// Sanitize every field of a submitted form
pub fn sanitize_record(record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| (key, sanitize_value(value)))
        .collect()
}

fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn check_name_and_phone(record: &Record, errors: &mut Vec<String>) {
    if str_field(record, "name").map_or(true, |n| validate_name(n).is_err()) {
        errors.push(ValidationError::InvalidName.to_string());
    }
    if str_field(record, "phone").map_or(true, |p| validate_phone(p).is_err()) {
        errors.push(ValidationError::InvalidPhone.to_string());
    }
}

/// Check a sanitized registration form. Returns every problem found.
pub fn validate_registration(record: &Record) -> Vec<String> {
    let mut errors = Vec::new();
    check_name_and_phone(record, &mut errors);

    // Email is optional but must be valid when given
    match record.get("email") {
        None | Some(Value::Null) => {},
        Some(Value::String(email)) if email.is_empty() => {},
        Some(Value::String(email)) if validate_email(email).is_ok() => {},
        Some(_) => errors.push(ValidationError::InvalidEmail.to_string()),
    }

    errors
}

/// Check a sanitized contact form. Returns every problem found.
pub fn validate_contact(record: &Record) -> Vec<String> {
    let mut errors = Vec::new();
    check_name_and_phone(record, &mut errors);

    if let Some(message) = str_field(record, "message") {
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            errors.push(ValidationError::MessageTooLong.to_string());
        }
    }

    errors
}
