use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::domain::{Application, Submission};

pub const MIN_AGE: i32 = 16;
pub const MAX_AGE: i32 = 100;

const MIN_TEXT_LEN: usize = 2;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

/// A single failed field constraint, listed in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldError {
    Name,
    Email,
    Gender,
    Age,
    CurrentOccupation,
}

impl FieldError {
    pub fn message(self) -> &'static str {
        match self {
            FieldError::Name => "Name is required.",
            FieldError::Email => "Valid email required.",
            FieldError::Gender => "Gender is required.",
            FieldError::Age => "Age must be 16–100.",
            FieldError::CurrentOccupation => "Current occupation required.",
        }
    }
}

/// Every constraint a submission failed. Renders as the space-joined messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.0.iter().map(|field| field.message()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join(" "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Runs every field check in order and collects all failures.
pub fn validate(submission: &Submission) -> ValidationErrors {
    let mut errors = Vec::new();

    if !has_min_length(submission.name.as_deref()) {
        errors.push(FieldError::Name);
    }
    if !submission
        .email
        .as_deref()
        .is_some_and(|email| email_pattern().is_match(email))
    {
        errors.push(FieldError::Email);
    }
    if submission.gender.as_deref().map_or(true, str::is_empty) {
        errors.push(FieldError::Gender);
    }
    if coerce_age(submission.age.as_ref()).is_none() {
        errors.push(FieldError::Age);
    }
    if !has_min_length(submission.current_occupation.as_deref()) {
        errors.push(FieldError::CurrentOccupation);
    }

    ValidationErrors(errors)
}

fn has_min_length(value: Option<&str>) -> bool {
    value.is_some_and(|text| text.trim().chars().count() >= MIN_TEXT_LEN)
}

/// Coerces a loosely typed age value and returns it when it is a whole number in range.
///
/// Absent and `null` count as zero, booleans as 0/1, strings are parsed after trimming
/// (an empty string is zero). Arrays and objects never coerce.
pub fn coerce_age(value: Option<&Value>) -> Option<i32> {
    let number = match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::Number(number)) => number.as_f64()?,
        Some(Value::String(text)) => parse_numeric(text)?,
        Some(Value::Array(_)) | Some(Value::Object(_)) => return None,
    };

    if !number.is_finite() || number.fract() != 0.0 {
        return None;
    }
    if number < f64::from(MIN_AGE) || number > f64::from(MAX_AGE) {
        return None;
    }
    Some(number as i32)
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix = match trimmed.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        // `from_str_radix` tolerates a leading sign, which a prefixed literal never has.
        let digits = &trimmed[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        return u64::from_str_radix(digits, radix)
            .ok()
            .map(|value| value as f64);
    }

    // `f64::from_str` also accepts "inf" and "nan" spellings; those are rejected later
    // by the finiteness check, so the outcome matches a strict numeric parse.
    trimmed.parse::<f64>().ok()
}

impl Application {
    /// Validates a submission and normalizes it for storage.
    pub fn from_submission(
        submission: Submission,
        ip_address: Option<String>,
    ) -> Result<Self, ValidationErrors> {
        let errors = validate(&submission);
        if !errors.is_empty() {
            return Err(errors);
        }

        let Submission {
            name,
            email,
            gender,
            age,
            current_occupation,
        } = submission;

        let age = coerce_age(age.as_ref()).ok_or_else(|| ValidationErrors(vec![FieldError::Age]))?;

        Ok(Self {
            name: name.unwrap_or_default().trim().to_string(),
            email: email.unwrap_or_default().trim().to_lowercase(),
            gender: gender.unwrap_or_default(),
            age,
            current_occupation: current_occupation.unwrap_or_default().trim().to_string(),
            ip_address,
        })
    }
}
