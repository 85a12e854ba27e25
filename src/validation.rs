use std::{collections::BTreeMap, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field name → first violation message for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Records `message` unless the field already has an error.
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Folds `other` in; fields already present keep their message.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.0.entry(field).or_insert(message);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A request schema: checks every field and turns the raw input into its
/// validated form, or reports all violations at once.
pub trait Validate: Sized {
    type Valid;

    fn validate(self) -> Result<Self::Valid, FieldErrors>;
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn field(&mut self, name: &'static str, value: Option<String>) -> Check<'_> {
        let value = value.map(|v| v.trim().to_string());
        self.check(name, value)
    }

    /// Like `field`, but keeps surrounding whitespace. Used for passwords.
    pub fn secret(&mut self, name: &'static str, value: Option<String>) -> Check<'_> {
        self.check(name, value)
    }

    fn check(&mut self, name: &'static str, value: Option<String>) -> Check<'_> {
        let value = value.filter(|v| !v.trim().is_empty());
        Check {
            errors: &mut self.errors,
            name,
            value,
            failed: false,
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.insert(field, message);
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.get(field).is_some()
    }

    /// Builds the validated value only when no field failed.
    pub fn finish<T>(self, build: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.errors.is_empty() {
            Ok(build())
        } else {
            Err(self.errors)
        }
    }
}

/// Rules for one field. After the first failure the remaining rules are skipped;
/// format rules skip absent values so only `required` reports emptiness.
pub struct Check<'v> {
    errors: &'v mut FieldErrors,
    name: &'static str,
    value: Option<String>,
    failed: bool,
}

impl<'v> Check<'v> {
    fn fail(&mut self, message: &str) {
        if !self.failed {
            self.errors.insert(self.name, message);
            self.failed = true;
        }
    }

    fn test(mut self, message: &str, ok: impl FnOnce(&str) -> bool) -> Self {
        if !self.failed {
            if let Some(v) = self.value.as_deref() {
                if !ok(v) {
                    self.fail(message);
                }
            }
        }
        self
    }

    pub fn required(mut self, message: &str) -> Self {
        if self.value.is_none() {
            self.fail(message);
        }
        self
    }

    pub fn email(self, message: &str) -> Self {
        self.test(message, is_valid_email)
    }

    pub fn min_len(self, min: usize, message: &str) -> Self {
        self.test(message, |v| v.chars().count() >= min)
    }

    pub fn max_len(self, max: usize, message: &str) -> Self {
        self.test(message, |v| v.chars().count() <= max)
    }

    pub fn digits(self, count: usize, message: &str) -> Self {
        self.test(message, |v| {
            v.len() == count && v.chars().all(|c| c.is_ascii_digit())
        })
    }

    pub fn one_of(self, allowed: &[&str], message: &str) -> Self {
        self.test(message, |v| allowed.iter().any(|a| *a == v))
    }

    /// Cross-field equality. A missing counterpart counts as a mismatch.
    pub fn equals(self, other: Option<&str>, message: &str) -> Self {
        self.test(message, |v| other.is_some_and(|o| o == v))
    }

    pub fn value(self) -> Option<String> {
        if self.failed {
            None
        } else {
            self.value
        }
    }

    pub fn parse<T: FromStr>(mut self, message: &str) -> Option<T> {
        if self.failed {
            return None;
        }
        let raw = self.value.take()?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(message);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn collects_every_failing_field() {
        let mut v = Validator::default();
        v.field("name", None).required("Name is required");
        v.field("email", Some("nope".into()))
            .required("Email is required")
            .email("Invalid email format");
        v.field("mobile", Some("123".into()))
            .required("Mobile number is required")
            .digits(10, "Mobile number must be 10 digits");
        v.field("gender", Some("male".into()))
            .one_of(&["male", "female", "other"], "Gender must be male, female or other");

        let errors = v.finish(|| ()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Invalid email format"));
        assert_eq!(errors.get("mobile"), Some("Mobile number must be 10 digits"));
        assert_eq!(errors.get("gender"), None);
    }

    #[test]
    fn merge_keeps_existing_messages() {
        let mut errors = FieldErrors::default();
        errors.insert("image", "Only image files are allowed");
        let mut other = FieldErrors::default();
        other.insert("image", "Image is required");
        other.insert("name", "Name is required");

        errors.merge(other);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("image"), Some("Only image files are allowed"));
        assert_eq!(errors.get("name"), Some("Name is required"));
    }

    #[test]
    fn first_violation_per_field_wins() {
        let mut v = Validator::default();
        v.secret("password", Some("   ".into()))
            .required("Password is required")
            .min_len(6, "Password must be at least 6 characters");
        let errors = v.finish(|| ()).unwrap_err();
        assert_eq!(errors.get("password"), Some("Password is required"));
    }

    #[test]
    fn optional_fields_skip_format_rules() {
        let mut v = Validator::default();
        let desc = v.field("description", None).max_len(10, "too long").value();
        assert!(desc.is_none());
        assert!(v.finish(|| ()).is_ok());
    }

    #[test]
    fn equals_compares_against_the_other_field() {
        let mut v = Validator::default();
        v.field("confirmPassword", Some("abcdef".into()))
            .equals(Some("abcdeg"), "Confirm password must match new password");
        let errors = v.finish(|| ()).unwrap_err();
        assert_eq!(
            errors.get("confirmPassword"),
            Some("Confirm password must match new password")
        );
    }

    #[test]
    fn parse_reports_bad_numbers() {
        let mut v = Validator::default();
        let stock: Option<i32> = v.field("stock", Some("ten".into())).parse("Stock must be a whole number");
        let price: Option<rust_decimal::Decimal> =
            v.field("price", Some("9.99".into())).parse("Price must be a number");
        assert!(stock.is_none());
        assert_eq!(price.map(|p| p.to_string()), Some("9.99".to_string()));
        assert!(v.has_error("stock"));
        assert!(!v.has_error("price"));
    }
}
