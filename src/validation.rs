//! Request payload validation.
//!
//! Payloads are parsed from a JSON object field by field. Every problem is
//! collected into [`FieldErrors`], keyed by field name, so a client gets all
//! of its mistakes back in one `400` response instead of the first one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::slug::is_valid_slug;

pub type Object = Map<String, Value>;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref URL_REGEX: Regex =
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merges `other` as is.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Merges `other`, qualifying each of its keys with `prefix` (`images[0].image`).
    pub fn absorb(&mut self, prefix: &str, other: FieldErrors) {
        for (field, messages) in other.0 {
            let key = format!("{prefix}.{field}");
            self.0.entry(key).or_default().extend(messages);
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Checks that a request body is a JSON object.
pub fn body_object(value: Value) -> Result<Object, FieldErrors> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(FieldErrors::single(
            NON_FIELD_ERRORS,
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(&other)
            ),
        )),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Field-by-field reader over one payload object.
///
/// In partial mode (PATCH) absent fields are simply skipped; otherwise an
/// absent required field is reported as [`REQUIRED`].
pub struct Fields<'a> {
    body: &'a Object,
    partial: bool,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    pub fn new(body: &'a Object, partial: bool) -> Self {
        Self {
            body,
            partial,
            errors: FieldErrors::new(),
        }
    }

    pub fn error(&mut self, key: &str, message: impl Into<String>) {
        self.errors.add(key, message);
    }

    pub fn absorb(&mut self, prefix: &str, errors: FieldErrors) {
        self.errors.absorb(prefix, errors);
    }

    /// Adds errors found by a sub-parser reading the same object.
    pub fn merge(&mut self, errors: FieldErrors) {
        self.errors.merge(errors);
    }

    fn present(&mut self, key: &str, required: bool) -> Option<&'a Value> {
        match self.body.get(key) {
            Some(value) => Some(value),
            None => {
                if required && !self.partial {
                    self.errors.add(key, REQUIRED);
                }
                None
            }
        }
    }

    fn check_len(&mut self, key: &str, value: &str, max_len: usize) -> bool {
        if value.chars().count() > max_len {
            self.errors.add(
                key,
                format!("Ensure this field has no more than {max_len} characters."),
            );
            return false;
        }
        true
    }

    /// Required, non-null, non-blank string (trimmed).
    pub fn text(&mut self, key: &str, max_len: usize) -> Option<String> {
        match self.present(key, true)? {
            Value::Null => {
                self.errors.add(key, NOT_NULL);
                None
            }
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    self.errors.add(key, NOT_BLANK);
                    None
                } else if self.check_len(key, s, max_len) {
                    Some(s.to_string())
                } else {
                    None
                }
            }
            _ => {
                self.errors.add(key, "Not a valid string.");
                None
            }
        }
    }

    /// Optional, nullable string. `None` = absent, `Some(None)` = explicit null.
    pub fn optional_text(&mut self, key: &str, max_len: Option<usize>) -> Option<Option<String>> {
        match self.present(key, false)? {
            Value::Null => Some(None),
            Value::String(s) => {
                let s = s.trim();
                match max_len {
                    Some(max) if !self.check_len(key, s, max) => None,
                    _ => Some(Some(s.to_string())),
                }
            }
            _ => {
                self.errors.add(key, "Not a valid string.");
                None
            }
        }
    }

    pub fn email(&mut self, key: &str) -> Option<Option<String>> {
        let value = self.optional_text(key, Some(254))?;
        if let Some(v) = &value {
            if !v.is_empty() && !EMAIL_REGEX.is_match(v) {
                self.errors.add(key, "Enter a valid email address.");
                return None;
            }
        }
        Some(value)
    }

    pub fn url(&mut self, key: &str) -> Option<Option<String>> {
        let value = self.optional_text(key, Some(200))?;
        if let Some(v) = &value {
            if !v.is_empty() && !URL_REGEX.is_match(v) {
                self.errors.add(key, "Enter a valid URL.");
                return None;
            }
        }
        Some(value)
    }

    /// Optional client-supplied slug; validated for shape only.
    pub fn slug(&mut self, key: &str) -> Option<String> {
        match self.present(key, false)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => {
                let s = s.trim();
                if !self.check_len(key, s, 255) {
                    None
                } else if !is_valid_slug(s) {
                    self.errors.add(
                        key,
                        "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
                    );
                    None
                } else {
                    Some(s.to_string())
                }
            }
            _ => {
                self.errors.add(key, "Not a valid string.");
                None
            }
        }
    }

    /// Optional, nullable number within `[min, max]`.
    pub fn number_in(&mut self, key: &str, min: f64, max: f64) -> Option<Option<f64>> {
        match self.present(key, false)? {
            Value::Null => Some(None),
            value => match float(value).filter(|n| n.is_finite()) {
                Some(n) if n < min => {
                    self.errors.add(
                        key,
                        format!("Ensure this value is greater than or equal to {min}."),
                    );
                    None
                }
                Some(n) if n > max => {
                    self.errors.add(
                        key,
                        format!("Ensure this value is less than or equal to {max}."),
                    );
                    None
                }
                Some(n) => Some(Some(n)),
                None => {
                    self.errors.add(key, "A valid number is required.");
                    None
                }
            },
        }
    }

    /// Optional, non-null, non-negative integer.
    pub fn count(&mut self, key: &str) -> Option<i64> {
        match self.present(key, false)? {
            Value::Null => {
                self.errors.add(key, NOT_NULL);
                None
            }
            value => match integer(value) {
                Some(n) if n < 0 => {
                    self.errors
                        .add(key, "Ensure this value is greater than or equal to 0.");
                    None
                }
                Some(n) => Some(n),
                None => {
                    self.errors.add(key, "A valid integer is required.");
                    None
                }
            },
        }
    }

    fn pk_value(&mut self, key: &str, value: &Value) -> Option<i64> {
        match integer(value) {
            Some(id) if id > 0 => Some(id),
            Some(id) => {
                self.errors
                    .add(key, format!("Invalid pk \"{id}\" - object does not exist."));
                None
            }
            None => {
                self.errors.add(
                    key,
                    format!(
                        "Incorrect type. Expected pk value, received {}.",
                        type_name(value)
                    ),
                );
                None
            }
        }
    }

    /// Required reference to another row.
    pub fn pk(&mut self, key: &str) -> Option<i64> {
        match self.present(key, true)? {
            Value::Null => {
                self.errors.add(key, NOT_NULL);
                None
            }
            value => self.pk_value(key, value),
        }
    }

    /// Optional, nullable reference to another row.
    pub fn optional_pk(&mut self, key: &str) -> Option<Option<i64>> {
        match self.present(key, false)? {
            Value::Null => Some(None),
            value => self.pk_value(key, value).map(Some),
        }
    }

    /// Optional list of references; duplicates are dropped, order kept.
    pub fn pk_list(&mut self, key: &str) -> Option<Vec<i64>> {
        match self.present(key, false)? {
            Value::Array(items) => {
                let mut ids = Vec::with_capacity(items.len());
                let mut ok = true;
                for item in items {
                    match self.pk_value(key, item) {
                        Some(id) if !ids.contains(&id) => ids.push(id),
                        Some(_) => {}
                        None => ok = false,
                    }
                }
                ok.then_some(ids)
            }
            Value::Null => {
                self.errors.add(key, NOT_NULL);
                None
            }
            other => {
                self.errors.add(
                    key,
                    format!(
                        "Expected a list of items but got type \"{}\".",
                        type_name(other)
                    ),
                );
                None
            }
        }
    }

    /// Required decimal, `>= 0`, at most `max_digits` digits and `places` decimals.
    pub fn price(&mut self, key: &str, max_digits: u32, places: u32) -> Option<Decimal> {
        let value = match self.present(key, true)? {
            Value::Null => {
                self.errors.add(key, NOT_NULL);
                return None;
            }
            value => value,
        };
        let Some(amount) = decimal(value) else {
            self.errors.add(key, "A valid number is required.");
            return None;
        };
        let amount = amount.normalize();
        if amount.is_sign_negative() && !amount.is_zero() {
            self.errors
                .add(key, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        if amount.scale() > places {
            self.errors.add(
                key,
                format!("Ensure that there are no more than {places} decimal places."),
            );
            return None;
        }
        let limit = Decimal::from(10i64.pow(max_digits - places));
        if amount >= limit {
            self.errors.add(
                key,
                format!("Ensure that there are no more than {max_digits} digits in total."),
            );
            return None;
        }
        let mut amount = amount.abs();
        amount.rescale(places);
        Some(amount)
    }

    /// Optional nested object. `Some(None)` = explicit null.
    pub fn nested(&mut self, key: &str) -> Option<Option<&'a Object>> {
        match self.present(key, false)? {
            Value::Null => Some(None),
            Value::Object(map) => Some(Some(map)),
            other => {
                self.errors.add(
                    key,
                    format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        type_name(other)
                    ),
                );
                None
            }
        }
    }

    /// Optional list of nested objects.
    pub fn nested_list(&mut self, key: &str) -> Option<Vec<&'a Object>> {
        match self.present(key, false)? {
            Value::Array(items) => {
                let mut objects = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(map) => objects.push(map),
                        other => self.errors.add(
                            format!("{key}[{i}]"),
                            format!(
                                "Invalid data. Expected a dictionary, but got {}.",
                                type_name(other)
                            ),
                        ),
                    }
                }
                (objects.len() == items.len()).then_some(objects)
            }
            other => {
                self.errors.add(
                    key,
                    format!(
                        "Expected a list of items but got type \"{}\".",
                        type_name(other)
                    ),
                );
                None
            }
        }
    }

    /// Finishes validation. `make` runs only when no error was recorded; it
    /// uses `?` on the required fields, which are all `Some` at that point.
    pub fn build<T>(self, make: impl FnOnce() -> Option<T>) -> Result<T, FieldErrors> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        make().ok_or_else(|| FieldErrors::single(NON_FIELD_ERRORS, "Invalid data."))
    }
}
