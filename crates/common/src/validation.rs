use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

pub const USERNAME_MAX_LEN: usize = 150;
pub const TITLE_MAX_LEN: usize = 128;
pub const TEXT_MAX_LEN: usize = 2048;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const MINIMUM_AGE: i32 = 15;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username regex"));

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "1234567890",
    "qwertyuiop",
    "qwerty123",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "azertyuiop",
    "motdepasse",
    "trustno1",
];

/// Field name to messages, rendered as the `fields` object of a 400 response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input for {}", self.field_names().join(", "))
    }
}

impl std::error::Error for FieldErrors {}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, field: &str, outcome: Result<(), String>) {
        if let Err(message) = outcome {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn username(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("this field may not be blank".into());
    }
    if value.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "ensure this field has no more than {USERNAME_MAX_LEN} characters"
        ));
    }
    if !USERNAME_RE.is_match(value) {
        return Err(
            "enter a valid username: letters, digits and @/./+/-/_ characters only".into(),
        );
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("enter a valid email address".into()),
    }
}

pub fn password(value: &str, username: Option<&str>) -> Result<(), String> {
    if value.chars().count() < PASSWORD_MIN_LEN {
        return Err(format!(
            "this password is too short, it must contain at least {PASSWORD_MIN_LEN} characters"
        ));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err("this password is entirely numeric".into());
    }
    let lowered = value.to_lowercase();
    if let Some(name) = username.filter(|name| !name.is_empty()) {
        if lowered.contains(&name.to_lowercase()) {
            return Err("the password is too similar to the username".into());
        }
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("this password is too common".into());
    }
    Ok(())
}

pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

pub fn birth_date(value: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if age_on(value, today) < MINIMUM_AGE {
        return Err(format!("the user must be at least {MINIMUM_AGE} years old"));
    }
    Ok(())
}

pub fn title(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("this field may not be blank".into());
    }
    max_len(value, TITLE_MAX_LEN)
}

pub fn text(value: &str) -> Result<(), String> {
    max_len(value, TEXT_MAX_LEN)
}

pub fn required_text(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("this field may not be blank".into());
    }
    max_len(value, TEXT_MAX_LEN)
}

fn max_len(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("ensure this field has no more than {max} characters"));
    }
    Ok(())
}
