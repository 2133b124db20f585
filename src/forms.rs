//! HTML form payloads and their validation.
//!
//! Structural rules (lengths, email shape) live on the structs as `validator`
//! attributes. Rules that need the database or compare fields are checked by
//! the handlers and added to the same [`FormErrors`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// Field name to messages, rendered next to each input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// All messages for a field joined into one line.
    pub fn message(&self, field: &str) -> String {
        self.0
            .get(field)
            .map(|messages| messages.join(" "))
            .unwrap_or_default()
    }

    /// Validate `form` and collect any failures.
    pub fn check<T: Validate>(form: &T) -> Self {
        match form.validate() {
            Ok(()) => Self::new(),
            Err(errors) => errors.into(),
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.add(&field, message);
            }
        }
        out
    }
}

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required")
            .with_message(Cow::Borrowed("This field is required.")));
    }
    Ok(())
}

fn username_rules(value: &str) -> Result<(), ValidationError> {
    required(value)?;
    let valid = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(ValidationError::new("username_chars").with_message(Cow::Borrowed(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    #[validate(
        length(max = 150, message = "Ensure this value has at most 150 characters."),
        custom(function = "username_rules")
    )]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(
        min = 8,
        message = "This password is too short. It must contain at least 8 characters."
    ))]
    pub password1: String,

    pub password2: String,
}

impl RegisterForm {
    /// Cross-field password rules.
    pub fn check_passwords(&self, errors: &mut FormErrors) {
        if !self.password1.is_empty() && self.password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password1", "This password is entirely numeric.");
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(custom(function = "required"))]
    pub content: String,
}

/// Text part of the post create/update form; the image arrives separately.
#[derive(Debug, Default, Clone, Validate)]
pub struct PostForm {
    #[validate(
        custom(function = "required"),
        length(max = 80, message = "Ensure this value has at most 80 characters.")
    )]
    pub title: String,

    #[validate(custom(function = "required"))]
    pub content: String,

    pub category_ids: Vec<i64>,
}

impl PostForm {
    /// Takes a reference since templates pass arguments by reference.
    pub fn has_category(&self, id: &i64) -> bool {
        self.category_ids.contains(id)
    }
}

/// Text part of the profile form.
#[derive(Debug, Default, Clone, Validate)]
pub struct ProfileForm {
    #[validate(
        length(max = 150, message = "Ensure this value has at most 150 characters."),
        custom(function = "username_rules")
    )]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}
