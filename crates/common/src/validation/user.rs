//! Account form checks

use super::{matches, max_chars, min_chars, no_invalid_characters, not_blank, Validator};
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

static PHONE_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}-[0-9]{3}-[0-9]{4}$").expect("phone pattern compiles"));

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 100;
pub const EMAIL_MIN: usize = 5;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 8;
/// bcrypt ignores input past 72 bytes
pub const PASSWORD_MAX: usize = 70;
pub const PHONE_MIN: usize = 10;
pub const PHONE_MAX: usize = 15;

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check_field(not_blank(name), "name", "The name field cannot be blank.");
    v.check_field(
        max_chars(name, NAME_MAX),
        "name",
        "The name field is too long (max. 100 characters).",
    );
    v.check_field(
        min_chars(name, NAME_MIN),
        "name",
        "The name field is too short (min. 2 characters).",
    );
    v.check_field(
        no_invalid_characters(name),
        "name",
        "The name field contains invalid characters.",
    );
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check_field(not_blank(email), "email", "The email field cannot be blank.");
    v.check_field(
        max_chars(email, EMAIL_MAX),
        "email",
        "The email field is too long (max. 255 characters).",
    );
    v.check_field(
        min_chars(email, EMAIL_MIN),
        "email",
        "The email field is too short (min. 5 characters).",
    );
    v.check_field(
        matches(email, &EMAIL_RX),
        "email",
        "The email field is not a valid email address.",
    );
}

/// Checks a password under `key`
pub fn validate_password(v: &mut Validator, key: &str, password: &str) {
    v.check_field(not_blank(password), key, "The password field cannot be blank.");
    v.check_field(
        min_chars(password, PASSWORD_MIN),
        key,
        "The password field is too short (min. 8 characters).",
    );
    v.check_field(
        max_chars(password, PASSWORD_MAX),
        key,
        "The password field is too long (max. 70 characters).",
    );
    v.check_field(
        no_invalid_characters(password),
        key,
        "The password field contains invalid characters.",
    );
}

/// Phone is optional; an empty value is accepted as "no phone".
pub fn validate_phone(v: &mut Validator, phone: &str) {
    if phone.is_empty() {
        return;
    }
    v.check_field(
        min_chars(phone, PHONE_MIN),
        "phone",
        "The phone field is too short (min. 10 characters).",
    );
    v.check_field(
        max_chars(phone, PHONE_MAX),
        "phone",
        "The phone field is too long (max. 15 characters).",
    );
    v.check_field(
        matches(phone, &PHONE_RX),
        "phone",
        "The phone field is not a valid phone number.",
    );
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_name(&mut v, &self.name);
        validate_email(&mut v, &self.email);
        validate_password(&mut v, "password", &self.password);
        v
    }
}

/// Login credentials. Only presence is checked; a wrong value is reported
/// as a failed login rather than a field error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        v.check_field(not_blank(&self.email), "email", "The email field cannot be blank.");
        v.check_field(not_blank(&self.password), "password", "The password field cannot be blank.");
        v
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_name(&mut v, &self.name);
        validate_email(&mut v, &self.email);
        validate_phone(&mut v, &self.phone);
        v
    }

    /// `None` when the phone field was left empty
    pub fn phone(&self) -> Option<&str> {
        Some(self.phone.as_str()).filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl ChangePasswordForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        v.check_field(
            not_blank(&self.current_password),
            "currentPassword",
            "This field cannot be blank",
        );
        v.check_field(not_blank(&self.new_password), "newPassword", "This field cannot be blank");
        v.check_field(
            not_blank(&self.confirm_password),
            "confirmPassword",
            "This field cannot be blank",
        );
        validate_password(&mut v, "newPassword", &self.new_password);
        v.check_field(
            self.new_password == self.confirm_password,
            "confirmPassword",
            "Passwords do not match",
        );
        v
    }
}
