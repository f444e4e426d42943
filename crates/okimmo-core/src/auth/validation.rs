//! Form checks run before any credentials leave the device.

use thiserror::Error;

/// Minimum password length accepted by the backend
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum display name length for registration
pub const MIN_NAME_LEN: usize = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Name must be at least 2 characters")]
    NameTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Registration form as typed by the user
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl RegistrationForm {
    /// Copy of the form with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
            password_confirmation: self.password_confirmation.trim().to_string(),
        }
    }
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_registration(form: &RegistrationForm) -> Result<(), ValidationError> {
    if form.name.is_empty()
        || form.email.is_empty()
        || form.password.is_empty()
        || form.password_confirmation.is_empty()
    {
        return Err(ValidationError::MissingFields);
    }
    if form.name.chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::NameTooShort);
    }
    if !is_valid_email(&form.email) {
        return Err(ValidationError::InvalidEmail);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if form.password != form.password_confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Address shape check: `local@label(.label)+`.
///
/// The local part allows letters, digits and `+._%-`; domain labels must start
/// with a letter or digit and may contain `-`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.len() <= 256
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+._%-".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        label.len() <= 64
            && label.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
