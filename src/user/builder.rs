//! Record constructor and partial update for [`User`].

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};
use zeroize::Zeroizing;

use super::{Status, User, fields};
use crate::crypto::{Password, PasswordHash, PasswordManager};
use crate::error::Result;

/// [`User`] builder.
///
/// Used both for new records and to rebuild records read from storage;
/// an already hashed password is kept as-is unless it was set through
/// [`UserBuilder::plaintext_password`].
#[derive(Clone, Default)]
pub struct UserBuilder {
    id: Option<Uuid>,
    name: String,
    email: String,
    phone: String,
    password: Zeroizing<String>,
    plaintext: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl UserBuilder {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Update `id` field. A nil UUID is treated as unset.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id).filter(|id| !id.is_nil());
        self
    }

    /// Update `name` field.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Update `email` field.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Update `phone` field.
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    /// Update `password` field with either a plaintext or a PHC string.
    ///
    /// An empty password is rejected by [`UserBuilder::build`]; use
    /// [`UserPatch`] to update other fields only.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Zeroizing::new(password.into());
        self.plaintext = false;
        self
    }

    /// Update `password` field with caller input, always hashed even if it
    /// looks like a PHC string.
    pub fn plaintext_password(mut self, password: impl Into<String>) -> Self {
        self.password = Zeroizing::new(password.into());
        self.plaintext = true;
        self
    }

    /// Update `created_at` field.
    pub fn created_at(mut self, date: DateTime<Utc>) -> Self {
        self.created_at = Some(date);
        self
    }

    /// Update `updated_at` field.
    pub fn updated_at(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.updated_at = date;
        self
    }

    /// Update `deleted_at` field.
    pub fn deleted_at(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.deleted_at = date;
        self
    }

    /// Validate every field and build the [`User`].
    ///
    /// All field errors are reported at once.
    pub fn build(self, pwd: &PasswordManager) -> Result<User> {
        let mut errors = ValidationErrors::new();

        let name = fields::name(&self.name)
            .map_err(|err| errors.add("name", err))
            .ok();
        let email = fields::email(&self.email)
            .map_err(|err| errors.add("email", err))
            .ok();
        let phone = fields::phone(&self.phone)
            .map_err(|err| errors.add("phone", err))
            .ok();
        let password = hash_once(&self.password, self.plaintext, pwd)
            .map_err(|err| errors.add("password", err))
            .ok();

        let (Some(name), Some(email), Some(phone), Some(password)) =
            (name, email, phone, password)
        else {
            return Err(errors.into());
        };

        Ok(User {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name,
            email,
            phone,
            password,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            updated_at: self.updated_at,
            status: match self.deleted_at {
                Some(at) => Status::Deleted { at },
                None => Status::Active,
            },
        })
    }
}

/// Hash `password` unless it is a trusted PHC string.
fn hash_once(
    password: &str,
    plaintext: bool,
    pwd: &PasswordManager,
) -> std::result::Result<PasswordHash, ValidationError> {
    if !plaintext {
        if let Ok(hash) = PasswordHash::parse(password) {
            return Ok(hash);
        }
    }

    if password.is_empty() {
        return Err(ValidationError::new("required")
            .with_message("password is required".into()));
    }

    let password = Password::new(password)?;
    pwd.hash_password(&password).map_err(hashing_error)
}

pub(crate) fn hashing_error(err: impl std::fmt::Display) -> ValidationError {
    ValidationError::new("hash").with_message(err.to_string().into())
}

/// Partial update of a [`User`].
///
/// An empty field means "unchanged".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserPatch {
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
}

impl UserPatch {
    /// Create a new [`UserPatch`], validating every non-empty field.
    pub fn new(name: &str, email: &str, phone: &str) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        let mut field =
            |key: &'static str,
             value: &str,
             check: fn(&str) -> std::result::Result<String, ValidationError>| {
                if value.trim().is_empty() {
                    return None;
                }
                check(value).map_err(|err| errors.add(key, err)).ok()
            };

        let patch = Self {
            name: field("name", name, fields::name),
            email: field("email", email, fields::email),
            phone: field("phone", phone, fields::phone),
        };

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(patch)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Apply non-empty fields on `user`.
    pub(crate) fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(phone) = &self.phone {
            user.phone.clone_from(phone);
        }
    }
}
