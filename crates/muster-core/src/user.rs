//! Admin users and their permission sets.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated operator of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:             i64,
  pub username:       String,
  pub name:           String,
  /// argon2 PHC string; never serialised to clients.
  #[serde(skip_serializing, default)]
  pub password_hash:  String,
  pub is_super_admin: bool,
  pub permissions:    BTreeSet<String>,
  pub created_at:     DateTime<Utc>,
}

impl User {
  /// Whether the user holds `permission` directly or as a super admin.
  pub fn can(&self, permission: &str) -> bool {
    self.is_super_admin || self.permissions.contains(permission)
  }
}

/// A user ready to persist; the password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
  pub username:       String,
  pub name:           String,
  pub password_hash:  String,
  pub is_super_admin: bool,
  pub permissions:    BTreeSet<String>,
}

/// The create-user form as posted by a client, with a plaintext password.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserForm {
  pub username:       String,
  pub name:           String,
  pub password:       String,
  #[serde(default)]
  pub is_super_admin: bool,
  #[serde(default)]
  pub permissions:    BTreeSet<String>,
}

/// The edit-profile form. Leaving `password` empty keeps the current one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
  pub name:                  String,
  #[serde(default)]
  pub current_password:      Option<String>,
  #[serde(default)]
  pub password:              Option<String>,
  #[serde(default)]
  pub password_confirmation: Option<String>,
}

impl ProfileForm {
  /// The requested new password, if the form asks for a change.
  pub fn new_password(&self) -> Option<&str> {
    self.password.as_deref().filter(|p| !p.is_empty())
  }
}
