//! Categories: typed tags applied to entities.
//!
//! A category's [`CategoryType`] is set at creation and never changes. Only
//! [`CategoryType::User`] carries special behaviour in the hierarchy engine;
//! every other type is a generic grouping.

use std::{convert::Infallible, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The semantic type of a category.
///
/// Stored as a plain string; unrecognised strings round-trip through
/// [`CategoryType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryType {
  User,
  Organization,
  DeviceGroup,
  Other(String),
}

impl CategoryType {
  pub fn as_str(&self) -> &str {
    match self {
      Self::User => "user",
      Self::Organization => "organization",
      Self::DeviceGroup => "device-group",
      Self::Other(s) => s,
    }
  }

  pub fn is_user(&self) -> bool { matches!(self, Self::User) }
}

impl From<&str> for CategoryType {
  fn from(s: &str) -> Self {
    match s {
      "user" => Self::User,
      "organization" => Self::Organization,
      "device-group" => Self::DeviceGroup,
      other => Self::Other(other.to_owned()),
    }
  }
}

impl From<String> for CategoryType {
  fn from(s: String) -> Self { Self::from(s.as_str()) }
}

impl From<CategoryType> for String {
  fn from(t: CategoryType) -> Self { t.as_str().to_owned() }
}

impl FromStr for CategoryType {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::from(s)) }
}

impl fmt::Display for CategoryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A persisted category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub category_id:   String,
  pub name:          String,
  pub category_type: CategoryType,
  pub created_at:    DateTime<Utc>,
}

/// Input for [`CategoryStore::add_category`](crate::store::CategoryStore::add_category).
#[derive(Debug, Clone)]
pub struct NewCategory {
  pub name:          String,
  pub category_type: CategoryType,
}
