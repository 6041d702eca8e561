//! Users as seen by the hierarchy: records the engine may re-parent but whose
//! lifecycle it does not own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:       String,
  pub email:         String,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  /// Email of the user who referred this one.
  pub referral_mail: Option<String>,
  /// Entity this user was linked under by a cross-link.
  pub parent_id:     Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
  pub email:         String,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub referral_mail: Option<String>,
}

/// Profile fields to overwrite. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
}

impl UserUpdate {
  /// Whether the update would change nothing.
  pub fn is_empty(&self) -> bool { self.first_name.is_none() && self.last_name.is_none() }
}
