//! Devices registered to a user.
//!
//! A device is identified by the hardware id it reports (usually its MAC
//! address), so ids are supplied by the caller rather than generated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  pub device_id:   String,
  pub name:        String,
  /// The owning user.
  pub user_id:     String,
  pub category:    Option<String>,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
  pub device_id:   String,
  pub name:        String,
  pub user_id:     String,
  pub category:    Option<String>,
  pub description: Option<String>,
}
