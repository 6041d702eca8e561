//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, entity details as compact JSON
//! objects and category types as their textual tag. Ids are opaque text,
//! generated here as hyphenated UUID v4 strings.

use chrono::{DateTime, Utc};
use zolaris_core::{
  category::{Category, CategoryType},
  device::Device,
  entity::{Details, Entity},
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Ids ─────────────────────────────────────────────────────────────────────

pub fn new_id() -> String { Uuid::new_v4().hyphenated().to_string() }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Details ─────────────────────────────────────────────────────────────────

pub fn encode_details(details: &Details) -> Result<String> {
  Ok(serde_json::to_string(details)?)
}

pub fn decode_details(entity_id: &str, s: &str) -> Result<Details> {
  match serde_json::from_str(s)? {
    serde_json::Value::Object(map) => Ok(map),
    _ => Err(Error::DetailsNotObject(entity_id.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for every entity read, in [`RawEntity::from_row`] order.
pub const ENTITY_COLUMNS: &str = "e.entity_id, e.name, e.category_id, e.parent_id, \
   e.user_id, e.depth, e.details, e.created_at, e.updated_at";

/// Raw values read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:   String,
  pub name:        String,
  pub category_id: String,
  pub parent_id:   Option<String>,
  pub user_id:     Option<String>,
  pub depth:       u32,
  pub details:     String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawEntity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:   row.get(0)?,
      name:        row.get(1)?,
      category_id: row.get(2)?,
      parent_id:   row.get(3)?,
      user_id:     row.get(4)?,
      depth:       row.get(5)?,
      details:     row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    let details = decode_details(&self.entity_id, &self.details)?;
    Ok(Entity {
      details,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      entity_id:   self.entity_id,
      name:        self.name,
      category_id: self.category_id,
      parent_id:   self.parent_id,
      user_id:     self.user_id,
      depth:       self.depth,
    })
  }
}

pub const CATEGORY_COLUMNS: &str = "category_id, name, category_type, created_at";

/// Raw strings read directly from a `categories` row.
pub struct RawCategory {
  pub category_id:   String,
  pub name:          String,
  pub category_type: String,
  pub created_at:    String,
}

impl RawCategory {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      category_id:   row.get(0)?,
      name:          row.get(1)?,
      category_type: row.get(2)?,
      created_at:    row.get(3)?,
    })
  }

  pub fn into_category(self) -> Result<Category> {
    Ok(Category {
      created_at:    decode_dt(&self.created_at)?,
      category_id:   self.category_id,
      name:          self.name,
      category_type: CategoryType::from(self.category_type),
    })
  }
}

pub const USER_COLUMNS: &str = "user_id, email, first_name, last_name, referral_mail, \
   parent_id, created_at, updated_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub email:         String,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub referral_mail: Option<String>,
  pub parent_id:     Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      email:         row.get(1)?,
      first_name:    row.get(2)?,
      last_name:     row.get(3)?,
      referral_mail: row.get(4)?,
      parent_id:     row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      user_id:       self.user_id,
      email:         self.email,
      first_name:    self.first_name,
      last_name:     self.last_name,
      referral_mail: self.referral_mail,
      parent_id:     self.parent_id,
    })
  }
}

pub const DEVICE_COLUMNS: &str = "device_id, name, user_id, category, description, created_at";

/// Raw strings read directly from a `devices` row.
pub struct RawDevice {
  pub device_id:   String,
  pub name:        String,
  pub user_id:     String,
  pub category:    Option<String>,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawDevice {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      device_id:   row.get(0)?,
      name:        row.get(1)?,
      user_id:     row.get(2)?,
      category:    row.get(3)?,
      description: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_device(self) -> Result<Device> {
    Ok(Device {
      created_at:  decode_dt(&self.created_at)?,
      device_id:   self.device_id,
      name:        self.name,
      user_id:     self.user_id,
      category:    self.category,
      description: self.description,
    })
  }
}
