//! Entities: the nodes of the hierarchy forest.
//!
//! An entity's parent and depth are fixed when it is created. Roots have no
//! parent and depth 0; every other entity sits exactly one level below its
//! parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Free-form key/value payload attached to an entity.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// A persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:   String,
  pub name:        String,
  pub category_id: String,
  pub parent_id:   Option<String>,
  /// The user that owns this entity, if any.
  pub user_id:     Option<String>,
  pub depth:       u32,
  pub details:     Details,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Entity {
  pub fn is_root(&self) -> bool { self.parent_id.is_none() }
}

/// Input for creating an entity. Placement (root or sub) is chosen by the
/// store method it is passed to.
#[derive(Debug, Clone)]
pub struct NewEntity {
  pub category_id: String,
  pub name:        String,
  pub user_id:     Option<String>,
  pub details:     Details,
}

/// How far below an entity a traversal reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  /// Descendants at most this many levels below the start; `1` is direct
  /// children only.
  UpTo(u32),
  /// All descendants.
  Unbounded,
}

impl Level {
  /// Maximum relative depth, or `None` when unbounded.
  pub fn max_depth(self) -> Option<u32> {
    match self {
      Self::UpTo(n) => Some(n),
      Self::Unbounded => None,
    }
  }
}

impl TryFrom<i64> for Level {
  type Error = Error;

  /// `0` is direct children, `-1` is unbounded, `n > 0` is up to `n` levels.
  fn try_from(level: i64) -> Result<Self> {
    match level {
      -1 => Ok(Self::Unbounded),
      0 => Ok(Self::UpTo(1)),
      n if n > 0 => u32::try_from(n)
        .map(Self::UpTo)
        .map_err(|_| Error::Validation(format!("level {n} is too large"))),
      _ => Err(Error::Validation(
        "invalid level: must be -1 (all levels), 0 (direct children only), or a positive integer"
          .into(),
      )),
    }
  }
}
