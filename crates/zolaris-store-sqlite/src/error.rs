//! Error type for `zolaris-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored `details` column did not hold a JSON object.
  #[error("details of entity {0} are not a JSON object")]
  DetailsNotObject(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
