//! Error types for `zolaris-core`.

use thiserror::Error;

/// Boxed cause carried by the storage and cross-link variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing caller input. Never retried.
  #[error("validation error: {0}")]
  Validation(String),

  /// A referenced entity, category or user does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// The underlying store failed.
  #[error("storage error: {0}")]
  Storage(#[source] BoxError),

  /// The cross-link step failed after the entity was already persisted.
  #[error("failed to update user parent: {0}")]
  Link(#[source] BoxError),
}

impl Error {
  pub(crate) fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  pub(crate) fn link<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Link(Box::new(e))
  }

  /// Whether the caller may retry the whole operation.
  ///
  /// A retried `Link` failure will create a second entity; creation has no
  /// idempotency key.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Storage(_) | Self::Link(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
