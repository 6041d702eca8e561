//! The cross-link rule: a user-typed entity created under a user-typed parent
//! re-parents the sub-user named in its details.

use crate::{
  Error, Result,
  category::CategoryType,
  entity::Details,
};

/// Key in an entity's details naming the user to re-parent.
pub const SUBUSER_ID_KEY: &str = "subuser_id";

/// A pending parent update for a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossLink {
  pub subuser_id:       String,
  pub parent_entity_id: String,
}

/// Raised through [`Error::Link`] when the sub-user does not exist.
#[derive(Debug, thiserror::Error)]
#[error("user {0} not found")]
pub struct UnknownSubuser(pub String);

/// Whether creating a `child` entity under a `parent` fires a cross-link.
///
/// Only the types matter; two different categories that are both
/// [`CategoryType::User`] still link.
pub fn links(parent: &CategoryType, child: &CategoryType) -> bool {
  parent.is_user() && child.is_user()
}

/// Decide the cross-link for a new sub-entity.
///
/// Returns `Ok(None)` when the types do not call for one, regardless of what
/// `details` contains. When they do, `details` must carry a string
/// `subuser_id`.
pub fn plan(
  parent_type: &CategoryType,
  child_type: &CategoryType,
  details: &Details,
  parent_entity_id: &str,
) -> Result<Option<CrossLink>> {
  if !links(parent_type, child_type) {
    return Ok(None);
  }

  let raw = details
    .get(SUBUSER_ID_KEY)
    .ok_or_else(|| Error::Validation("subuser_id not found in details".into()))?;
  let subuser_id = raw
    .as_str()
    .ok_or_else(|| Error::Validation("subuser_id must be a string".into()))?;

  Ok(Some(CrossLink {
    subuser_id:       subuser_id.to_owned(),
    parent_entity_id: parent_entity_id.to_owned(),
  }))
}
