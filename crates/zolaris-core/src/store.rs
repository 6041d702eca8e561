//! Collaborator traits for the hierarchy engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `zolaris-store-sqlite`). The engine and the `zolaris` binary depend on
//! these abstractions, not on any concrete backend.
//!
//! Absence is reported as `Ok(None)` / `Ok(false)`; `Err` is reserved for
//! backend failures. All methods return `Send` futures so implementations
//! can be shared across a multi-threaded tokio runtime.

use std::future::Future;

use crate::{
  category::{Category, CategoryType, NewCategory},
  device::{Device, NewDevice},
  entity::{Entity, Level, NewEntity},
  tree::EntityNode,
  user::{NewUser, User, UserUpdate},
};

// ─── Entities ────────────────────────────────────────────────────────────────

/// Persistence for the entity forest.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new root entity (no parent, depth 0).
  fn create_root(
    &self,
    input: NewEntity,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Persist a new entity one level below `parent_id`.
  ///
  /// Reading the parent's depth and inserting the child happen atomically.
  /// Returns `None` if the parent does not exist.
  fn create_sub<'a>(
    &'a self,
    input: NewEntity,
    parent_id: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Retrieve an entity by id. Returns `None` if not found.
  fn get_entity<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Direct children of `entity_id`, or every descendant when `recursive`.
  /// Ordered by depth, then creation order.
  fn get_children<'a>(
    &'a self,
    entity_id: &'a str,
    recursive: bool,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Descendants of `entity_id` within `level`, optionally restricted to
  /// entities whose category has exactly `category_type`.
  fn get_by_level<'a>(
    &'a self,
    entity_id: &'a str,
    level: Level,
    category_type: Option<&'a CategoryType>,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Materialise the tree rooted at `root_id`. Returns `None` if the root
  /// does not exist.
  fn get_hierarchy<'a>(
    &'a self,
    root_id: &'a str,
  ) -> impl Future<Output = Result<Option<EntityNode>, Self::Error>> + Send + 'a;

  /// The category id of an entity. Returns `None` if the entity does not
  /// exist.
  fn category_id_for_entity<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// Whether any entity is owned by `user_id`.
  fn check_presence<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// The earliest-created entity owned by `user_id`, if any.
  fn entity_for_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// The category directory.
pub trait CategoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The type of a category. Returns `None` if the category does not exist.
  fn category_type<'a>(
    &'a self,
    category_id: &'a str,
  ) -> impl Future<Output = Result<Option<CategoryType>, Self::Error>> + Send + 'a;

  fn add_category(
    &self,
    input: NewCategory,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  fn get_category<'a>(
    &'a self,
    category_id: &'a str,
  ) -> impl Future<Output = Result<Option<Category>, Self::Error>> + Send + 'a;

  /// List all categories, optionally filtered by type. Ordered by name.
  fn list_categories(
    &self,
    category_type: Option<CategoryType>,
  ) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// The user directory the engine links sub-users through.
pub trait UserDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Point `user_id`'s parent at `parent_entity_id`. Returns `false` if no
  /// such user exists.
  fn set_parent<'a>(
    &'a self,
    user_id: &'a str,
    parent_entity_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Overwrite the profile fields set in `update` and refresh
  /// `updated_at`. Returns `None` if the user does not exist.
  fn update_user<'a>(
    &'a self,
    user_id: &'a str,
    update: UserUpdate,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Whether the user has a parent. Returns `None` if the user does not
  /// exist.
  fn has_parent<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<bool>, Self::Error>> + Send + 'a;

  /// Users whose referral email is `user_id`'s email. Empty if the referrer
  /// does not exist.
  fn list_referred_users<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;
}

// ─── Devices ─────────────────────────────────────────────────────────────────

/// Devices registered to users.
pub trait DeviceRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Register a device. Fails if `device_id` is already registered.
  fn add_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  /// Devices owned by `user_id`, in registration order.
  fn list_devices_for_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + 'a;
}
