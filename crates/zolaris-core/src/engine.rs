//! Entity creation, linkage and traversal through [`HierarchyEngine`].
//!
//! The engine holds no state of its own beyond handles to its three
//! collaborators. Every step of an operation is awaited in order; nothing is
//! spawned.

use std::sync::Arc;

use tracing::debug;

use crate::{
  Error, Result,
  category::CategoryType,
  entity::{Details, Entity, Level, NewEntity},
  link::{self, UnknownSubuser},
  store::{CategoryStore, EntityStore, UserDirectory},
  tree::EntityNode,
};

/// Entry point for every hierarchy operation.
pub struct HierarchyEngine<E, C, U> {
  entities:   Arc<E>,
  categories: Arc<C>,
  users:      Arc<U>,
}

impl<E, C, U> Clone for HierarchyEngine<E, C, U> {
  fn clone(&self) -> Self {
    Self {
      entities:   Arc::clone(&self.entities),
      categories: Arc::clone(&self.categories),
      users:      Arc::clone(&self.users),
    }
  }
}

fn require(value: &str, what: &str) -> Result<()> {
  if value.is_empty() {
    return Err(Error::Validation(format!("{what} cannot be empty")));
  }
  Ok(())
}

impl<E, C, U> HierarchyEngine<E, C, U>
where
  E: EntityStore,
  C: CategoryStore,
  U: UserDirectory,
{
  pub fn new(entities: Arc<E>, categories: Arc<C>, users: Arc<U>) -> Self {
    Self { entities, categories, users }
  }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Create a top-level entity with no parent.
  pub async fn create_root_entity(
    &self,
    category_id: &str,
    name: &str,
    owner_user_id: Option<&str>,
    details: Option<Details>,
  ) -> Result<Entity> {
    require(category_id, "category ID")?;
    require(name, "entity name")?;

    let input = NewEntity {
      category_id: category_id.to_owned(),
      name:        name.to_owned(),
      user_id:     owner_user_id.map(str::to_owned),
      details:     details.unwrap_or_default(),
    };

    let entity = self
      .entities
      .create_root(input)
      .await
      .map_err(Error::storage)?;
    debug!(entity_id = %entity.entity_id, "created root entity");
    Ok(entity)
  }

  /// Create an entity under `parent_entity_id`.
  ///
  /// When both the parent's and the new entity's categories are user-typed,
  /// the user named by `details.subuser_id` is re-parented to
  /// `parent_entity_id`. The details are validated before anything is
  /// written; the re-parenting happens after the entity is persisted, and a
  /// failure there ([`Error::Link`]) leaves the entity in place.
  pub async fn create_sub_entity(
    &self,
    category_id: &str,
    name: &str,
    owner_user_id: Option<&str>,
    details: Option<Details>,
    parent_entity_id: &str,
  ) -> Result<Entity> {
    require(category_id, "category ID")?;
    require(name, "entity name")?;
    require(parent_entity_id, "parent entity ID")?;
    let details = details.unwrap_or_default();

    let parent_category_id = self
      .entities
      .category_id_for_entity(parent_entity_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("parent entity {parent_entity_id}")))?;
    let parent_type = self.resolve_category_type(&parent_category_id).await?;
    let current_type = self.resolve_category_type(category_id).await?;

    let cross_link = link::plan(&parent_type, &current_type, &details, parent_entity_id)?;

    let input = NewEntity {
      category_id: category_id.to_owned(),
      name:        name.to_owned(),
      user_id:     owner_user_id.map(str::to_owned),
      details,
    };
    let entity = self
      .entities
      .create_sub(input, parent_entity_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("parent entity {parent_entity_id}")))?;
    debug!(
      entity_id = %entity.entity_id,
      parent_id = parent_entity_id,
      depth = entity.depth,
      "created sub-entity"
    );

    if let Some(cross_link) = cross_link {
      let updated = self
        .users
        .set_parent(&cross_link.subuser_id, &cross_link.parent_entity_id)
        .await
        .map_err(Error::link)?;
      if !updated {
        return Err(Error::link(UnknownSubuser(cross_link.subuser_id)));
      }
      debug!(
        subuser_id = %cross_link.subuser_id,
        parent_entity_id = %cross_link.parent_entity_id,
        "linked sub-user"
      );
    }

    Ok(entity)
  }

  async fn resolve_category_type(&self, category_id: &str) -> Result<CategoryType> {
    self
      .categories
      .category_type(category_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("category {category_id}")))
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  /// Whether `user_id` owns any entity. Always a live lookup.
  pub async fn check_entity_exists(&self, user_id: &str) -> Result<bool> {
    require(user_id, "user ID")?;
    self
      .entities
      .check_presence(user_id)
      .await
      .map_err(Error::storage)
  }

  /// The id of the first entity owned by `user_id`, if any.
  pub async fn entity_for_user(&self, user_id: &str) -> Result<Option<String>> {
    require(user_id, "user ID")?;
    self
      .entities
      .entity_for_user(user_id)
      .await
      .map_err(Error::storage)
  }

  // ── Traversal ─────────────────────────────────────────────────────────────

  /// Direct children of `entity_id`, or all descendants when `recursive`.
  pub async fn get_child_entities(
    &self,
    entity_id: &str,
    recursive: bool,
  ) -> Result<Vec<Entity>> {
    require(entity_id, "entity ID")?;
    self
      .entities
      .get_children(entity_id, recursive)
      .await
      .map_err(Error::storage)
  }

  /// Descendants of `entity_id` down to `level`.
  ///
  /// `level` is `0` for direct children, `-1` for every descendant, or a
  /// positive depth bound. An empty `category_type` disables filtering.
  pub async fn list_entity_children(
    &self,
    entity_id: &str,
    level: i64,
    category_type: &str,
  ) -> Result<Vec<Entity>> {
    require(entity_id, "entity ID")?;
    let level = Level::try_from(level)?;
    let filter = (!category_type.is_empty()).then(|| CategoryType::from(category_type));

    self
      .entities
      .get_by_level(entity_id, level, filter.as_ref())
      .await
      .map_err(Error::storage)
  }

  /// The nested tree rooted at `root_entity_id`.
  pub async fn get_entity_hierarchy(&self, root_entity_id: &str) -> Result<EntityNode> {
    require(root_entity_id, "root entity ID")?;
    self
      .entities
      .get_hierarchy(root_entity_id)
      .await
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound(format!("entity {root_entity_id}")))
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
  };

  use chrono::Utc;
  use serde_json::json;

  use super::*;
  use crate::{
    category::{Category, NewCategory},
    tree,
    user::{NewUser, User, UserUpdate},
  };

  // ─── In-memory collaborators ───────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("memory store failure")]
  struct Failure;

  #[derive(Default)]
  struct State {
    next_id:          u32,
    entities:         Vec<Entity>,
    categories:       HashMap<String, Category>,
    users:            HashMap<String, User>,
    set_parent_calls: Vec<(String, String)>,
    fail_set_parent:  bool,
    fail_entities:    bool,
    fail_categories:  bool,
  }

  #[derive(Default)]
  struct Memory {
    state: Mutex<State>,
  }

  impl Memory {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
      f(&mut self.state.lock().unwrap())
    }

    fn category(&self, id: &str, category_type: CategoryType) {
      self.with(|s| {
        s.categories.insert(id.into(), Category {
          category_id: id.into(),
          name: id.into(),
          category_type,
          created_at: Utc::now(),
        })
      });
    }

    fn user(&self, id: &str) {
      self.with(|s| {
        let now = Utc::now();
        s.users.insert(id.into(), User {
          user_id:       id.into(),
          email:         format!("{id}@example.com"),
          first_name:    None,
          last_name:     None,
          referral_mail: None,
          parent_id:     None,
          created_at:    now,
          updated_at:    now,
        })
      });
    }

    /// Insert an entity with a chosen id.
    fn seed(&self, id: &str, category_id: &str, parent: Option<&str>) {
      self.with(|s| {
        let depth = parent
          .and_then(|p| s.entities.iter().find(|e| e.entity_id == p))
          .map_or(0, |p| p.depth + 1);
        let now = Utc::now();
        s.entities.push(Entity {
          entity_id: id.into(),
          name: id.into(),
          category_id: category_id.into(),
          parent_id: parent.map(str::to_owned),
          user_id: None,
          depth,
          details: Details::new(),
          created_at: now,
          updated_at: now,
        });
      });
    }

    fn insert(&self, input: NewEntity, parent: Option<&Entity>) -> Entity {
      self.with(|s| {
        s.next_id += 1;
        let now = Utc::now();
        let entity = Entity {
          entity_id:   format!("gen{}", s.next_id),
          name:        input.name,
          category_id: input.category_id,
          parent_id:   parent.map(|p| p.entity_id.clone()),
          user_id:     input.user_id,
          depth:       parent.map_or(0, |p| p.depth + 1),
          details:     input.details,
          created_at:  now,
          updated_at:  now,
        };
        s.entities.push(entity.clone());
        entity
      })
    }

    fn entities_ok(&self) -> Result<(), Failure> {
      if self.with(|s| s.fail_entities) { Err(Failure) } else { Ok(()) }
    }

    fn categories_ok(&self) -> Result<(), Failure> {
      if self.with(|s| s.fail_categories) { Err(Failure) } else { Ok(()) }
    }

    fn find(&self, id: &str) -> Option<Entity> {
      self.with(|s| s.entities.iter().find(|e| e.entity_id == id).cloned())
    }

    /// Breadth-first descendants with their depth relative to `id`.
    fn descendants(&self, id: &str, max: Option<u32>) -> Vec<(Entity, u32)> {
      self.with(|s| {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(id.to_owned(), 0)]);
        while let Some((current, rel)) = queue.pop_front() {
          if max.is_some_and(|m| rel >= m) {
            continue;
          }
          for child in s
            .entities
            .iter()
            .filter(|e| e.parent_id.as_deref() == Some(current.as_str()))
          {
            queue.push_back((child.entity_id.clone(), rel + 1));
            out.push((child.clone(), rel + 1));
          }
        }
        out
      })
    }
  }

  impl EntityStore for Memory {
    type Error = Failure;

    async fn create_root(&self, input: NewEntity) -> Result<Entity, Failure> {
      self.entities_ok()?;
      Ok(self.insert(input, None))
    }

    async fn create_sub(
      &self,
      input: NewEntity,
      parent_id: &str,
    ) -> Result<Option<Entity>, Failure> {
      self.entities_ok()?;
      Ok(self.find(parent_id).map(|p| self.insert(input, Some(&p))))
    }

    async fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>, Failure> {
      self.entities_ok()?;
      Ok(self.find(entity_id))
    }

    async fn get_children(
      &self,
      entity_id: &str,
      recursive: bool,
    ) -> Result<Vec<Entity>, Failure> {
      self.entities_ok()?;
      let max = (!recursive).then_some(1);
      Ok(self.descendants(entity_id, max).into_iter().map(|(e, _)| e).collect())
    }

    async fn get_by_level(
      &self,
      entity_id: &str,
      level: Level,
      category_type: Option<&CategoryType>,
    ) -> Result<Vec<Entity>, Failure> {
      self.entities_ok()?;
      let rows = self.descendants(entity_id, level.max_depth());
      Ok(self.with(|s| {
        rows
          .into_iter()
          .map(|(e, _)| e)
          .filter(|e| {
            category_type.is_none_or(|t| {
              s.categories
                .get(&e.category_id)
                .is_some_and(|c| &c.category_type == t)
            })
          })
          .collect()
      }))
    }

    async fn get_hierarchy(&self, root_id: &str) -> Result<Option<EntityNode>, Failure> {
      self.entities_ok()?;
      let Some(root) = self.find(root_id) else {
        return Ok(None);
      };
      let rows = self.descendants(root_id, None).into_iter().map(|(e, _)| e).collect();
      Ok(Some(tree::assemble(root, rows)))
    }

    async fn category_id_for_entity(
      &self,
      entity_id: &str,
    ) -> Result<Option<String>, Failure> {
      self.entities_ok()?;
      Ok(self.find(entity_id).map(|e| e.category_id))
    }

    async fn check_presence(&self, user_id: &str) -> Result<bool, Failure> {
      self.entities_ok()?;
      Ok(self.with(|s| {
        s.entities
          .iter()
          .any(|e| e.user_id.as_deref() == Some(user_id))
      }))
    }

    async fn entity_for_user(&self, user_id: &str) -> Result<Option<String>, Failure> {
      self.entities_ok()?;
      Ok(self.with(|s| {
        s.entities
          .iter()
          .find(|e| e.user_id.as_deref() == Some(user_id))
          .map(|e| e.entity_id.clone())
      }))
    }
  }

  impl CategoryStore for Memory {
    type Error = Failure;

    async fn category_type(
      &self,
      category_id: &str,
    ) -> Result<Option<CategoryType>, Failure> {
      self.categories_ok()?;
      Ok(self.with(|s| {
        s.categories
          .get(category_id)
          .map(|c| c.category_type.clone())
      }))
    }

    async fn add_category(&self, input: NewCategory) -> Result<Category, Failure> {
      self.categories_ok()?;
      let id = input.name.clone();
      self.category(&id, input.category_type);
      Ok(self.with(|s| s.categories[&id].clone()))
    }

    async fn get_category(&self, category_id: &str) -> Result<Option<Category>, Failure> {
      self.categories_ok()?;
      Ok(self.with(|s| s.categories.get(category_id).cloned()))
    }

    async fn list_categories(
      &self,
      category_type: Option<CategoryType>,
    ) -> Result<Vec<Category>, Failure> {
      self.categories_ok()?;
      Ok(self.with(|s| {
        s.categories
          .values()
          .filter(|c| category_type.as_ref().is_none_or(|t| &c.category_type == t))
          .cloned()
          .collect()
      }))
    }
  }

  impl UserDirectory for Memory {
    type Error = Failure;

    async fn set_parent(
      &self,
      user_id: &str,
      parent_entity_id: &str,
    ) -> Result<bool, Failure> {
      self.with(|s| {
        s.set_parent_calls
          .push((user_id.to_owned(), parent_entity_id.to_owned()));
        if s.fail_set_parent {
          return Err(Failure);
        }
        Ok(match s.users.get_mut(user_id) {
          Some(user) => {
            user.parent_id = Some(parent_entity_id.to_owned());
            true
          }
          None => false,
        })
      })
    }

    async fn add_user(&self, input: NewUser) -> Result<User, Failure> {
      let id = input.email.clone();
      self.user(&id);
      Ok(self.with(|s| s.users[&id].clone()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, Failure> {
      Ok(self.with(|s| s.users.get(user_id).cloned()))
    }

    async fn update_user(
      &self,
      user_id: &str,
      update: UserUpdate,
    ) -> Result<Option<User>, Failure> {
      Ok(self.with(|s| {
        s.users.get_mut(user_id).map(|user| {
          if let Some(first_name) = update.first_name {
            user.first_name = Some(first_name);
          }
          if let Some(last_name) = update.last_name {
            user.last_name = Some(last_name);
          }
          user.clone()
        })
      }))
    }

    async fn has_parent(&self, user_id: &str) -> Result<Option<bool>, Failure> {
      Ok(self.with(|s| s.users.get(user_id).map(|u| u.parent_id.is_some())))
    }

    async fn list_referred_users(&self, _user_id: &str) -> Result<Vec<User>, Failure> {
      Ok(Vec::new())
    }
  }

  type Engine = HierarchyEngine<Memory, Memory, Memory>;

  /// An engine whose three collaborators share one in-memory state, seeded
  /// with one category per type.
  fn engine() -> (Engine, Arc<Memory>) {
    let mem = Arc::new(Memory::default());
    mem.category("cat-user", CategoryType::User);
    mem.category("cat-user-alt", CategoryType::User);
    mem.category("cat-org", CategoryType::Organization);
    mem.category("cat-site", CategoryType::Other("site".into()));
    mem.category("cat-group", CategoryType::DeviceGroup);
    let engine = HierarchyEngine::new(mem.clone(), mem.clone(), mem.clone());
    (engine, mem)
  }

  fn details(value: serde_json::Value) -> Option<Details> {
    value.as_object().cloned()
  }

  fn sorted_ids(entities: &[Entity]) -> Vec<String> {
    let mut ids: Vec<_> = entities.iter().map(|e| e.entity_id.clone()).collect();
    ids.sort();
    ids
  }

  // ─── Root creation ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn root_entity_has_depth_zero_and_empty_details() {
    let (engine, _) = engine();
    let root = engine
      .create_root_entity("cat-org", "Acme", Some("owner-1"), None)
      .await
      .unwrap();

    assert!(root.is_root());
    assert_eq!(root.depth, 0);
    assert!(root.details.is_empty());
    assert_eq!(root.user_id.as_deref(), Some("owner-1"));
  }

  #[tokio::test]
  async fn root_requires_category_and_name() {
    let (engine, _) = engine();
    let err = engine.create_root_entity("", "Acme", None, None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = engine.create_root_entity("cat-org", "", None, None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn new_root_has_no_children() {
    let (engine, _) = engine();
    let root = engine
      .create_root_entity("cat-org", "Acme", None, None)
      .await
      .unwrap();
    let children = engine
      .list_entity_children(&root.entity_id, 0, "")
      .await
      .unwrap();
    assert!(children.is_empty());
  }

  // ─── Sub-entity creation ───────────────────────────────────────────────────

  #[tokio::test]
  async fn sub_entity_sits_one_level_below_parent() {
    let (engine, _) = engine();
    let root = engine
      .create_root_entity("cat-org", "Acme", None, None)
      .await
      .unwrap();
    let site = engine
      .create_sub_entity("cat-site", "Plant", None, None, &root.entity_id)
      .await
      .unwrap();
    let line = engine
      .create_sub_entity("cat-group", "Line 1", None, None, &site.entity_id)
      .await
      .unwrap();

    assert_eq!(site.parent_id.as_deref(), Some(root.entity_id.as_str()));
    assert_eq!(site.depth, 1);
    assert_eq!(line.parent_id.as_deref(), Some(site.entity_id.as_str()));
    assert_eq!(line.depth, 2);
  }

  #[tokio::test]
  async fn sub_entity_with_missing_parent_is_not_found() {
    let (engine, mem) = engine();
    let err = engine
      .create_sub_entity("cat-site", "Plant", None, None, "nope")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(mem.with(|s| s.entities.is_empty()));
  }

  #[tokio::test]
  async fn sub_entity_with_unknown_category_is_not_found() {
    let (engine, mem) = engine();
    mem.seed("e1", "cat-org", None);
    let err = engine
      .create_sub_entity("cat-missing", "Plant", None, None, "e1")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(ref m) if m.contains("cat-missing")));
  }

  #[tokio::test]
  async fn sub_entity_requires_fields() {
    let (engine, mem) = engine();
    mem.seed("e1", "cat-org", None);
    for (cat, name, parent) in [("", "x", "e1"), ("cat-org", "", "e1"), ("cat-org", "x", "")] {
      let err = engine
        .create_sub_entity(cat, name, None, None, parent)
        .await
        .unwrap_err();
      assert!(matches!(err, Error::Validation(_)));
    }
  }

  // ─── Cross-link ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn user_under_user_links_subuser_to_parent() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);
    mem.user("u42");

    let child = engine
      .create_sub_entity(
        "cat-user",
        "Referral",
        None,
        details(json!({ "subuser_id": "u42" })),
        "e7",
      )
      .await
      .unwrap();

    assert_eq!(child.parent_id.as_deref(), Some("e7"));
    let calls = mem.with(|s| s.set_parent_calls.clone());
    assert_eq!(calls, [("u42".to_owned(), "e7".to_owned())]);
    assert_eq!(
      mem.with(|s| s.users["u42"].parent_id.clone()).as_deref(),
      Some("e7")
    );
  }

  #[tokio::test]
  async fn distinct_user_categories_still_link() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);
    mem.user("u42");

    engine
      .create_sub_entity(
        "cat-user-alt",
        "Referral",
        None,
        details(json!({ "subuser_id": "u42" })),
        "e7",
      )
      .await
      .unwrap();
    assert_eq!(mem.with(|s| s.set_parent_calls.len()), 1);
  }

  #[tokio::test]
  async fn missing_subuser_id_is_validation_error() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);

    let err = engine
      .create_sub_entity("cat-user", "Referral", None, None, "e7")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("subuser_id not found")));
    assert!(mem.with(|s| s.set_parent_calls.is_empty()));
    assert_eq!(mem.with(|s| s.entities.len()), 1);
  }

  #[tokio::test]
  async fn numeric_subuser_id_is_validation_error() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);

    let err = engine
      .create_sub_entity(
        "cat-user",
        "Referral",
        None,
        details(json!({ "subuser_id": 42 })),
        "e7",
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("must be a string")));
    assert!(mem.with(|s| s.set_parent_calls.is_empty()));
  }

  #[tokio::test]
  async fn non_user_types_never_touch_user_directory() {
    let (engine, mem) = engine();
    mem.seed("org", "cat-org", None);
    mem.seed("usr", "cat-user", None);
    mem.user("u42");
    let payload = json!({ "subuser_id": "u42" });

    engine
      .create_sub_entity("cat-user", "A", None, details(payload.clone()), "org")
      .await
      .unwrap();
    engine
      .create_sub_entity("cat-org", "B", None, details(payload), "usr")
      .await
      .unwrap();
    engine
      .create_sub_entity("cat-site", "C", None, details(json!({ "subuser_id": 1 })), "usr")
      .await
      .unwrap();

    assert!(mem.with(|s| s.set_parent_calls.is_empty()));
  }

  #[tokio::test]
  async fn link_failure_keeps_persisted_entity() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);
    mem.user("u42");
    mem.with(|s| s.fail_set_parent = true);

    let err = engine
      .create_sub_entity(
        "cat-user",
        "Referral",
        None,
        details(json!({ "subuser_id": "u42" })),
        "e7",
      )
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Link(_)));
    assert!(err.is_retryable());
    let children = engine.get_child_entities("e7", false).await.unwrap();
    assert_eq!(children.len(), 1);
  }

  #[tokio::test]
  async fn unknown_subuser_is_link_error() {
    let (engine, mem) = engine();
    mem.seed("e7", "cat-user", None);

    let err = engine
      .create_sub_entity(
        "cat-user",
        "Referral",
        None,
        details(json!({ "subuser_id": "ghost" })),
        "e7",
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Link(ref e) if e.to_string().contains("ghost")));
  }

  // ─── Presence ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn check_entity_exists() {
    let (engine, _) = engine();
    assert!(matches!(
      engine.check_entity_exists("").await,
      Err(Error::Validation(_))
    ));
    assert!(!engine.check_entity_exists("nonexistent-id").await.unwrap());

    let root = engine
      .create_root_entity("cat-org", "Acme", Some("owner-1"), None)
      .await
      .unwrap();
    assert!(engine.check_entity_exists("owner-1").await.unwrap());
    assert_eq!(
      engine.entity_for_user("owner-1").await.unwrap(),
      Some(root.entity_id)
    );
    assert_eq!(engine.entity_for_user("owner-2").await.unwrap(), None);
  }

  // ─── Traversal ─────────────────────────────────────────────────────────────

  /// r ─┬─ a ─┬─ a1 ── a1x
  ///    │     └─ a2
  ///    └─ b
  fn seed_tree(mem: &Memory) {
    mem.seed("r", "cat-org", None);
    mem.seed("a", "cat-site", Some("r"));
    mem.seed("b", "cat-group", Some("r"));
    mem.seed("a1", "cat-group", Some("a"));
    mem.seed("a2", "cat-site", Some("a"));
    mem.seed("a1x", "cat-group", Some("a1"));
  }

  #[tokio::test]
  async fn child_entities_direct_and_recursive() {
    let (engine, mem) = engine();
    seed_tree(&mem);

    let direct = engine.get_child_entities("r", false).await.unwrap();
    assert_eq!(sorted_ids(&direct), ["a", "b"]);
    let all = engine.get_child_entities("r", true).await.unwrap();
    assert_eq!(sorted_ids(&all), ["a", "a1", "a1x", "a2", "b"]);

    assert!(matches!(
      engine.get_child_entities("", false).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn unbounded_level_matches_breadth_first_closure() {
    let (engine, mem) = engine();
    seed_tree(&mem);

    let mut closure = HashSet::new();
    let mut queue = VecDeque::from(["r".to_owned()]);
    while let Some(id) = queue.pop_front() {
      for child in engine.get_child_entities(&id, false).await.unwrap() {
        queue.push_back(child.entity_id.clone());
        closure.insert(child.entity_id);
      }
    }

    let listed: HashSet<String> = engine
      .list_entity_children("r", -1, "")
      .await
      .unwrap()
      .into_iter()
      .map(|e| e.entity_id)
      .collect();
    assert_eq!(listed, closure);
  }

  #[tokio::test]
  async fn bounded_levels() {
    let (engine, mem) = engine();
    seed_tree(&mem);

    let level0 = engine.list_entity_children("r", 0, "").await.unwrap();
    assert_eq!(sorted_ids(&level0), ["a", "b"]);
    let level2 = engine.list_entity_children("r", 2, "").await.unwrap();
    assert_eq!(sorted_ids(&level2), ["a", "a1", "a2", "b"]);
  }

  #[tokio::test]
  async fn level_below_minus_one_is_rejected() {
    let (engine, mem) = engine();
    seed_tree(&mem);
    let err = engine
      .list_entity_children("r", -2, "site")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn category_type_filter_is_exact() {
    let (engine, mem) = engine();
    seed_tree(&mem);

    let groups = engine
      .list_entity_children("r", -1, "device-group")
      .await
      .unwrap();
    assert_eq!(sorted_ids(&groups), ["a1", "a1x", "b"]);
    let sites = engine.list_entity_children("r", -1, "site").await.unwrap();
    assert_eq!(sorted_ids(&sites), ["a", "a2"]);
    let none = engine.list_entity_children("r", -1, "Site").await.unwrap();
    assert!(none.is_empty());
  }

  #[tokio::test]
  async fn hierarchy_contains_every_descendant() {
    let (engine, mem) = engine();
    seed_tree(&mem);

    let tree = engine.get_entity_hierarchy("r").await.unwrap();
    let descendants = engine.get_child_entities("r", true).await.unwrap();
    assert_eq!(tree.node_count(), 1 + descendants.len());

    let subtree = engine.get_entity_hierarchy("a").await.unwrap();
    assert_eq!(subtree.node_count(), 4);
  }

  #[tokio::test]
  async fn hierarchy_of_missing_root_is_not_found() {
    let (engine, _) = engine();
    let err = engine.get_entity_hierarchy("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  // ─── Backend failures ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn failing_entity_store_is_storage_error() {
    let (engine, mem) = engine();
    mem.seed("r", "cat-org", None);
    mem.with(|s| s.fail_entities = true);

    let err = engine
      .create_root_entity("cat-org", "Acme", None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(err.is_retryable());

    let err = engine.get_child_entities("r", true).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    let err = engine
      .create_sub_entity("cat-site", "Plant", None, None, "r")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
  }

  #[tokio::test]
  async fn failing_category_lookup_is_storage_error_before_any_write() {
    let (engine, mem) = engine();
    mem.seed("r", "cat-org", None);
    mem.with(|s| s.fail_categories = true);

    let err = engine
      .create_sub_entity("cat-site", "Plant", None, None, "r")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Storage(ref e) if e.to_string() == "memory store failure"));
    assert_eq!(mem.with(|s| s.entities.len()), 1);
  }
}
