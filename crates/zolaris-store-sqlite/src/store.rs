//! [`SqliteStore`], the SQLite implementation of the Zolaris collaborator
//! traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use zolaris_core::{
  category::{Category, CategoryType, NewCategory},
  device::{Device, NewDevice},
  entity::{Entity, Level, NewEntity},
  store::{CategoryStore, DeviceRegistry, EntityStore, UserDirectory},
  tree::{self, EntityNode, MAX_TREE_DEPTH},
  user::{NewUser, User, UserUpdate},
};

use crate::{
  Result,
  encode::{
    CATEGORY_COLUMNS, DEVICE_COLUMNS, ENTITY_COLUMNS, RawCategory, RawDevice, RawEntity,
    RawUser, USER_COLUMNS, encode_details, encode_dt, new_id,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Zolaris store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All
/// statements run on the connection's single worker thread, in call order.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Descendants of `entity_id` at most `max_depth` levels below it,
  /// optionally restricted to one category type.
  ///
  /// The walk never goes deeper than [`MAX_TREE_DEPTH`], which also bounds it
  /// on corrupted (cyclic) parent chains.
  async fn descendants(
    &self,
    entity_id: &str,
    max_depth: Option<u32>,
    category_type: Option<&CategoryType>,
  ) -> Result<Vec<Entity>> {
    let id_str   = entity_id.to_owned();
    let max      = max_depth.map_or(MAX_TREE_DEPTH, |d| d.min(MAX_TREE_DEPTH));
    let type_str = category_type.map(|t| t.as_str().to_owned());

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "WITH RECURSIVE tree(entity_id, rel) AS (
             SELECT entity_id, 1 FROM entities WHERE parent_id = ?1
             UNION ALL
             SELECT e.entity_id, t.rel + 1
             FROM entities e
             JOIN tree t ON e.parent_id = t.entity_id
             WHERE t.rel < ?2
           )
           SELECT {ENTITY_COLUMNS}
           FROM tree t
           JOIN entities   e ON e.entity_id   = t.entity_id
           JOIN categories c ON c.category_id = e.category_id
           WHERE ?3 IS NULL OR c.category_type = ?3
           ORDER BY e.depth, e.rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, max, type_str], RawEntity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = crate::Error;

  async fn create_root(&self, input: NewEntity) -> Result<Entity> {
    let now = Utc::now();
    let entity = Entity {
      entity_id:   new_id(),
      name:        input.name,
      category_id: input.category_id,
      parent_id:   None,
      user_id:     input.user_id,
      depth:       0,
      details:     input.details,
      created_at:  now,
      updated_at:  now,
    };

    let id_str       = entity.entity_id.clone();
    let name         = entity.name.clone();
    let category_id  = entity.category_id.clone();
    let user_id      = entity.user_id.clone();
    let details_str  = encode_details(&entity.details)?;
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entities (
             entity_id, name, category_id, parent_id, user_id,
             depth, details, created_at, updated_at
           ) VALUES (?1, ?2, ?3, NULL, ?4, 0, ?5, ?6, ?6)",
          rusqlite::params![id_str, name, category_id, user_id, details_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entity)
  }

  async fn create_sub(&self, input: NewEntity, parent_id: &str) -> Result<Option<Entity>> {
    let now         = Utc::now();
    let id_str      = new_id();
    let parent_str  = parent_id.to_owned();
    let details_str = encode_details(&input.details)?;
    let at_str      = encode_dt(now);

    let insert_id       = id_str.clone();
    let insert_name     = input.name.clone();
    let insert_category = input.category_id.clone();
    let insert_user     = input.user_id.clone();
    let insert_parent   = parent_str.clone();

    // Parent lookup and insert share one transaction so the depth cannot go
    // stale between them.
    let depth: Option<u32> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let parent_depth: Option<u32> = tx
          .query_row(
            "SELECT depth FROM entities WHERE entity_id = ?1",
            rusqlite::params![insert_parent],
            |r| r.get(0),
          )
          .optional()?;
        let Some(parent_depth) = parent_depth else {
          return Ok(None);
        };
        let depth = parent_depth + 1;

        tx.execute(
          "INSERT INTO entities (
             entity_id, name, category_id, parent_id, user_id,
             depth, details, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            insert_id,
            insert_name,
            insert_category,
            insert_parent,
            insert_user,
            depth,
            details_str,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(Some(depth))
      })
      .await?;

    Ok(depth.map(|depth| Entity {
      entity_id:   id_str,
      name:        input.name,
      category_id: input.category_id,
      parent_id:   Some(parent_str),
      user_id:     input.user_id,
      depth,
      details:     input.details,
      created_at:  now,
      updated_at:  now,
    }))
  }

  async fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
    let id_str = entity_id.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.entity_id = ?1"),
            rusqlite::params![id_str],
            RawEntity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn get_children(&self, entity_id: &str, recursive: bool) -> Result<Vec<Entity>> {
    let max_depth = if recursive { None } else { Some(1) };
    self.descendants(entity_id, max_depth, None).await
  }

  async fn get_by_level(
    &self,
    entity_id: &str,
    level: Level,
    category_type: Option<&CategoryType>,
  ) -> Result<Vec<Entity>> {
    self
      .descendants(entity_id, level.max_depth(), category_type)
      .await
  }

  async fn get_hierarchy(&self, root_id: &str) -> Result<Option<EntityNode>> {
    let Some(root) = self.get_entity(root_id).await? else {
      return Ok(None);
    };
    let descendants = self.descendants(root_id, None, None).await?;
    Ok(Some(tree::assemble(root, descendants)))
  }

  async fn category_id_for_entity(&self, entity_id: &str) -> Result<Option<String>> {
    let id_str = entity_id.to_owned();

    let category_id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT category_id FROM entities WHERE entity_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(category_id)
  }

  async fn check_presence(&self, user_id: &str) -> Result<bool> {
    let user_str = user_id.to_owned();

    let present: bool = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM entities WHERE user_id = ?1)",
          rusqlite::params![user_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(present)
  }

  async fn entity_for_user(&self, user_id: &str) -> Result<Option<String>> {
    let user_str = user_id.to_owned();

    let entity_id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT entity_id FROM entities
             WHERE user_id = ?1
             ORDER BY rowid
             LIMIT 1",
            rusqlite::params![user_str],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(entity_id)
  }
}

// ─── CategoryStore impl ──────────────────────────────────────────────────────

impl CategoryStore for SqliteStore {
  type Error = crate::Error;

  async fn category_type(&self, category_id: &str) -> Result<Option<CategoryType>> {
    let id_str = category_id.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT category_type FROM categories WHERE category_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(CategoryType::from))
  }

  async fn add_category(&self, input: NewCategory) -> Result<Category> {
    let category = Category {
      category_id:   new_id(),
      name:          input.name,
      category_type: input.category_type,
      created_at:    Utc::now(),
    };

    let id_str   = category.category_id.clone();
    let name     = category.name.clone();
    let type_str = category.category_type.as_str().to_owned();
    let at_str   = encode_dt(category.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO categories (category_id, name, category_type, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, type_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(category)
  }

  async fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
    let id_str = category_id.to_owned();

    let raw: Option<RawCategory> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE category_id = ?1"),
            rusqlite::params![id_str],
            RawCategory::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCategory::into_category).transpose()
  }

  async fn list_categories(&self, category_type: Option<CategoryType>) -> Result<Vec<Category>> {
    let type_str = category_type.map(String::from);

    let raws: Vec<RawCategory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CATEGORY_COLUMNS} FROM categories
           WHERE ?1 IS NULL OR category_type = ?1
           ORDER BY name, category_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![type_str], RawCategory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCategory::into_category).collect()
  }
}

// ─── UserDirectory impl ──────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  type Error = crate::Error;

  async fn set_parent(&self, user_id: &str, parent_entity_id: &str) -> Result<bool> {
    let user_str   = user_id.to_owned();
    let parent_str = parent_entity_id.to_owned();
    let at_str     = encode_dt(Utc::now());

    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET parent_id = ?1, updated_at = ?2 WHERE user_id = ?3",
          rusqlite::params![parent_str, at_str, user_str],
        )?)
      })
      .await?;

    Ok(updated > 0)
  }

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let now = Utc::now();
    let user = User {
      user_id:       new_id(),
      email:         input.email,
      first_name:    input.first_name,
      last_name:     input.last_name,
      referral_mail: input.referral_mail,
      parent_id:     None,
      created_at:    now,
      updated_at:    now,
    };

    let id_str     = user.user_id.clone();
    let email      = user.email.clone();
    let first_name = user.first_name.clone();
    let last_name  = user.last_name.clone();
    let referral   = user.referral_mail.clone();
    let at_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             user_id, email, first_name, last_name, referral_mail,
             parent_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)",
          rusqlite::params![id_str, email, first_name, last_name, referral, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
    let id_str = user_id.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            rusqlite::params![id_str],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn update_user(&self, user_id: &str, update: UserUpdate) -> Result<Option<User>> {
    let id_str = user_id.to_owned();
    let at_str = encode_dt(Utc::now());

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE users SET
             first_name = COALESCE(?1, first_name),
             last_name  = COALESCE(?2, last_name),
             updated_at = ?3
           WHERE user_id = ?4",
          rusqlite::params![update.first_name, update.last_name, at_str, id_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        let raw = tx.query_row(
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
          rusqlite::params![id_str],
          RawUser::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn has_parent(&self, user_id: &str) -> Result<Option<bool>> {
    let id_str = user_id.to_owned();

    let has_parent: Option<bool> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT parent_id IS NOT NULL FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(has_parent)
  }

  async fn list_referred_users(&self, user_id: &str) -> Result<Vec<User>> {
    let id_str = user_id.to_owned();

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let email: Option<String> = conn
          .query_row(
            "SELECT email FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        // An unknown referrer simply has no referrals.
        let Some(email) = email else {
          return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users
           WHERE referral_mail = ?1
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![email], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }
}

// ─── DeviceRegistry impl ─────────────────────────────────────────────────────

impl DeviceRegistry for SqliteStore {
  type Error = crate::Error;

  async fn add_device(&self, input: NewDevice) -> Result<Device> {
    let device = Device {
      device_id:   input.device_id,
      name:        input.name,
      user_id:     input.user_id,
      category:    input.category,
      description: input.description,
      created_at:  Utc::now(),
    };

    let id_str      = device.device_id.clone();
    let name        = device.name.clone();
    let user_str    = device.user_id.clone();
    let category    = device.category.clone();
    let description = device.description.clone();
    let at_str      = encode_dt(device.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO devices (device_id, name, user_id, category, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, user_str, category, description, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(device)
  }

  async fn list_devices_for_user(&self, user_id: &str) -> Result<Vec<Device>> {
    let user_str = user_id.to_owned();

    let raws: Vec<RawDevice> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEVICE_COLUMNS} FROM devices
           WHERE user_id = ?1
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawDevice::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDevice::into_device).collect()
  }
}
