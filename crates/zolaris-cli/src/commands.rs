//! Subcommand definitions and their execution against the store.

use anyhow::{Context as _, anyhow, bail};
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use zolaris_core::{
  HierarchyEngine,
  category::{CategoryType, NewCategory},
  device::NewDevice,
  entity::Details,
  store::{CategoryStore, DeviceRegistry, UserDirectory},
  user::{NewUser, UserUpdate},
};
use zolaris_store_sqlite::SqliteStore;

pub type Engine = HierarchyEngine<SqliteStore, SqliteStore, SqliteStore>;

// ─── Commands ─────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage entity categories.
  #[command(subcommand)]
  Category(CategoryCommand),

  /// Manage users.
  #[command(subcommand)]
  User(UserCommand),

  /// Register and list devices.
  #[command(subcommand)]
  Device(DeviceCommand),

  /// Create and query entities.
  #[command(subcommand)]
  Entity(EntityCommand),
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
  /// Create a category.
  Add {
    #[arg(long)]
    name:          String,
    /// `user`, `organization`, `device-group`, or any other tag.
    #[arg(long = "type")]
    category_type: String,
  },
  /// List categories, optionally of one type.
  List {
    #[arg(long = "type")]
    category_type: Option<String>,
  },
  /// Show one category.
  Get { category_id: String },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  /// Register a user.
  Add {
    #[arg(long)]
    email:         String,
    #[arg(long)]
    first_name:    Option<String>,
    #[arg(long)]
    last_name:     Option<String>,
    /// Email of the referring user.
    #[arg(long)]
    referral_mail: Option<String>,
  },
  /// Show one user.
  Get { user_id: String },
  /// Change a user's name.
  Update {
    user_id:    String,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name:  Option<String>,
  },
  /// Whether the user has been linked under an entity.
  HasParent { user_id: String },
  /// Users referred by this user.
  Referrals { user_id: String },
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
  /// Register a device to a user.
  Add {
    /// Hardware id, usually the MAC address.
    #[arg(long = "id")]
    device_id:   String,
    #[arg(long)]
    name:        String,
    /// Owning user id.
    #[arg(long = "user")]
    user_id:     String,
    #[arg(long)]
    category:    Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  /// Devices owned by a user.
  List { user_id: String },
}

#[derive(Subcommand, Debug)]
pub enum EntityCommand {
  /// Create a top-level entity.
  Root {
    #[arg(long)]
    category: String,
    #[arg(long)]
    name:     String,
    /// Owning user id.
    #[arg(long)]
    owner:    Option<String>,
    /// Details as a JSON object.
    #[arg(long, value_parser = parse_details)]
    details:  Option<Details>,
  },
  /// Create an entity under a parent.
  Sub {
    #[arg(long)]
    category: String,
    #[arg(long)]
    name:     String,
    #[arg(long)]
    parent:   String,
    #[arg(long)]
    owner:    Option<String>,
    #[arg(long, value_parser = parse_details)]
    details:  Option<Details>,
  },
  /// Direct children, or every descendant with `--recursive`.
  Children {
    entity_id: String,
    #[arg(long)]
    recursive: bool,
  },
  /// Descendants down to `--level`, optionally filtered by category type.
  List {
    entity_id:     String,
    /// 0 for direct children, -1 for all levels, or a depth bound.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    level:         i64,
    #[arg(long = "type", default_value = "")]
    category_type: String,
  },
  /// The nested tree rooted at an entity.
  Tree { entity_id: String },
  /// Whether a user owns any entity.
  Exists { user_id: String },
  /// The first entity owned by a user.
  ForUser { user_id: String },
}

fn parse_details(raw: &str) -> Result<Details, String> {
  match serde_json::from_str(raw) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(_) => Err("details must be a JSON object".to_owned()),
    Err(e) => Err(e.to_string()),
  }
}

// ─── Execution ────────────────────────────────────────────────────────────────

/// Run `command` and return its result as JSON.
pub async fn run(command: Command, engine: &Engine, store: &SqliteStore) -> anyhow::Result<Value> {
  match command {
    Command::Category(cmd) => category(cmd, store).await,
    Command::User(cmd) => user(cmd, store).await,
    Command::Device(cmd) => device(cmd, store).await,
    Command::Entity(cmd) => entity(cmd, engine).await,
  }
}

async fn category(cmd: CategoryCommand, store: &SqliteStore) -> anyhow::Result<Value> {
  match cmd {
    CategoryCommand::Add { name, category_type } => {
      let category_type = CategoryType::from(category_type);
      to_json(store.add_category(NewCategory { name, category_type }).await?)
    }
    CategoryCommand::List { category_type } => {
      let filter = category_type.map(CategoryType::from);
      to_json(store.list_categories(filter).await?)
    }
    CategoryCommand::Get { category_id } => {
      let found = store.get_category(&category_id).await?;
      to_json(found.ok_or_else(|| anyhow!("category {category_id} not found"))?)
    }
  }
}

async fn user(cmd: UserCommand, store: &SqliteStore) -> anyhow::Result<Value> {
  match cmd {
    UserCommand::Add { email, first_name, last_name, referral_mail } => {
      let input = NewUser { email, first_name, last_name, referral_mail };
      to_json(store.add_user(input).await?)
    }
    UserCommand::Get { user_id } => {
      let found = store.get_user(&user_id).await?;
      to_json(found.ok_or_else(|| anyhow!("user {user_id} not found"))?)
    }
    UserCommand::Update { user_id, first_name, last_name } => {
      let update = UserUpdate { first_name, last_name };
      if update.is_empty() {
        bail!("nothing to update: pass --first-name and/or --last-name");
      }
      let found = store.update_user(&user_id, update).await?;
      to_json(found.ok_or_else(|| anyhow!("user {user_id} not found"))?)
    }
    UserCommand::HasParent { user_id } => {
      let found = store.has_parent(&user_id).await?;
      to_json(found.ok_or_else(|| anyhow!("user {user_id} not found"))?)
    }
    UserCommand::Referrals { user_id } => to_json(store.list_referred_users(&user_id).await?),
  }
}

async fn device(cmd: DeviceCommand, store: &SqliteStore) -> anyhow::Result<Value> {
  match cmd {
    DeviceCommand::Add { device_id, name, user_id, category, description } => {
      let input = NewDevice { device_id, name, user_id, category, description };
      to_json(store.add_device(input).await?)
    }
    DeviceCommand::List { user_id } => to_json(store.list_devices_for_user(&user_id).await?),
  }
}

async fn entity(cmd: EntityCommand, engine: &Engine) -> anyhow::Result<Value> {
  match cmd {
    EntityCommand::Root { category, name, owner, details } => to_json(
      engine
        .create_root_entity(&category, &name, owner.as_deref(), details)
        .await?,
    ),
    EntityCommand::Sub { category, name, parent, owner, details } => to_json(
      engine
        .create_sub_entity(&category, &name, owner.as_deref(), details, &parent)
        .await?,
    ),
    EntityCommand::Children { entity_id, recursive } => {
      to_json(engine.get_child_entities(&entity_id, recursive).await?)
    }
    EntityCommand::List { entity_id, level, category_type } => to_json(
      engine
        .list_entity_children(&entity_id, level, &category_type)
        .await?,
    ),
    EntityCommand::Tree { entity_id } => to_json(engine.get_entity_hierarchy(&entity_id).await?),
    EntityCommand::Exists { user_id } => to_json(engine.check_entity_exists(&user_id).await?),
    EntityCommand::ForUser { user_id } => to_json(engine.entity_for_user(&user_id).await?),
  }
}

fn to_json(value: impl Serialize) -> anyhow::Result<Value> {
  serde_json::to_value(value).context("failed to serialise output")
}
