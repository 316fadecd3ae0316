mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::sync::Arc;

use anyhow::{Context, Result};
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::config::Config;

/// Shared handles to the database and its five collections.
///
/// Handlers borrow a `Store` for the scope of one request; the underlying
/// driver client is pooled and safe for concurrent use.
#[derive(Clone)]
pub struct Store {
    db: Database,
    posts: Collection<Document>,
    notifications: Collection<Document>,
    categories: Collection<Document>,
    subcategories: Collection<Document>,
    admins: Collection<Document>,
}

impl Store {
    fn new(db: Database, config: &Config) -> Self {
        Self {
            posts: db.collection(&config.posts_collection),
            notifications: db.collection(&config.notifications_collection),
            categories: db.collection(&config.categories_collection),
            subcategories: db.collection(&config.subcategories_collection),
            admins: db.collection(&config.admins_collection),
            db,
        }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn posts(&self) -> &Collection<Document> {
        &self.posts
    }

    #[must_use]
    pub fn notifications(&self) -> &Collection<Document> {
        &self.notifications
    }

    #[must_use]
    pub fn categories(&self) -> &Collection<Document> {
        &self.categories
    }

    #[must_use]
    pub fn subcategories(&self) -> &Collection<Document> {
        &self.subcategories
    }

    #[must_use]
    pub fn admins(&self) -> &Collection<Document> {
        &self.admins
    }

    /// Check store connectivity by running the `ping` database command.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

/// Lazily-initialized store connector.
///
/// All request handlers acquire readiness through [`StoreManager::get`].
/// Concurrent first callers collapse onto one in-flight connection attempt;
/// a failed attempt is not memoized, so a later request retries.
pub struct StoreManager {
    config: Arc<Config>,
    store: OnceCell<Store>,
}

impl StoreManager {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            store: OnceCell::new(),
        }
    }

    /// Get the ready store, connecting and seeding the default admin on
    /// the first successful call.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the initial seeding fails.
    /// Callers map this to a 5xx response.
    pub async fn get(&self) -> Result<&Store> {
        self.store
            .get_or_try_init(|| self.connect_and_seed())
            .await
    }

    async fn connect_and_seed(&self) -> Result<Store> {
        let client = Client::with_uri_str(&self.config.mongodb_uri)
            .await
            .context("invalid MongoDB connection string")?;
        let store = Store::new(client.database(&self.config.db_name), &self.config);

        // The driver connects lazily; ping so readiness actually means
        // the server is reachable.
        store.ping().await.context("failed to connect to MongoDB")?;

        if self.config.admin_enabled {
            seed_default_admin(&store, &self.config)
                .await
                .context("failed to seed default admin")?;
        }

        info!(db = %self.config.db_name, "store ready");
        Ok(store)
    }
}

/// Insert the default admin credential if no admin with that username
/// exists yet. Keyed by username via `$setOnInsert`, so an existing admin
/// is never overwritten and the operation is idempotent.
async fn seed_default_admin(store: &Store, config: &Config) -> Result<()> {
    if config.default_admin_from_fallback {
        warn!(
            username = %config.default_admin_username,
            "DEFAULT_ADMIN_USERNAME / DEFAULT_ADMIN_PASSWORD are not set; \
             seeding the built-in development credential. Set both variables \
             before running anything production-facing."
        );
    } else {
        info!(username = %config.default_admin_username, "seeding configured default admin");
    }

    let username = config.default_admin_username.trim();
    let password_hash = hash_password(&config.default_admin_password, config.bcrypt_cost)?;

    store
        .admins()
        .update_one(
            doc! { "username": username },
            doc! {
                "$setOnInsert": {
                    "username": username,
                    "passwordHash": password_hash,
                    "createdAt": mongodb::bson::DateTime::now(),
                }
            },
        )
        .upsert(true)
        .await
        .context("failed to upsert default admin")?;

    Ok(())
}
