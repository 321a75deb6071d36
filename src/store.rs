//! Achievement store: a year-keyed map of achievement strings plus a few
//! profile scalars, persisted in the backing key-value store with an
//! in-process fallback cache seeded from the bundled default dataset.
//!
//! Every backend failure on the read/mutate paths is a soft failure (warn
//! and fall back to the cache). The one exception is `set_admin`: creating
//! the admin record must be durable, so it surfaces the error instead.
//!
//! Concurrent writers race with last-write-wins. There is no optimistic
//! concurrency control, which is fine for a single-admin deployment.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use redis::{AsyncCommands, aio::ConnectionManager};
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::error::AppError;

/// Year string to display-ordered achievement list. Cross-year ordering is a
/// presentation concern (sort keys descending), not stored.
pub type AchievementsMap = BTreeMap<String, Vec<String>>;

const ACHIEVEMENTS_KEY: &str = "profile:achievements";
const ADMIN_KEY: &str = "profile:admin";
const GRADE_KEY: &str = "profile:grade";
const BIO_KEY: &str = "profile:bio";
const BIRTHDAY_KEY: &str = "profile:birthday";

pub const DEFAULT_GRADE: &str = "12";
pub const DEFAULT_BIO: &str = "Student, runner, and hobbyist programmer.";
pub const DEFAULT_BIRTHDAY: &str = "2008-01-01";

const DEFAULT_ACHIEVEMENTS: &str = include_str!("../data/achievements.json");

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());

pub fn is_valid_year(year: &str) -> bool {
    YEAR_RE.is_match(year)
}

/// The single stored credential record. Created once via setup, never
/// updated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminRecord {
    pub hashed_password: String,
    pub created_at: String,
}

impl AdminRecord {
    pub fn new(hashed_password: String) -> Self {
        Self {
            hashed_password,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Minimal async seam over the backing store so the store logic is
/// testable without a live redis.
#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

pub struct RedisKv {
    connection: ConnectionManager,
}

impl RedisKv {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();

        Ok(connection.get(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, value).await?;

        Ok(())
    }
}

#[derive(Default)]
struct Cache {
    achievements: Option<AchievementsMap>,
    admin: Option<AdminRecord>,
    scalars: HashMap<&'static str, String>,
}

pub struct Store {
    backend: Option<Arc<dyn Kv>>,
    cache: RwLock<Cache>,
}

impl Store {
    pub fn new(backend: Option<Arc<dyn Kv>>) -> Self {
        Self {
            backend,
            cache: RwLock::new(Cache::default()),
        }
    }

    async fn read_backend<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Corrupt value under {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Store read for {key} failed: {e}");
                None
            }
        }
    }

    async fn write_backend<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let backend = self
            .backend
            .as_ref()
            .context("no backing store configured")?;
        let raw = serde_json::to_string(value)?;

        backend.set(key, raw).await
    }

    async fn write_backend_soft<T: Serialize>(&self, key: &str, value: &T) {
        if self.backend.is_none() {
            return;
        }
        if let Err(e) = self.write_backend(key, value).await {
            warn!("Store write for {key} failed: {e}");
        }
    }

    /// Backing-store value if present, else the cached map, else the bundled
    /// default, which is cached and lazily persisted on first use.
    pub async fn get_all(&self) -> AchievementsMap {
        if let Some(map) = self.read_backend(ACHIEVEMENTS_KEY).await {
            return map;
        }

        if let Some(map) = self.cache.read().await.achievements.clone() {
            return map;
        }

        let map = default_achievements();
        self.cache.write().await.achievements = Some(map.clone());
        self.write_backend_soft(ACHIEVEMENTS_KEY, &map).await;

        map
    }

    async fn set_all(&self, map: AchievementsMap) {
        self.cache.write().await.achievements = Some(map.clone());
        self.write_backend_soft(ACHIEVEMENTS_KEY, &map).await;
    }

    /// Wholesale overwrite. Every key must be a 4-digit year; prior state is
    /// untouched when validation fails.
    pub async fn replace_all(&self, map: AchievementsMap) -> Result<AchievementsMap, AppError> {
        for year in map.keys() {
            if !is_valid_year(year) {
                return Err(AppError::Validation(format!("Invalid year format: {year}")));
            }
        }

        self.set_all(map.clone()).await;

        Ok(map)
    }

    pub async fn add(&self, year: &str, achievement: &str) -> AchievementsMap {
        let mut map = self.get_all().await;
        map.entry(year.to_string())
            .or_default()
            .push(achievement.to_string());

        self.set_all(map.clone()).await;

        map
    }

    pub async fn update(
        &self,
        year: &str,
        index: usize,
        achievement: &str,
    ) -> Option<AchievementsMap> {
        let mut map = self.get_all().await;

        let slot = map.get_mut(year)?.get_mut(index)?;
        *slot = achievement.to_string();

        self.set_all(map.clone()).await;

        Some(map)
    }

    /// Removes the item at `index`; a year whose list becomes empty is
    /// dropped from the map entirely.
    pub async fn delete(&self, year: &str, index: usize) -> Option<AchievementsMap> {
        let mut map = self.get_all().await;

        let items = map.get_mut(year)?;
        if index >= items.len() {
            return None;
        }
        items.remove(index);
        if items.is_empty() {
            map.remove(year);
        }

        self.set_all(map.clone()).await;

        Some(map)
    }

    pub async fn get_admin(&self) -> Option<AdminRecord> {
        if let Some(admin) = self.read_backend(ADMIN_KEY).await {
            return Some(admin);
        }

        self.cache.read().await.admin.clone()
    }

    pub async fn is_admin_setup(&self) -> bool {
        self.get_admin()
            .await
            .map(|admin| !admin.hashed_password.is_empty())
            .unwrap_or(false)
    }

    /// The one write that must land in the backing store: losing the admin
    /// record would lock the admin out, so failures propagate instead of
    /// degrading to the cache.
    pub async fn set_admin(&self, record: AdminRecord) -> Result<()> {
        self.write_backend(ADMIN_KEY, &record).await?;
        self.cache.write().await.admin = Some(record);

        Ok(())
    }

    async fn get_scalar(&self, key: &'static str, default: &str) -> String {
        if let Some(value) = self.read_backend(key).await {
            return value;
        }

        if let Some(value) = self.cache.read().await.scalars.get(key) {
            return value.clone();
        }

        default.to_string()
    }

    async fn set_scalar(&self, key: &'static str, value: &str) {
        self.cache.write().await.scalars.insert(key, value.to_string());
        self.write_backend_soft(key, &value).await;
    }

    pub async fn get_grade(&self) -> String {
        self.get_scalar(GRADE_KEY, DEFAULT_GRADE).await
    }

    pub async fn set_grade(&self, value: &str) {
        self.set_scalar(GRADE_KEY, value).await;
    }

    pub async fn get_bio(&self) -> String {
        self.get_scalar(BIO_KEY, DEFAULT_BIO).await
    }

    pub async fn set_bio(&self, value: &str) {
        self.set_scalar(BIO_KEY, value).await;
    }

    pub async fn get_birthday(&self) -> String {
        self.get_scalar(BIRTHDAY_KEY, DEFAULT_BIRTHDAY).await
    }

    pub async fn set_birthday(&self, value: &str) {
        self.set_scalar(BIRTHDAY_KEY, value).await;
    }
}

fn default_achievements() -> AchievementsMap {
    serde_json::from_str(DEFAULT_ACHIEVEMENTS).unwrap_or_else(|e| {
        error!("Bundled achievements dataset is invalid: {e}");
        AchievementsMap::new()
    })
}
