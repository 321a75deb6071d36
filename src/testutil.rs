//! Mock key-value backends for exercising the store without a live redis.

use std::{collections::HashMap, sync::Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::store::Kv;

#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.data.lock().unwrap().insert(key.to_string(), value);

        Ok(())
    }
}

/// Simulates a backing store that is configured but unreachable.
pub struct FailingKv;

#[async_trait]
impl Kv for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("store offline"))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(anyhow!("store offline"))
    }
}
