//! # Redis
//!
//! Remote key-value store holding the achievements map, the admin record,
//! and the profile scalars, one JSON value per key.
//!
//! The store is optional at runtime: when the connection cannot be
//! established the server keeps running on the in-process fallback cache,
//! so a redis outage degrades persistence but never availability.

use std::time::Duration;

use redis::{
    Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::warn;

pub async fn init_redis(redis_url: &str) -> Option<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = match Client::open(redis_url) {
        Ok(client) => client,
        Err(e) => {
            warn!("Invalid redis url: {e}");
            return None;
        }
    };

    match client.get_connection_manager_with_config(config).await {
        Ok(connection_manager) => Some(connection_manager),
        Err(e) => {
            warn!("Redis unavailable, running on the in-process cache: {e}");
            None
        }
    }
}
