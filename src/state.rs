use std::sync::Arc;

use super::{
    config::Config,
    database::init_redis,
    store::{Kv, RedisKv, Store},
};

pub struct State {
    pub config: Config,
    pub store: Store,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let backend = init_redis(&config.redis_url)
            .await
            .map(|connection| Arc::new(RedisKv::new(connection)) as Arc<dyn Kv>);
        let store = Store::new(backend);

        Arc::new(Self { config, store })
    }
}
