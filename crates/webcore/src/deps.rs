//! Static registration of every library the binary ships with.
use std::collections::HashMap;

use webcore_auth::{ApiKeyAuthentication, YamlAuthStore};
use webcore_core::kernel::constants::{self, loader_name};
use webcore_core::library_system::{DefaultLoader, LibraryLoader};
use webcore_inmemory::{
    MemoryBroker, MemoryCache, MemoryDatabase, MemoryKafkaConsumerLoader, MemoryKafkaProducerLoader,
    MemoryPubSubLoader, DRIVER,
};

pub fn loaders() -> HashMap<String, Box<dyn LibraryLoader>> {
    let mut loaders: HashMap<String, Box<dyn LibraryLoader>> = HashMap::new();
    loaders.insert(
        loader_name(constants::DATABASE_LOADER_PREFIX, DRIVER),
        Box::new(DefaultLoader::<MemoryDatabase>::new()),
    );
    loaders.insert(
        loader_name(constants::CACHE_LOADER_PREFIX, DRIVER),
        Box::new(DefaultLoader::<MemoryCache>::new()),
    );
    loaders.insert(
        loader_name(constants::PUBSUB_LOADER_PREFIX, DRIVER),
        Box::new(MemoryPubSubLoader::new()),
    );
    let broker = MemoryBroker::new();
    loaders.insert(
        loader_name(constants::KAFKA_PRODUCER_LOADER_PREFIX, DRIVER),
        Box::new(MemoryKafkaProducerLoader::new(broker.clone())),
    );
    loaders.insert(
        loader_name(constants::KAFKA_CONSUMER_LOADER_PREFIX, DRIVER),
        Box::new(MemoryKafkaConsumerLoader::new(broker)),
    );
    loaders.insert(
        webcore_auth::STORE_LOADER.to_string(),
        Box::new(DefaultLoader::<YamlAuthStore>::new()),
    );
    loaders.insert(
        webcore_auth::AUTHN_LOADER.to_string(),
        Box::new(DefaultLoader::<ApiKeyAuthentication>::new()),
    );
    loaders
}
