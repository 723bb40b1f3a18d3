//! In-process topic log behind the [`Kafka`] port.
//!
//! A [`MemoryBroker`] is shared by every producer and consumer built from the
//! same loaders, so records published by one library reach the consumers of
//! another.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use webcore_core::kernel::error::Result;
use webcore_core::library_system::{
    construct, Connector, Library, LibraryArgs, LibraryLoader, LibrarySystemError,
};
use webcore_core::ports::{Kafka, KafkaConsumer, PortError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryKafkaConfig {
    pub brokers: Vec<String>,
    pub group_id: String,
    pub topics: Vec<String>,
    /// Records buffered per subscription before `publish` waits
    pub buffer: usize,
}

impl Default for MemoryKafkaConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            group_id: String::new(),
            topics: Vec::new(),
            buffer: 64,
        }
    }
}

struct Subscription {
    owner: u64,
    sender: mpsc::Sender<Vec<u8>>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Subscription>>,
    next_owner: u64,
}

/// Topic fan-out shared between memory Kafka libraries.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<StdMutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self) -> u64 {
        let mut state = self.state();
        state.next_owner += 1;
        state.next_owner
    }

    fn subscribe(&self, owner: u64, topic: &str, buffer: usize) -> mpsc::Receiver<Vec<u8>> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        self.state()
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscription { owner, sender });
        receiver
    }

    /// Drop every subscription held by `owner`, ending their streams.
    fn close(&self, owner: u64) {
        let mut state = self.state();
        for subscriptions in state.topics.values_mut() {
            subscriptions.retain(|s| s.owner != owner);
        }
        state.topics.retain(|_, subscriptions| !subscriptions.is_empty());
    }

    /// Deliver `message` to every open subscription of `topic` and return how
    /// many received it.
    async fn publish(&self, topic: &str, message: Vec<u8>) -> usize {
        let senders: Vec<mpsc::Sender<Vec<u8>>> = {
            let mut state = self.state();
            let Some(subscriptions) = state.topics.get_mut(topic) else {
                return 0;
            };
            subscriptions.retain(|s| !s.sender.is_closed());
            subscriptions.iter().map(|s| s.sender.clone()).collect()
        };
        let mut delivered = 0;
        for sender in senders {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Open subscriptions on `topic`.
    pub fn subscribers(&self, topic: &str) -> usize {
        self.state()
            .topics
            .get(topic)
            .map_or(0, |subscriptions| subscriptions.iter().filter(|s| !s.sender.is_closed()).count())
    }
}

impl fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let mut topics: Vec<&String> = state.topics.keys().collect();
        topics.sort();
        f.debug_struct("MemoryBroker").field("topics", &topics).finish()
    }
}

struct Inner {
    broker: MemoryBroker,
    owner: u64,
    config: OnceLock<MemoryKafkaConfig>,
    connected: AtomicBool,
    committed: AtomicU64,
    rejected: AtomicU64,
    workers: Mutex<Vec<(CancellationToken, JoinHandle<()>)>>,
}

impl Inner {
    fn config(&self) -> MemoryKafkaConfig {
        self.config.get().cloned().unwrap_or_default()
    }

    async fn stop_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for (stop, _) in &workers {
            stop.cancel();
        }
        for (_, handle) in workers {
            if let Err(e) = handle.await {
                warn!("Kafka consumer worker ended abnormally: {}", e);
            }
        }
    }
}

/// In-process Kafka client.
///
/// Built by [`MemoryKafkaProducerLoader`] it only publishes and opens
/// streams. Built by [`MemoryKafkaConsumerLoader`] it also feeds every
/// configured topic to a [`KafkaConsumer`] until it disconnects or the
/// application shuts down.
#[derive(Clone)]
pub struct MemoryKafka {
    inner: Arc<Inner>,
}

impl MemoryKafka {
    pub fn new(broker: MemoryBroker) -> Self {
        let owner = broker.register();
        Self {
            inner: Arc::new(Inner {
                broker,
                owner,
                config: OnceLock::new(),
                connected: AtomicBool::new(false),
                committed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Records the consumer handled and committed.
    pub fn committed(&self) -> u64 {
        self.inner.committed.load(Ordering::SeqCst)
    }

    /// Records the consumer declined or failed on.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PortError::unavailable("kafka", "not connected").into())
        }
    }

    /// Start one worker per configured topic handing records to `consumer`.
    async fn start_consuming(&self, consumer: Arc<dyn KafkaConsumer>, token: CancellationToken) -> Result<()> {
        self.ensure_connected()?;
        let config = self.inner.config();
        if config.topics.is_empty() {
            return Err(LibrarySystemError::invalid_arguments("kafka:memory", "consumer has no topics").into());
        }
        let mut workers = self.inner.workers.lock().await;
        for topic in config.topics {
            let records = self.inner.broker.subscribe(self.inner.owner, &topic, config.buffer);
            let stop = token.child_token();
            let handle = tokio::spawn(consume_topic(
                self.inner.clone(),
                topic,
                records,
                consumer.clone(),
                stop.clone(),
            ));
            workers.push((stop, handle));
        }
        debug!("Memory Kafka consumer started for group {:?}", self.inner.config().group_id);
        Ok(())
    }
}

impl fmt::Debug for MemoryKafka {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKafka")
            .field("topics", &self.inner.config().topics)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Library for MemoryKafka {
    fn kind(&self) -> &str {
        "memory kafka"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: MemoryKafkaConfig = args.config_as("kafka:memory")?;
        debug!(
            "Memory Kafka installed (brokers {:?}, topics {:?})",
            config.brokers, config.topics
        );
        let _ = self.inner.config.set(config);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.inner.stop_workers().await;
        self.inner.broker.close(self.inner.owner);
        Ok(())
    }

    fn connector(&self) -> Option<&dyn Connector> {
        Some(self)
    }

    fn into_kafka(self: Arc<Self>) -> Option<Arc<dyn Kafka>> {
        Some(self)
    }
}

#[async_trait]
impl Connector for MemoryKafka {
    async fn connect(&self) -> Result<()> {
        self.inner.connected.store(true, Ordering::SeqCst);
        info!("Memory Kafka connected to {:?}", self.inner.config().brokers);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.stop_workers().await;
        self.inner.broker.close(self.inner.owner);
        info!("Memory Kafka disconnected");
        Ok(())
    }
}

#[async_trait]
impl Kafka for MemoryKafka {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()> {
        self.ensure_connected()?;
        let delivered = self.inner.broker.publish(topic, message).await;
        debug!("Published to {} ({} subscribers)", topic, delivered);
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        self.ensure_connected()?;
        Ok(self.inner.broker.subscribe(self.inner.owner, topic, self.inner.config().buffer))
    }
}

async fn consume_topic(
    inner: Arc<Inner>,
    topic: String,
    mut records: mpsc::Receiver<Vec<u8>>,
    consumer: Arc<dyn KafkaConsumer>,
    stop: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            _ = stop.cancelled() => break,
            record = records.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };
        match consumer.consume(&record).await {
            Ok(true) => {
                inner.committed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(false) => {
                inner.rejected.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("Kafka consumer failed on a record from {}: {}", topic, e);
                inner.rejected.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    debug!("Memory Kafka consumer for {} stopped", topic);
}

/// Loader for `kafka.producer:memory`.
#[derive(Default)]
pub struct MemoryKafkaProducerLoader {
    name: String,
    broker: MemoryBroker,
}

impl MemoryKafkaProducerLoader {
    pub fn new(broker: MemoryBroker) -> Self {
        Self {
            name: String::new(),
            broker,
        }
    }
}

#[async_trait]
impl LibraryLoader for MemoryKafkaProducerLoader {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        construct(MemoryKafka::new(self.broker.clone()), &args).await
    }
}

/// Loader for `kafka.consumer:memory`.
///
/// The arguments must carry a [`KafkaConsumer`]; consumption starts once the
/// library is connected and is bound to the application's shutdown token.
#[derive(Default)]
pub struct MemoryKafkaConsumerLoader {
    name: String,
    broker: MemoryBroker,
}

impl MemoryKafkaConsumerLoader {
    pub fn new(broker: MemoryBroker) -> Self {
        Self {
            name: String::new(),
            broker,
        }
    }
}

#[async_trait]
impl LibraryLoader for MemoryKafkaConsumerLoader {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        let Some(consumer) = args.kafka_consumer().cloned() else {
            return Err(LibrarySystemError::invalid_arguments(&self.name, "consumer needs a record handler").into());
        };
        let kafka = MemoryKafka::new(self.broker.clone());
        let library = construct(kafka.clone(), &args).await?;

        let token = args.context().map(|c| c.shutdown_token()).unwrap_or_default();
        if let Err(e) = kafka.start_consuming(consumer, token).await {
            let _ = kafka.disconnect().await;
            let _ = kafka.uninstall().await;
            return Err(e);
        }
        Ok(library)
    }
}
