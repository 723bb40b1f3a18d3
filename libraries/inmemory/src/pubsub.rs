//! Topic queue with a background delivery worker behind the [`PubSub`] port.
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock as StdRwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use webcore_core::kernel::error::Result;
use webcore_core::library_system::{construct, Connector, Library, LibraryArgs, LibraryLoader};
use webcore_core::ports::{MessageReceiver, PortError, PubSub, PubSubMessage};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryPubSubConfig {
    pub project_id: String,
    pub topic: String,
    pub subscription: String,
    /// Deliveries per message before it is dead-lettered
    pub max_attempts: u32,
    pub batch_size: usize,
}

impl Default for MemoryPubSubConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            topic: "memory".to_string(),
            subscription: String::new(),
            max_attempts: 3,
            batch_size: 10,
        }
    }
}

struct Worker {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    config: OnceLock<MemoryPubSubConfig>,
    connected: AtomicBool,
    queue: Mutex<VecDeque<PubSubMessage>>,
    notify: Notify,
    receiver: StdRwLock<Option<Arc<dyn MessageReceiver>>>,
    next_id: AtomicU64,
    acked: AtomicU64,
    dead_letters: Mutex<Vec<PubSubMessage>>,
    worker: Mutex<Option<Worker>>,
}

impl Inner {
    fn config(&self) -> MemoryPubSubConfig {
        self.config.get().cloned().unwrap_or_default()
    }

    fn receiver(&self) -> Option<Arc<dyn MessageReceiver>> {
        self.receiver
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn take_batch(&self) -> Vec<PubSubMessage> {
        let size = self.config().batch_size.max(1);
        let mut queue = self.queue.lock().await;
        let count = size.min(queue.len());
        queue.drain(..count).collect()
    }

    /// Ack, redeliver or dead-letter each message of a delivered batch.
    async fn settle(&self, batch: Vec<PubSubMessage>, acks: &HashMap<String, bool>) {
        let max_attempts = self.config().max_attempts.max(1);
        let mut queue = self.queue.lock().await;
        for mut message in batch {
            if acks.get(&message.id).copied().unwrap_or(false) {
                self.acked.fetch_add(1, Ordering::SeqCst);
            } else if message.delivery_attempt >= max_attempts {
                warn!(
                    "Message {} dead-lettered after {} attempts",
                    message.id, message.delivery_attempt
                );
                self.dead_letters.lock().await.push(message);
            } else {
                message.delivery_attempt += 1;
                queue.push_back(message);
            }
        }
    }

    async fn stop_worker(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.stop.cancel();
        if let Err(e) = worker.handle.await {
            warn!("Pub/sub delivery worker ended abnormally: {}", e);
        }
    }
}

/// In-process pub/sub topic with a single subscription.
///
/// Published messages are queued and delivered in batches to the registered
/// [`MessageReceiver`] by a background task started with
/// [`PubSub::start_receiving`]. Messages the receiver does not ack are
/// redelivered until `max_attempts` is reached, then dead-lettered.
#[derive(Clone, Default)]
pub struct MemoryPubSub {
    inner: Arc<Inner>,
}

impl MemoryPubSub {
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Messages waiting for delivery.
    pub async fn pending(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Messages acked so far.
    pub fn acked(&self) -> u64 {
        self.inner.acked.load(Ordering::SeqCst)
    }

    pub async fn dead_letters(&self) -> Vec<PubSubMessage> {
        self.inner.dead_letters.lock().await.clone()
    }

    pub async fn is_receiving(&self) -> bool {
        self.inner
            .worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl fmt::Debug for MemoryPubSub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPubSub")
            .field("topic", &self.inner.config().topic)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Library for MemoryPubSub {
    fn kind(&self) -> &str {
        "memory pubsub"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        let config: MemoryPubSubConfig = args.config_as("pubsub:memory")?;
        debug!(
            "Memory pub/sub installed for topic {} (max attempts {})",
            config.topic, config.max_attempts
        );
        let _ = self.inner.config.set(config);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        self.inner.stop_worker().await;
        self.inner.queue.lock().await.clear();
        Ok(())
    }

    fn connector(&self) -> Option<&dyn Connector> {
        Some(self)
    }

    fn into_pubsub(self: Arc<Self>) -> Option<Arc<dyn PubSub>> {
        Some(self)
    }
}

#[async_trait]
impl Connector for MemoryPubSub {
    async fn connect(&self) -> Result<()> {
        self.inner.connected.store(true, Ordering::SeqCst);
        info!("Memory pub/sub connected to topic {}", self.inner.config().topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.stop_worker().await;
        info!("Memory pub/sub disconnected");
        Ok(())
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, data: Vec<u8>, attributes: HashMap<String, String>) -> Result<String> {
        if !self.is_connected() {
            return Err(PortError::unavailable("pubsub", "not connected").into());
        }
        let sequence = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{}", self.inner.config().topic, sequence);
        let message = PubSubMessage {
            id: id.clone(),
            data,
            publish_time: SystemTime::now(),
            attributes,
            delivery_attempt: 1,
        };
        self.inner.queue.lock().await.push_back(message);
        self.inner.notify.notify_one();
        Ok(id)
    }

    fn register_receiver(&self, receiver: Arc<dyn MessageReceiver>) {
        *self
            .inner
            .receiver
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(receiver);
    }

    async fn start_receiving(&self, token: CancellationToken) -> Result<()> {
        if self.inner.receiver().is_none() {
            return Err(PortError::unavailable("pubsub", "no receiver registered").into());
        }
        let mut worker = self.inner.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(());
        }
        let stop = CancellationToken::new();
        let handle = tokio::spawn(deliver(self.inner.clone(), token, stop.clone()));
        *worker = Some(Worker { stop, handle });
        debug!("Memory pub/sub delivery started");
        Ok(())
    }
}

async fn deliver(inner: Arc<Inner>, token: CancellationToken, stop: CancellationToken) {
    loop {
        if token.is_cancelled() || stop.is_cancelled() {
            break;
        }
        let batch = inner.take_batch().await;
        if batch.is_empty() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = stop.cancelled() => break,
                _ = inner.notify.notified() => continue,
            }
        }
        let Some(receiver) = inner.receiver() else {
            break;
        };
        let acks = match receiver.consume(&batch).await {
            Ok(acks) => acks,
            Err(e) => {
                warn!("Receiver rejected a batch of {} messages: {}", batch.len(), e);
                HashMap::new()
            }
        };
        inner.settle(batch, &acks).await;
    }
    debug!("Memory pub/sub delivery stopped");
}

/// Loader for `pubsub:memory`.
///
/// Builds, installs and connects the topic. When the arguments carry a
/// message receiver it is registered and delivery starts right away, bound
/// to the application's shutdown token.
#[derive(Default)]
pub struct MemoryPubSubLoader {
    name: String,
}

impl MemoryPubSubLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryLoader for MemoryPubSubLoader {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, args: LibraryArgs) -> Result<Arc<dyn Library>> {
        let pubsub = MemoryPubSub::default();
        let library = construct(pubsub.clone(), &args).await?;

        if let Some(receiver) = args.receiver() {
            pubsub.register_receiver(receiver.clone());
            let token = args.context().map(|c| c.shutdown_token()).unwrap_or_default();
            if let Err(e) = pubsub.start_receiving(token).await {
                let _ = pubsub.disconnect().await;
                let _ = pubsub.uninstall().await;
                return Err(e);
            }
        }
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use webcore_core::kernel::error::Error;

    /// Forwards every delivery to a channel, acking according to `ack`.
    struct ChannelReceiver {
        deliveries: mpsc::UnboundedSender<PubSubMessage>,
        ack: bool,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl MessageReceiver for ChannelReceiver {
        async fn consume(&self, messages: &[PubSubMessage]) -> Result<HashMap<String, bool>> {
            for message in messages {
                let _ = self.deliveries.send(message.clone());
            }
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::Other("handler crashed".to_string()));
            }
            Ok(messages.iter().map(|m| (m.id.clone(), self.ack)).collect())
        }
    }

    fn receiver(ack: bool, fail_first: usize) -> (Arc<ChannelReceiver>, mpsc::UnboundedReceiver<PubSubMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = Arc::new(ChannelReceiver {
            deliveries: tx,
            ack,
            fail_first: AtomicUsize::new(fail_first),
        });
        (receiver, rx)
    }

    async fn connected(config: serde_json::Value) -> MemoryPubSub {
        let pubsub = MemoryPubSub::default();
        construct(pubsub.clone(), &LibraryArgs::new().with_config_value(config))
            .await
            .unwrap();
        pubsub
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<PubSubMessage>) -> PubSubMessage {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed")
    }

    async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_published_messages_are_delivered_and_acked() {
        let pubsub = connected(json!({"topic": "orders"})).await;
        let (receiver, mut rx) = receiver(true, 0);
        pubsub.register_receiver(receiver);
        pubsub.start_receiving(CancellationToken::new()).await.unwrap();

        let attributes = HashMap::from([("kind".to_string(), "created".to_string())]);
        let id = pubsub.publish(b"order-1".to_vec(), attributes).await.unwrap();
        assert_eq!(id, "orders-1");

        let message = next(&mut rx).await;
        assert_eq!(message.id, id);
        assert_eq!(message.data_as_str(), Some("order-1"));
        assert_eq!(message.attributes["kind"], "created");
        assert_eq!(message.delivery_attempt, 1);

        let watched = pubsub.clone();
        wait_until(move || {
            let watched = watched.clone();
            async move { watched.acked() == 1 }
        })
        .await;
        assert_eq!(pubsub.pending().await, 0);
    }

    #[tokio::test]
    async fn test_nacked_messages_are_redelivered_then_dead_lettered() {
        let pubsub = connected(json!({"topic": "jobs", "max_attempts": 3})).await;
        let (receiver, mut rx) = receiver(false, 0);
        pubsub.register_receiver(receiver);
        pubsub.start_receiving(CancellationToken::new()).await.unwrap();

        pubsub.publish(b"job".to_vec(), HashMap::new()).await.unwrap();

        for attempt in 1..=3 {
            assert_eq!(next(&mut rx).await.delivery_attempt, attempt);
        }
        let watched = pubsub.clone();
        wait_until(move || {
            let watched = watched.clone();
            async move { watched.dead_letters().await.len() == 1 }
        })
        .await;
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err(), "no fourth delivery");
        assert_eq!(pubsub.acked(), 0);
    }

    #[tokio::test]
    async fn test_receiver_error_nacks_the_batch() {
        let pubsub = connected(serde_json::Value::Null).await;
        let (receiver, mut rx) = receiver(true, 1);
        pubsub.register_receiver(receiver);
        pubsub.start_receiving(CancellationToken::new()).await.unwrap();

        pubsub.publish(b"a".to_vec(), HashMap::new()).await.unwrap();

        assert_eq!(next(&mut rx).await.delivery_attempt, 1);
        assert_eq!(next(&mut rx).await.delivery_attempt, 2);
        let watched = pubsub.clone();
        wait_until(move || {
            let watched = watched.clone();
            async move { watched.acked() == 1 }
        })
        .await;
    }

    #[tokio::test]
    async fn test_cancellation_stops_delivery() {
        let pubsub = connected(serde_json::Value::Null).await;
        let (receiver, mut rx) = receiver(true, 0);
        pubsub.register_receiver(receiver);
        let token = CancellationToken::new();
        pubsub.start_receiving(token.clone()).await.unwrap();

        token.cancel();
        let watched = pubsub.clone();
        wait_until(move || {
            let watched = watched.clone();
            async move { !watched.is_receiving().await }
        })
        .await;

        pubsub.publish(b"late".to_vec(), HashMap::new()).await.unwrap();
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
        assert_eq!(pubsub.pending().await, 1);
    }

    #[tokio::test]
    async fn test_start_without_receiver_and_publish_while_disconnected_fail() {
        let pubsub = connected(serde_json::Value::Null).await;
        assert!(pubsub.start_receiving(CancellationToken::new()).await.is_err());

        pubsub.disconnect().await.unwrap();
        assert!(pubsub.publish(b"x".to_vec(), HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_uninstall_stops_worker_and_drops_queue() {
        let pubsub = connected(serde_json::Value::Null).await;
        let (receiver, _rx) = receiver(true, 0);
        pubsub.register_receiver(receiver);
        pubsub.start_receiving(CancellationToken::new()).await.unwrap();
        assert!(pubsub.is_receiving().await);

        pubsub.disconnect().await.unwrap();
        pubsub.uninstall().await.unwrap();
        assert!(!pubsub.is_receiving().await);
        assert_eq!(pubsub.pending().await, 0);
    }

    #[tokio::test]
    async fn test_loader_wires_receiver_from_arguments() {
        let (receiver, mut rx) = receiver(true, 0);
        let mut loader = MemoryPubSubLoader::new();
        loader.set_name("pubsub:memory");

        let library = loader
            .init(
                LibraryArgs::new()
                    .with_config_value(json!({"topic": "audit"}))
                    .with_receiver(receiver),
            )
            .await
            .unwrap();
        let pubsub = library.clone().into_pubsub().expect("pubsub port");

        pubsub.publish(b"login".to_vec(), HashMap::new()).await.unwrap();
        assert_eq!(next(&mut rx).await.id, "audit-1");

        library.connector().expect("connection-bearing").disconnect().await.unwrap();
        library.uninstall().await.unwrap();
    }
}
