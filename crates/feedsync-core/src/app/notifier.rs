//! CompletionNotifier - queue の drain 完了を開いている全クライアントへ知らせる
//!
//! 配送は best-effort。受信側が閉じていれば黙って外すだけで、ack も retry もない。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::domain::{ClientId, QueueKind, SyncMessage};

/// Receiving end held by one open client.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<SyncMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SyncMessage> {
        self.rx.try_recv().ok()
    }
}

/// Open clients under the worker's control.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<SyncMessage>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> ClientHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ClientId::generate();
        self.clients.lock().await.insert(id, tx);
        debug!(client = %id, "client connected");
        ClientHandle { id, rx }
    }

    pub async fn disconnect(&self, id: ClientId) {
        self.clients.lock().await.remove(&id);
    }

    /// Ids of clients that are still open.
    pub async fn clients(&self) -> Vec<ClientId> {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, tx| !tx.is_closed());
        clients.keys().copied().collect()
    }

    /// Post `message` to every open client. Returns how many accepted it.
    pub async fn post_all(&self, message: &SyncMessage) -> usize {
        let mut clients = self.clients.lock().await;
        let mut delivered = 0;
        clients.retain(|id, tx| match tx.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                trace!(client = %id, "dropping closed client");
                false
            }
        });
        delivered
    }
}

#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    clients: Arc<ClientRegistry>,
}

impl CompletionNotifier {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Broadcast `BACKGROUND_SYNC_COMPLETE` for `queue`.
    pub async fn notify_queue_complete(&self, queue: QueueKind) -> usize {
        let message = SyncMessage::BackgroundSyncComplete { queue };
        let delivered = self.clients.post_all(&message).await;
        debug!(%queue, delivered, "sync completion broadcast");
        delivered
    }
}
