use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::Transport;
use crate::error::DeliveryError;
use crate::protocol::{AgentAddress, Envelope};

/// In-process mailboxes keyed by agent address.
///
/// Delivery never waits: a full mailbox is reported as `MailboxFull` so the
/// sender's retry policy decides what happens next.
pub struct LocalBus {
    mailboxes: RwLock<HashMap<AgentAddress, mpsc::Sender<Envelope>>>,
    capacity: usize,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Create the mailbox for `address` and return its receiving end.
    /// Registering an address twice replaces the earlier mailbox.
    pub fn register(&self, address: AgentAddress) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut mailboxes = self.mailboxes.write().unwrap_or_else(PoisonError::into_inner);
        if mailboxes.insert(address.clone(), tx).is_some() {
            tracing::warn!(agent = %address, "LocalBus: replaced existing mailbox");
        }
        rx
    }

    pub fn is_local(&self, address: &AgentAddress) -> bool {
        self.mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }
}

#[async_trait]
impl Transport for LocalBus {
    async fn deliver(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        let recipient = envelope.recipient.clone();
        let mailbox = self
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&recipient)
            .cloned()
            .ok_or_else(|| DeliveryError::UnknownRecipient(recipient.clone()))?;

        match mailbox.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::MailboxFull(recipient)),
            Err(TrySendError::Closed(_)) => Err(DeliveryError::MailboxClosed(recipient)),
        }
    }
}
