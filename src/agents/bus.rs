//! Agent Communication Bus (spec §4.K) — single-process async pub/sub with
//! a priority queue per recipient plus a broadcast fan-out, and
//! `request_response` correlation. Grounded on the teacher's `EventBus`
//! (`orchestrator/event_bus.rs`, a `tokio::sync::broadcast` pub/sub) for the
//! broadcast half; the per-recipient priority mailbox has no teacher
//! analogue since `broadcast` can't express per-recipient priority
//! ordering, so it's built directly on `BinaryHeap` + `Notify`, the same
//! cooperative-wakeup idiom as [`crate::provider::CancellationToken`].

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex, Notify};

use crate::domain::{AgentMessage, MessagePriority, MessageTarget};
use crate::error::{OrchestratorError, Result};

struct Envelope {
    priority: MessagePriority,
    seq: u64,
    message: AgentMessage,
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Envelope {}
impl PartialOrd for Envelope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Envelope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority pops first; within a priority class, lower `seq`
        // (earlier arrival) pops first — the FIFO-within-priority guarantee
        // from spec §4.K.
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Mailbox {
    queue: Mutex<BinaryHeap<Envelope>>,
    notify: Notify,
    capacity: usize,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self { queue: Mutex::new(BinaryHeap::new()), notify: Notify::new(), capacity }
    }

    async fn try_push(&self, envelope: Envelope) -> Result<()> {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            return Err(OrchestratorError::Backpressure(envelope.message.id.clone()));
        }
        queue.push(envelope);
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    async fn recv(&self) -> AgentMessage {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(envelope) = queue.pop() {
                    return envelope.message;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// A subscriber's handle onto its mailbox, returned by [`AgentBus::subscribe`].
pub struct MailboxHandle {
    agent_id: String,
    mailbox: Arc<Mailbox>,
}

impl MailboxHandle {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Blocks until the next message arrives, draining the priority heap
    /// highest-priority-first (spec §4.K: "handler is invoked in arrival
    /// order within a priority class").
    pub async fn recv(&self) -> AgentMessage {
        self.mailbox.recv().await
    }
}

/// Default bounded capacity per recipient mailbox before `publish` returns
/// `Backpressure` (spec §5: "bounded capacity; when full, publish fails").
const DEFAULT_MAILBOX_CAPACITY: usize = 256;

pub struct AgentBus {
    mailboxes: Mutex<HashMap<String, Arc<Mailbox>>>,
    pending_requests: Mutex<HashMap<String, (String, oneshot::Sender<AgentMessage>)>>,
    mailbox_capacity: usize,
    next_seq: AtomicU64,
}

impl AgentBus {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
            pending_requests: Mutex::new(HashMap::new()),
            mailbox_capacity,
            next_seq: AtomicU64::new(0),
        }
    }

    pub async fn subscribe(&self, agent_id: impl Into<String>) -> MailboxHandle {
        let agent_id = agent_id.into();
        let mailbox = Arc::new(Mailbox::new(self.mailbox_capacity));
        self.mailboxes.lock().await.insert(agent_id.clone(), mailbox.clone());
        MailboxHandle { agent_id, mailbox }
    }

    pub async fn unsubscribe(&self, agent_id: &str) {
        self.mailboxes.lock().await.remove(agent_id);
    }

    /// `publish(message) -> ack` (spec §4.K). A reply whose `correlation_id`
    /// matches a pending `request_response` call *and* whose `to` targets
    /// that call's original caller resolves the call directly instead of
    /// (additionally) queuing into a mailbox. The initiating request itself
    /// carries the same `correlation_id` but is addressed to the recipient,
    /// not the caller, so it is never mistaken for its own reply and is
    /// delivered to the recipient's mailbox like any other message.
    pub async fn publish(&self, message: AgentMessage) -> Result<()> {
        if let Some(correlation_id) = &message.correlation_id {
            if let MessageTarget::Agent(to) = &message.to {
                let mut pending = self.pending_requests.lock().await;
                if let Some((caller_id, _)) = pending.get(correlation_id) {
                    if caller_id == to {
                        let (_, waiter) = pending.remove(correlation_id).unwrap();
                        let _ = waiter.send(message);
                        return Ok(());
                    }
                }
            }
        }

        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        match &message.to {
            MessageTarget::Agent(agent_id) => {
                let mailbox = {
                    let mailboxes = self.mailboxes.lock().await;
                    mailboxes.get(agent_id).cloned()
                };
                match mailbox {
                    Some(mailbox) => {
                        let priority = message.priority;
                        mailbox.try_push(Envelope { priority, seq, message }).await
                    }
                    None => Ok(()), // unknown recipient: best-effort, no subscriber to deliver to.
                }
            }
            MessageTarget::Broadcast => {
                // Broadcast is best-effort (spec §4.K): a full mailbox is
                // skipped rather than failing the whole publish.
                let mailboxes: Vec<Arc<Mailbox>> = self.mailboxes.lock().await.values().cloned().collect();
                for mailbox in mailboxes {
                    let envelope = Envelope { priority: message.priority, seq, message: message.clone() };
                    let _ = mailbox.try_push(envelope).await;
                }
                Ok(())
            }
        }
    }

    /// `request_response(message, timeout) -> reply | TimeoutError` (spec
    /// §4.K). Assigns a `correlation_id` if the message doesn't already
    /// carry one.
    pub async fn request_response(&self, mut message: AgentMessage, timeout: Duration) -> Result<AgentMessage> {
        let correlation_id = message.correlation_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        message.correlation_id = Some(correlation_id.clone());

        let (tx, rx) = oneshot::channel();
        let caller_id = message.from_agent.clone();
        self.pending_requests.lock().await.insert(correlation_id.clone(), (caller_id, tx));

        self.publish(message).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) | Err(_) => {
                self.pending_requests.lock().await.remove(&correlation_id);
                Err(OrchestratorError::RequestResponseTimeout(correlation_id))
            }
        }
    }
}

impl Default for AgentBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageType;
    use serde_json::json;

    fn msg(from: &str, to: MessageTarget, priority: MessagePriority) -> AgentMessage {
        AgentMessage::new(from, to, MessageType::Coordination, priority, json!({}))
    }

    #[tokio::test]
    async fn higher_priority_delivered_first() {
        let bus = AgentBus::new(16);
        let handle = bus.subscribe("worker").await;
        bus.publish(msg("a", MessageTarget::Agent("worker".into()), MessagePriority::Low)).await.unwrap();
        bus.publish(msg("b", MessageTarget::Agent("worker".into()), MessagePriority::Urgent)).await.unwrap();
        bus.publish(msg("c", MessageTarget::Agent("worker".into()), MessagePriority::Normal)).await.unwrap();

        let first = handle.recv().await;
        assert_eq!(first.from_agent, "b");
        let second = handle.recv().await;
        assert_eq!(second.from_agent, "c");
        let third = handle.recv().await;
        assert_eq!(third.from_agent, "a");
    }

    #[tokio::test]
    async fn fifo_within_same_priority() {
        let bus = AgentBus::new(16);
        let handle = bus.subscribe("worker").await;
        for sender in ["a", "b", "c"] {
            bus.publish(msg(sender, MessageTarget::Agent("worker".into()), MessagePriority::Normal)).await.unwrap();
        }
        assert_eq!(handle.recv().await.from_agent, "a");
        assert_eq!(handle.recv().await.from_agent, "b");
        assert_eq!(handle.recv().await.from_agent, "c");
    }

    #[tokio::test]
    async fn publish_fails_with_backpressure_when_mailbox_full() {
        let bus = AgentBus::new(1);
        let _handle = bus.subscribe("worker").await;
        bus.publish(msg("a", MessageTarget::Agent("worker".into()), MessagePriority::Normal)).await.unwrap();
        let second = bus.publish(msg("b", MessageTarget::Agent("worker".into()), MessagePriority::Normal)).await;
        assert!(matches!(second, Err(OrchestratorError::Backpressure(_))));
    }

    #[tokio::test]
    async fn request_response_matches_reply_by_correlation_id() {
        let bus = Arc::new(AgentBus::new(16));
        let responder_bus = bus.clone();
        let handle = bus.subscribe("responder").await;

        tokio::spawn(async move {
            let request = handle.recv().await;
            let reply = AgentMessage {
                correlation_id: request.correlation_id.clone(),
                ..msg("responder", MessageTarget::Agent("caller".into()), MessagePriority::Normal)
            };
            responder_bus.publish(reply).await.unwrap();
        });

        let request = msg("caller", MessageTarget::Agent("responder".into()), MessagePriority::Normal);
        let reply = bus.request_response(request, Duration::from_millis(500)).await.unwrap();
        assert_eq!(reply.from_agent, "responder");
    }

    #[tokio::test]
    async fn request_response_times_out_without_a_reply() {
        let bus = AgentBus::new(16);
        let _handle = bus.subscribe("silent").await;
        let request = msg("caller", MessageTarget::Agent("silent".into()), MessagePriority::Normal);
        let result = bus.request_response(request, Duration::from_millis(30)).await;
        assert!(matches!(result, Err(OrchestratorError::RequestResponseTimeout(_))));
    }
}
