use log::{ info, warn };
use serde::Serialize;
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Mutex, MutexGuard };
use std::time::{ Duration, Instant };
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::transport::ChatTransport;

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Sending,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// A round trip was already in flight; nothing was sent or appended.
    Busy,
    /// Blank input.
    Ignored,
    Replied(ChatMessage),
    Failed {
        reply: ChatMessage,
        error: ChatError,
    },
    /// The widget was reset while the request was in flight.
    Discarded,
}

struct Notice {
    message: String,
    raised_at: Instant,
}

/// Releases the in-flight flag on every exit path of a submission.
struct SendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One chat widget session: its transcript, its transport and the
/// `Idle`/`Sending` state machine. Nothing here is shared between widgets.
pub struct ChatWidget {
    id: Uuid,
    transport: ChatTransport,
    conversation: Mutex<Conversation>,
    notice: Mutex<Option<Notice>>,
    notice_ttl: Duration,
    sending: AtomicBool,
    epoch: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatWidget {
    pub fn open(transport: ChatTransport, notice_ttl: Duration) -> Self {
        let greeting = Conversation::seeded(&transport.persona().greeting);
        Self::with_conversation(transport, greeting, notice_ttl)
    }

    pub fn with_conversation(
        transport: ChatTransport,
        conversation: Conversation,
        notice_ttl: Duration
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            conversation: Mutex::new(conversation),
            notice: Mutex::new(None),
            notice_ttl,
            sending: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransportState {
        if self.sending.load(Ordering::SeqCst) {
            TransportState::Sending
        } else {
            TransportState::Idle
        }
    }

    pub fn conversation(&self) -> Conversation {
        lock(&self.conversation).clone()
    }

    pub fn notice_ttl(&self) -> Duration {
        self.notice_ttl
    }

    pub fn append(&self, turn: ChatMessage) -> Conversation {
        let mut conversation = lock(&self.conversation);
        *conversation = conversation.append(turn);
        conversation.clone()
    }

    /// Back to the seeded greeting with no pending notice. Safe to call
    /// any number of times.
    pub fn reset(&self) -> Conversation {
        let fresh = {
            let mut conversation = lock(&self.conversation);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *conversation = conversation.reset(&self.transport.persona().greeting);
            conversation.clone()
        };
        *lock(&self.notice) = None;
        self.transport.reset_session();
        info!("Widget {} reset", self.id);
        fresh
    }

    /// The technical error text of the last failure, until it expires.
    pub fn active_notice(&self) -> Option<String> {
        let mut notice = lock(&self.notice);
        match notice.as_ref() {
            Some(n) if n.raised_at.elapsed() < self.notice_ttl => Some(n.message.clone()),
            Some(_) => {
                *notice = None;
                None
            }
            None => None,
        }
    }

    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        self.submit_with(input, || {}).await
    }

    /// Like `submit`, calling `on_sending` once the widget has entered
    /// `Sending` and before the round trip starts.
    pub async fn submit_with<F: FnOnce()>(&self, input: &str, on_sending: F) -> SubmitOutcome {
        let utterance = input.trim();
        if utterance.is_empty() {
            return SubmitOutcome::Ignored;
        }

        if self.sending.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            info!("Widget {} is already sending, dropping submission", self.id);
            return SubmitOutcome::Busy;
        }
        let _guard = SendingGuard { flag: &self.sending };
        on_sending();

        let (history, epoch) = {
            let mut conversation = lock(&self.conversation);
            let prior = conversation.clone();
            *conversation = conversation.append(ChatMessage::user(utterance));
            (prior, self.epoch.load(Ordering::SeqCst))
        };
        *lock(&self.notice) = None;

        let result = self.transport.send_message(utterance, &history).await;

        let mut conversation = lock(&self.conversation);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!("Widget {} was reset mid-flight, discarding reply", self.id);
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(text) => {
                let reply = ChatMessage::assistant(text);
                *conversation = conversation.append(reply.clone());
                SubmitOutcome::Replied(reply)
            }
            Err(error) => {
                warn!("Widget {} chat failure: {}", self.id, error);
                let reply = ChatMessage::assistant(self.transport.persona().fallback_message());
                *conversation = conversation.append(reply.clone());
                // Still under the conversation lock: a concurrent reset
                // either runs first (and we bailed above) or clears this.
                *lock(&self.notice) = Some(Notice {
                    message: error.to_string(),
                    raised_at: Instant::now(),
                });
                SubmitOutcome::Failed { reply, error }
            }
        }
    }
}
