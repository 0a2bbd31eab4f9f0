use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::common::{ChatId, TypingSignal, UserId};

#[derive(Debug)]
struct PendingStop {
    chat_id: ChatId,
    user_id: UserId,
    deadline: Instant,
}

/// Debounces local keystrokes into start/stop signals and tracks remote
/// typing indicators per chat.
#[derive(Debug)]
pub struct TypingCoordinator {
    quiet: Duration,
    pending: Option<PendingStop>,
    indicators: HashMap<ChatId, bool>,
    typists: HashMap<ChatId, BTreeSet<UserId>>,
}

impl TypingCoordinator {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            indicators: HashMap::new(),
            typists: HashMap::new(),
        }
    }

    /// Returns the signals to send now: a start signal unless one is
    /// already active for this pair, preceded by a stop for a different
    /// pair that was still pending. Always re-arms the stop timer.
    pub fn notify_local_typing(&mut self, chat_id: &ChatId, user_id: &UserId) -> Vec<TypingSignal> {
        let mut signals = Vec::new();
        let active = self
            .pending
            .as_ref()
            .is_some_and(|pending| &pending.chat_id == chat_id && &pending.user_id == user_id);

        if !active {
            signals.extend(self.take_stop());
            signals.push(TypingSignal::new(chat_id.clone(), user_id.clone(), true));
        }

        self.pending = Some(PendingStop {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
            deadline: Instant::now() + self.quiet,
        });
        signals
    }

    /// Resolves with the stop signal once the quiet interval elapses.
    /// Pending forever while nobody is typing.
    pub async fn next_stop(&mut self) -> TypingSignal {
        let Some(deadline) = self.pending.as_ref().map(|pending| pending.deadline) else {
            return futures::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        match self.take_stop() {
            Some(stop) => stop,
            None => futures::future::pending().await,
        }
    }

    pub fn is_local_typing(&self) -> bool {
        self.pending.is_some()
    }

    /// Sets the chat's indicator from a remote signal. Returns the new state.
    pub fn on_remote_typing(&mut self, chat_id: &ChatId, user_id: &UserId, is_typing: bool) -> bool {
        self.indicators.insert(chat_id.clone(), is_typing);

        let typists = self.typists.entry(chat_id.clone()).or_default();
        if is_typing {
            typists.insert(user_id.clone());
        } else {
            typists.remove(user_id);
        }
        is_typing
    }

    pub fn indicator(&self, chat_id: &ChatId) -> bool {
        self.indicators.get(chat_id).copied().unwrap_or(false)
    }

    /// Everyone currently typing in the chat, by sender.
    pub fn typists(&self, chat_id: &ChatId) -> Vec<UserId> {
        self.typists
            .get(chat_id)
            .map(|typists| typists.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forgets all indicators; returns the pending local stop, if any.
    pub fn reset(&mut self) -> Option<TypingSignal> {
        self.indicators.clear();
        self.typists.clear();
        self.take_stop()
    }

    /// Disarms the local stop timer without touching remote indicators.
    /// Returns the stop that would have been sent.
    pub fn cancel_local(&mut self) -> Option<TypingSignal> {
        self.take_stop()
    }

    fn take_stop(&mut self) -> Option<TypingSignal> {
        self.pending
            .take()
            .map(|pending| TypingSignal::new(pending.chat_id, pending.user_id, false))
    }
}
