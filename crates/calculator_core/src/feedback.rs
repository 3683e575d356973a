//! Single-slot, auto-expiring user notification.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::broadcast, task::JoinHandle};
use tracing::debug;

use crate::{lock_recover, CoreEvent};

pub const DEFAULT_FEEDBACK_TTL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub text: String,
    pub shown_at: DateTime<Utc>,
}

#[derive(Default)]
struct FeedbackSlot {
    message: Option<FeedbackMessage>,
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

impl FeedbackSlot {
    fn cancel_expiry(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

pub struct FeedbackChannel {
    ttl: Duration,
    slot: Arc<Mutex<FeedbackSlot>>,
    events: broadcast::Sender<CoreEvent>,
}

impl FeedbackChannel {
    pub fn new(ttl: Duration, events: broadcast::Sender<CoreEvent>) -> Self {
        Self {
            ttl,
            slot: Arc::new(Mutex::new(FeedbackSlot::default())),
            events,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Installs `text` as the visible message, superseding the previous one
    /// and restarting the expiry countdown.
    pub fn show(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut slot = lock_recover(&self.slot);
            slot.cancel_expiry();
            slot.generation += 1;
            slot.message = Some(FeedbackMessage {
                text: text.clone(),
                shown_at: Utc::now(),
            });
            slot.expiry = self.schedule_expiry(slot.generation);
        }
        debug!(text = %text, "feedback: message shown");
        let _ = self.events.send(CoreEvent::FeedbackChanged(Some(text)));
    }

    pub fn clear(&self) {
        let removed = {
            let mut slot = lock_recover(&self.slot);
            slot.cancel_expiry();
            slot.message.take().is_some()
        };
        if removed {
            let _ = self.events.send(CoreEvent::FeedbackChanged(None));
        }
    }

    pub fn current(&self) -> Option<FeedbackMessage> {
        lock_recover(&self.slot).message.clone()
    }

    pub fn text(&self) -> Option<String> {
        self.current().map(|message| message.text)
    }

    pub fn has_pending_expiry(&self) -> bool {
        lock_recover(&self.slot)
            .expiry
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops any pending expiry without touching the visible message.
    pub fn cancel_expiry(&self) {
        lock_recover(&self.slot).cancel_expiry();
    }

    fn schedule_expiry(&self, generation: u64) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            debug!("feedback: no async runtime, message will not expire");
            return None;
        };
        let ttl = self.ttl;
        let slot = Arc::clone(&self.slot);
        let events = self.events.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            expire(&slot, generation, &events);
        }))
    }
}

impl Drop for FeedbackChannel {
    fn drop(&mut self) {
        lock_recover(&self.slot).cancel_expiry();
    }
}

fn expire(slot: &Mutex<FeedbackSlot>, generation: u64, events: &broadcast::Sender<CoreEvent>) {
    let expired = {
        let mut slot = lock_recover(slot);
        if slot.generation != generation {
            return;
        }
        slot.expiry = None;
        slot.message.take().is_some()
    };
    if expired {
        debug!(generation, "feedback: message expired");
        let _ = events.send(CoreEvent::FeedbackChanged(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(ttl_ms: u64) -> (FeedbackChannel, broadcast::Receiver<CoreEvent>) {
        let (events, rx) = broadcast::channel(16);
        (FeedbackChannel::new(Duration::from_millis(ttl_ms), events), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn message_expires_after_ttl() {
        let (feedback, _rx) = channel(3000);
        feedback.show("Рост установлен: 180 см");
        assert!(feedback.has_pending_expiry());

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(feedback.text().as_deref(), Some("Рост установлен: 180 см"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(feedback.text(), None);
        assert!(!feedback.has_pending_expiry());
    }

    #[tokio::test(start_paused = true)]
    async fn new_message_restarts_the_countdown() {
        let (feedback, _rx) = channel(3000);
        feedback.show("first");
        tokio::time::sleep(Duration::from_millis(2000)).await;
        feedback.show("second");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(feedback.text().as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(feedback.text(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent_and_notifies_once() {
        let (feedback, mut rx) = channel(3000);
        feedback.show("hello");
        feedback.clear();
        feedback.clear();

        assert_eq!(feedback.text(), None);
        assert!(!feedback.has_pending_expiry());
        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::FeedbackChanged(Some(text))) if text == "hello"
        ));
        assert!(matches!(rx.try_recv(), Ok(CoreEvent::FeedbackChanged(None))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_expiry_leaves_message_in_place() {
        let (feedback, _rx) = channel(3000);
        feedback.show("persist");
        feedback.cancel_expiry();

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(feedback.text().as_deref(), Some("persist"));
    }

    #[test]
    fn without_runtime_message_has_no_expiry() {
        let (feedback, _rx) = channel(3000);
        feedback.show("no runtime");
        assert_eq!(feedback.text().as_deref(), Some("no runtime"));
        assert!(!feedback.has_pending_expiry());
    }
}
