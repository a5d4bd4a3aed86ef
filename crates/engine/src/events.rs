use shelf_cache::CacheRecord;
use shelf_models::{MangaKey, SourceId};
use tokio::sync::broadcast;
use tracing::trace;

/// Events emitted by a refresh pass, in order:
///
/// 1. [`CycleStart`](Self::CycleStart), exactly once.
/// 2. [`MangaUpdated`](Self::MangaUpdated), once per merged item, in
///    completion order.
/// 3. [`NewChapters`](Self::NewChapters), at most once.
/// 4. [`CycleComplete`](Self::CycleComplete), exactly once, even when every
///    fetch failed.
///
/// Delivery is fire-and-forget: a pass never waits for subscribers, and
/// subscribers that fall behind miss events.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    CycleStart { queued: usize },
    MangaUpdated { record: Box<CacheRecord>, source: SourceId },
    NewChapters(NewChaptersNotice),
    CycleComplete,
}

/// One consolidated notification per pass, rather than one per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChaptersNotice {
    /// Title of the primary item.
    pub title: String,
    /// The affected item the user has gone longest without reading.
    pub primary: MangaKey,
    /// How many other items also gained chapters.
    pub others: usize,
}
impl NewChaptersNotice {
    /// Total number of items with new chapters.
    pub fn affected(&self) -> usize {
        self.others + 1
    }
}

/// Sending half shared by everything that emits [`UpdateEvent`]s.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<UpdateEvent>,
}
impl EventBus {
    const CAPACITY: usize = 512;

    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: UpdateEvent) {
        // Only fails when nobody is listening.
        if self.sender.send(event).is_err() {
            trace!("no subscribers for update event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(UpdateEvent::CycleComplete);
        let mut receiver = bus.subscribe();
        bus.emit(UpdateEvent::CycleStart { queued: 3 });
        assert!(matches!(receiver.recv().await.unwrap(), UpdateEvent::CycleStart { queued: 3 }));
    }

    #[test]
    fn test_notice_counts_primary() {
        let notice = NewChaptersNotice {
            title: "Yotsuba&!".to_string(),
            primary: MangaKey::new("mangadex", "a"),
            others: 2,
        };
        assert_eq!(notice.affected(), 3);
    }
}
