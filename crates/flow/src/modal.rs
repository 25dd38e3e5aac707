use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::domain::ModalId;
use tokio::{sync::Mutex, time};
use tracing::debug;

/// Delay before a hidden modal is actually marked invisible, so the front
/// end's exit transition can finish first.
pub const DEFAULT_HIDE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, Default)]
struct ModalSlot {
    visible: bool,
    /// Bumped on every `show`; a pending delayed hide from before the bump
    /// must not clobber the re-shown modal.
    generation: u64,
}

/// Visibility tracking for the fixed modal registry.
///
/// Showing is immediate, hiding is delayed, and no mutual exclusion is
/// enforced here: callers hide before showing when they need exclusivity.
#[derive(Clone)]
pub struct ModalManager {
    slots: Arc<Mutex<HashMap<ModalId, ModalSlot>>>,
    hide_delay: Duration,
}

impl ModalManager {
    pub fn new() -> Self {
        Self::with_hide_delay(DEFAULT_HIDE_DELAY)
    }

    pub fn with_hide_delay(hide_delay: Duration) -> Self {
        let slots = ModalId::ALL
            .iter()
            .map(|id| (*id, ModalSlot::default()))
            .collect();
        Self {
            slots: Arc::new(Mutex::new(slots)),
            hide_delay,
        }
    }

    pub async fn show(&self, id: ModalId) {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(id).or_default();
        slot.visible = true;
        slot.generation += 1;
        debug!(modal = id.label(), "modal shown");
    }

    /// Marks the modal hidden only after the transition delay elapses;
    /// callers must not assume it is gone synchronously.
    pub async fn hide(&self, id: ModalId) {
        let generation = {
            let slots = self.slots.lock().await;
            match slots.get(&id) {
                Some(slot) if slot.visible => slot.generation,
                _ => return,
            }
        };
        let slots = Arc::clone(&self.slots);
        let delay = self.hide_delay;
        tokio::spawn(async move {
            time::sleep(delay).await;
            let mut slots = slots.lock().await;
            if let Some(slot) = slots.get_mut(&id) {
                if slot.generation == generation {
                    slot.visible = false;
                    debug!(modal = id.label(), "modal hidden");
                }
            }
        });
    }

    /// Same delayed policy, applied independently per registered modal.
    pub async fn hide_all(&self) {
        for id in ModalId::ALL {
            self.hide(id).await;
        }
    }

    pub async fn visible(&self, id: ModalId) -> bool {
        self.slots
            .lock()
            .await
            .get(&id)
            .map(|slot| slot.visible)
            .unwrap_or(false)
    }
}

impl Default for ModalManager {
    fn default() -> Self {
        Self::new()
    }
}
