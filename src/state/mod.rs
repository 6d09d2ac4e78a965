/// Per-room change fan-out.
pub mod notifier;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::{AppConfig, GameTimings},
    dao::room_store::RoomStore,
    error::ServiceError,
    quiz::QuizProvider,
};

pub use self::notifier::{ChangeEvent, ChangeKind, ChangeNotifier, Subscription, TableKind};

/// State handle shared by handlers and tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, change fan-out and collaborators.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    notifier: ChangeNotifier,
    quiz_provider: Arc<dyn QuizProvider>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, quiz_provider: Arc<dyn QuizProvider>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            notifier: ChangeNotifier::default(),
            quiz_provider,
            config,
            degraded: degraded_tx,
        })
    }

    /// Convenience constructor with a store already installed.
    pub async fn with_store(
        config: AppConfig,
        quiz_provider: Arc<dyn QuizProvider>,
        store: Arc<dyn RoomStore>,
    ) -> SharedState {
        let state = Self::new(config, quiz_provider);
        state.install_room_store(store).await;
        state
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`Self::room_store`] but fails with [`ServiceError::Degraded`] in degraded mode.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Per-room change fan-out.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Quiz source used at room creation.
    pub fn quiz_provider(&self) -> &Arc<dyn QuizProvider> {
        &self.quiz_provider
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Game timings of the loaded config.
    pub fn timings(&self) -> GameTimings {
        self.config.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::room_store::MemoryRoomStore, quiz::StaticQuizProvider};

    #[tokio::test]
    async fn degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default(), Arc::new(StaticQuizProvider::sample()));
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_room_store().await,
            Err(ServiceError::Degraded)
        ));

        state.install_room_store(Arc::new(MemoryRoomStore::new())).await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_room_store().await.is_ok());

        state.clear_room_store().await;
        assert!(state.is_degraded());
    }
}
