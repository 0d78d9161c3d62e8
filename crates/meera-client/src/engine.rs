//! Engine wiring: owns the ledger, state, star set, and service adapters,
//! and runs the realtime fold task.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};

use meera_net::realtime::{spawn_realtime, RealtimeCommand, RealtimeConfig};
use meera_net::{ChatApi, ChatClient};
use meera_shared::protocol::RowChange;
use meera_shared::types::{ConversationId, UserId};
use meera_store::{BlobApi, BlobClient, HistoryApi, HistoryClient, Session, StarApi, StarClient};

use crate::config::ClientConfig;
use crate::events::{emit_event, UiEvent};
use crate::ledger::MessageLedger;
use crate::state::SessionState;
use crate::stars::StarSet;
use crate::viewport::{NullViewport, Viewport};

/// The conversational engine for one conversation.
///
/// Construct with [`Engine::connect`] against the hosted backend, or with
/// [`Engine::new`] and custom adapters (tests use in-memory fakes). The
/// returned receiver carries [`UiEvent`]s for the rendering layer.
pub struct Engine {
    pub(crate) config: ClientConfig,
    pub(crate) conversation_id: ConversationId,
    pub(crate) chat: Arc<dyn ChatApi>,
    pub(crate) history: Arc<dyn HistoryApi>,
    pub(crate) stars_api: Arc<dyn StarApi>,
    pub(crate) blobs: Arc<dyn BlobApi>,
    pub(crate) viewport: Arc<dyn Viewport>,
    pub(crate) events: mpsc::UnboundedSender<UiEvent>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) ledger: Mutex<MessageLedger>,
    pub(crate) star_set: Mutex<StarSet>,
    realtime_cmd: Mutex<Option<mpsc::Sender<RealtimeCommand>>>,
}

impl Engine {
    pub fn new(
        config: ClientConfig,
        chat: Arc<dyn ChatApi>,
        history: Arc<dyn HistoryApi>,
        stars_api: Arc<dyn StarApi>,
        blobs: Arc<dyn BlobApi>,
        viewport: Arc<dyn Viewport>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            config,
            conversation_id: ConversationId::new(),
            chat,
            history,
            stars_api,
            blobs,
            viewport,
            events,
            state: Mutex::new(SessionState::new()),
            ledger: Mutex::new(MessageLedger::new()),
            star_set: Mutex::new(StarSet::new()),
            realtime_cmd: Mutex::new(None),
        });
        (engine, events_rx)
    }

    /// Build an engine backed by the hosted services.
    pub fn connect(
        config: ClientConfig,
        session: Option<&Session>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<UiEvent>) {
        let token = session.map(|s| s.access_token.clone());
        let chat = Arc::new(ChatClient::new(
            config.chat_url.clone(),
            config.chat_api_key.clone(),
        ));
        let history = Arc::new(HistoryClient::new(config.api_base.clone(), token.clone()));
        let stars = Arc::new(StarClient::new(config.api_base.clone(), token.clone()));
        let blobs = Arc::new(BlobClient::new(
            config.api_base.clone(),
            config.storage_bucket.clone(),
            token,
        ));

        let (engine, events_rx) =
            Self::new(config, chat, history, stars, blobs, Arc::new(NullViewport));
        if let Some(session) = session {
            engine.state().session = Some(session.clone());
        }
        (engine, events_rx)
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Start the realtime listener for this user and fold its changes in.
    /// Calling again replaces the previous subscription.
    pub fn start_realtime(self: &Arc<Self>, user_id: UserId) {
        let access_token = self.state().session.as_ref().map(|s| s.access_token.clone());
        let (cmd_tx, mut change_rx) = spawn_realtime(RealtimeConfig {
            base_url: self.config.api_base.clone(),
            user_id,
            access_token,
        });

        if let Some(previous) = self
            .realtime_cmd
            .lock()
            .expect("realtime lock poisoned")
            .replace(cmd_tx)
        {
            let _ = previous.try_send(RealtimeCommand::Shutdown);
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(change) = change_rx.recv().await {
                engine.apply_row_change(change);
            }
            debug!("realtime fold task finished");
        });
    }

    /// Fold one realtime row change into the ledger / star set, using the
    /// same merge primitives the reconciler uses.
    pub fn apply_row_change(&self, change: RowChange) {
        match change {
            RowChange::MessageInserted(message) | RowChange::MessageUpdated(message) => {
                self.ledger().merge_authoritative(std::slice::from_ref(&message));
            }
            RowChange::StarInserted(star) | RowChange::StarUpdated(star) => {
                self.stars().upsert(star);
            }
            RowChange::StarDeleted { message_id } => {
                self.stars().remove(&message_id);
            }
        }
    }

    /// Ask the in-flight stream, if any, to stop.
    pub fn abort_stream(&self) {
        if let Some(abort) = &self.state().stream_abort {
            let _ = abort.send(true);
            info!("stream abort requested");
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("state lock poisoned")
    }

    pub(crate) fn ledger(&self) -> MutexGuard<'_, MessageLedger> {
        self.ledger.lock().expect("ledger lock poisoned")
    }

    pub(crate) fn stars(&self) -> MutexGuard<'_, StarSet> {
        self.star_set.lock().expect("star set lock poisoned")
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        emit_event(&self.events, event);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.realtime_cmd.lock() {
            if let Some(cmd) = guard.take() {
                let _ = cmd.try_send(RealtimeCommand::Shutdown);
            }
        }
    }
}
