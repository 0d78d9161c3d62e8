//! In-memory service fakes shared by the engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use meera_net::{ChatApi, DeltaStream, NetError};
use meera_shared::constants::HISTORY_PAGE_SIZE;
use meera_shared::models::{Message, StarRecord};
use meera_shared::protocol::{ChatReply, ChatRequest};
use meera_shared::types::{ConversationId, MessageId, Role};
use meera_store::{BlobApi, HistoryApi, StarApi, StoreError};

use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::events::UiEvent;
use crate::viewport::Viewport;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn row(id: &str, role: Role, content: &str, at: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::from(id),
        conversation_id: ConversationId::new(),
        role,
        content: content.to_string(),
        created_at: at,
        attachments: Vec::new(),
        failed: false,
        failure_note: None,
        try_number: 0,
        finish_reason: None,
        thoughts: None,
    }
}

/// A full transport page: enough rows that the loader keeps paging.
pub fn full_page(tag: &str, base: DateTime<Utc>) -> Vec<Message> {
    (0..HISTORY_PAGE_SIZE)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            row(
                &format!("{tag}-{i}"),
                role,
                &format!("{tag} message {i}"),
                base + chrono::Duration::seconds(i as i64),
            )
        })
        .collect()
}

pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Chat fake
// ---------------------------------------------------------------------------

enum ChatScript {
    Deltas(Vec<String>),
    Fail(String),
}

pub struct FakeChat {
    script: Mutex<ChatScript>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(ChatScript::Deltas(Vec::new())),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn script_deltas(&self, deltas: &[&str]) {
        *self.script.lock().unwrap() =
            ChatScript::Deltas(deltas.iter().map(|s| s.to_string()).collect());
    }

    pub fn script_failure(&self, message: &str) {
        *self.script.lock().unwrap() = ChatScript::Fail(message.to_string());
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn stream_reply(&self, request: ChatRequest) -> Result<DeltaStream, NetError> {
        self.requests.lock().unwrap().push(request);
        match &*self.script.lock().unwrap() {
            ChatScript::Deltas(deltas) => {
                let items: Vec<Result<String, NetError>> =
                    deltas.iter().cloned().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            ChatScript::Fail(message) => Err(NetError::Status {
                status: 500,
                body: message.clone(),
            }),
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, NetError> {
        self.requests.lock().unwrap().push(request);
        match &*self.script.lock().unwrap() {
            ChatScript::Deltas(deltas) => Ok(ChatReply {
                reply: deltas.concat(),
                images: Vec::new(),
            }),
            ChatScript::Fail(message) => Err(NetError::Status {
                status: 500,
                body: message.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// History fake
// ---------------------------------------------------------------------------

pub struct FakeHistory {
    pages: Mutex<HashMap<u32, Vec<Message>>>,
    context: Mutex<Vec<Message>>,
    page_calls: AtomicUsize,
    context_calls: AtomicUsize,
}

impl FakeHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            context: Mutex::new(Vec::new()),
            page_calls: AtomicUsize::new(0),
            context_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_page(&self, page: u32, rows: Vec<Message>) {
        self.pages.lock().unwrap().insert(page, rows);
    }

    pub fn set_context(&self, rows: Vec<Message>) {
        *self.context.lock().unwrap() = rows;
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryApi for FakeHistory {
    async fn fetch_page(&self, page: u32, _initial: bool) -> Result<Vec<Message>, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_context(&self, _message_id: &MessageId) -> Result<Vec<Message>, StoreError> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.context.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Star fake
// ---------------------------------------------------------------------------

pub struct FakeStars {
    fail: AtomicBool,
    rows: Mutex<Vec<StarRecord>>,
}

impl FakeStars {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            rows: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<StarRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Api("star write refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StarApi for FakeStars {
    async fn insert_star(&self, star: &StarRecord) -> Result<(), StoreError> {
        self.check()?;
        self.rows.lock().unwrap().push(star.clone());
        Ok(())
    }

    async fn delete_star(&self, message_id: &MessageId) -> Result<(), StoreError> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .retain(|s| &s.message_id != message_id);
        Ok(())
    }

    async fn list_stars(&self) -> Result<Vec<StarRecord>, StoreError> {
        Ok(self.rows.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Blob fake
// ---------------------------------------------------------------------------

pub struct FakeBlobs {
    fail: AtomicBool,
    uploads: Mutex<Vec<String>>,
}

impl FakeBlobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobApi for FakeBlobs {
    async fn upload(&self, path: &str, _bytes: Vec<u8>, _mime: &str) -> Result<String, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Upload("upload refused".to_string()));
        }
        self.uploads.lock().unwrap().push(path.to_string());
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.test/{path}")
    }
}

// ---------------------------------------------------------------------------
// Viewport fake
// ---------------------------------------------------------------------------

pub struct TestViewport {
    heights: Mutex<Vec<f64>>,
    scrolled: Mutex<Vec<f64>>,
}

impl TestViewport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            heights: Mutex::new(Vec::new()),
            scrolled: Mutex::new(Vec::new()),
        })
    }

    /// Queue the content heights the next measurements will report.
    pub fn push_heights(&self, heights: &[f64]) {
        self.heights.lock().unwrap().extend_from_slice(heights);
    }

    pub fn scrolled(&self) -> Vec<f64> {
        self.scrolled.lock().unwrap().clone()
    }
}

impl Viewport for TestViewport {
    fn content_height(&self) -> f64 {
        let mut heights = self.heights.lock().unwrap();
        if heights.is_empty() {
            0.0
        } else {
            heights.remove(0)
        }
    }

    fn scroll_by(&self, delta: f64) {
        self.scrolled.lock().unwrap().push(delta);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub engine: Arc<Engine>,
    pub events: mpsc::UnboundedReceiver<UiEvent>,
    pub chat: Arc<FakeChat>,
    pub history: Arc<FakeHistory>,
    pub stars: Arc<FakeStars>,
    pub blobs: Arc<FakeBlobs>,
    pub viewport: Arc<TestViewport>,
}

pub fn test_engine() -> TestHarness {
    let chat = FakeChat::new();
    let history = FakeHistory::new();
    let stars = FakeStars::new();
    let blobs = FakeBlobs::new();
    let viewport = TestViewport::new();

    let (engine, events) = Engine::new(
        ClientConfig::default(),
        chat.clone(),
        history.clone(),
        stars.clone(),
        blobs.clone(),
        viewport.clone(),
    );

    TestHarness {
        engine,
        events,
        chat,
        history,
        stars,
        blobs,
        viewport,
    }
}
