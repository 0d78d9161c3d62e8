//! The submission coordinator: one "send" operation end to end.
//!
//! Pipeline: attachment upload → optimistic insert → stream consumption →
//! reconciliation. Exactly one submission may be in flight per conversation;
//! failures are converted into ledger flags and toast events at this
//! boundary and never propagate further.

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use meera_net::NetError;
use meera_shared::constants::TIMESTAMP_NUDGE_MS;
use meera_shared::models::{Attachment, Message};
use meera_shared::protocol::{ChatRequest, ChatTurn, FileMeta};
use meera_shared::types::{AttachmentKind, ConversationId, MessageId, Role};
use meera_store::{object_path, StoreError};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::{ToastKind, UiEvent};

/// Handle to a locally created preview resource (the object-URL analogue).
/// The release callback runs exactly once: on explicit release, on
/// supersession by the uploaded URL, or on drop.
pub struct PreviewHandle {
    url: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl PreviewHandle {
    pub fn new(url: String, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            url,
            release: Some(Box::new(release)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("url", &self.url).finish()
    }
}

/// A locally staged attachment: bytes waiting for upload, plus the preview
/// shown while the upload is pending.
#[derive(Debug)]
pub struct StagedAttachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    preview: Option<PreviewHandle>,
}

impl StagedAttachment {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
            preview: None,
        }
    }

    pub fn with_preview(mut self, preview: PreviewHandle) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Release the preview once a durable URL supersedes it.
    pub fn release_preview(&mut self) {
        self.preview = None;
    }
}

/// How a send request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply streamed and reconciliation ran.
    Sent,
    /// Another submission was in flight; nothing happened.
    Busy,
    /// Rejected before any optimistic state was shown.
    Rejected,
    /// Optimistic entries are marked failed and retryable in place.
    Failed,
}

impl Engine {
    /// Submit a message with optional attachments.
    pub async fn send_message(
        &self,
        text: &str,
        attachments: Vec<StagedAttachment>,
    ) -> SendOutcome {
        let text = text.trim().to_string();
        if text.is_empty() && attachments.is_empty() {
            debug!("nothing to send");
            return SendOutcome::Rejected;
        }

        if !self.begin_submission() {
            debug!("submission already in flight, ignoring send");
            return SendOutcome::Busy;
        }

        let outcome = match self.upload_attachments(attachments).await {
            Ok(uploaded) => self.run_submission(text, uploaded, 1, None).await,
            // All-or-nothing: nothing optimistic was shown, a toast already
            // went out.
            Err(_) => SendOutcome::Rejected,
        };

        self.end_submission();
        outcome
    }

    /// Re-submit a failed message in place: same identifier, same content
    /// and attachments, incremented try counter.
    pub async fn retry_message(&self, failed_id: &MessageId) -> SendOutcome {
        let (content, attachments, try_number) = {
            let ledger = self.ledger();
            match ledger.get(failed_id) {
                Some(m) if m.failed && m.role == Role::User => {
                    (m.content.clone(), m.attachments.clone(), m.try_number + 1)
                }
                _ => {
                    debug!(message_id = %failed_id, "retry target is not a failed user message");
                    return SendOutcome::Rejected;
                }
            }
        };

        if !self.begin_submission() {
            debug!("submission already in flight, ignoring retry");
            return SendOutcome::Busy;
        }

        let outcome = self
            .run_submission(content, attachments, try_number, Some(failed_id.clone()))
            .await;
        self.end_submission();
        outcome
    }

    /// Take the single-flight guard. Returns false when a submission is
    /// already active.
    fn begin_submission(&self) -> bool {
        let mut state = self.state();
        if state.is_sending {
            return false;
        }
        state.is_sending = true;
        state.stream_accumulator.clear();
        true
    }

    /// The `finally` phase: the guard flags reset on every exit path so the
    /// single-flight policy can never deadlock the UI.
    fn end_submission(&self) {
        let was_typing = {
            let mut state = self.state();
            let was_typing = state.is_assistant_typing;
            state.is_sending = false;
            state.is_assistant_typing = false;
            state.stream_abort = None;
            was_typing
        };
        if was_typing {
            self.emit(UiEvent::AssistantTyping { active: false });
        }
    }

    /// Upload every staged attachment, all-or-nothing.
    async fn upload_attachments(
        &self,
        staged: Vec<StagedAttachment>,
    ) -> Result<Vec<Attachment>, EngineError> {
        let mut uploaded = Vec::with_capacity(staged.len());
        for mut file in staged {
            let bytes = std::mem::take(&mut file.bytes);
            let size = bytes.len() as u64;
            let path = object_path(&file.name, Utc::now().timestamp_millis());

            match self.blobs.upload(&path, bytes, &file.mime).await {
                Ok(stored) => {
                    let url = self.blobs.public_url(&stored);
                    file.release_preview();
                    uploaded.push(Attachment {
                        name: file.name.clone(),
                        kind: AttachmentKind::from_mime(&file.mime),
                        mime: file.mime.clone(),
                        size,
                        storage_path: stored,
                        url,
                    });
                }
                Err(e) => {
                    error!(file = %file.name, error = %e, "attachment upload failed");
                    let kind = if matches!(e, StoreError::SessionExpired) {
                        ToastKind::SessionExpired
                    } else {
                        ToastKind::Error
                    };
                    self.emit(UiEvent::Toast {
                        kind,
                        text: format!("Could not upload {}", file.name),
                    });
                    return Err(EngineError::Upload(e.to_string()));
                }
            }
        }
        Ok(uploaded)
    }

    async fn run_submission(
        &self,
        text: String,
        attachments: Vec<Attachment>,
        try_number: u32,
        reuse: Option<MessageId>,
    ) -> SendOutcome {
        let started_at = Utc::now();

        // Prior turns, captured before the new pair lands. A retried
        // message is the current message, not history.
        let turns: Vec<ChatTurn> = {
            let ledger = self.ledger();
            ledger
                .iter()
                .filter(|m| !m.failed && m.has_content())
                .filter(|m| reuse.as_ref() != Some(&m.id))
                .map(|m| ChatTurn {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect()
        };

        let (user_id, assistant_id) =
            self.stage_optimistic_pair(&text, &attachments, try_number, reuse, started_at);

        {
            let mut state = self.state();
            state.is_assistant_typing = true;
            state.input_draft.clear();
        }
        self.emit(UiEvent::MessageSent {
            user_message_id: user_id.clone(),
        });
        self.emit(UiEvent::AssistantTyping { active: true });

        let request = ChatRequest {
            conversation_id: self.conversation_id.clone(),
            messages: turns,
            message: build_payload(&text, &attachments),
            files: attachments
                .iter()
                .map(|a| FileMeta {
                    name: a.name.clone(),
                    mime: a.mime.clone(),
                    size: a.size,
                    url: a.url.clone(),
                })
                .collect(),
            stream: self.config.streaming,
        };

        match self.consume_reply(request, &assistant_id).await {
            Ok(()) => {
                if let Err(e) = self
                    .reconcile_after_stream(&user_id, &assistant_id, started_at)
                    .await
                {
                    // Non-fatal: the streamed content already on screen
                    // stays authoritative for display.
                    warn!(error = %e, "post-stream reconciliation failed");
                }
                info!(user_message = %user_id, try_number, "submission completed");
                SendOutcome::Sent
            }
            Err(e) => {
                let session_expired = matches!(e, EngineError::SessionExpired);
                let note = e.to_string();
                {
                    let mut ledger = self.ledger();
                    ledger.update(&user_id, |m| m.failed = true);
                    ledger.update(&assistant_id, |m| {
                        m.failed = true;
                        m.failure_note = Some(note.clone());
                    });
                }
                error!(user_message = %user_id, error = %note, "submission failed");
                self.emit(UiEvent::Toast {
                    kind: if session_expired {
                        ToastKind::SessionExpired
                    } else {
                        ToastKind::Error
                    },
                    text: if session_expired {
                        "Session expired, please sign in again".to_string()
                    } else {
                        "Message failed to send".to_string()
                    },
                });
                SendOutcome::Failed
            }
        }
    }

    /// Insert (or, on retry, reset) the optimistic user/assistant pair and
    /// register the pairing. Both entries land in one batch so the view
    /// never shows the user message alone.
    fn stage_optimistic_pair(
        &self,
        text: &str,
        attachments: &[Attachment],
        try_number: u32,
        reuse: Option<MessageId>,
        started_at: DateTime<Utc>,
    ) -> (MessageId, MessageId) {
        match reuse {
            Some(user_id) => {
                let assistant_id = self
                    .state()
                    .pending_assistant
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_else(|| {
                        MessageId::assistant_placeholder(started_at.timestamp_millis())
                    });

                {
                    let mut ledger = self.ledger();
                    ledger.update(&user_id, |m| {
                        m.failed = false;
                        m.failure_note = None;
                        m.try_number = try_number;
                    });
                    let reset = ledger.update(&assistant_id, |m| {
                        m.failed = false;
                        m.failure_note = None;
                        m.content.clear();
                        m.finish_reason = None;
                        m.try_number = try_number;
                    });
                    if !reset {
                        let ts = ledger.next_timestamp();
                        ledger.insert(assistant_placeholder(
                            assistant_id.clone(),
                            self.conversation_id.clone(),
                            ts,
                            try_number,
                        ));
                    }
                }

                self.state()
                    .pending_assistant
                    .insert(user_id.clone(), assistant_id.clone());
                (user_id, assistant_id)
            }
            None => {
                let millis = started_at.timestamp_millis();
                let user_id = MessageId::optimistic(millis);
                let assistant_id = MessageId::assistant_placeholder(millis);

                {
                    let mut ledger = self.ledger();
                    let user_ts = ledger.next_timestamp();
                    let assistant_ts = user_ts + Duration::milliseconds(TIMESTAMP_NUDGE_MS);
                    let user = Message {
                        id: user_id.clone(),
                        conversation_id: self.conversation_id.clone(),
                        role: Role::User,
                        content: text.to_string(),
                        created_at: user_ts,
                        attachments: attachments.to_vec(),
                        failed: false,
                        failure_note: None,
                        try_number,
                        finish_reason: None,
                        thoughts: None,
                    };
                    let assistant = assistant_placeholder(
                        assistant_id.clone(),
                        self.conversation_id.clone(),
                        assistant_ts,
                        try_number,
                    );
                    ledger.insert_pair(user, assistant);
                }

                self.state()
                    .pending_assistant
                    .insert(user_id.clone(), assistant_id.clone());
                (user_id, assistant_id)
            }
        }
    }

    /// Consume the reply, patching the assistant placeholder per delta and
    /// accumulating the full text for reconciliation.
    async fn consume_reply(
        &self,
        request: ChatRequest,
        assistant_id: &MessageId,
    ) -> Result<(), EngineError> {
        let (abort_tx, mut abort_rx) = watch::channel(false);
        self.state().stream_abort = Some(abort_tx);

        if !self.config.streaming {
            let reply = self.chat.complete(request).await?;
            self.ledger().patch_content(assistant_id, &reply.reply);
            self.state().stream_accumulator.push_str(&reply.reply);
            return Ok(());
        }

        let mut stream = self.chat.stream_reply(request).await?;
        loop {
            tokio::select! {
                changed = abort_rx.changed() => {
                    if changed.is_err() || *abort_rx.borrow() {
                        return Err(EngineError::Stream(NetError::Aborted));
                    }
                }
                item = stream.next() => match item {
                    Some(Ok(delta)) => {
                        self.ledger().patch_content(assistant_id, &delta);
                        self.state().stream_accumulator.push_str(&delta);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
        }
        Ok(())
    }
}

/// Upstream payload: the user's text, then a readable listing of the
/// attachments — the model endpoint is text-only, so this is how attachment
/// content becomes visible to it.
fn build_payload(text: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return text.to_string();
    }
    let mut payload = String::from(text);
    payload.push_str("\n\nAttached files:\n");
    for a in attachments {
        payload.push_str(&format!("- {} ({}, {} bytes): {}\n", a.name, a.mime, a.size, a.url));
    }
    payload
}

fn assistant_placeholder(
    id: MessageId,
    conversation_id: ConversationId,
    created_at: DateTime<Utc>,
    try_number: u32,
) -> Message {
    Message {
        id,
        conversation_id,
        role: Role::Assistant,
        content: String::new(),
        created_at,
        attachments: Vec::new(),
        failed: false,
        failure_note: None,
        try_number,
        finish_reason: None,
        thoughts: None,
    }
}
