//! Client for the hosted chat function.
//!
//! The endpoint answers either as a `text/event-stream` of `data:` frames or
//! as a single JSON object, depending on the request's streaming flag. Both
//! paths are exposed behind the [`ChatApi`] trait so the engine can be tested
//! against in-memory fakes.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use meera_shared::protocol::{ChatReply, ChatRequest};

use crate::decoder::ChunkDecoder;
use crate::error::{NetError, Result};

/// Stream of visible-text deltas produced by one chat invocation.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// POST the request with streaming enabled and decode the reply frames.
    async fn stream_reply(&self, request: ChatRequest) -> Result<DeltaStream>;

    /// POST the request and read a single JSON reply.
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply>;
}

#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let mut req = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NetError::Status { status, body });
        }
        Ok(response)
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: ChunkDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn stream_reply(&self, mut request: ChatRequest) -> Result<DeltaStream> {
        request.stream = true;
        let response = self.post(&request).await?;

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            decoder: ChunkDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(delta) = st.pending.pop_front() {
                    return Some((Ok(delta), st));
                }
                if st.finished {
                    return None;
                }
                match st.bytes.next().await {
                    Some(Ok(chunk)) => {
                        st.pending.extend(st.decoder.push(&chunk));
                        if st.decoder.is_done() {
                            st.finished = true;
                        }
                    }
                    Some(Err(e)) => {
                        st.finished = true;
                        return Some((Err(NetError::Http(e)), st));
                    }
                    None => {
                        st.decoder.finish();
                        st.finished = true;
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn complete(&self, mut request: ChatRequest) -> Result<ChatReply> {
        request.stream = false;
        let response = self.post(&request).await?;
        Ok(response.json::<ChatReply>().await?)
    }
}
