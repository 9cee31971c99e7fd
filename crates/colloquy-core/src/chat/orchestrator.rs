//! ChatOrchestrator -- runs one conversational turn.
//!
//! A turn moves through [`TurnPhase`]s: resolve (or create) the session,
//! append the user message, optionally augment the system prompt with web
//! search results, invoke the model (streamed or not), and append exactly one
//! assistant message on success.
//!
//! The user message is persisted before the model is called, so a failed
//! model call leaves it in place with no assistant reply.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use colloquy_types::chat::{CHAT_SESSION_TYPE, TurnPhase, TurnRecord, TurnRequest};
use colloquy_types::config::ChatConfig;
use colloquy_types::error::ChatError;
use colloquy_types::llm::{ChatRequest, LlmError, StreamEvent, Usage};
use colloquy_types::message::Message;
use colloquy_types::session::{NewSession, Session};

use crate::llm::registry::ModelRegistry;
use crate::search::BoxWebSearch;
use crate::session::manager::SessionManager;

/// Heading placed between the system prompt and injected search results.
pub const WEB_SEARCH_PROMPT_PREFIX: &str =
    "The following reference information was retrieved from the web. Use it to answer the user's question:";

const TURN_CHANNEL_CAPACITY: usize = 64;

/// Executes chat turns against the session manager and model registry.
///
/// Cheap to clone; clones share the manager, registry and search capability.
#[derive(Clone)]
pub struct ChatOrchestrator {
    sessions: Arc<SessionManager>,
    models: Arc<ModelRegistry>,
    search: Option<BoxWebSearch>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(sessions: Arc<SessionManager>, models: Arc<ModelRegistry>, config: ChatConfig) -> Self {
        Self {
            sessions,
            models,
            search: None,
            config,
        }
    }

    /// Enable web search augmentation for turns that request it.
    pub fn with_search(mut self, search: BoxWebSearch) -> Self {
        self.search = Some(search);
        self
    }

    /// Run one turn, yielding records as they are produced.
    ///
    /// Non-streaming turns yield one record with the full reply. Streaming
    /// turns yield an empty opening record, one record per text increment,
    /// and an empty closing record carrying the token count.
    pub fn stream_turn(
        &self,
        request: TurnRequest,
    ) -> impl Stream<Item = Result<TurnRecord, ChatError>> + Send + 'static {
        let this = self.clone();
        async_stream::try_stream! {
            if request.user_question.trim().is_empty() {
                Err::<(), _>(ChatError::EmptyQuestion)?;
            }

            let provider = request
                .model_provider
                .clone()
                .unwrap_or_else(|| this.config.default_provider.clone());
            let model_name = request
                .model_name
                .clone()
                .unwrap_or_else(|| this.config.default_model.clone());

            let session = this.resolve_session(&request, &provider, &model_name).await?;
            let session_id = session.session_id.clone();
            let history = session.history_for_context();

            if !this
                .sessions
                .add_message(&session_id, Message::user(request.user_question.clone()))
                .await?
            {
                Err::<(), _>(ChatError::SessionVanished(session_id.clone()))?;
            }

            enter(&session_id, TurnPhase::AugmentPrompt);
            let system_prompt = this
                .build_system_prompt(&session_id, &request)
                .await;

            enter(&session_id, TurnPhase::InvokeModel);
            let model = this.models.resolve(&provider, &model_name).ok_or_else(|| {
                ChatError::ModelUnavailable {
                    provider: provider.clone(),
                    model: model_name.clone(),
                }
            })?;

            let chat_request = ChatRequest {
                model: model_name.clone(),
                system_prompt,
                user_prompt: String::new(),
                user_question: request.user_question.clone(),
                history,
                max_tokens: this.config.max_tokens,
                temperature: Some(this.config.temperature),
            };

            if request.stream {
                yield TurnRecord::chunk(session_id.clone(), "");

                let mut events = model.stream(chat_request.clone());
                let mut content = String::new();
                let mut usage: Option<Usage> = None;
                while let Some(event) = events.next().await {
                    match event.map_err(ChatError::from)? {
                        StreamEvent::TextDelta { text } => {
                            if text.is_empty() {
                                continue;
                            }
                            content.push_str(&text);
                            yield TurnRecord::chunk(session_id.clone(), text);
                        }
                        StreamEvent::Usage(u) => usage = Some(u),
                        StreamEvent::Done => break,
                    }
                }

                let token_count = token_count(usage, &chat_request, &content);
                this.persist_reply(&session_id, content).await?;
                yield TurnRecord::finished(session_id.clone(), "", token_count);
            } else {
                let response = model
                    .complete(&chat_request)
                    .await
                    .map_err(ChatError::from)?;
                let token_count = token_count(Some(response.usage), &chat_request, &response.content);
                this.persist_reply(&session_id, response.content.clone()).await?;
                yield TurnRecord::finished(session_id.clone(), response.content, token_count);
            }

            enter(&session_id, TurnPhase::Done);
        }
    }

    /// Run a non-streaming turn and return its single record.
    pub async fn chat(&self, mut request: TurnRequest) -> Result<TurnRecord, ChatError> {
        request.stream = false;
        let mut records = std::pin::pin!(self.stream_turn(request));
        let mut last = None;
        while let Some(record) = records.next().await {
            last = Some(record?);
        }
        last.ok_or_else(|| ChatError::Llm(LlmError::Stream("turn produced no reply".to_string())))
    }

    /// Run a turn on a background task that feeds an ordered channel.
    ///
    /// Cancelling the handle or dropping it stops forwarding and closes the
    /// channel. A partially streamed reply is not persisted in that case.
    pub fn spawn_turn(&self, request: TurnRequest) -> TurnHandle {
        let (tx, rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let records = self.stream_turn(request);

        tokio::spawn(async move {
            let mut records = std::pin::pin!(records);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("turn cancelled");
                        break;
                    }
                    next = records.next() => match next {
                        Some(item) => {
                            if tx.send(item).await.is_err() {
                                debug!("turn receiver dropped");
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        TurnHandle {
            receiver: rx,
            cancel,
        }
    }

    /// Reuse the requested session or create a new one, and record the model
    /// selection on it.
    async fn resolve_session(
        &self,
        request: &TurnRequest,
        provider: &str,
        model_name: &str,
    ) -> Result<Session, ChatError> {
        let llm_name = format!("{provider}-{model_name}");
        let description: String = request
            .user_question
            .chars()
            .take(self.config.description_max_chars)
            .collect();

        if let Some(session_id) = request.session_id.as_deref() {
            enter(session_id, TurnPhase::ResolveSession);
            let name = llm_name.clone();
            let seed = description.clone();
            let updated = self
                .sessions
                .update(session_id, move |s| {
                    s.set_llm_name(name);
                    if !s.has_description() {
                        s.set_description(seed);
                    }
                })
                .await?;
            if let Some(session) = updated {
                return Ok(session);
            }
            warn!(session_id = %session_id, "requested session not found, starting a new one");
        }

        let session_id = self
            .sessions
            .create(NewSession {
                session_type: CHAT_SESSION_TYPE.to_string(),
                user_id: request.user_id.clone(),
                description: Some(description),
                metadata: request.metadata.clone().unwrap_or_default(),
                llm_name: Some(llm_name),
            })
            .await?;
        enter(&session_id, TurnPhase::ResolveSession);

        self.sessions
            .get(&session_id)
            .await?
            .ok_or(ChatError::SessionVanished(session_id))
    }

    async fn build_system_prompt(&self, session_id: &str, request: &TurnRequest) -> String {
        let mut prompt = self.config.system_prompt.clone();
        if !request.enable_web_search {
            return prompt;
        }

        let Some(search) = &self.search else {
            warn!(session_id = %session_id, "web search requested but no search capability is configured");
            return prompt;
        };

        match search.retrieve_chunks(&request.user_question).await {
            Ok(results) => match results.render() {
                Some(context) => {
                    debug!(
                        session_id = %session_id,
                        chunks = results.chunks.len(),
                        "injecting web search results"
                    );
                    prompt.push_str("\n\n");
                    prompt.push_str(WEB_SEARCH_PROMPT_PREFIX);
                    prompt.push_str("\n\n");
                    prompt.push_str(&context);
                }
                None => debug!(session_id = %session_id, "web search returned no usable content"),
            },
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "web search failed, continuing without it");
            }
        }
        prompt
    }

    async fn persist_reply(&self, session_id: &str, content: String) -> Result<(), ChatError> {
        enter(session_id, TurnPhase::PersistTurn);
        if !self
            .sessions
            .add_message(session_id, Message::assistant(content))
            .await?
        {
            return Err(ChatError::SessionVanished(session_id.to_string()));
        }
        info!(session_id = %session_id, "turn completed");
        Ok(())
    }
}

fn enter(session_id: &str, phase: TurnPhase) {
    debug!(session_id = %session_id, phase = %phase, "turn phase");
}

/// Provider-reported usage when present, otherwise a character estimate.
fn token_count(usage: Option<Usage>, request: &ChatRequest, reply: &str) -> u32 {
    match usage {
        Some(u) if u.total() > 0 => u.total(),
        _ => request.estimate_input_tokens() + estimate_tokens(reply),
    }
}

/// Rough token estimate (~4 characters per token).
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as f64 / 4.0).ceil() as u32
}

/// Handle to a turn running on a background task.
pub struct TurnHandle {
    receiver: mpsc::Receiver<Result<TurnRecord, ChatError>>,
    cancel: CancellationToken,
}

impl TurnHandle {
    /// Next record, or `None` once the turn has finished or was cancelled.
    pub async fn recv(&mut self) -> Option<Result<TurnRecord, ChatError>> {
        self.receiver.recv().await
    }

    /// Stop forwarding records. The channel closes shortly after.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
