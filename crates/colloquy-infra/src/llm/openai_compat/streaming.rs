//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Emits `TextDelta` for every non-empty content fragment, `Usage` when the
//! final usage-only chunk arrives (requires `stream_options.include_usage`),
//! and `Done` once the server closes the stream.

use futures_util::{Stream, StreamExt};

use async_openai::error::OpenAIError;
use async_openai::types::chat::CreateChatCompletionStreamResponse;

use colloquy_core::llm::provider::ModelStream;
use colloquy_types::llm::{LlmError, StreamEvent, Usage};

/// Map an async-openai chunk stream to a stream of [`StreamEvent`]s.
pub fn map_openai_stream<S>(stream: S) -> ModelStream
where
    S: Stream<Item = Result<CreateChatCompletionStreamResponse, OpenAIError>> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut stream = Box::pin(stream);

        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta { text: text.clone() };
                }
            }

            if let Some(usage) = &chunk.usage {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }
        }

        yield StreamEvent::Done;
    })
}
