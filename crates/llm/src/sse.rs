//! Server-sent-event decoding for the chat completions stream.
//!
//! Decoding is line-oriented, following the SSE grammar directly: each
//! `data:` line contributes to the open event, a blank line closes it,
//! and every other field (`event:`, `id:`, `retry:`, comments) is
//! ignored. [`DeltaDecoder`] holds the partial-line and open-event
//! state between body chunks, so there is exactly one dispatch path
//! whether a payload arrives whole, split across chunks, or truncated
//! at end-of-body.

use futures_util::StreamExt;

use mf_domain::error::{Error, Result};
use mf_domain::llm::{BoxStream, StreamEvent};

/// Incremental SSE decoder around a payload parser.
///
/// The parser receives each complete `data:` payload and may produce
/// zero or more stream events (`FnMut`: tool-call assembly keeps state
/// across payloads). The decoder guarantees a `Done` event is always
/// the last thing out, minting one at [`DeltaDecoder::finish`] if the
/// endpoint never sent a terminal chunk.
pub(crate) struct DeltaDecoder<F> {
    parse: F,
    /// Trailing partial line of the previous chunk.
    pending_line: String,
    /// `data:` payload lines of the event currently being assembled.
    open_event: Vec<String>,
    saw_done: bool,
}

impl<F> DeltaDecoder<F>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>>,
{
    pub(crate) fn new(parse: F) -> Self {
        Self {
            parse,
            pending_line: String::new(),
            open_event: Vec::new(),
            saw_done: false,
        }
    }

    /// Decode one body chunk into the events it completes.
    pub(crate) fn feed(&mut self, chunk: &str) -> Vec<Result<StreamEvent>> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(newline) = rest.find('\n') {
            self.pending_line.push_str(&rest[..newline]);
            rest = &rest[newline + 1..];

            let line = std::mem::take(&mut self.pending_line);
            self.take_line(line.trim_end_matches('\r'), &mut events);
        }
        self.pending_line.push_str(rest);

        events
    }

    /// The body is closed: flush whatever is still buffered and make
    /// sure the stream ends on `Done`.
    pub(crate) fn finish(&mut self) -> Vec<Result<StreamEvent>> {
        let mut events = Vec::new();

        let line = std::mem::take(&mut self.pending_line);
        if !line.is_empty() {
            self.take_line(line.trim_end_matches('\r'), &mut events);
        }
        self.close_event(&mut events);

        if !self.saw_done {
            events.push(Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            }));
        }
        events
    }

    fn take_line(&mut self, line: &str, events: &mut Vec<Result<StreamEvent>>) {
        if line.is_empty() {
            self.close_event(events);
        } else if let Some(data) = line.strip_prefix("data:") {
            self.open_event
                .push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        // Any other field line is not ours to interpret.
    }

    fn close_event(&mut self, events: &mut Vec<Result<StreamEvent>>) {
        if self.open_event.is_empty() {
            return;
        }
        let payload = self.open_event.join("\n");
        self.open_event.clear();

        if payload.trim().is_empty() {
            return;
        }
        for event in (self.parse)(&payload) {
            if matches!(&event, Ok(StreamEvent::Done { .. })) {
                self.saw_done = true;
            }
            events.push(event);
        }
    }
}

/// Turn an SSE response body into a [`BoxStream`] of stream events.
pub(crate) fn event_stream<F>(
    response: reqwest::Response,
    parse: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = DeltaDecoder::new(parse);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.feed(&String::from_utf8_lossy(&bytes)) {
                        yield event;
                    }
                }
                Err(e) => {
                    yield Err(Error::Http(e.to_string()));
                    return;
                }
            }
        }

        for event in decoder.finish() {
            yield event;
        }
    })
}
