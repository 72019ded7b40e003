//! Event stream adapter.
//!
//! Wraps the loop's output as a consumer-facing server-sent-event stream:
//! every [`LoopEvent`] becomes one `data: <compact JSON>` frame and the
//! stream closes after `done`.
//!
//! Cancellation is drop-based: when the consumer disconnects, Axum drops
//! the body stream, which drops the loop generator, which drops the
//! provider stream and aborts the backend request.  An optional hook fires
//! when the stream is dropped before `done` was delivered, for caller-side
//! bookkeeping.

use std::convert::Infallible;
use std::pin::pin;

use async_stream::stream;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};

use strand_core::LoopEvent;

/// Callback invoked when the consumer cancels before the stream completed.
pub type CancelHook = Box<dyn FnOnce() + Send>;

/// Runs the hook on drop unless the stream reached its terminal event.
struct CancelGuard {
    hook: Option<CancelHook>,
}

impl CancelGuard {
    fn new(hook: Option<CancelHook>) -> Self {
        Self { hook }
    }

    fn disarm(&mut self) {
        self.hook = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

/// Encode one loop event as an SSE frame.
fn frame(event: &LoopEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => Event::default().data(
            serde_json::json!({
                "type": "error",
                "message": format!("event serialization failed: {e}"),
            })
            .to_string(),
        ),
    }
}

/// Convert a loop event stream into SSE frames.
///
/// The frame stream ends after the `done` event.  If the upstream ends
/// without one (a throw escaping the loop), a synthetic `error` frame and a
/// closing `done` frame are emitted instead.
pub fn event_frames<S>(
    events: S,
    on_cancel: Option<CancelHook>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send
where
    S: Stream<Item = LoopEvent> + Send + 'static,
{
    let mut guard = CancelGuard::new(on_cancel);

    stream! {
        let mut events = pin!(events);
        let mut closed_cleanly = false;

        while let Some(event) = events.next().await {
            let is_done = matches!(event, LoopEvent::Done);
            if is_done {
                // Disarm before yielding: once the terminal frame is handed
                // to the transport this is a completion, not a cancel.
                guard.disarm();
                closed_cleanly = true;
            }
            yield Ok(frame(&event));
            if is_done {
                break;
            }
        }

        if !closed_cleanly {
            guard.disarm();
            yield Ok(frame(&LoopEvent::Error {
                message: "event stream ended unexpectedly".into(),
            }));
            yield Ok(frame(&LoopEvent::Done));
        }
    }
}

/// Build the SSE response for a loop event stream.
pub fn sse_response<S>(
    events: S,
    on_cancel: Option<CancelHook>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    S: Stream<Item = LoopEvent> + Send + 'static,
{
    Sse::new(event_frames(events, on_cancel))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
