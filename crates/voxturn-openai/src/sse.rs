//! Minimal server-sent events decoder.
//!
//! Handles `event:` and `data:` fields, multi-line data, comments and CRLF
//! line endings. Other fields (`id:`, `retry:`) are ignored.

use bytes::BytesMut;
use futures_util::{Stream, StreamExt};

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
struct Pending {
    event: Option<String>,
    data: Vec<String>,
}

impl Pending {
    /// Apply one line. Returns an event when a blank line dispatches it.
    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            let pending = std::mem::take(self);
            return Some(SseEvent {
                event: pending.event,
                data: pending.data.join("\n"),
            });
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

struct State<S> {
    stream: S,
    buf: BytesMut,
    pending: Pending,
    done: bool,
}

/// Decode a byte stream into events. A read error is yielded once and ends
/// the stream; a final event without a trailing blank line is still
/// dispatched.
pub fn sse_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseEvent, String>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = State {
        stream: bytes,
        buf: BytesMut::new(),
        pending: Pending::default(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            while let Some(end) = st.buf.iter().position(|&b| b == b'\n') {
                let raw = st.buf.split_to(end + 1);
                let text = String::from_utf8_lossy(&raw[..end]);
                let line = text.strip_suffix('\r').unwrap_or(&text);
                if let Some(event) = st.pending.line(line) {
                    return Some((Ok(event), st));
                }
            }
            if st.done {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e.to_string()), st));
                }
                None => {
                    st.done = true;
                    // Terminate a trailing line and a trailing event.
                    if !st.buf.is_empty() {
                        st.buf.extend_from_slice(b"\n");
                    }
                    st.buf.extend_from_slice(b"\n");
                }
            }
        }
    })
}
