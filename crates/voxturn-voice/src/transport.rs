//! Chunk transport: newline-delimited JSON over one long-lived response.
//!
//! Each [`ChunkRecord`] is one JSON object on its own line. The encoder side
//! turns a record stream into body bytes; the decoder side reassembles lines
//! from arbitrarily split network reads.

use std::convert::Infallible;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tracing::warn;
use voxturn_core::ChunkRecord;

use crate::error::TransportError;

/// Media type of the transport body.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Serialize one record as a single line, newline included.
pub fn encode_record(record: &ChunkRecord) -> Bytes {
    match serde_json::to_vec(record) {
        Ok(mut line) => {
            line.push(b'\n');
            Bytes::from(line)
        }
        Err(e) => {
            // Records are plain data; this only fires on a serde bug.
            warn!(error = %e, "Failed to encode chunk record");
            Bytes::from_static(b"{\"type\":\"error\",\"message\":\"encoding failed\"}\n")
        }
    }
}

/// Body stream for a record stream. Ends when the records end.
pub fn encode_records<S>(records: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = ChunkRecord> + Send,
{
    records.map(|record| Ok(encode_record(&record)))
}

/// Incremental line decoder.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buf: BytesMut,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes as they arrive.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete record, if a full line is buffered. Blank lines are
    /// skipped.
    pub fn next_record(&mut self) -> Option<Result<ChunkRecord, TransportError>> {
        while let Some(end) = find_newline(&self.buf) {
            let line = self.buf.split_to(end + 1);
            if let Some(parsed) = parse_line(&line[..end]) {
                return Some(parsed);
            }
        }
        None
    }

    /// Decode a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<ChunkRecord, TransportError>> {
        let rest = self.buf.split();
        parse_line(&rest)
    }
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

fn parse_line(line: &[u8]) -> Option<Result<ChunkRecord, TransportError>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(line).map_err(|source| TransportError::Malformed {
            line: line.to_string(),
            source,
        }),
    )
}

struct DecodeState<S> {
    stream: S,
    decoder: RecordDecoder,
    done: bool,
}

/// Decode a byte stream (e.g. `reqwest::Response::bytes_stream`) into
/// records, in order. A read error ends the stream after being yielded.
pub fn decode_records<S, B, E>(bytes: S) -> impl Stream<Item = Result<ChunkRecord, TransportError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = DecodeState {
        stream: bytes,
        decoder: RecordDecoder::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(record) = st.decoder.next_record() {
                return Some((record, st));
            }
            if st.done {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(TransportError::Read(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    if let Some(record) = st.decoder.finish() {
                        return Some((record, st));
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use voxturn_core::AudioRef;

    use super::*;

    fn audio(index: u32, text: &str, value: Option<&str>) -> ChunkRecord {
        ChunkRecord::Audio {
            index: Some(index),
            text: text.into(),
            value: value.map(AudioRef::new),
        }
    }

    #[test]
    fn encoded_record_is_one_line() {
        let line = encode_record(&audio(0, "Hello there.\n\n", Some("http://a/1")));
        let text = std::str::from_utf8(&line).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1, "embedded newlines must be escaped");
    }

    #[tokio::test]
    async fn decodes_records_split_across_reads() {
        let records = vec![
            ChunkRecord::Transcription { value: "hi".into() },
            audio(0, "Hello there.\n\n", Some("http://a/1")),
            audio(1, "How are you?", None),
            ChunkRecord::Cancelled,
        ];
        let body: Vec<u8> = records.iter().flat_map(|r| encode_record(r).to_vec()).collect();

        // Feed the body in awkward 7-byte pieces.
        let pieces: Vec<Result<Vec<u8>, Infallible>> =
            body.chunks(7).map(|c| Ok(c.to_vec())).collect();
        let decoded: Vec<ChunkRecord> = decode_records(stream::iter(pieces))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(decoded, records);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_decoded() {
        let pieces: Vec<Result<&[u8], Infallible>> =
            vec![Ok(b"{\"type\":\"cancelled\"}".as_slice())];
        let decoded: Vec<_> = decode_records(stream::iter(pieces)).collect().await;
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap(), &ChunkRecord::Cancelled);
    }

    #[tokio::test]
    async fn read_error_ends_the_stream() {
        let pieces: Vec<Result<&[u8], &str>> = vec![
            Ok(b"{\"type\":\"transcription\",\"value\":\"x\"}\n".as_slice()),
            Err("connection reset"),
            Ok(b"{\"type\":\"cancelled\"}\n".as_slice()),
        ];
        let decoded: Vec<_> = decode_records(stream::iter(pieces)).collect().await;
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_ok());
        assert!(matches!(decoded[1], Err(TransportError::Read(_))));
    }

    #[test]
    fn malformed_line_is_reported_and_skipped() {
        let mut decoder = RecordDecoder::new();
        decoder.push(b"not json\n\n{\"type\":\"cancelled\"}\n");
        assert!(matches!(
            decoder.next_record(),
            Some(Err(TransportError::Malformed { .. }))
        ));
        assert_eq!(decoder.next_record().unwrap().unwrap(), ChunkRecord::Cancelled);
        assert!(decoder.next_record().is_none());
    }
}
