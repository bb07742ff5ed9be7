use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::LlmError;
use crate::types::ChatCompletionChunk;
use crate::Result;

// ─── Server-sent events ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Bytes are buffered until a full line is available, so UTF-8 sequences and
/// `data:` lines split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(ev) = parse_line(&line) {
                events.push(ev);
            }
        }
        events
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&String::from_utf8_lossy(&rest))
    }
}

/// `data: {...}` becomes a delta, `data: [DONE]` ends the stream. Comments,
/// other fields and chunks with no text are skipped.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk.delta_text().map(|t| SseEvent::Delta(t.to_string())),
        Err(e) => {
            tracing::debug!(error = %e, line = data, "skipping unrecognised stream chunk");
            None
        }
    }
}

// ─── ChatStream ───────────────────────────────────────────────────────────

/// Text deltas of one streamed completion.
///
/// A background task owns the HTTP response and forwards decoded deltas over
/// an mpsc channel until `[DONE]` or end of body. Dropping the stream closes
/// the receiver, which stops the task on its next send.
pub struct ChatStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl ChatStream {
    pub(crate) fn spawn(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                };
                for event in decoder.push(&bytes) {
                    match event {
                        SseEvent::Done => return,
                        SseEvent::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            if let Some(SseEvent::Delta(text)) = decoder.finish() {
                let _ = tx.send(Ok(text)).await;
            }
        });

        ChatStream { rx }
    }

    /// Wrap a raw receiver; lets callers and tests feed pre-built deltas.
    pub fn from_channel(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx }
    }

    /// Drain the stream into one string, calling `on_delta` for each piece.
    pub async fn collect_text(mut self, mut on_delta: impl FnMut(&str)) -> Result<String> {
        let mut text = String::new();
        while let Some(delta) = self.next().await {
            let delta = delta?;
            on_delta(&delta);
            text.push_str(&delta);
        }
        Ok(text)
    }
}

impl Stream for ChatStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices":[{"delta":{"content":text}}]})
        )
    }

    #[test]
    fn decodes_deltas_and_done() {
        let mut d = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        assert_eq!(
            d.push(body.as_bytes()),
            vec![
                SseEvent::Delta("Hel".into()),
                SseEvent::Delta("lo".into()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn line_split_across_chunks() {
        let mut d = SseDecoder::new();
        let body = chunk(">>> WRITE a.txt\n");
        let (a, b) = body.as_bytes().split_at(12);
        assert!(d.push(a).is_empty());
        assert_eq!(d.push(b), vec![SseEvent::Delta(">>> WRITE a.txt\n".into())]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let mut d = SseDecoder::new();
        let body = chunk("héllo");
        let bytes = body.as_bytes();
        let cut = body.find('é').unwrap() + 1;
        assert!(d.push(&bytes[..cut]).is_empty());
        assert_eq!(d.push(&bytes[cut..]), vec![SseEvent::Delta("héllo".into())]);
    }

    #[test]
    fn comments_and_unknown_chunks_are_skipped() {
        assert_eq!(parse_line(": OPENROUTER PROCESSING"), None);
        assert_eq!(parse_line("event: ping"), None);
        assert_eq!(parse_line("data: not json"), None);
        assert_eq!(parse_line(r#"data: {"choices":[{"delta":{}}]}"#), None);
        assert_eq!(parse_line("data: [DONE]\r"), Some(SseEvent::Done));
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut d = SseDecoder::new();
        let body = chunk("tail");
        assert!(d.push(body.trim_end().as_bytes()).is_empty());
        assert_eq!(d.finish(), Some(SseEvent::Delta("tail".into())));
    }

    #[tokio::test]
    async fn collect_text_concatenates_deltas() {
        let (tx, rx) = mpsc::channel(8);
        for piece in ["a", "b", "c"] {
            tx.send(Ok(piece.to_string())).await.unwrap();
        }
        drop(tx);
        let mut seen = Vec::new();
        let text = ChatStream::from_channel(rx)
            .collect_text(|d| seen.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(text, "abc");
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn collect_text_stops_on_error() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok("a".to_string())).await.unwrap();
        tx.send(Err(LlmError::EmptyResponse)).await.unwrap();
        drop(tx);
        let err = ChatStream::from_channel(rx).collect_text(|_| {}).await;
        assert!(matches!(err, Err(LlmError::EmptyResponse)));
    }
}
