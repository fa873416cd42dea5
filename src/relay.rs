// src/relay.rs

//! Output relay: drains a launched unit's output into the log sink.
//!
//! Each stream gets its own Tokio task and preserves its own line order.
//! Lines from two streams of the same unit (stdout / stderr) are interleaved
//! in whatever order the tasks get scheduled; no cross-stream ordering is
//! promised.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::Result;
use crate::sink::{LogLevel, LogLine, LogSink};

/// Tracing target for mirrored unit output.
///
/// The sink layer skips this target because the relay writes the
/// structured line itself.
pub const UNIT_OUTPUT_TARGET: &str = "skillrun::unit";

/// How a followed log stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Closed { lines: usize },
    Interrupted { lines: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct OutputRelay {
    sink: Arc<LogSink>,
    unit: String,
}

impl OutputRelay {
    pub fn new(sink: Arc<LogSink>, unit: impl Into<String>) -> Self {
        Self {
            sink,
            unit: unit.into(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Record one line for this unit.
    pub fn emit(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();
        debug!(target: UNIT_OUTPUT_TARGET, unit = %self.unit, level = %level, "{}", text);
        self.sink.emit(LogLine::unit(level, &self.unit, text));
    }

    /// Drain `reader` on a background task; resolves to the number of lines
    /// relayed once the stream reaches EOF.
    pub fn spawn_reader<R>(&self, reader: R, level: LogLevel) -> JoinHandle<usize>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let relay = self.clone();
        tokio::spawn(async move { relay.drain_reader(reader, level).await })
    }

    /// Relay every newline-terminated line of `reader` at `level`.
    ///
    /// Invalid UTF-8 is replaced rather than dropped, and a trailing `\r`
    /// is stripped so CRLF output looks like LF output.
    pub async fn drain_reader<R>(&self, reader: R, level: LogLevel) -> usize
    where
        R: AsyncRead + Unpin,
    {
        let mut segments = BufReader::new(reader).split(b'\n');
        let mut count = 0;

        loop {
            match segments.next_segment().await {
                Ok(Some(bytes)) => {
                    let raw = String::from_utf8_lossy(&bytes);
                    let text = raw.strip_suffix('\r').unwrap_or(raw.as_ref());
                    self.emit(level, text);
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.emit(LogLevel::Error, format!("reading unit output failed: {e}"));
                    break;
                }
            }
        }

        debug!(unit = %self.unit, lines = count, "output stream drained");
        count
    }

    /// Drain a stream of text chunks (container logs) on a background task.
    pub fn spawn_stream<S>(&self, stream: S) -> JoinHandle<StreamEnd>
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let relay = self.clone();
        tokio::spawn(async move { relay.drain_stream(stream).await })
    }

    /// Relay every line of the stream at `Info`.
    ///
    /// Chunk boundaries are not line boundaries: a chunk may carry several
    /// lines or only part of one, so text is buffered until its newline
    /// arrives. Whatever is left when the stream ends is relayed as one last
    /// line. An error item ends the drain; it is reported back to the caller
    /// rather than raised.
    pub async fn drain_stream<S>(&self, stream: S) -> StreamEnd
    where
        S: Stream<Item = Result<String>>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut carry = String::new();
        let mut lines = 0;

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    carry.push_str(&chunk);
                    while let Some(pos) = carry.find('\n') {
                        let rest = carry.split_off(pos + 1);
                        let line = std::mem::replace(&mut carry, rest);
                        self.emit_stream_line(&line[..pos]);
                        lines += 1;
                    }
                }
                Err(e) => {
                    lines += self.flush_carry(&mut carry);
                    return StreamEnd::Interrupted {
                        lines,
                        reason: e.to_string(),
                    };
                }
            }
        }

        lines += self.flush_carry(&mut carry);
        StreamEnd::Closed { lines }
    }

    fn emit_stream_line(&self, line: &str) {
        self.emit(LogLevel::Info, line.strip_suffix('\r').unwrap_or(line));
    }

    fn flush_carry(&self, carry: &mut String) -> usize {
        if carry.is_empty() {
            return 0;
        }
        let line = std::mem::take(carry);
        self.emit_stream_line(&line);
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SkillrunError;
    use crate::sink::EXECUTION_COMPONENT;

    fn relay() -> (Arc<LogSink>, OutputRelay) {
        let sink = Arc::new(LogSink::in_memory(100));
        let relay = OutputRelay::new(Arc::clone(&sink), "daily-brief");
        (sink, relay)
    }

    #[tokio::test]
    async fn reader_lines_are_tagged_and_ordered() {
        let (sink, relay) = relay();
        let input: &[u8] = b"one\r\ntwo\nthree";

        let count = relay.drain_reader(input, LogLevel::Error).await;

        assert_eq!(count, 3);
        let lines = sink.recent(10);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(lines.iter().all(|l| l.level == LogLevel::Error));
        assert!(lines.iter().all(|l| l.component == EXECUTION_COMPONENT));
        assert!(lines.iter().all(|l| l.is_from_unit("daily-brief")));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_dropped() {
        let (sink, relay) = relay();
        let input: &[u8] = b"ok\n\xff\xfebad\n";

        assert_eq!(relay.drain_reader(input, LogLevel::Info).await, 2);
        assert!(sink.recent(10)[1].text.ends_with("bad"));
    }

    #[tokio::test]
    async fn stream_chunks_are_split_into_lines() {
        let (sink, relay) = relay();
        let chunks = futures::stream::iter(vec![
            Ok("a\nb\n".to_string()),
            Ok("c\n".to_string()),
        ]);

        let end = relay.drain_stream(chunks).await;

        assert_eq!(end, StreamEnd::Closed { lines: 3 });
        let texts: Vec<_> = sink.recent(10).into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_joined() {
        let (sink, relay) = relay();
        let chunks = futures::stream::iter(vec![
            Ok("topic 1 hel".to_string()),
            Ok("lo world\r\ntopic".to_string()),
            Ok(" 2\ntail without newline".to_string()),
        ]);

        let end = relay.drain_stream(chunks).await;

        assert_eq!(end, StreamEnd::Closed { lines: 3 });
        let texts: Vec<_> = sink.recent(10).into_iter().map(|l| l.text).collect();
        assert_eq!(
            texts,
            vec!["topic 1 hello world", "topic 2", "tail without newline"]
        );
    }

    #[tokio::test]
    async fn stream_error_ends_drain_without_panicking() {
        let (sink, relay) = relay();
        let chunks = futures::stream::iter(vec![
            Ok("first".to_string()),
            Err(SkillrunError::BackendUnavailable("gone".to_string())),
            Ok("never".to_string()),
        ]);

        let end = relay.spawn_stream(chunks).await.unwrap();

        match end {
            StreamEnd::Interrupted { lines, reason } => {
                assert_eq!(lines, 1);
                assert!(reason.contains("gone"));
            }
            other => panic!("unexpected end: {other:?}"),
        }
        assert_eq!(sink.recent(10).len(), 1);
    }
}
