// src/sink/mod.rs

//! Process-wide structured log store.
//!
//! Every entry goes to two places under one lock:
//! - a bounded in-memory ring buffer (oldest evicted first)
//! - a durable, rotating, append-only JSON-lines file
//!
//! Queries read the durable file so entries written by another process
//! sharing the file are visible; when the file cannot be read the sink
//! answers from its own ring buffer. Clearing only ever touches memory.
//!
//! Nothing in this module logs through `tracing`: the `SinkLayer` forwards
//! tracing events into `emit`, so a tracing call made while holding the
//! lock would deadlock.

pub mod file;
pub mod line;
pub mod ring;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::LogConfig;

pub use file::RotatingFile;
pub use line::{EXECUTION_COMPONENT, LogLevel, LogLine};
pub use ring::RingBuffer;

#[derive(Debug)]
struct SinkState {
    ring: RingBuffer<LogLine>,
    file: Option<RotatingFile>,
}

#[derive(Debug)]
pub struct LogSink {
    state: Mutex<SinkState>,
    file_path: Option<PathBuf>,
    max_files: usize,
}

impl LogSink {
    /// Sink backed by the configured durable file.
    ///
    /// If the file cannot be opened the sink still works, memory-only.
    pub fn new(config: &LogConfig) -> Self {
        let path = config.file_path();
        let file = match RotatingFile::open(&path, config.max_file_bytes, config.max_files) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!(
                    "skillrun: cannot open log file {}: {e}; keeping logs in memory only",
                    path.display()
                );
                None
            }
        };

        Self {
            state: Mutex::new(SinkState {
                ring: RingBuffer::new(config.memory_capacity),
                file,
            }),
            file_path: Some(path),
            max_files: config.max_files.max(1),
        }
    }

    /// Sink without a durable file.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SinkState {
                ring: RingBuffer::new(capacity),
                file: None,
            }),
            file_path: None,
            max_files: 1,
        }
    }

    /// Append one entry. Safe to call from any thread.
    pub fn emit(&self, line: LogLine) {
        let mut state = self.lock();

        let mut write_failed = None;
        if let Some(file) = state.file.as_mut() {
            match serde_json::to_vec(&line) {
                Ok(mut record) => {
                    record.push(b'\n');
                    if let Err(e) = file.append(&record) {
                        write_failed = Some(e);
                    }
                }
                Err(e) => eprintln!("skillrun: dropping unserialisable log line: {e}"),
            }
        }
        if let Some(e) = write_failed {
            eprintln!("skillrun: log file write failed: {e}; continuing in memory only");
            state.file = None;
        }

        state.ring.push(line);
    }

    /// The newest `limit` entries, oldest first.
    pub fn query(&self, limit: usize) -> Vec<LogLine> {
        if limit == 0 {
            return Vec::new();
        }
        if let Some(path) = &self.file_path {
            if let Ok(lines) = file::read_tail(path, self.max_files, limit) {
                return lines;
            }
        }
        self.recent(limit)
    }

    /// The newest `limit` entries of this process's in-memory buffer.
    pub fn recent(&self, limit: usize) -> Vec<LogLine> {
        self.lock().ring.tail(limit)
    }

    /// Empty the in-memory buffer. The durable file is left untouched.
    pub fn clear(&self) {
        self.lock().ring.clear();
    }

    pub fn memory_len(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // Poisoned only if a writer panicked mid-line.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
