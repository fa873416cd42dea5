// src/sink/file.rs

//! Durable, size-rotated, append-only log file.
//!
//! The active file is `<path>`; rotated generations are `<path>.1` (newest)
//! up to `<path>.<max_files - 1>` (oldest). Nothing here ever truncates a
//! file in place.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::line::LogLine;

#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_files: usize,
}

impl RotatingFile {
    /// Open (or create) the active file in append mode.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            file,
            written,
            max_bytes: max_bytes.max(1),
            max_files: max_files.max(1),
        })
    }

    /// Append one complete record. Rotates first if the record would push
    /// a non-empty active file past `max_bytes`.
    pub fn append(&mut self, record: &[u8]) -> io::Result<()> {
        let len = record.len() as u64;
        if self.max_files > 1 && self.written > 0 && self.written + len > self.max_bytes {
            self.rotate()?;
        }

        self.file.write_all(record)?;
        self.written += len;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let oldest = rotated_path(&self.path, self.max_files - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for idx in (1..self.max_files - 1).rev() {
            let from = rotated_path(&self.path, idx);
            if from.exists() {
                fs::rename(&from, rotated_path(&self.path, idx + 1))?;
            }
        }
        fs::rename(&self.path, rotated_path(&self.path, 1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `<path>.<index>`
pub fn rotated_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Read the newest `limit` records across the active and rotated files,
/// oldest first.
///
/// Fails with `NotFound` if the active file does not exist. Lines that do
/// not parse (e.g. a record half-written by another process) are skipped.
pub fn read_tail(path: &Path, max_files: usize, limit: usize) -> io::Result<Vec<LogLine>> {
    let active = fs::read_to_string(path)?;

    let mut generations: Vec<Vec<LogLine>> = vec![parse_records(&active)];
    let mut found = generations[0].len();

    for idx in 1..max_files.max(1) {
        if found >= limit {
            break;
        }
        let rotated = rotated_path(path, idx);
        match fs::read_to_string(&rotated) {
            Ok(contents) => {
                let records = parse_records(&contents);
                found += records.len();
                generations.push(records);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e),
        }
    }

    let all: Vec<LogLine> = generations.into_iter().rev().flatten().collect();
    let skip = all.len().saturating_sub(limit);
    Ok(all.into_iter().skip(skip).collect())
}

fn parse_records(contents: &str) -> Vec<LogLine> {
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}
