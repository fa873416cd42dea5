// tests/log_sink.rs

mod common;
use crate::common::builders::{ConfigBuilder, SkillTree, file_sink};

use std::error::Error;

use skillrun::sink::{LogLevel, LogLine, LogSink};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn clear_empties_memory_and_leaves_file_bytes_unchanged() -> TestResult {
    let tree = SkillTree::new();
    let config = ConfigBuilder::new(&tree).build();
    let sink = file_sink(&config);

    for i in 0..20 {
        sink.emit(LogLine::unit(LogLevel::Info, "daily-brief", format!("line {i}")));
    }
    let before = std::fs::read(tree.log_file())?;

    sink.clear();

    assert_eq!(sink.memory_len(), 0);
    assert!(sink.recent(100).is_empty());
    assert_eq!(std::fs::read(tree.log_file())?, before);

    // Queries still answer from the durable file.
    let lines = sink.query(5);
    let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["line 15", "line 16", "line 17", "line 18", "line 19"]);
    Ok(())
}

#[test]
fn query_sees_lines_written_by_another_sink_on_the_same_file() -> TestResult {
    let tree = SkillTree::new();
    let config = ConfigBuilder::new(&tree).build();

    let writer = file_sink(&config);
    writer.emit(LogLine::host(LogLevel::Warn, "skillrun::exec::selector", "fallback"));
    writer.emit(LogLine::unit(LogLevel::Error, "daily-brief", "boom"));

    let reader = file_sink(&config);
    let lines = reader.query(10);

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].level, LogLevel::Warn);
    assert_eq!(lines[0].unit_name, None);
    assert!(lines[1].is_from_unit("daily-brief"));
    assert_eq!(reader.memory_len(), 0);
    Ok(())
}

#[test]
fn memory_keeps_only_the_newest_entries() {
    let tree = SkillTree::new();
    let config = ConfigBuilder::new(&tree).memory_capacity(3).build();
    let sink = LogSink::new(&config.log);

    for i in 0..10 {
        sink.emit(LogLine::unit(LogLevel::Info, "u", format!("{i}")));
    }

    let texts: Vec<_> = sink.recent(10).into_iter().map(|l| l.text).collect();
    assert_eq!(texts, vec!["7", "8", "9"]);
    // The durable file keeps everything.
    assert_eq!(sink.query(100).len(), 10);
}

#[test]
fn query_falls_back_to_memory_when_file_is_unreadable() -> TestResult {
    let tree = SkillTree::new();
    let config = ConfigBuilder::new(&tree).build();
    let sink = file_sink(&config);

    sink.emit(LogLine::unit(LogLevel::Info, "u", "kept in memory"));
    std::fs::remove_file(tree.log_file())?;

    let lines = sink.query(10);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text, "kept in memory");
    Ok(())
}
