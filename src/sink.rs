//! Persistence seam: where extracted questions go.
//!
//! The run hands every [`QuestionRecord`] to a [`QuestionSink`] as soon as
//! its page is extracted, before the next page starts. [`JsonlSink`] syncs
//! each record to disk, so a crash mid-run loses at most the page in flight.

use crate::error::SinkError;
use crate::question::QuestionRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait QuestionSink: Send {
    /// Durably record one question. An error stops the run.
    async fn save(&mut self, record: &QuestionRecord) -> Result<(), SinkError>;
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: File,
    written: usize,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written through this handle.
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl QuestionSink for JsonlSink {
    async fn save(&mut self, record: &QuestionRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        self.written += 1;
        debug!("Saved record {} to {}", self.written, self.path.display());
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub records: Vec<QuestionRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionSink for MemorySink {
    async fn save(&mut self, record: &QuestionRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Load records written by [`JsonlSink`]. Blank lines are skipped.
pub async fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<QuestionRecord>, SinkError> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| SinkError::BadRecord {
                line: i + 1,
                detail: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkingScheme;
    use crate::question::ExtractedQuestion;

    fn record(statement: &str) -> QuestionRecord {
        let m = MarkingScheme::default();
        QuestionRecord {
            question: ExtractedQuestion {
                question_type: m.question_type.clone(),
                question_statement: statement.into(),
                options: None,
                correct_marks: m.correct_marks,
                incorrect_marks: m.incorrect_marks,
                skipped_marks: m.skipped_marks,
                partial_marks: m.partial_marks,
                time_minutes: m.time_minutes,
            },
            course_id: "c".into(),
            slot: None,
            part: None,
            year: 2020,
            categorized: false,
        }
    }

    #[tokio::test]
    async fn jsonl_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let mut sink = JsonlSink::open(&path).await.unwrap();
        sink.save(&record("one")).await.unwrap();
        sink.save(&record("two\nlines")).await.unwrap();
        assert_eq!(sink.written(), 2);
        drop(sink);

        let mut again = JsonlSink::open(&path).await.unwrap();
        again.save(&record("three")).await.unwrap();

        let back = read_jsonl(&path).await.unwrap();
        let statements: Vec<_> = back.iter().map(|r| r.question.question_statement.as_str()).collect();
        assert_eq!(statements, vec!["one", "two\nlines", "three"]);
    }

    #[tokio::test]
    async fn bad_line_is_reported_with_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let good = serde_json::to_string(&record("ok")).unwrap();
        tokio::fs::write(&path, format!("{good}\n\n{{not json\n")).await.unwrap();
        match read_jsonl(&path).await.unwrap_err() {
            SinkError::BadRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.save(&record("a")).await.unwrap();
        assert_eq!(sink.records.len(), 1);
    }
}
