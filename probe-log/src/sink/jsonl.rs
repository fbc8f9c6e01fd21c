//! JSON Lines transcript files.
//!
//! One line per event: the [`RecordHeader`] fields plus the event under
//! `event`. Several samples may share a file; [`read_jsonl`] returns events in
//! file order along with the lines it could not decode.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{EventRecord, RecordHeader, TranscriptSink};
use crate::error::{DecodeError, Result};
use crate::events::{Event, decode_event};

/// Sink appending records to a JSONL file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it (and its parent directory) if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), "opened transcript file");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptSink for JsonlSink {
    async fn write(&self, header: &RecordHeader, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(&EventRecord { header, event })?;
        line.push(b'\n');
        self.writer.lock().await.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// Decoded contents of a transcript file.
#[derive(Debug, Default)]
pub struct TranscriptFile {
    /// Successfully decoded records, in file order.
    pub events: Vec<(RecordHeader, Event)>,
    /// Lines that could not be decoded.
    pub errors: Vec<DecodeError>,
}

impl TranscriptFile {
    /// Events belonging to one sample.
    pub fn for_sample<'a>(&'a self, sample_uuid: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter(move |(header, _)| header.sample_uuid == sample_uuid)
            .map(|(_, event)| event)
    }
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(flatten)]
    header: RecordHeader,
    event: Value,
}

/// Read a JSONL transcript file.
///
/// A malformed line is recorded in [`TranscriptFile::errors`] with its line
/// number and skipped; the rest of the file is still decoded. Lazy event
/// fields stay raw until read.
pub async fn read_jsonl(path: impl AsRef<Path>) -> Result<TranscriptFile> {
    let contents = tokio::fs::read(path.as_ref()).await?;
    let mut file = TranscriptFile::default();

    for (position, line) in contents.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.trim_ascii().is_empty() {
            continue;
        }
        let decoded = std::str::from_utf8(line)
            .map_err(|e| DecodeError::record(position, None, format!("invalid UTF-8: {e}")))
            .and_then(|line| {
                serde_json::from_str::<RawRecord>(line)
                    .map_err(|e| DecodeError::record(position, None, e.to_string()))
            })
            .and_then(|raw| decode_event(raw.event, position).map(|event| (raw.header, event)));
        match decoded {
            Ok(record) => file.events.push(record),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "skipping undecodable event");
                file.errors.push(e);
            }
        }
    }

    Ok(file)
}
