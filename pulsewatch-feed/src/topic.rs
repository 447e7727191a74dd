// Pulsewatch Feed - Event producers and topic log
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! File-backed partitioned topic log.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/<topic>/partition-<n>.log            one JSON envelope per line
//! <data_dir>/<topic>/partition-<n>.<group>.offset last committed offset
//! <data_dir>/<topic>/partitions                    partition count
//! ```
//!
//! Keyed records go to `partition_for(key)`, so one key always lands in one
//! partition and keeps its order. Unkeyed records are spread round-robin.

use crate::error::{FeedError, Result};
use crate::publisher::{Delivery, Publisher};
use pulsewatch::{partition_for, RawRecord, RecordSource, Shutdown, SourceError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub offset: u64,
    #[serde(default)]
    pub key: Option<String>,
    pub payload: String,
}

/// Directory holding a topic's partitions.
pub fn topic_dir(data_dir: &Path, topic: &str) -> PathBuf {
    data_dir.join(topic)
}

/// Log file of one partition.
pub fn partition_log_path(topic_dir: &Path, partition: u32) -> PathBuf {
    topic_dir.join(format!("partition-{}.log", partition))
}

/// File recording how many partitions a topic was created with.
pub fn partition_count_path(topic_dir: &Path) -> PathBuf {
    topic_dir.join("partitions")
}

/// Partition count recorded for `topic`, or `None` if no producer created it yet.
pub fn read_partition_count(data_dir: impl AsRef<Path>, topic: &str) -> Result<Option<u32>> {
    let path = partition_count_path(&topic_dir(data_dir.as_ref(), topic));
    match fs::read_to_string(&path) {
        Ok(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FeedError::CorruptLog {
                path: path.display().to_string(),
                line: 1,
                reason: format!("invalid partition count {:?}", text.trim()),
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Committed offset file of one partition for one consumer group.
pub fn offset_path(topic_dir: &Path, partition: u32, group: &str) -> PathBuf {
    topic_dir.join(format!("partition-{}.{}.offset", partition, group))
}

struct PartitionWriter {
    file: File,
    next_offset: u64,
}

impl PartitionWriter {
    fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        // Drop a torn trailing write so the next append starts on a new line.
        let complete = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        if complete < contents.len() {
            log::warn!(
                "Truncating {} torn bytes at end of {}",
                contents.len() - complete,
                path.display()
            );
            file.set_len(complete as u64)?;
        }

        let next_offset = match contents[..complete]
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .last()
        {
            Some(line) => {
                let envelope: Envelope = serde_json::from_slice(line).map_err(|e| {
                    FeedError::CorruptLog {
                        path: path.display().to_string(),
                        line: contents[..complete].iter().filter(|b| **b == b'\n').count(),
                        reason: e.to_string(),
                    }
                })?;
                envelope.offset + 1
            }
            None => 0,
        };

        Ok(Self { file, next_offset })
    }
}

/// Writer side of a topic.
pub struct TopicLog {
    dir: PathBuf,
    partitions: Vec<PartitionWriter>,
    round_robin: u32,
}

impl TopicLog {
    /// Open or create `topic` with `partitions` partitions.
    pub fn open(data_dir: impl AsRef<Path>, topic: &str, partitions: u32) -> Result<Self> {
        if partitions == 0 {
            return Err(FeedError::InvalidConfig(
                "a topic needs at least one partition".into(),
            ));
        }
        let dir = topic_dir(data_dir.as_ref(), topic);
        fs::create_dir_all(&dir)?;

        match read_partition_count(data_dir.as_ref(), topic)? {
            Some(existing) if existing != partitions => {
                return Err(FeedError::InvalidConfig(format!(
                    "topic {} has {} partitions, not {}",
                    topic, existing, partitions
                )));
            }
            Some(_) => {}
            None => fs::write(partition_count_path(&dir), format!("{}\n", partitions))?,
        }

        let partitions = (0..partitions)
            .map(|p| PartitionWriter::open(&partition_log_path(&dir, p)))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Opened topic {} with {} partitions",
            dir.display(),
            partitions.len()
        );
        Ok(Self {
            dir,
            partitions,
            round_robin: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    /// Offset the next record of `partition` will get.
    pub fn next_offset(&self, partition: u32) -> Option<u64> {
        self.partitions.get(partition as usize).map(|p| p.next_offset)
    }

    fn choose_partition(&mut self, key: Option<&str>) -> u32 {
        let count = self.partition_count();
        match key {
            Some(key) => partition_for(key, count),
            None => {
                let p = self.round_robin % count;
                self.round_robin = self.round_robin.wrapping_add(1);
                p
            }
        }
    }
}

impl Publisher for TopicLog {
    fn publish(&mut self, key: Option<&str>, payload: &[u8]) -> Result<Delivery> {
        let payload = String::from_utf8(payload.to_vec())?;
        let partition = self.choose_partition(key);
        let writer = &mut self.partitions[partition as usize];

        let envelope = Envelope {
            offset: writer.next_offset,
            key: key.map(str::to_string),
            payload,
        };
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        writer.file.write_all(&line)?;
        writer.next_offset += 1;

        Ok(Delivery {
            partition,
            offset: envelope.offset,
        })
    }

    fn flush(&mut self) -> Result<()> {
        for p in &mut self.partitions {
            p.file.flush()?;
            p.file.sync_data()?;
        }
        Ok(())
    }
}

/// Consumer side of one partition for one consumer group.
///
/// Resumes after the group's committed offset. In follow mode, waits for new
/// records at end of file until shutdown; otherwise end of file ends the stream.
pub struct TopicReader {
    log_path: PathBuf,
    offset_path: PathBuf,
    reader: BufReader<File>,
    line: String,
    /// Byte position just past the last complete line consumed.
    line_start: u64,
    next_offset: u64,
    committed: Option<u64>,
    follow: bool,
    poll_interval: Duration,
    shutdown: Shutdown,
}

impl TopicReader {
    pub fn open(
        data_dir: impl AsRef<Path>,
        topic: &str,
        partition: u32,
        group: &str,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let dir = topic_dir(data_dir.as_ref(), topic);
        fs::create_dir_all(&dir)?;
        let log_path = partition_log_path(&dir, partition);
        let offset_path = offset_path(&dir, partition, group);

        // A consumer may start before the producer created the log.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&log_path)?;

        let committed = read_committed(&offset_path)?;
        let next_offset = committed.map_or(0, |c| c + 1);

        log::info!(
            "Reading {} from offset {} (group {})",
            log_path.display(),
            next_offset,
            group
        );

        Ok(Self {
            log_path,
            offset_path,
            reader: BufReader::new(file),
            line: String::new(),
            line_start: 0,
            next_offset,
            committed,
            follow: false,
            poll_interval: Duration::from_millis(100),
            shutdown,
        })
    }

    /// Wait for new records at end of file instead of ending the stream.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn committed(&self) -> Option<u64> {
        self.committed
    }

    /// Forget a partial trailing line and rewind to its start, so the next
    /// read sees the line as the writer completes or replaces it.
    fn rewind_partial(&mut self) -> std::result::Result<(), SourceError> {
        self.line.clear();
        let len = self.reader.get_ref().metadata()?.len();
        if len < self.line_start {
            return Err(self.corrupt(format!(
                "log shrank to {} bytes below read position {}",
                len, self.line_start
            )));
        }
        self.reader.seek(SeekFrom::Start(self.line_start))?;
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Corrupt {
            offset: self.next_offset,
            reason: format!("{}: {}", self.log_path.display(), reason.into()),
        }
    }
}

impl RecordSource for TopicReader {
    fn next_record(&mut self) -> std::result::Result<Option<RawRecord>, SourceError> {
        loop {
            if self.shutdown.is_triggered() {
                return Ok(None);
            }

            let read = self.reader.read_line(&mut self.line)?;
            if read == 0 || !self.line.ends_with('\n') {
                // End of file, possibly mid-line while the writer catches up
                // or after a crash left a torn write that a restarted
                // writer will truncate.
                self.rewind_partial()?;
                if !self.follow {
                    return Ok(None);
                }
                std::thread::sleep(self.poll_interval);
                continue;
            }

            self.line_start += self.line.len() as u64;
            let line = std::mem::take(&mut self.line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let envelope: Envelope =
                serde_json::from_str(line).map_err(|e| self.corrupt(e.to_string()))?;
            if envelope.offset < self.next_offset {
                continue;
            }
            self.next_offset = envelope.offset + 1;

            return Ok(Some(RawRecord::new(
                envelope.offset,
                envelope.key,
                envelope.payload.into_bytes(),
            )));
        }
    }

    fn commit(&mut self, offset: u64) -> std::result::Result<(), SourceError> {
        let tmp = self.offset_path.with_extension("offset.tmp");
        let write = || -> std::io::Result<()> {
            fs::write(&tmp, format!("{}\n", offset))?;
            fs::rename(&tmp, &self.offset_path)
        };
        write().map_err(|e| SourceError::Commit {
            offset,
            reason: e.to_string(),
        })?;
        self.committed = Some(offset);
        Ok(())
    }
}

fn read_committed(path: &Path) -> Result<Option<u64>> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse().map(Some).map_err(|_| FeedError::CorruptLog {
                path: path.display().to_string(),
                line: 1,
                reason: format!("invalid offset {:?}", text),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
