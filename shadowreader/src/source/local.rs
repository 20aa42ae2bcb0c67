//! Paging over a local text file.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::{Checkpoint, CheckpointState, ContentSource, Page};
use crate::cancellation::CancellationToken;
use crate::errors::ReaderError;
use crate::position::PositionRecord;

/// Characters between two recorded byte checkpoints.
const CHECKPOINT_STRIDE: usize = 4096;
const READ_CHUNK: usize = 8 * 1024;

fn is_char_start(byte: u8) -> bool {
    byte & 0xC0 != 0x80
}

/// Appends one counted character: its decoding, or a single U+FFFD when the
/// bytes are not valid UTF-8.
fn push_unit(out: &mut String, unit: &mut Vec<u8>) {
    if unit.is_empty() {
        return;
    }
    match std::str::from_utf8(unit) {
        Ok(text) => out.push_str(text),
        Err(_) => out.push(char::REPLACEMENT_CHARACTER),
    }
    unit.clear();
}

/// A text file read a page at a time by character offset.
///
/// Opening probes the file once, counting characters and recording the byte
/// offset of every `CHECKPOINT_STRIDE`-th character so each page read seeks
/// close to its start.
#[derive(Debug)]
pub struct LocalFileSource {
    path: PathBuf,
    file: Option<File>,
    consumed_offset: usize,
    total_chars: usize,
    checkpoints: Vec<u64>,
    token: Arc<CancellationToken>,
}

impl LocalFileSource {
    /// Opens a file and positions it at `consumed_offset` characters.
    ///
    /// Offsets past the end are clamped to the end.
    pub async fn open(
        path: impl AsRef<Path>,
        consumed_offset: usize,
        token: Arc<CancellationToken>,
    ) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        let (total_chars, checkpoints) = probe(&mut file).await?;

        debug!(path = %path.display(), total_chars, "Opened local book");

        Ok(Self {
            path,
            file: Some(file),
            consumed_offset: consumed_offset.min(total_chars),
            total_chars,
            checkpoints,
            token,
        })
    }

    /// The file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total characters in the file at open time.
    #[must_use]
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Reads up to `count` characters starting at character `start`.
    async fn read_chars(&mut self, start: usize, count: usize) -> Result<(String, usize), ReaderError> {
        let file = self.file.as_mut().ok_or(ReaderError::Released)?;
        if start >= self.total_chars || count == 0 {
            return Ok((String::new(), 0));
        }

        let checkpoint = start / CHECKPOINT_STRIDE;
        let mut skip = start - checkpoint * CHECKPOINT_STRIDE;
        file.seek(SeekFrom::Start(self.checkpoints[checkpoint])).await?;

        // Each counted unit is a lead byte plus the continuation bytes after
        // it, and decodes to exactly one char.
        let mut out = String::with_capacity(count);
        let mut unit = Vec::with_capacity(4);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut taken = 0;
        let mut taking = false;

        'read: loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                if is_char_start(byte) {
                    if skip > 0 {
                        skip -= 1;
                        continue;
                    }
                    push_unit(&mut out, &mut unit);
                    if taken == count {
                        break 'read;
                    }
                    taken += 1;
                    taking = true;
                }
                if taking {
                    unit.push(byte);
                }
            }
        }
        push_unit(&mut out, &mut unit);

        Ok((out, taken))
    }

    fn ensure_live(&self) -> Result<(), ReaderError> {
        if self.file.is_none() {
            return Err(ReaderError::Released);
        }
        self.token.check()
    }
}

/// Counts characters and records checkpoint byte offsets.
async fn probe(file: &mut File) -> Result<(usize, Vec<u64>), ReaderError> {
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut checkpoints = Vec::new();
    let mut chars = 0usize;
    let mut byte_pos = 0u64;

    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if is_char_start(byte) {
                if chars % CHECKPOINT_STRIDE == 0 {
                    checkpoints.push(byte_pos);
                }
                chars += 1;
            }
            byte_pos += 1;
        }
    }

    Ok((chars, checkpoints))
}

#[async_trait]
impl ContentSource for LocalFileSource {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn next_page(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_live()?;
        let (text, taken) = self.read_chars(self.consumed_offset, page_size).await?;
        self.consumed_offset += taken;
        Ok(Page::new(text))
    }

    async fn prev_page(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_live()?;
        // Step back over the page on screen and the one before it.
        let start = self.consumed_offset.saturating_sub(page_size.saturating_mul(2));
        let (text, taken) = self.read_chars(start, page_size).await?;
        self.consumed_offset = start + taken;
        Ok(Page::new(text))
    }

    fn percent_complete(&self) -> f64 {
        if self.total_chars == 0 {
            return 100.0;
        }
        (self.consumed_offset as f64 / self.total_chars as f64) * 100.0
    }

    fn snapshot(&self) -> PositionRecord {
        PositionRecord::local(self.consumed_offset)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint(CheckpointState::Local {
            consumed_offset: self.consumed_offset,
        })
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), ReaderError> {
        if self.file.is_none() {
            return Err(ReaderError::Released);
        }
        match checkpoint.0 {
            CheckpointState::Local { consumed_offset } => {
                self.consumed_offset = consumed_offset.min(self.total_chars);
                Ok(())
            }
            CheckpointState::Remote(_) => Err(ReaderError::unsupported_kind("remote")),
        }
    }

    fn release(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "Released local book");
        }
    }
}
