//! Chunked log reading.
//!
//! The log is read in fixed-size byte chunks and reassembled into lines.
//! Only the current chunk and the trailing partial line are held in memory,
//! so multi-gigabyte logs never need to fit in a single `String`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ParserConfig;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(
        "cannot read {}: {source}. The game may still have it open; copy the file somewhere else and try again",
        .path.display()
    )]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ran out of memory while reading the log")]
    ResourceExhausted(#[source] io::Error),
    #[error("IO error: {0}")]
    Io(#[source] io::Error),
    #[error("parse cancelled")]
    Cancelled,
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::OutOfMemory {
            Self::ResourceExhausted(err)
        } else {
            Self::Io(err)
        }
    }
}

/// A byte source of known size that can be read at arbitrary offsets.
pub trait ChunkSource {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Reads bytes starting at `offset` into `buf`, returning how many were read.
    ///
    /// Returning 0 before `size()` is reached ends the stream early.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ParseError>;
}

/// In-memory source, mostly for tests and embedding hosts.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl ChunkSource for SliceSource<'_> {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ParseError> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.bytes.len());
        let available = &self.bytes[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

/// A log file on disk.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let unreadable = |source| ParseError::Unreadable {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(unreadable)?;
        let size = file.metadata().map_err(unreadable)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    fn map_err(&self, err: io::Error) -> ParseError {
        if err.kind() == io::ErrorKind::OutOfMemory {
            ParseError::ResourceExhausted(err)
        } else {
            ParseError::Unreadable {
                path: self.path.clone(),
                source: err,
            }
        }
    }
}

impl ChunkSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ParseError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.map_err(e))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.map_err(e)),
            }
        }
        Ok(filled)
    }
}

/// Read progress reported after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_read: u64,
    pub total_bytes: u64,
}

impl Progress {
    /// Whole-number percentage, 100 for empty input.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.bytes_read.saturating_mul(100) / self.total_bytes;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

/// Reassembles lines that straddle chunk boundaries.
#[derive(Debug)]
pub struct LineAssembler {
    leftover: Vec<u8>,
    max_line_bytes: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl LineAssembler {
    pub const fn new(max_line_bytes: usize) -> Self {
        Self {
            leftover: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Emits every line completed by `chunk`; keeps the unfinished tail.
    ///
    /// Lines longer than the limit are dropped wherever the chunk
    /// boundaries fall.
    pub fn feed<F: FnMut(&str)>(&mut self, chunk: &[u8], on_line: &mut F) {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..pos];
            let len = self.leftover.len() + head.len();
            if self.discarding {
                self.discarding = false;
            } else if len > self.max_line_bytes {
                self.drop_oversized(len);
            } else if self.leftover.is_empty() {
                emit(head, on_line);
            } else {
                self.leftover.extend_from_slice(head);
                emit(&self.leftover, on_line);
                self.leftover.clear();
            }
            rest = &rest[pos + 1..];
        }

        if self.discarding {
            return;
        }
        let len = self.leftover.len() + rest.len();
        if len > self.max_line_bytes {
            self.drop_oversized(len);
            self.discarding = true;
        } else {
            self.leftover.extend_from_slice(rest);
        }
    }

    fn drop_oversized(&mut self, bytes: usize) {
        tracing::warn!(bytes, limit = self.max_line_bytes, "dropping oversized log line");
        self.leftover.clear();
    }

    /// Flushes a final line that had no trailing newline.
    pub fn finish<F: FnMut(&str)>(mut self, on_line: &mut F) {
        if !self.discarding && !self.leftover.is_empty() {
            let tail = std::mem::take(&mut self.leftover);
            emit(&tail, on_line);
        }
    }

    /// Bytes currently held for an unfinished line.
    pub fn pending(&self) -> usize {
        self.leftover.len()
    }
}

fn emit<F: FnMut(&str)>(bytes: &[u8], on_line: &mut F) {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    on_line(&String::from_utf8_lossy(bytes));
}

/// Drives a source chunk by chunk, handing non-noise lines to a callback.
struct ChunkDriver<'c, S> {
    source: S,
    config: &'c ParserConfig,
    assembler: Option<LineAssembler>,
    buf: Vec<u8>,
    offset: u64,
    size: u64,
}

impl<'c, S: ChunkSource> ChunkDriver<'c, S> {
    fn new(source: S, config: &'c ParserConfig) -> Self {
        let size = source.size();
        Self {
            source,
            config,
            assembler: Some(LineAssembler::new(config.max_line_bytes)),
            buf: Vec::new(),
            offset: 0,
            size,
        }
    }

    const fn progress(&self) -> Progress {
        Progress {
            bytes_read: self.offset,
            total_bytes: self.size,
        }
    }

    /// Processes one chunk. Returns `false` once the input is exhausted.
    fn step<F: FnMut(&str)>(&mut self, on_line: &mut F) -> Result<bool, ParseError> {
        let config = self.config;
        let mut filtered = |line: &str| {
            if !config.is_noise(line) {
                on_line(line);
            }
        };

        let Some(assembler) = self.assembler.as_mut() else {
            return Ok(false);
        };

        if self.offset < self.size {
            let remaining = self.size - self.offset;
            let want = usize::try_from(remaining)
                .unwrap_or(usize::MAX)
                .min(config.chunk_size.max(1));
            self.buf.resize(want, 0);
            let n = self.source.read_at(self.offset, &mut self.buf)?;
            if n > 0 {
                self.offset += n as u64;
                assembler.feed(&self.buf[..n], &mut filtered);
                tracing::trace!(
                    bytes_read = self.offset,
                    total = self.size,
                    pending = assembler.pending(),
                    "read chunk"
                );
                return Ok(true);
            }
            tracing::warn!(
                offset = self.offset,
                expected = self.size,
                "log ended before its reported size"
            );
        }

        if let Some(assembler) = self.assembler.take() {
            assembler.finish(&mut filtered);
        }
        Ok(false)
    }
}

/// Counters for one pass over a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Chunks read from the source.
    pub chunks: u64,
    /// Times control was handed back to the runtime.
    pub yields: u64,
}

/// Reads every line of `source`, dropping noise lines.
pub fn read_lines<S, F>(
    source: S,
    config: &ParserConfig,
    mut on_line: F,
) -> Result<ReadStats, ParseError>
where
    S: ChunkSource,
    F: FnMut(&str),
{
    let mut driver = ChunkDriver::new(source, config);
    let mut stats = ReadStats::default();
    while driver.step(&mut on_line)? {
        stats.chunks += 1;
    }
    Ok(stats)
}

/// Like [`read_lines`], but yields to the async runtime between chunks.
///
/// Yields happen at most once per `yield_interval_ms`; the token is checked
/// before the first chunk and at every yield point.
pub async fn read_lines_async<S, P, F>(
    source: S,
    config: &ParserConfig,
    cancel: &CancellationToken,
    mut on_progress: P,
    mut on_line: F,
) -> Result<ReadStats, ParseError>
where
    S: ChunkSource,
    P: FnMut(Progress),
    F: FnMut(&str),
{
    if cancel.is_cancelled() {
        return Err(ParseError::Cancelled);
    }

    let interval = Duration::from_millis(config.yield_interval_ms);
    let mut driver = ChunkDriver::new(source, config);
    let mut stats = ReadStats::default();
    let mut last_yield = Instant::now();

    while driver.step(&mut on_line)? {
        stats.chunks += 1;
        on_progress(driver.progress());
        if last_yield.elapsed() >= interval {
            tokio::task::yield_now().await;
            stats.yields += 1;
            last_yield = Instant::now();
            if cancel.is_cancelled() {
                return Err(ParseError::Cancelled);
            }
        }
    }
    on_progress(driver.progress());
    Ok(stats)
}
