//! Seekable HTTP source for Symphonia.
//!
//! Reads the track URL in fixed-size blocks with `Range` requests so the decoder can seek
//! (and probe trailing metadata) without downloading the whole file.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use symphonia::core::io::MediaSource;

pub(crate) struct HttpRangeSource {
    url: String,
    block_size: usize,
    timeout: Duration,
    pos: u64,
    total: Option<u64>,
    block: Vec<u8>,
    block_start: u64,
    cancel: Arc<AtomicBool>,
}

struct RangeReply {
    body: Vec<u8>,
    /// Stream offset of `body[0]`.
    offset: u64,
    total: Option<u64>,
}

impl HttpRangeSource {
    pub(crate) fn new(
        url: impl Into<String>,
        block_size: usize,
        timeout: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            url: url.into(),
            block_size: block_size.max(1),
            timeout,
            pos: 0,
            total: None,
            block: Vec::new(),
            block_start: 0,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn block_end(&self) -> u64 {
        self.block_start.saturating_add(self.block.len() as u64)
    }

    fn fetch(&self, start: u64, end: u64) -> io::Result<RangeReply> {
        let range = format!("bytes={start}-{end}");
        let started = Instant::now();
        let resp = ureq::get(&self.url)
            .config()
            .timeout_per_call(Some(self.timeout))
            .build()
            .header("Range", &range)
            .call()
            .map_err(|e| io::Error::other(format!("range request {range} failed: {e}")))?;

        let status = resp.status();
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let content_range = header("Content-Range");
        let content_length = header("Content-Length").and_then(|v| v.parse::<u64>().ok());

        let mut body = Vec::new();
        let (_, reader) = resp.into_parts();
        reader
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| io::Error::other(format!("range body {range}: {e}")))?;

        let took = started.elapsed();
        if took > Duration::from_millis(250) {
            tracing::warn!(
                took_ms = took.as_millis() as u64,
                bytes = body.len(),
                range = %range,
                "slow range fetch"
            );
        }

        // A plain 200 ignored the range and sent the whole file from byte 0.
        let (offset, total) = match status {
            ureq::http::StatusCode::PARTIAL_CONTENT => (
                start,
                content_range
                    .as_deref()
                    .and_then(total_from_content_range)
                    .or(content_length),
            ),
            ureq::http::StatusCode::OK => (0, content_length.or(Some(body.len() as u64))),
            _ => (start, None),
        };
        Ok(RangeReply {
            body,
            offset,
            total,
        })
    }

    fn load_block_at_pos(&mut self) -> io::Result<()> {
        let start = self.pos;
        let mut end = start
            .saturating_add(self.block_size as u64)
            .saturating_sub(1);
        if let Some(total) = self.total.filter(|t| *t > 0) {
            end = end.min(total - 1);
        }

        let reply = self.fetch(start, end)?;
        if reply.total.is_some() {
            self.total = reply.total;
        }
        self.block = reply.body;
        self.block_start = reply.offset;
        Ok(())
    }

    fn total_len(&mut self) -> io::Result<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let reply = self.fetch(0, 0)?;
        let total = reply
            .total
            .ok_or_else(|| io::Error::other("server did not report a content length"))?;
        self.total = Some(total);
        Ok(total)
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.cancelled() {
            return Ok(0);
        }
        if self.total.is_some_and(|t| self.pos >= t) {
            return Ok(0);
        }

        if self.pos < self.block_start || self.pos >= self.block_end() {
            self.load_block_at_pos()?;
        }
        // Server answered with fewer bytes than asked (or none): treat as EOF.
        if self.pos >= self.block_end() {
            return Ok(0);
        }

        let offset = (self.pos - self.block_start) as usize;
        let n = (self.block.len() - offset).min(out.len());
        out[..n].copy_from_slice(&self.block[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.pos = match target {
            SeekFrom::Start(at) => at,
            SeekFrom::Current(delta) => offset_by(self.pos, delta),
            SeekFrom::End(delta) => {
                let total = self.total_len()?;
                offset_by(total, delta)
            }
        };
        Ok(self.pos)
    }
}

impl MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.total
    }
}

/// Total size from `Content-Range: bytes start-end/total`.
fn total_from_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn offset_by(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}
