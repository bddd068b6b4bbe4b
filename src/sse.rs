//! Server-sent-event decoding.
//!
//! Implements the line-oriented SSE event stream format: `field: value`
//! lines accumulate into a frame that is dispatched on a blank line. `data`
//! lines are joined with `\n`, lines starting with `:` are comments, the
//! event name defaults to `message`, and the last seen `id` persists across
//! frames. A frame left without its terminating blank line at end of stream
//! is dropped.

use std::{
    collections::VecDeque,
    io::{self, BufRead},
};

pub const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line without its terminator. Returns a frame when the line
    /// is blank and the pending frame carries data.
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(millis);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }
}

/// Pulls complete frames out of a byte stream.
pub struct SseReader<R> {
    inner: R,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            buf: Vec::new(),
            finished: false,
        }
    }

    /// Next dispatched frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> io::Result<Option<SseFrame>> {
        loop {
            while let Some(line) = self.pending.pop_front() {
                if let Some(frame) = self.decoder.push_line(&line) {
                    return Ok(Some(frame));
                }
            }
            if self.finished {
                return Ok(None);
            }
            self.read_lines()?;
        }
    }

    fn read_lines(&mut self) -> io::Result<()> {
        self.buf.clear();
        let read = self.inner.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            self.finished = true;
            return Ok(());
        }
        let terminated = self.buf.ends_with(b"\n");
        if terminated {
            self.buf.pop();
        }
        let text = String::from_utf8_lossy(&self.buf);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        // a lone CR also terminates a line
        let mut lines: Vec<String> = text.split('\r').map(str::to_string).collect();
        if text.ends_with('\r') {
            // "...\r\n" or "...\r" at the end: the CR was the terminator
            lines.pop();
        } else if !terminated {
            // unterminated tail at end of stream is not a complete line
            lines.pop();
        }
        self.pending.extend(lines);
        Ok(())
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = io::Result<SseFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
