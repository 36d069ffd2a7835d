//! Bounded capture of a command's combined output.
//!
//! The toolchain does not reliably report its own failures through the exit
//! status, so the capture also watches for failure markers (by default
//! `panicked`) in the accumulated text. Detection runs on every chunk, over the
//! new text plus enough of the previous text to catch a marker split across
//! chunk boundaries.
//!
//! Once the buffer grows past its cap it is replaced by [`TRUNCATION_MARKER`];
//! later chunks append after the marker.

/// Default cap on captured characters.
pub const DEFAULT_MAX_CHARS: usize = 10_000_000;
/// Text that replaces an overflowing buffer.
pub const TRUNCATION_MARKER: &str = "...[truncated]";
/// Marker the toolchain prints when it aborts.
pub const DEFAULT_FAILURE_MARKER: &str = "panicked";

/// Accumulator bound to one executed command.
#[derive(Debug, Clone)]
pub struct StreamCapture {
    buf: String,
    chars: usize,
    max_chars: usize,
    markers: Vec<String>,
    failure_at: Option<usize>,
    frozen_failure: Option<String>,
    truncated: bool,
    pending: Vec<u8>,
}

impl Default for StreamCapture {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, [DEFAULT_FAILURE_MARKER])
    }
}

impl StreamCapture {
    /// Capture holding at most `max_chars` characters, flagging any of `markers`.
    pub fn new<I, S>(max_chars: usize, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            buf: String::new(),
            chars: 0,
            max_chars,
            markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty())
                .collect(),
            failure_at: None,
            frozen_failure: None,
            truncated: false,
            pending: Vec::new(),
        }
    }

    /// Append raw bytes from a stream.
    ///
    /// Bytes are decoded as UTF-8 incrementally; an incomplete trailing
    /// sequence is held back until the next call. Invalid sequences become
    /// U+FFFD.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);

        let mut pos = 0;
        while pos < data.len() {
            match std::str::from_utf8(&data[pos..]) {
                Ok(s) => {
                    self.push_str(s);
                    pos = data.len();
                }
                Err(e) => {
                    let valid = pos + e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&data[pos..valid]) {
                        self.push_str(s);
                    }
                    match e.error_len() {
                        Some(n) => {
                            self.push_str("\u{FFFD}");
                            pos = valid + n;
                        }
                        None => {
                            self.pending = data[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Append decoded text.
    pub fn push_str(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let prev_len = self.buf.len();
        self.buf.push_str(chunk);
        self.chars += chunk.chars().count();

        if self.failure_at.is_none() && self.frozen_failure.is_none() {
            self.scan_from(prev_len);
        }

        if self.chars > self.max_chars {
            if let Some(at) = self.failure_at.take() {
                self.frozen_failure = Some(self.buf[at..].to_owned());
            }
            self.buf = TRUNCATION_MARKER.to_owned();
            self.chars = TRUNCATION_MARKER.chars().count();
            self.truncated = true;
        }
    }

    fn scan_from(&mut self, prev_len: usize) {
        let overlap = self
            .markers
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .saturating_sub(1);
        let mut start = prev_len.saturating_sub(overlap);
        while !self.buf.is_char_boundary(start) {
            start -= 1;
        }
        let window = &self.buf[start..];
        self.failure_at = self
            .markers
            .iter()
            .filter_map(|m| window.find(m.as_str()))
            .min()
            .map(|i| start + i);
    }

    /// Whether a failure marker has been seen, regardless of exit status.
    #[must_use]
    pub fn failure_signal(&self) -> bool {
        self.failure_at.is_some() || self.frozen_failure.is_some()
    }

    /// Captured text starting at the first failure marker, if any.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match (&self.frozen_failure, self.failure_at) {
            (Some(s), _) => Some(s.as_str()),
            (None, Some(at)) => Some(&self.buf[at..]),
            (None, None) => None,
        }
    }

    /// Everything captured so far (or the truncation marker and what followed it).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buf
    }

    /// Whether the buffer overflowed at some point.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// The last `max_chars` characters of the captured text.
    #[must_use]
    pub fn tail(&self, max_chars: usize) -> &str {
        if self.chars <= max_chars {
            return &self.buf;
        }
        let skip = self.chars - max_chars;
        match self.buf.char_indices().nth(skip) {
            Some((i, _)) => &self.buf[i..],
            None => "",
        }
    }

    /// Flush held-back bytes and resolve the capture: the full text when no
    /// failure marker was seen, otherwise the text from the first marker on.
    pub fn finish(mut self) -> Result<String, String> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
            self.push_str(&rest);
        }
        if let Some(msg) = self.failure_message() {
            return Err(msg.to_owned());
        }
        Ok(self.buf)
    }
}
