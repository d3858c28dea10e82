//! Newline framing for inbound bytes.
//!
//! A single socket read may carry a partial line, several lines, or both.
//! [`LineDecoder`] keeps the unterminated tail between reads.

/// Longest partial line kept between reads before it is discarded.
pub const MAX_LINE_LEN: usize = 1024;

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes and returns every line completed by them.
    ///
    /// Lines are trimmed; empty lines are skipped. Invalid UTF-8 is replaced
    /// lossily. A line that grows beyond [`MAX_LINE_LEN`] without a
    /// terminator is dropped up to and including its eventual terminator.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for chunk in bytes.split_inclusive(|b| *b == b'\n') {
            let terminated = chunk.last() == Some(&b'\n');
            let body = if terminated {
                &chunk[..chunk.len() - 1]
            } else {
                chunk
            };

            if !self.overflowed {
                self.pending.extend_from_slice(body);
                if self.pending.len() > MAX_LINE_LEN {
                    self.pending.clear();
                    self.overflowed = true;
                }
            }

            if terminated {
                if !self.overflowed {
                    let line = String::from_utf8_lossy(&self.pending);
                    let line = line.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                self.pending.clear();
                self.overflowed = false;
            }
        }

        lines
    }

    /// Number of buffered bytes of the current partial line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops any partial line, e.g. after the connection was replaced.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.overflowed = false;
    }
}
