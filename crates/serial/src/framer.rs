//! Delimiter-based line framing.

/// Splits a byte stream into text lines on a fixed delimiter.
///
/// Lines longer than `max_len` bytes are force-split.  Empty lines (two
/// delimiters back to back) are dropped.  Invalid UTF-8 is replaced, not
/// rejected.
pub struct LineFramer {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
    max_len: usize,
}

impl LineFramer {
    pub fn new(delimiter: &[u8], max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            delimiter: delimiter.to_vec(),
            max_len: max_len.max(1),
        }
    }

    /// Feed raw bytes; returns every line completed by them.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            if !self.delimiter.is_empty() && self.buffer.ends_with(&self.delimiter) {
                let end = self.buffer.len() - self.delimiter.len();
                self.buffer.truncate(end);
                self.take_line(&mut lines);
                continue;
            }

            if self.buffer.len() >= self.max_len {
                self.take_line(&mut lines);
            }
        }

        lines
    }

    /// Return the partial line still buffered, if any.
    pub fn flush(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.take_line(&mut lines);
        lines.pop()
    }

    fn take_line(&mut self, out: &mut Vec<String>) {
        if self.buffer.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.buffer);
        out.push(String::from_utf8_lossy(&bytes).into_owned());
    }
}
