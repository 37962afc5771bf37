//! Line framing for newline-delimited JSON bodies.
//!
//! Transport chunks arrive at arbitrary byte boundaries, so one NDJSON object
//! can be split across two reads, and so can a multi-byte UTF-8 character.
//! `LineBuffer` holds the incomplete tail until its newline arrives.

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a transport chunk and drain every completed line.
    ///
    /// Lines are returned without their `\n` / `\r\n` terminator.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        lines
    }

    /// Take whatever is left once the body has ended.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            self.pending.clear();
            return None;
        }

        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end().to_string())
    }
}
