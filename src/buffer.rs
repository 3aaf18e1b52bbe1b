//! Text accumulation for one stream session.

const REPLACEMENT: char = '\u{FFFD}';

/// Growing/shrinking text buffer fed by decoded transport fragments.
///
/// The buffer only grows through [`StreamBuffer::append`] and only shrinks by
/// dropping an exact prefix through [`StreamBuffer::consume`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamBuffer {
    text: String,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// Drops the first `prefix_len` bytes and any whitespace that follows them.
    ///
    /// Trailing whitespace is kept: it may belong to a string value whose
    /// closing quote has not arrived yet.
    pub fn consume(&mut self, prefix_len: usize) {
        let mut cut = prefix_len.min(self.text.len());
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        let remainder = &self.text[cut..];
        let leading_ws = remainder.len() - remainder.trim_start().len();
        self.text.drain(..cut + leading_ws);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when nothing but whitespace is buffered.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Incremental UTF-8 decoder for transport fragments.
///
/// A multi-byte sequence cut by a fragment boundary is held back until the
/// rest of it arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        if self.pending.is_empty() {
            if let Ok(text) = std::str::from_utf8(bytes) {
                return text.to_owned();
            }
        }

        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut pos = 0;

        while pos < self.pending.len() {
            match std::str::from_utf8(&self.pending[pos..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    pos = self.pending.len();
                }
                Err(error) => {
                    let valid_end = pos + error.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&self.pending[pos..valid_end]).unwrap_or_default(),
                    );
                    match error.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            pos = valid_end + len;
                        }
                        // Truncated sequence at the end: wait for the next fragment.
                        None => {
                            pos = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..pos);
        out
    }

    /// Flushes a sequence left incomplete at end of input.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{StreamBuffer, Utf8Decoder};

    #[test]
    fn consume_drops_prefix_and_leading_whitespace() {
        let mut buffer = StreamBuffer::new();
        buffer.append("{\"event\":\"a\"}\n  {\"event\"");
        buffer.consume(13);
        assert_eq!(buffer.as_str(), "{\"event\"");
    }

    #[test]
    fn consume_keeps_trailing_whitespace_of_partial_value() {
        let mut buffer = StreamBuffer::new();
        buffer.append("{} {\"event\":\"a ");
        buffer.consume(2);
        assert_eq!(buffer.as_str(), "{\"event\":\"a ");
    }

    #[test]
    fn consume_past_end_empties_buffer() {
        let mut buffer = StreamBuffer::new();
        buffer.append("abc");
        buffer.consume(10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn zero_length_append_is_a_no_op() {
        let mut buffer = StreamBuffer::new();
        buffer.append("");
        assert!(buffer.is_empty());
        buffer.append("  \n");
        assert!(!buffer.is_empty());
        assert!(buffer.is_blank());
    }

    #[test]
    fn decoder_holds_back_split_multibyte_sequence() {
        let bytes = "h\u{e9}llo \u{1f600}".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }

        assert_eq!(out, "h\u{e9}llo \u{1f600}");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn decoder_replaces_invalid_bytes_and_keeps_going() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn decoder_flushes_truncated_tail_lossily() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xe2, 0x82]), "x");
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), "\u{fffd}");
        assert!(!decoder.has_pending());
    }
}
