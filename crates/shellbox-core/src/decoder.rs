//! Incremental UTF-8 decoding of process output
//!
//! Pipe reads split the byte stream at arbitrary points, so a multi-byte
//! character can straddle two reads. The decoder keeps the incomplete tail
//! until the next chunk arrives (or the stream ends).

use std::char::REPLACEMENT_CHARACTER;

/// Stateful decoder for one output stream.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    pending: Vec<u8>,
}

impl OutputDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning all text that is complete so far.
    ///
    /// Invalid sequences become U+FFFD. With `last` set, an incomplete
    /// trailing sequence is flushed as a single U+FFFD as well.
    pub fn decode(&mut self, chunk: &[u8], last: bool) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut pos = 0;
        loop {
            match std::str::from_utf8(&buf[pos..]) {
                Ok(text) => {
                    out.push_str(text);
                    pos = buf.len();
                    break;
                }
                Err(e) => {
                    let valid = pos + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&buf[pos..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            pos = valid + len;
                        }
                        None if last => {
                            out.push(REPLACEMENT_CHARACTER);
                            pos = buf.len();
                            break;
                        }
                        None => {
                            pos = valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = buf.split_off(pos);
        out
    }

    /// Flush whatever is buffered at end of stream.
    pub fn finish(&mut self) -> String {
        self.decode(&[], true)
    }

    /// Number of bytes held back waiting for the rest of a character.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.decode(b"hello\n", false), "hello\n");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_split_multibyte() {
        // "é" is 0xC3 0xA9, "世" is 0xE4 0xB8 0x96
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xC3], false), "a");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&[0xA9, 0xE4], false), "é");
        assert_eq!(decoder.decode(&[0xB8], false), "");
        assert_eq!(decoder.decode(&[0x96, b'!'], false), "世!");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b'], false), "a\u{FFFD}b");
    }

    #[test]
    fn test_incomplete_tail_on_final() {
        let mut decoder = OutputDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE4, 0xB8], false), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_byte_by_byte_matches_whole() {
        let text = "grüße, 世界 🚀 done";
        let mut decoder = OutputDecoder::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(byte), false));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }
}
