//! Incremental UTF-8 decoding for pipe output.
//!
//! Pipe reads split multi-byte sequences at arbitrary boundaries, so each
//! fragment decodes the longest valid prefix and carries the remaining bytes
//! into the next read. The same algorithm works on every platform.

/// Streaming decoder with a carry-over buffer for incomplete sequences.
#[derive(Debug, Default)]
pub(crate) struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of the buffered bytes as possible. Invalid sequences in
    /// the middle of the stream are replaced; an incomplete trailing sequence
    /// is held back for the next push.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_len]));
                    match err.error_len() {
                        Some(bad_len) => {
                            self.pending.drain(..valid_len + bad_len);
                            out.push(char::REPLACEMENT_CHARACTER);
                        }
                        None => {
                            // Incomplete trailing sequence: carry it forward.
                            self.pending.drain(..valid_len);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Lenient final decode once the process has exited; anything still
    /// buffered is substituted rather than dropped.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.push(b"hello world"), "hello world");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn multibyte_split_across_fragments_is_reassembled() {
        let mut decoder = Utf8StreamDecoder::new();
        let text = "héllo 日本語";
        let bytes = text.as_bytes();

        // Feed one byte at a time; output must concatenate back losslessly.
        let mut collected = String::new();
        for b in bytes {
            collected.push_str(&decoder.push(std::slice::from_ref(b)));
        }
        collected.push_str(&decoder.flush());
        assert_eq!(collected, text);
    }

    #[test]
    fn split_point_inside_a_character_holds_bytes_back() {
        let mut decoder = Utf8StreamDecoder::new();
        let bytes = "日".as_bytes(); // three bytes

        assert_eq!(decoder.push(&bytes[..2]), "");
        assert_eq!(decoder.push(&bytes[2..]), "日");
    }

    #[test]
    fn invalid_bytes_are_substituted_not_fatal() {
        let mut decoder = Utf8StreamDecoder::new();
        let out = decoder.push(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn flush_substitutes_dangling_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        let bytes = "日".as_bytes();
        assert_eq!(decoder.push(&bytes[..1]), "");
        assert_eq!(decoder.flush(), "\u{FFFD}");
    }
}
