//! Incremental UTF-8 decoding for chunked byte streams.
//!
//! Network chunks can end in the middle of a multi-byte character. A
//! per-chunk `String::from_utf8_lossy` would turn both halves into U+FFFD, so
//! [`Utf8Decoder`] keeps the incomplete tail and prepends it to the next
//! chunk instead.

/// Stateful byte-to-text decoder.
///
/// Bytes that are definitely invalid decode to U+FFFD (one per maximal
/// invalid subpart, as `from_utf8_lossy` does). Bytes that might still become
/// valid once more input arrives are held back until the next call to
/// [`decode_into`](Self::decode_into) or [`finish_into`](Self::finish_into).
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, appending complete characters to `out`.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        let joined;
        let mut input: &[u8] = if self.pending.is_empty() {
            bytes
        } else {
            self.pending.extend_from_slice(bytes);
            joined = std::mem::take(&mut self.pending);
            &joined
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Convenience wrapper around [`decode_into`](Self::decode_into).
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        self.decode_into(bytes, &mut out);
        out
    }

    /// Flush held-back bytes at end of input.
    ///
    /// A sequence that never completed becomes a single U+FFFD.
    pub fn finish_into(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }

    /// Whether an incomplete sequence is currently held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
