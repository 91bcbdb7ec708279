//! Byte-to-text decoding for remote shell output.
//!
//! Device output is mostly UTF-8 but not reliably so. Valid UTF-8 decodes
//! normally; every byte outside a valid sequence maps to the Latin-1 code
//! point of the same value, so no byte is ever lost or turned into U+FFFD.

/// Streaming UTF-8 decoder with a Latin-1 fallback.
#[derive(Debug, Clone, Default)]
pub struct TextDecoder {
    /// Incomplete trailing sequence from the previous chunk (at most 3 bytes)
    pending: Vec<u8>,
}

impl TextDecoder {
    /// Create a decoder with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, holding back an incomplete trailing UTF-8 sequence.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.decode_inner(bytes, false)
    }

    /// Decode a chunk and flush anything pending.
    pub fn decode_final(&mut self, bytes: &[u8]) -> String {
        self.decode_inner(bytes, true)
    }

    fn decode_inner(&mut self, bytes: &[u8], flush: bool) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match e.error_len() {
                        Some(len) => {
                            out.extend(after[..len].iter().map(|&b| char::from(b)));
                            rest = &after[len..];
                        }
                        None if flush => {
                            out.extend(after.iter().map(|&b| char::from(b)));
                            break;
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}
