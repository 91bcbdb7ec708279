//! The protocol filter pipeline.
//!
//! Raw socket bytes go through four stages: TELNET framing is stripped,
//! the remaining bytes are decoded as text, the decoded text is checked for
//! pager markers, and finally the VT sanitizer reduces it to plain text.

use crate::pager::PagerDetector;
use crate::parser::Sanitizer;
use crate::telnet::{Negotiation, TelnetDecoder};
use crate::text::TextDecoder;

/// Default pager continuation marker.
pub const DEFAULT_PAGER_MARKER: &str = "--More--";

/// Result of filtering one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutput {
    /// Sanitized text: printable characters, `\n` and `\t` only
    pub text: String,
    /// A pager marker appeared in the decoded text
    pub pager: bool,
    /// Option negotiations stripped from the chunk
    pub negotiations: Vec<Negotiation>,
}

/// Streaming protocol filter for one remote connection.
///
/// Unlike [`filter`], state carries over between calls: partial TELNET
/// sequences, incomplete UTF-8, unfinished escape sequences, a trailing CR
/// and the tail of the last chunk for pager detection.
#[derive(Debug)]
pub struct ProtocolFilter {
    telnet: TelnetDecoder,
    text: TextDecoder,
    pager: PagerDetector,
    sanitizer: Sanitizer,
}

impl ProtocolFilter {
    /// Create a filter detecting the given pager markers.
    pub fn new<S: AsRef<str>>(pager_markers: &[S]) -> Self {
        Self {
            telnet: TelnetDecoder::new(),
            text: TextDecoder::new(),
            pager: PagerDetector::new(pager_markers),
            sanitizer: Sanitizer::new(),
        }
    }

    /// Filter one chunk read from the socket.
    pub fn feed(&mut self, raw: &[u8]) -> FilterOutput {
        let decoded = self.telnet.decode(raw);
        let text = self.text.decode(&decoded.data);
        self.finish(text, decoded.negotiations)
    }

    /// Filter a final chunk, flushing any incomplete UTF-8 sequence.
    pub fn feed_final(&mut self, raw: &[u8]) -> FilterOutput {
        let decoded = self.telnet.decode(raw);
        let text = self.text.decode_final(&decoded.data);
        self.finish(text, decoded.negotiations)
    }

    fn finish(&mut self, text: String, negotiations: Vec<Negotiation>) -> FilterOutput {
        let pager = self.pager.scan(&text);
        FilterOutput {
            text: self.sanitizer.sanitize(&text),
            pager,
            negotiations,
        }
    }
}

impl Default for ProtocolFilter {
    fn default() -> Self {
        Self::new(&[DEFAULT_PAGER_MARKER])
    }
}

/// Filter one self-contained chunk with the default pager marker.
pub fn filter(raw: &[u8]) -> FilterOutput {
    ProtocolFilter::default().feed_final(raw)
}
