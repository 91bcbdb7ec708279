//! ANSI/VT sanitizer using the VTE crate.
//!
//! Reduces terminal output to plain text: escape sequences (CSI, OSC, DCS,
//! plain ESC) vanish, CR+LF and bare CR become `\n`, backspace erases the
//! previous character, and every other control character is dropped.
//!
//! Control strings (OSC, DCS, SOS, PM, APC) are only honoured up to
//! [`MAX_CONTROL_STRING`] bytes and never across a line feed. Past either
//! point the parser is reset, so a stray introducer cannot swallow the rest
//! of a session.

use vte::{Params, Perform};

/// Longest control string body consumed before the parser gives up on it.
pub const MAX_CONTROL_STRING: usize = 1024;

/// Where the byte stream stands relative to control strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Not inside a control string
    Text,
    /// Just saw ESC
    Escape,
    /// Inside an OSC body, with the bytes consumed so far
    Osc(usize),
    /// Inside a DCS, SOS, PM or APC body, with the bytes consumed so far
    Str(usize),
}

impl Scan {
    /// Advance by one byte; returns true when the parser must be reset first.
    fn step(&mut self, byte: u8) -> bool {
        let (next, reset) = match (*self, byte) {
            (_, 0x1b) => (Scan::Escape, false),
            // CAN and SUB abort any sequence
            (_, 0x18 | 0x1a) => (Scan::Text, false),
            (Scan::Escape, b']') => (Scan::Osc(0), false),
            (Scan::Escape, b'P' | b'X' | b'^' | b'_') => (Scan::Str(0), false),
            (Scan::Escape, _) => (Scan::Text, false),
            (Scan::Osc(_), 0x07) => (Scan::Text, false),
            (Scan::Osc(_) | Scan::Str(_), b'\n') => (Scan::Text, true),
            (Scan::Osc(n) | Scan::Str(n), _) if n >= MAX_CONTROL_STRING => (Scan::Text, true),
            (Scan::Osc(n), _) => (Scan::Osc(n + 1), false),
            (Scan::Str(n), _) => (Scan::Str(n + 1), false),
            (Scan::Text, _) => (Scan::Text, false),
        };
        *self = next;
        reset
    }
}

/// Plain-text sink driven by the VTE state machine.
#[derive(Debug, Default)]
struct PlainText {
    out: String,
    /// Last line-ending byte was CR; a following LF is part of the same newline
    pending_cr: bool,
}

impl Perform for PlainText {
    /// Printable character.
    fn print(&mut self, c: char) {
        if c.is_control() {
            return;
        }
        self.out.push(c);
        self.pending_cr = false;
    }

    /// C0 control character.
    fn execute(&mut self, byte: u8) {
        match byte {
            // Backspace (BS): destructive, newlines included
            0x08 => {
                self.out.pop();
                self.pending_cr = false;
            }

            // Horizontal Tab (HT)
            0x09 => {
                self.out.push('\t');
                self.pending_cr = false;
            }

            // Line Feed (LF)
            0x0A => {
                if self.pending_cr {
                    self.pending_cr = false;
                } else {
                    self.out.push('\n');
                }
            }

            // Carriage Return (CR)
            0x0D => {
                self.out.push('\n');
                self.pending_cr = true;
            }

            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

/// Streaming sanitizer.
///
/// Parser state persists between calls, so an escape sequence or a CR+LF
/// pair split across two chunks is handled as if it arrived whole. A
/// backspace can only erase text produced by the same call.
pub struct Sanitizer {
    parser: vte::Parser,
    sink: PlainText,
    scan: Scan,
}

impl Sanitizer {
    /// Create a sanitizer in the ground state.
    pub fn new() -> Self {
        Self {
            parser: vte::Parser::new(),
            sink: PlainText::default(),
            scan: Scan::Text,
        }
    }

    /// Sanitize one chunk of decoded text.
    pub fn sanitize(&mut self, text: &str) -> String {
        for byte in text.bytes() {
            if self.scan.step(byte) {
                // Abandon the control string; this byte is read as text
                self.parser = vte::Parser::new();
            }
            self.parser.advance(&mut self.sink, byte);
        }
        std::mem::take(&mut self.sink.out)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("pending_cr", &self.sink.pending_cr)
            .field("scan", &self.scan)
            .finish_non_exhaustive()
    }
}
