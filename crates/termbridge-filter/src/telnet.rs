//! TELNET (RFC 854) option-negotiation decoder.
//!
//! Strips IAC framing from the inbound byte stream. Partial sequences at the
//! end of a read are carried into the next call, so a negotiation split
//! across two socket reads is still removed in full.

use tracing::trace;

/// TELNET command bytes.
pub mod cmd {
    /// End of record
    pub const EOR: u8 = 239;
    /// End of sub-negotiation
    pub const SE: u8 = 240;
    /// No operation
    pub const NOP: u8 = 241;
    /// Data mark
    pub const DM: u8 = 242;
    /// Break
    pub const BRK: u8 = 243;
    /// Interrupt process
    pub const IP: u8 = 244;
    /// Abort output
    pub const AO: u8 = 245;
    /// Are you there
    pub const AYT: u8 = 246;
    /// Erase character
    pub const EC: u8 = 247;
    /// Erase line
    pub const EL: u8 = 248;
    /// Go ahead
    pub const GA: u8 = 249;
    /// Start of sub-negotiation
    pub const SB: u8 = 250;
    /// Sender wants to enable an option
    pub const WILL: u8 = 251;
    /// Sender refuses an option
    pub const WONT: u8 = 252;
    /// Sender asks the peer to enable an option
    pub const DO: u8 = 253;
    /// Sender asks the peer to disable an option
    pub const DONT: u8 = 254;
    /// Interpret as command
    pub const IAC: u8 = 255;
}

/// Option-negotiation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// WILL
    Will,
    /// WONT
    Wont,
    /// DO
    Do,
    /// DONT
    Dont,
}

impl Verb {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            cmd::WILL => Some(Verb::Will),
            cmd::WONT => Some(Verb::Wont),
            cmd::DO => Some(Verb::Do),
            cmd::DONT => Some(Verb::Dont),
            _ => None,
        }
    }
}

/// One option negotiation stripped from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Negotiation {
    /// Negotiation verb
    pub verb: Verb,
    /// Option code
    pub option: u8,
}

impl Negotiation {
    /// Reply that refuses this request, if it is a request.
    ///
    /// `WILL x` is answered with `DONT x` and `DO x` with `WONT x`;
    /// `WONT`/`DONT` need no answer.
    pub fn refusal(&self) -> Option<[u8; 3]> {
        match self.verb {
            Verb::Will => Some([cmd::IAC, cmd::DONT, self.option]),
            Verb::Do => Some([cmd::IAC, cmd::WONT, self.option]),
            Verb::Wont | Verb::Dont => None,
        }
    }
}

/// Output of one decode step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Data bytes with all framing removed
    pub data: Vec<u8>,
    /// Negotiations seen in this chunk
    pub negotiations: Vec<Negotiation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Verb(u8),
    Sub,
    SubIac,
}

/// Streaming TELNET decoder.
#[derive(Debug, Clone)]
pub struct TelnetDecoder {
    state: State,
}

impl TelnetDecoder {
    /// Create a decoder in the data state.
    pub fn new() -> Self {
        Self { state: State::Data }
    }

    /// True if a partial sequence is pending from a previous call.
    pub fn in_sequence(&self) -> bool {
        self.state != State::Data
    }

    /// Decode one chunk of raw socket bytes.
    pub fn decode(&mut self, input: &[u8]) -> Decoded {
        let mut out = Decoded {
            data: Vec::with_capacity(input.len()),
            negotiations: Vec::new(),
        };

        for &byte in input {
            self.state = match self.state {
                State::Data => {
                    if byte == cmd::IAC {
                        State::Iac
                    } else {
                        out.data.push(byte);
                        State::Data
                    }
                }
                State::Iac => match byte {
                    cmd::IAC => {
                        out.data.push(cmd::IAC);
                        State::Data
                    }
                    cmd::SB => State::Sub,
                    cmd::WILL | cmd::WONT | cmd::DO | cmd::DONT => State::Verb(byte),
                    // DM, BRK, IP, AO, AYT, EC, EL, GA, NOP, EOR, stray SE
                    other => {
                        trace!("Dropped TELNET command {}", other);
                        State::Data
                    }
                },
                State::Verb(verb) => {
                    if let Some(verb) = Verb::from_byte(verb) {
                        trace!("Dropped TELNET negotiation {:?} {}", verb, byte);
                        out.negotiations.push(Negotiation { verb, option: byte });
                    }
                    State::Data
                }
                State::Sub => {
                    if byte == cmd::IAC {
                        State::SubIac
                    } else {
                        State::Sub
                    }
                }
                State::SubIac => match byte {
                    cmd::SE => State::Data,
                    // IAC IAC inside a sub-negotiation is escaped data
                    _ => State::Sub,
                },
            };
        }

        out
    }
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self::new()
    }
}
