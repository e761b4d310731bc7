//! Device console protocol.
//!
//! The device prints a prompt (`"> "`) after every command and reports each
//! received UDP datagram as a line such as:
//!
//! ```text
//! > 5 bytes from fe80::1 49154 42;17;99
//! ```
//!
//! Everything here is pure: decoding raw console lines, dropping prompt
//! noise, recognising datagram notifications and extracting their payload.

use std::fmt;

use thiserror::Error;

/// Prompt token printed by the console.
pub const PROMPT: &str = ">";

/// Marker identifying a datagram notification line.
pub const NOTIFICATION_MARKER: &str = "bytes from";

/// Terminator appended to every command sent to the console.
pub const LINE_END: &str = "\r\n";

/// Raw lines that carry no information: an empty line, a bare prompt line
/// and a prompt still waiting for input.
pub const NOISE_LINES: [&[u8]; 3] = [b"\r\n", b"> \r\n", b"> "];

/// Number of trailing bytes stripped from every decoded line.
const TERMINATOR_LEN: usize = 2;

/// One step of the console bring-up script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStep {
    /// Discard pending console input.
    ClearInput,
    /// Send a command line; the empty command is a bare newline.
    Send(&'static str),
}

/// Commands that put the console into UDP listening mode.
///
/// Binds a listener on all interfaces, port 1212, then asks the device for
/// its addresses. Replies are never checked.
pub const BRING_UP: [ConsoleStep; 6] = [
    ConsoleStep::ClearInput,
    ConsoleStep::Send(""),
    ConsoleStep::Send("udp open"),
    ConsoleStep::Send("udp bind :: 1212"),
    ConsoleStep::ClearInput,
    ConsoleStep::Send("ipaddr"),
];

/// Command sent before every read to prompt fresh output.
pub const POKE: &str = "";

/// Encode a console command, terminator included.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + LINE_END.len());
    bytes.extend_from_slice(command.as_bytes());
    bytes.extend_from_slice(LINE_END.as_bytes());
    bytes
}

/// A batch that could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {index} of the batch is not ASCII")]
    NonAscii { index: usize },
}

/// Check whether a raw line is prompt noise.
pub fn is_noise(raw: &[u8]) -> bool {
    NOISE_LINES.iter().any(|noise| *noise == raw)
}

/// Decode a single raw line as ASCII, stripping its two-byte terminator.
pub fn decode_line(raw: &[u8]) -> Option<String> {
    if !raw.is_ascii() {
        return None;
    }

    let end = raw.len().saturating_sub(TERMINATOR_LEN);
    std::str::from_utf8(&raw[..end]).ok().map(str::to_owned)
}

/// Drop noise from a batch and decode what remains.
///
/// A single undecodable line rejects the whole batch.
pub fn decode_batch<L: AsRef<[u8]>>(raw: &[L]) -> Result<Vec<String>, DecodeError> {
    raw.iter()
        .map(AsRef::as_ref)
        .enumerate()
        .filter(|(_, line)| !is_noise(line))
        .map(|(index, line)| decode_line(line).ok_or(DecodeError::NonAscii { index }))
        .collect()
}

/// Payload carried by a datagram notification, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the payload of a notification line.
///
/// The payload is the last whitespace token once a leading prompt token is
/// dropped, with every `;` turned into a space. The number of fields is not
/// checked: a short line yields whatever its last token is.
pub fn extract_payload(line: &str) -> Option<Payload> {
    let mut tokens = line.split_whitespace().peekable();
    if tokens.peek() == Some(&PROMPT) {
        tokens.next();
    }

    tokens.last().map(|token| Payload(token.replace(';', " ")))
}

/// Classification of a decoded console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine<'a> {
    /// The device received a datagram.
    Datagram(Payload),
    /// Anything else the console printed.
    Other(&'a str),
}

/// Classify a decoded, noise-free console line.
pub fn classify(line: &str) -> ConsoleLine<'_> {
    if line.contains(NOTIFICATION_MARKER) {
        if let Some(payload) = extract_payload(line) {
            return ConsoleLine::Datagram(payload);
        }
    }
    ConsoleLine::Other(line)
}
