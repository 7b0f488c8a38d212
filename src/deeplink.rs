//! Deep-link decoding: `<scheme>://<mode>-<id1>;<id2>;...;<idN>`

use std::fmt;

use crate::error::DecodeError;

/// Printing mode carried in the deep link.
///
/// Only `Print` and `Reprint` mean anything to the remote service. Any other
/// token is kept verbatim so it can be logged and forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrintMode {
    Print,
    Reprint,
    Other(String),
}

impl PrintMode {
    pub fn from_token(token: &str) -> Self {
        match token {
            "Print" => PrintMode::Print,
            "Reprint" => PrintMode::Reprint,
            other => PrintMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PrintMode::Print => "Print",
            PrintMode::Reprint => "Reprint",
            PrintMode::Other(token) => token,
        }
    }
}

impl fmt::Display for PrintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded activation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJobRequest {
    mode: PrintMode,
    identifiers: Vec<String>,
}

impl PrintJobRequest {
    /// Build a request directly. Returns `None` for an empty identifier list.
    pub fn new(mode: PrintMode, identifiers: Vec<String>) -> Option<Self> {
        if identifiers.is_empty() {
            return None;
        }
        Some(Self { mode, identifiers })
    }

    pub fn mode(&self) -> &PrintMode {
        &self.mode
    }

    /// Frame numbers in deep-link order, duplicates included.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
}

/// Decode one activation string for the given registered scheme.
pub fn decode(activation: &str, scheme: &str) -> Result<PrintJobRequest, DecodeError> {
    let prefix = format!("{}://", scheme);
    let body = activation
        .trim()
        .strip_prefix(prefix.as_str())
        .ok_or_else(|| DecodeError::WrongScheme { expected: prefix.clone() })?;

    // Browsers append a trailing slash to custom-scheme URLs
    let body = body.strip_suffix('/').unwrap_or(body);

    let (mode, list) = body.split_once('-').ok_or(DecodeError::MissingSeparator)?;

    let identifiers: Vec<String> = list
        .split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    PrintJobRequest::new(PrintMode::from_token(mode), identifiers)
        .ok_or(DecodeError::EmptyIdentifiers)
}

/// Decode the activation from process launch arguments. Only the last
/// argument is inspected.
pub fn decode_launch_args<S: AsRef<str>>(
    args: &[S],
    scheme: &str,
) -> Result<PrintJobRequest, DecodeError> {
    let last = args.last().ok_or(DecodeError::NoArguments)?;
    decode(last.as_ref(), scheme)
}
