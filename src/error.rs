use std::fmt::Display;
use thiserror::Error;

/// Wrapper around `std::Result`
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    /// [`std::io`] related error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The input bytes could not be decoded.
    /// Either the declared encoding is unknown, or the bytes don't match it.
    #[error("cannot decode XML input")]
    CannotDecode,
    /// Error raised by the XML reader or writer.
    #[error("malformed XML: {0}")]
    MalformedXml(#[from] quick_xml::Error),
    /// A CDATA block is not valid UTF-8. Parsing stops at the first one.
    #[error("unable to decode CDATA block as UTF-8 at `{path}`")]
    CdataDecoding { path: String },
    /// The tokenizer failed before the root element closed,
    /// or the document did not produce exactly one root.
    #[error("unexpected error: {reason}")]
    Unexpected { reason: String },
    /// Text could not be parsed as the requested type.
    #[error("expected {expected} at `{path}`")]
    TypeMismatch { expected: String, path: String },
    /// An unkeyed container was read past its last element.
    #[error("unkeyed container at `{path}` is at end")]
    EndOfContainer { path: String },
    /// A required key resolved to neither an attribute, a child, nor text.
    #[error("no value for key `{key}` at `{path}`")]
    KeyNotFound { key: String, path: String },
    /// The value has a shape the node tree cannot represent.
    #[error("cannot encode {0}")]
    Unsupported(&'static str),
    /// Message raised by a `Deserialize` or `Serialize` implementation.
    #[error("{0}")]
    Message(String),
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}
