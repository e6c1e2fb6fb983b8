//! XML tree building and a serde codec for feed documents.
//!
//! Bytes are tokenized by quick-xml and folded into an immutable [`Document`]
//! by the [`TreeBuilder`]. The decode engine maps that tree onto any
//! `Deserialize` type, and the encode engine turns any `Serialize` type
//! back into a tree that [`Document::write`] renders as XML text.
//!
//! Coding keys resolve, in order, to an attribute, a child element, or the
//! element's own text under the reserved [`TEXT_KEY`]. The attribute map as
//! a whole is available under [`ATTRIBUTES_KEY`].
//!
//! # Examples
//! ```
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Author {
//!     #[serde(default)]
//!     name: Vec<String>,
//! }
//!
//! let author: Author = feed_codec::from_str("<author><name>A</name><name>B</name></author>").unwrap();
//! assert_eq!(author.name, vec!["A", "B"]);
//! ```

mod de;
mod document;
mod error;
mod node;
mod parser;
mod ser;

pub use crate::de::{
    from_document, Deserializer, Entry, KeyedContainer, SingleValueContainer, UnkeyedContainer,
    ATTRIBUTES_KEY, TEXT_KEY,
};
pub use crate::document::{Document, ElementBuilder};
pub use crate::error::{Error, Result};
pub use crate::node::Node;
pub use crate::parser::TreeBuilder;
pub use crate::ser::to_document;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;

/// Options when parsing xml.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Elements with `type="xhtml"` keep their nested markup as text
    /// instead of growing child elements.
    pub capture_xhtml: bool,
    /// Tokenizer errors reported after the root element closed are ignored.
    /// Some real-world feeds carry junk after the document.
    pub ignore_trailing_content: bool,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            capture_xhtml: true,
            ignore_trailing_content: true,
        }
    }
}

/// Options when writing xml.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// One element per line, indented by depth.
    /// Otherwise nothing is inserted between siblings.
    pub formatted: bool,
    /// Spaces per depth level in formatted mode.
    pub indent: usize,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            formatted: true,
            indent: 2,
        }
    }
}

impl WriteOptions {
    pub fn compact() -> WriteOptions {
        WriteOptions {
            formatted: false,
            ..WriteOptions::default()
        }
    }
}

/// Parses `s` and decodes its root element as `T`.
pub fn from_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    from_slice(s.as_bytes())
}

/// Parses `bytes` and decodes its root element as `T`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let document = Document::parse_bytes(bytes)?;
    from_document(&document)
}

/// Reads `reader` to the end, then decodes its root element as `T`.
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    let document = Document::parse_reader(reader)?;
    from_document(&document)
}

/// Encodes `value` under a root element named `root`, without inserted whitespace.
pub fn to_string<T: ?Sized + Serialize>(value: &T, root: &str) -> Result<String> {
    to_document(value, root)?.write_str_with_opts(&WriteOptions::compact())
}

/// Encodes `value` under a root element named `root`, one element per line.
pub fn to_string_pretty<T: ?Sized + Serialize>(value: &T, root: &str) -> Result<String> {
    to_document(value, root)?.write_str()
}
