use crate::error::{Error, Result};
use crate::node::{Node, NodeData};
use crate::parser;
use crate::{ReadOptions, WriteOptions};
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Read, Write};
use std::str::FromStr;

/// Represents a XML document with exactly one root element.
///
/// A document is built in one pass, by parsing, by encoding a value with
/// [`to_document()`](crate::to_document), or from an [`ElementBuilder`].
/// It is never mutated afterwards, so it can be shared between threads
/// and decoded concurrently.
///
/// # Examples
/// ```
/// use feed_codec::Document;
/// use std::str::FromStr;
///
/// let doc = Document::from_str(r#"<?xml version="1.0" encoding="UTF-8"?>
/// <feed>
///     <author>
///         <name>Lewis Carroll</name>
///     </author>
/// </feed>
/// "#).unwrap();
/// let name = doc
///   .root()
///   .find(&doc, "author")
///   .unwrap()
///   .find(&doc, "name")
///   .unwrap();
/// assert_eq!(name.text(&doc), Some("Lewis Carroll"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) store: Vec<NodeData>,
    root: Node,
}

impl Document {
    pub(crate) fn from_parts(store: Vec<NodeData>, root: Node) -> Document {
        Document { store, root }
    }

    pub fn root(&self) -> Node {
        self.root
    }

    /// Number of elements in the document.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

// Read
impl Document {
    /// Parses xml string.
    pub fn parse_str(str: &str) -> Result<Document> {
        Document::parse_bytes(str.as_bytes())
    }

    pub fn parse_str_with_opts(str: &str, opts: ReadOptions) -> Result<Document> {
        Document::parse_bytes_with_opts(str.as_bytes(), opts)
    }

    /// Parses xml bytes. The encoding is taken from the byte order mark
    /// or the XML declaration, and defaults to UTF-8.
    ///
    /// # Errors
    ///
    /// - [`Error::CannotDecode`]: Unknown encoding, or bytes that don't match it.
    /// - [`Error::CdataDecoding`]: A CDATA block is not valid UTF-8.
    /// - [`Error::Unexpected`]: Malformed XML before the root element closed.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Document> {
        Document::parse_bytes_with_opts(bytes, ReadOptions::default())
    }

    pub fn parse_bytes_with_opts(bytes: &[u8], opts: ReadOptions) -> Result<Document> {
        parser::parse(bytes, opts)
    }

    /// Reads all of `reader`, then parses it like [`Document::parse_bytes`].
    pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
        Document::parse_reader_with_opts(reader, ReadOptions::default())
    }

    pub fn parse_reader_with_opts<R: Read>(mut reader: R, opts: ReadOptions) -> Result<Document> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        parser::parse(&bytes, opts)
    }
}

// Write
impl Document {
    /// Writes document as a formatted xml string.
    pub fn write_str(&self) -> Result<String> {
        self.write_str_with_opts(&WriteOptions::default())
    }

    pub fn write_str_with_opts(&self, opts: &WriteOptions) -> Result<String> {
        let mut buf: Vec<u8> = Vec::with_capacity(200);
        self.write(&mut buf, opts)?;
        String::from_utf8(buf).map_err(|_| Error::CannotDecode)
    }

    /// Write document to writer. Will be written in UTF-8, without an XML declaration.
    pub fn write(&self, writer: &mut impl Write, opts: &WriteOptions) -> Result<()> {
        if opts.formatted {
            let mut writer = Writer::new_with_indent(writer, b' ', opts.indent);
            self.write_element(&mut writer, self.root)
        } else {
            let mut writer = Writer::new(writer);
            self.write_element(&mut writer, self.root)
        }
    }

    fn write_element(&self, writer: &mut Writer<impl Write>, node: Node) -> Result<()> {
        let name = node.name(self);
        let mut start = BytesStart::new(name);
        for (key, value) in node.attributes(self) {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        let text = node.text(self).filter(|text| !text.is_empty());
        if text.is_none() && !node.has_children(self) {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        if let Some(text) = text {
            // Mixed content: text and each child get their own line.
            let mixed = node.has_children(self);
            if mixed {
                writer.write_indent()?;
            }
            // Captured XHTML is already markup.
            let event = if node.is_xhtml(self) {
                BytesText::from_escaped(text)
            } else {
                BytesText::new(text)
            };
            writer.write_event(Event::Text(event))?;
            if mixed {
                writer.write_indent()?;
            }
        }
        for child in node.children(self) {
            self.write_element(writer, *child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse_str(s)
    }
}

/// Owned description of an element, turned into a [`Document`] with
/// [`ElementBuilder::into_document`].
///
/// ```
/// use feed_codec::ElementBuilder;
///
/// let doc = ElementBuilder::new("item")
///     .attribute("id", "1")
///     .child(ElementBuilder::new("name").text("Item 1"))
///     .into_document();
/// assert_eq!(doc.write_str().unwrap(), "<item id=\"1\">\n  <name>Item 1</name>\n</item>");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementBuilder {
    pub(crate) name: String,
    pub(crate) text: Option<String>,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) children: Vec<ElementBuilder>,
    markup: bool,
}

impl ElementBuilder {
    pub fn new<S: Into<String>>(name: S) -> ElementBuilder {
        ElementBuilder {
            name: name.into(),
            ..ElementBuilder::default()
        }
    }

    pub fn attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Text that is escaped when written.
    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = Some(text.into());
        self.markup = false;
        self
    }

    /// Text that is already escaped markup, written as is.
    /// The element reads back as XHTML, like a captured `type="xhtml"` element.
    pub fn markup<S: Into<String>>(mut self, markup: S) -> Self {
        self.text = Some(markup.into());
        self.markup = true;
        self
    }

    /// Appends `child` after the children already added.
    pub fn child(mut self, child: ElementBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn into_document(self) -> Document {
        let mut store = Vec::new();
        let root = self.insert_into(&mut store, None);
        Document::from_parts(store, root)
    }

    fn insert_into(self, store: &mut Vec<NodeData>, parent: Option<Node>) -> Node {
        let node = Node::new(store.len());
        let mut data = NodeData::new(self.name, self.attributes, self.markup);
        data.text = self.text;
        data.parent = parent;
        store.push(data);
        for child in self.children {
            let child = child.insert_into(store, Some(node));
            store[node.index()].children.push(child);
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_links_parents() {
        let doc = ElementBuilder::new("author")
            .child(ElementBuilder::new("name").text("A"))
            .child(ElementBuilder::new("name").text("B"))
            .into_document();
        let author = doc.root();
        assert_eq!(doc.len(), 3);
        let names: Vec<_> = author.find_all(&doc, "name").collect();
        assert_eq!(names.len(), 2);
        for name in names {
            assert_eq!(name.parent(&doc), Some(author));
        }
    }

    #[test]
    fn test_builder_markup_is_raw() {
        let doc = ElementBuilder::new("content")
            .attribute("type", "xhtml")
            .markup("<p>Hi</p>")
            .into_document();
        assert!(doc.root().is_xhtml(&doc));
        assert_eq!(
            doc.write_str().unwrap(),
            r#"<content type="xhtml"><p>Hi</p></content>"#
        );
    }

    #[test]
    fn test_builder_text_is_escaped_under_xhtml_type() {
        let doc = ElementBuilder::new("content")
            .attribute("type", "xhtml")
            .text("Fish & Chips")
            .into_document();
        assert!(!doc.root().is_xhtml(&doc));
        let written = doc.write_str().unwrap();
        assert_eq!(written, r#"<content type="xhtml">Fish &amp; Chips</content>"#);

        // Read back, the text is captured as markup.
        let reread = Document::parse_str(&written).unwrap();
        assert_eq!(reread.root().text(&reread), Some("Fish &amp; Chips"));
    }

    #[test]
    fn test_document_is_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Document>();
    }
}
