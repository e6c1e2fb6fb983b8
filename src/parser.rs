use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeData};
use crate::ReadOptions;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use indexmap::IndexMap;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::fmt::Write;
use tracing::{debug, trace};

/// Single-pass stack machine folding tokenizer events into a [`Document`].
///
/// Drive it with [`start`](TreeBuilder::start), [`characters`](TreeBuilder::characters),
/// [`cdata`](TreeBuilder::cdata) and [`end`](TreeBuilder::end), report tokenizer
/// failures with [`error`](TreeBuilder::error), then call [`finish`](TreeBuilder::finish).
///
/// ```
/// use feed_codec::TreeBuilder;
/// use indexmap::IndexMap;
///
/// let mut builder = TreeBuilder::new();
/// builder.start("title", IndexMap::new());
/// builder.characters("  Hello ");
/// builder.end("title");
/// let doc = builder.finish().unwrap();
/// assert_eq!(doc.root().text(&doc), Some("Hello"));
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    opts: ReadOptions,
    store: Vec<NodeData>,
    stack: Vec<Node>,
    error: Option<Error>,
    complete: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        TreeBuilder::new()
    }
}

impl TreeBuilder {
    pub fn new() -> TreeBuilder {
        TreeBuilder::with_options(ReadOptions::default())
    }

    pub fn with_options(opts: ReadOptions) -> TreeBuilder {
        TreeBuilder {
            opts,
            store: Vec::new(),
            stack: Vec::new(),
            error: None,
            complete: false,
        }
    }

    /// The root element has closed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// An error was recorded and further events are ignored.
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    fn accepts_events(&self) -> bool {
        if self.complete || self.error.is_some() {
            trace!("ignoring event after the parse finished");
            return false;
        }
        true
    }

    fn data_mut(&mut self, node: Node) -> &mut NodeData {
        &mut self.store[node.index()]
    }

    fn push(&mut self, name: &str, attributes: IndexMap<String, String>, is_xhtml: bool) {
        let node = Node::new(self.store.len());
        self.store
            .push(NodeData::new(name.to_owned(), attributes, is_xhtml));
        self.stack.push(node);
    }

    /// Top of the stack, if it is capturing XHTML.
    fn capturing(&self) -> Option<Node> {
        self.stack
            .last()
            .copied()
            .filter(|node| self.store[node.index()].is_xhtml)
    }

    fn stack_path(&self) -> String {
        let names: Vec<&str> = self
            .stack
            .iter()
            .map(|node| self.store[node.index()].name.as_str())
            .collect();
        names.join("/")
    }

    pub fn start(&mut self, name: &str, attributes: IndexMap<String, String>) {
        if !self.accepts_events() {
            return;
        }
        let is_xhtml =
            self.opts.capture_xhtml && attributes.get("type").is_some_and(|t| t == "xhtml");
        if is_xhtml {
            self.push(name, attributes, true);
        } else if let Some(top) = self.capturing() {
            let mut tag = format!("<{}", name);
            for (key, value) in &attributes {
                let _ = write!(tag, " {}=\"{}\"", key, escape(value.as_str()));
            }
            tag.push('>');
            append_text(&mut self.data_mut(top).text, &tag);
        } else {
            self.push(name, attributes, false);
        }
    }

    /// Appends character data to the open element. May be called several
    /// times per element.
    pub fn characters(&mut self, text: &str) {
        if !self.accepts_events() || text.is_empty() {
            return;
        }
        let Some(&top) = self.stack.last() else {
            return;
        };
        let data = self.data_mut(top);
        if data.is_xhtml {
            let escaped = partial_escape(text);
            append_text(&mut data.text, &escaped);
        } else {
            append_text(&mut data.text, text);
        }
    }

    /// Same as [`characters`](TreeBuilder::characters) once `bytes` are
    /// decoded as UTF-8. Invalid UTF-8 aborts the parse.
    pub fn cdata(&mut self, bytes: &[u8]) {
        if !self.accepts_events() {
            return;
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => self.characters(text),
            Err(_) => {
                let path = self.stack_path();
                debug!(%path, "CDATA block is not valid UTF-8");
                self.error = Some(Error::CdataDecoding { path });
            }
        }
    }

    pub fn end(&mut self, name: &str) {
        if !self.accepts_events() {
            return;
        }
        let Some(&top) = self.stack.last() else {
            return;
        };
        let data = self.data_mut(top);
        if data.is_xhtml && data.name != name {
            append_text(&mut data.text, &format!("</{}>", name));
            return;
        }
        data.text = data
            .text
            .take()
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        if self.stack.len() > 1 {
            if let Some(node) = self.stack.pop() {
                // The new top is the parent.
                let parent = self.stack[self.stack.len() - 1];
                self.data_mut(node).parent = Some(parent);
                self.data_mut(parent).children.push(node);
            }
        } else {
            debug!(root = name, "root element closed");
            self.complete = true;
        }
    }

    /// Records a tokenizer failure.
    ///
    /// Once the root has closed the failure is ignored
    /// unless [`ReadOptions::ignore_trailing_content`] is off.
    pub fn error<S: Into<String>>(&mut self, reason: S) {
        let reason = reason.into();
        if self.complete && self.opts.ignore_trailing_content {
            debug!(%reason, "ignoring error after the root element closed");
            return;
        }
        if self.error.is_none() {
            self.error = Some(Error::Unexpected { reason });
        }
    }

    pub fn finish(self) -> Result<Document> {
        if let Some(error) = self.error {
            return Err(error);
        }
        match self.stack.as_slice() {
            [root] if self.complete => Ok(Document::from_parts(self.store, *root)),
            _ => Err(Error::Unexpected {
                reason: "document ended before the root element closed".to_string(),
            }),
        }
    }
}

fn append_text(text: &mut Option<String>, more: &str) {
    text.get_or_insert_with(String::new).push_str(more);
}

/// Tokenizes `bytes` with quick-xml and builds the document.
pub(crate) fn parse(bytes: &[u8], opts: ReadOptions) -> Result<Document> {
    let input = decode_input(bytes)?;
    let mut reader = Reader::from_reader(&*input);
    reader.config_mut().expand_empty_elements = true;

    let mut builder = TreeBuilder::with_options(opts);
    let mut buf = Vec::with_capacity(200);
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref start)) => match start_parts(&reader, start) {
                Ok((name, attributes)) => builder.start(&name, attributes),
                Err(err) => {
                    builder.error(err.to_string());
                    break;
                }
            },
            Ok(Event::End(ref end)) => match std::str::from_utf8(end.name().as_ref()) {
                Ok(name) => builder.end(name),
                Err(err) => {
                    builder.error(err.to_string());
                    break;
                }
            },
            Ok(Event::Text(ref text)) => match text.unescape() {
                Ok(text) => builder.characters(&text),
                Err(err) => {
                    builder.error(err.to_string());
                    break;
                }
            },
            // CDATA content is not escaped.
            Ok(Event::CData(ref cdata)) => builder.cdata(cdata),
            Ok(Event::Eof) => break,
            Ok(event) => trace!(?event, "skipping event"),
            Err(err) => {
                builder.error(err.to_string());
                break;
            }
        }
        if builder.is_aborted() {
            break;
        }
        buf.clear();
    }
    builder.finish()
}

fn start_parts(
    reader: &Reader<&[u8]>,
    start: &BytesStart,
) -> Result<(String, IndexMap<String, String>)> {
    let name = String::from_utf8(start.name().as_ref().to_vec()).map_err(|_| Error::CannotDecode)?;
    let mut attributes = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8(attr.key.as_ref().to_vec()).map_err(|_| Error::CannotDecode)?;
        let value = attr.decode_and_unescape_value(reader.decoder())?;
        attributes.insert(key, value.into_owned());
    }
    Ok((name, attributes))
}

/// Returns the input as UTF-8 bytes, transcoding when the byte order mark,
/// the first bytes or the declaration say otherwise.
///
/// UTF-8 input is passed through untouched so invalid CDATA bytes
/// still reach the tree builder.
fn decode_input(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => match bytes {
            [0x00, 0x3c, 0x00, 0x3f, ..] => (UTF_16BE, bytes),
            [0x3c, 0x00, 0x3f, 0x00, ..] => (UTF_16LE, bytes),
            _ => (declared_encoding(bytes)?.unwrap_or(UTF_8), bytes),
        },
    };
    if encoding == UTF_8 {
        return Ok(Cow::Borrowed(body));
    }
    debug!(encoding = encoding.name(), "transcoding input to UTF-8");
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(Error::CannotDecode);
    }
    Ok(Cow::Owned(text.into_owned().into_bytes()))
}

fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>> {
    let mut reader = Reader::from_reader(bytes);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => match decl.encoding() {
            Some(label) => {
                let label = label.map_err(quick_xml::Error::from)?;
                Encoding::for_label(&label)
                    .map(Some)
                    .ok_or(Error::CannotDecode)
            }
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_characters_concatenate_and_trim() {
        let mut builder = TreeBuilder::new();
        builder.characters("before root");
        builder.start("title", IndexMap::new());
        builder.characters("\n  Hello");
        builder.characters("");
        builder.characters(", ");
        builder.cdata(b"World  \n");
        builder.end("title");
        let doc = builder.finish().unwrap();
        assert_eq!(doc.root().text(&doc), Some("Hello, World"));
    }

    #[test]
    fn test_whitespace_text_collapses() {
        let mut builder = TreeBuilder::new();
        builder.start("channel", IndexMap::new());
        builder.characters("\n    ");
        builder.start("title", IndexMap::new());
        builder.end("title");
        builder.end("channel");
        let doc = builder.finish().unwrap();
        let channel = doc.root();
        assert_eq!(channel.text(&doc), None);
        assert_eq!(channel.children(&doc)[0].text(&doc), None);
    }

    #[test]
    fn test_children_keep_document_order() {
        let mut builder = TreeBuilder::new();
        builder.start("author", IndexMap::new());
        for name in ["A", "B", "C"] {
            builder.start("name", IndexMap::new());
            builder.characters(name);
            builder.end("name");
        }
        builder.end("author");
        let doc = builder.finish().unwrap();
        let names: Vec<_> = doc
            .root()
            .children(&doc)
            .iter()
            .map(|n| n.text(&doc).unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_xhtml_capture() {
        let mut builder = TreeBuilder::new();
        builder.start("entry", IndexMap::new());
        builder.start("content", attrs(&[("type", "xhtml")]));
        builder.start("div", attrs(&[("class", "a\"b")]));
        builder.characters("1 < 2");
        builder.start("br", IndexMap::new());
        builder.end("br");
        builder.end("div");
        builder.end("content");
        builder.end("entry");
        let doc = builder.finish().unwrap();
        let content = doc.root().children(&doc)[0];
        assert!(content.is_xhtml(&doc));
        assert!(!content.has_children(&doc));
        assert_eq!(content.attribute(&doc, "type"), Some("xhtml"));
        assert_eq!(
            content.text(&doc),
            Some(r#"<div class="a&quot;b">1 &lt; 2<br></br></div>"#)
        );
    }

    #[test]
    fn test_xhtml_capture_disabled() {
        let opts = ReadOptions {
            capture_xhtml: false,
            ..ReadOptions::default()
        };
        let mut builder = TreeBuilder::with_options(opts);
        builder.start("content", attrs(&[("type", "xhtml")]));
        builder.start("div", IndexMap::new());
        builder.end("div");
        builder.end("content");
        let doc = builder.finish().unwrap();
        assert!(!doc.root().is_xhtml(&doc));
        assert_eq!(doc.root().children(&doc).len(), 1);
    }

    #[test]
    fn test_invalid_cdata_aborts() {
        let mut builder = TreeBuilder::new();
        builder.start("rss", IndexMap::new());
        builder.start("description", IndexMap::new());
        builder.cdata(&[0x66, 0xff, 0xfe]);
        assert!(builder.is_aborted());
        builder.end("description");
        builder.end("rss");
        match builder.finish() {
            Err(Error::CdataDecoding { path }) => assert_eq!(path, "rss/description"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_after_completion_is_ignored() {
        let mut builder = TreeBuilder::new();
        builder.start("rss", IndexMap::new());
        builder.end("rss");
        assert!(builder.is_complete());
        builder.error("junk after document element");
        builder.start("junk", IndexMap::new());
        builder.characters("[]");
        let doc = builder.finish().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.root().text(&doc), None);
    }

    #[test]
    fn test_error_after_completion_when_strict() {
        let opts = ReadOptions {
            ignore_trailing_content: false,
            ..ReadOptions::default()
        };
        let mut builder = TreeBuilder::with_options(opts);
        builder.start("rss", IndexMap::new());
        builder.end("rss");
        builder.error("junk after document element");
        assert!(matches!(builder.finish(), Err(Error::Unexpected { .. })));
    }

    #[test]
    fn test_error_before_completion_fails() {
        let mut builder = TreeBuilder::new();
        builder.start("rss", IndexMap::new());
        builder.error("unexpected end of input");
        builder.end("rss");
        match builder.finish() {
            Err(Error::Unexpected { reason }) => assert_eq!(reason, "unexpected end of input"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_root_fails() {
        let mut builder = TreeBuilder::new();
        builder.start("rss", IndexMap::new());
        builder.start("channel", IndexMap::new());
        builder.end("channel");
        assert!(matches!(builder.finish(), Err(Error::Unexpected { .. })));

        let builder = TreeBuilder::new();
        assert!(matches!(builder.finish(), Err(Error::Unexpected { .. })));
    }

    #[test]
    fn test_decode_input_passes_utf8_through() {
        let bytes = "<a>é</a>".as_bytes();
        assert!(matches!(decode_input(bytes).unwrap(), Cow::Borrowed(_)));
        let with_bom = [&[0xef, 0xbb, 0xbf][..], bytes].concat();
        assert_eq!(&*decode_input(&with_bom).unwrap(), bytes);
    }

    #[test]
    fn test_decode_input_declared_encoding() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>".to_vec();
        bytes.push(0xe9);
        bytes.extend_from_slice(b"</a>");
        let decoded = decode_input(&bytes).unwrap();
        assert!(std::str::from_utf8(&decoded).unwrap().ends_with("<a>é</a>"));

        let unknown = b"<?xml version=\"1.0\" encoding=\"no-such-thing\"?><a/>";
        assert!(matches!(decode_input(unknown), Err(Error::CannotDecode)));
    }
}
