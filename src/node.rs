use crate::document::Document;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeData {
    pub(crate) name: String,
    pub(crate) text: Option<String>,
    pub(crate) attributes: IndexMap<String, String>, // source order
    pub(crate) parent: Option<Node>,
    pub(crate) children: Vec<Node>,
    pub(crate) is_xhtml: bool,
}

impl NodeData {
    pub(crate) fn new(name: String, attributes: IndexMap<String, String>, is_xhtml: bool) -> Self {
        NodeData {
            name,
            text: None,
            attributes,
            parent: None,
            children: Vec::new(),
            is_xhtml,
        }
    }
}

/// Represents an element of a parsed or encoded [`Document`].
///
/// This struct only contains a unique usize id and implements trait `Copy`.
/// The actual data lives in the [`Document`] arena,
/// so every method takes `&Document` as its first argument.
///
/// # Panics
///
/// Methods panic if the node is used with a document it doesn't belong to
/// and its id is out of that document's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    id: usize,
}

impl Node {
    pub(crate) fn new(id: usize) -> Node {
        Node { id }
    }

    pub(crate) fn index(&self) -> usize {
        self.id
    }

    fn data<'a>(&self, document: &'a Document) -> &'a NodeData {
        &document.store[self.id]
    }

    /// Raw element name, including any namespace prefix.
    pub fn name<'a>(&self, document: &'a Document) -> &'a str {
        &self.data(document).name
    }

    /// Trimmed text content. `None` if the element had no text,
    /// or only whitespace.
    ///
    /// For XHTML nodes this is the captured markup.
    pub fn text<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.data(document).text.as_deref()
    }

    /// Attributes in source order.
    pub fn attributes<'a>(&self, document: &'a Document) -> &'a IndexMap<String, String> {
        &self.data(document).attributes
    }

    pub fn attribute<'a>(&self, document: &'a Document, name: &str) -> Option<&'a str> {
        self.attributes(document).get(name).map(String::as_str)
    }

    pub fn parent(&self, document: &Document) -> Option<Node> {
        self.data(document).parent
    }

    pub fn is_root(&self, document: &Document) -> bool {
        document.root() == *self
    }

    pub fn is_xhtml(&self, document: &Document) -> bool {
        self.data(document).is_xhtml
    }

    /// Child elements in document order.
    pub fn children<'a>(&self, document: &'a Document) -> &'a [Node] {
        &self.data(document).children
    }

    pub fn has_children(&self, document: &Document) -> bool {
        !self.children(document).is_empty()
    }

    /// First child element named `name`.
    pub fn find(&self, document: &Document, name: &str) -> Option<Node> {
        self.children(document)
            .iter()
            .copied()
            .find(|child| child.name(document) == name)
    }

    /// Every child element named `name`, in document order.
    pub fn find_all<'a>(
        &self,
        document: &'a Document,
        name: &'a str,
    ) -> impl Iterator<Item = Node> + 'a {
        self.children(document)
            .iter()
            .copied()
            .filter(move |child| child.name(document) == name)
    }

    /// Element names from the root down to this node, joined by `/`.
    ///
    /// `<rss><channel><title>` -> `"rss/channel/title"`
    pub fn path(&self, document: &Document) -> String {
        let mut names = vec![self.name(document)];
        let mut node = *self;
        while let Some(parent) = node.parent(document) {
            names.push(parent.name(document));
            node = parent;
        }
        names.reverse();
        names.join("/")
    }
}
