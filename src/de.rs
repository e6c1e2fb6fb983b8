use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::Node;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, Deserialize, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use std::any::type_name;
use std::str::FromStr;

/// Coding key of an element's attribute map, decoded as a nested struct or map.
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Coding key of an element's own text, for shapes pairing text with attributes.
/// Consulted after attributes and children of the same name.
pub const TEXT_KEY: &str = "value";

/// Decodes the root element of `document` as `T`.
///
/// String fields may borrow from the document.
pub fn from_document<'d, T: Deserialize<'d>>(document: &'d Document) -> Result<T> {
    T::deserialize(Deserializer::new(document, document.root()))
}

/// What a coding key resolved to on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'d> {
    Attribute { name: &'d str, value: &'d str },
    /// First child element with the key's name.
    Element(Node),
    /// The element's attribute map, under [`ATTRIBUTES_KEY`].
    Attributes,
    /// The element's own text, under [`TEXT_KEY`].
    Text(&'d str),
}

/// Field-by-field view of one element.
#[derive(Debug, Clone, Copy)]
pub struct KeyedContainer<'d> {
    document: &'d Document,
    node: Node,
}

impl<'d> KeyedContainer<'d> {
    pub fn new(document: &'d Document, node: Node) -> KeyedContainer<'d> {
        KeyedContainer { document, node }
    }

    pub fn node(&self) -> Node {
        self.node
    }

    /// Resolves `key` to an attribute, then a child element, then the
    /// element's text if `key` is [`TEXT_KEY`].
    pub fn resolve(&self, key: &str) -> Option<Entry<'d>> {
        if key == ATTRIBUTES_KEY {
            let has_attributes = !self.node.attributes(self.document).is_empty();
            return has_attributes.then_some(Entry::Attributes);
        }
        if let Some(entry) = self.attribute_entry(key) {
            return Some(entry);
        }
        if let Some(child) = self.node.find(self.document, key) {
            return Some(Entry::Element(child));
        }
        if key == TEXT_KEY {
            return self.node.text(self.document).map(Entry::Text);
        }
        None
    }

    fn attribute_entry(&self, key: &str) -> Option<Entry<'d>> {
        self.node
            .attributes(self.document)
            .get_key_value(key)
            .map(|(name, value)| Entry::Attribute {
                name: name.as_str(),
                value: value.as_str(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// # Errors
    ///
    /// - [`Error::KeyNotFound`]: `key` resolved to nothing.
    pub fn decode<T: Deserialize<'d>>(&self, key: &str) -> Result<T> {
        match self.resolve(key) {
            Some(entry) => T::deserialize(self.entry_deserializer(entry)),
            None => Err(self.key_not_found(key)),
        }
    }

    /// `Ok(None)` when `key` resolves to nothing.
    pub fn decode_if_present<T: Deserialize<'d>>(&self, key: &str) -> Result<Option<T>> {
        self.resolve(key)
            .map(|entry| T::deserialize(self.entry_deserializer(entry)))
            .transpose()
    }

    pub fn nested_keyed(&self, key: &str) -> Result<KeyedContainer<'d>> {
        match self.resolve(key) {
            Some(Entry::Element(child)) => Ok(KeyedContainer::new(self.document, child)),
            Some(_) => Err(Error::TypeMismatch {
                expected: "element".to_string(),
                path: format!("{}/{}", self.node.path(self.document), key),
            }),
            None => Err(self.key_not_found(key)),
        }
    }

    /// Every child element named `key`. Empty if there is none.
    pub fn nested_unkeyed(&self, key: &str) -> UnkeyedContainer<'d> {
        match self.node.find(self.document, key) {
            Some(child) => UnkeyedContainer::repeated(self.document, child),
            None => UnkeyedContainer {
                document: self.document,
                parent: Some(self.node),
                name: key.to_owned(),
                nodes: Vec::new(),
                index: 0,
            },
        }
    }

    /// The element's own text.
    pub fn single_value(&self) -> SingleValueContainer<'d> {
        SingleValueContainer::text_of(self.document, self.node)
    }

    fn entry_deserializer(&self, entry: Entry<'d>) -> Deserializer<'d> {
        let source = match entry {
            Entry::Attribute { name, value } => Source::Attribute {
                node: self.node,
                name,
                value,
            },
            Entry::Element(child) => Source::Element {
                node: child,
                repeated: true,
            },
            Entry::Attributes => Source::Attributes(self.node),
            Entry::Text(_) => Source::Text(self.node),
        };
        Deserializer {
            document: self.document,
            source,
        }
    }

    fn key_not_found(&self, key: &str) -> Error {
        Error::KeyNotFound {
            key: key.to_owned(),
            path: self.node.path(self.document),
        }
    }
}

/// Cursor over identically named sibling elements, in document order.
#[derive(Debug, Clone)]
pub struct UnkeyedContainer<'d> {
    document: &'d Document,
    parent: Option<Node>,
    name: String,
    nodes: Vec<Node>,
    index: usize,
}

impl<'d> UnkeyedContainer<'d> {
    /// `node` and every sibling sharing its name, found through its parent.
    /// The root has no siblings, so its container is empty.
    pub fn repeated(document: &'d Document, node: Node) -> UnkeyedContainer<'d> {
        let name = node.name(document);
        let parent = node.parent(document);
        let nodes = match parent {
            Some(parent) => parent.find_all(document, name).collect(),
            None => Vec::new(),
        };
        UnkeyedContainer {
            document,
            parent,
            name: name.to_owned(),
            nodes,
            index: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.nodes.len()
    }

    fn path(&self) -> String {
        match self.parent {
            Some(parent) => format!(
                "{}/{}[{}]",
                parent.path(self.document),
                self.name,
                self.index
            ),
            None => format!("{}[{}]", self.name, self.index),
        }
    }

    fn current(&self) -> Result<Node> {
        self.nodes
            .get(self.index)
            .copied()
            .ok_or_else(|| Error::EndOfContainer { path: self.path() })
    }

    /// Decodes the element under the cursor, then advances.
    ///
    /// # Errors
    ///
    /// - [`Error::EndOfContainer`]: Every element was already decoded.
    pub fn decode<T: Deserialize<'d>>(&mut self) -> Result<T> {
        let node = self.current()?;
        let value = T::deserialize(Deserializer::element(self.document, node))?;
        self.index += 1;
        Ok(value)
    }
}

impl<'d> SeqAccess<'d> for UnkeyedContainer<'d> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'d>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let node = self.current()?;
        let value = seed.deserialize(Deserializer::element(self.document, node))?;
        self.index += 1;
        Ok(Some(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.nodes.len() - self.index)
    }
}

/// Text of an element or attribute, parsed as a primitive.
#[derive(Debug, Clone, Copy)]
pub struct SingleValueContainer<'d> {
    document: &'d Document,
    node: Node,
    attribute: Option<&'d str>,
    text: Option<&'d str>,
}

impl<'d> SingleValueContainer<'d> {
    pub fn text_of(document: &'d Document, node: Node) -> SingleValueContainer<'d> {
        SingleValueContainer {
            document,
            node,
            attribute: None,
            text: node.text(document),
        }
    }

    fn attribute(
        document: &'d Document,
        node: Node,
        name: &'d str,
        value: &'d str,
    ) -> SingleValueContainer<'d> {
        SingleValueContainer {
            document,
            node,
            attribute: Some(name),
            text: Some(value),
        }
    }

    pub fn text(&self) -> Option<&'d str> {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
    }

    /// `rss/channel/ttl`, or `rss/channel/image/@width` for attributes.
    pub fn path(&self) -> String {
        let path = self.node.path(self.document);
        match self.attribute {
            Some(name) => format!("{}/@{}", path, name),
            None => path,
        }
    }

    /// Parses the trimmed text with `T`'s `FromStr`, which is
    /// locale-independent and base 10 for every primitive.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`]: The text is absent or not a valid `T`.
    pub fn decode<T: FromStr>(&self) -> Result<T> {
        self.text
            .unwrap_or("")
            .trim()
            .parse::<T>()
            .map_err(|_| Error::TypeMismatch {
                expected: type_name::<T>().to_string(),
                path: self.path(),
            })
    }

    pub fn decode_if_present<T: FromStr>(&self) -> Result<Option<T>> {
        match self.text {
            Some(_) => self.decode().map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Source<'d> {
    /// Sequences are only offered for elements reached through a key.
    Element { node: Node, repeated: bool },
    Attribute {
        node: Node,
        name: &'d str,
        value: &'d str,
    },
    Text(Node),
    Attributes(Node),
}

/// serde `Deserializer` bound to a node of a [`Document`].
///
/// Structs resolve each declared field through a [`KeyedContainer`] and skip
/// fields that resolve to nothing, so `Option` fields become `None` and
/// `Vec` fields need `#[serde(default)]`. Sequences come from an
/// [`UnkeyedContainer`], primitives from a [`SingleValueContainer`].
#[derive(Debug, Clone, Copy)]
pub struct Deserializer<'d> {
    document: &'d Document,
    source: Source<'d>,
}

impl<'d> Deserializer<'d> {
    pub fn new(document: &'d Document, node: Node) -> Deserializer<'d> {
        Deserializer {
            document,
            source: Source::Element {
                node,
                repeated: true,
            },
        }
    }

    fn element(document: &'d Document, node: Node) -> Deserializer<'d> {
        Deserializer {
            document,
            source: Source::Element {
                node,
                repeated: false,
            },
        }
    }

    fn path(&self) -> String {
        match self.source {
            Source::Element { node, .. } | Source::Text(node) => node.path(self.document),
            Source::Attribute { node, name, .. } => {
                format!("{}/@{}", node.path(self.document), name)
            }
            Source::Attributes(node) => format!("{}/{}", node.path(self.document), ATTRIBUTES_KEY),
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch {
            expected: expected.to_string(),
            path: self.path(),
        }
    }

    fn single_value(&self) -> Result<SingleValueContainer<'d>> {
        match self.source {
            Source::Element { node, .. } | Source::Text(node) => {
                Ok(SingleValueContainer::text_of(self.document, node))
            }
            Source::Attribute { node, name, value } => Ok(SingleValueContainer::attribute(
                self.document,
                node,
                name,
                value,
            )),
            Source::Attributes(_) => Err(self.mismatch("text")),
        }
    }

    fn text(&self) -> Result<&'d str> {
        Ok(self.single_value()?.text().unwrap_or(""))
    }

    fn parse<T: FromStr>(&self) -> Result<T> {
        self.single_value()?.decode()
    }

    fn entries(&self) -> Result<EntriesAccess<'d>> {
        let document = self.document;
        let mut entries = Vec::new();
        match self.source {
            Source::Element { node, .. } => {
                if !node.attributes(document).is_empty() {
                    entries.push((ATTRIBUTES_KEY, Source::Attributes(node)));
                }
                for &child in node.children(document) {
                    let source = Source::Element {
                        node: child,
                        repeated: true,
                    };
                    entries.push((child.name(document), source));
                }
                if node.text(document).is_some() {
                    entries.push((TEXT_KEY, Source::Text(node)));
                }
            }
            Source::Attributes(node) => {
                for (name, value) in node.attributes(document) {
                    let source = Source::Attribute {
                        node,
                        name: name.as_str(),
                        value: value.as_str(),
                    };
                    entries.push((name.as_str(), source));
                }
            }
            _ => return Err(self.mismatch("element")),
        }
        Ok(EntriesAccess {
            document,
            entries: entries.into_iter(),
            pending: None,
        })
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident,)*) => {
        $(
            fn $method<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
                visitor.$visit(self.parse()?)
            }
        )*
    };
}

impl<'d> de::Deserializer<'d> for Deserializer<'d> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        match self.source {
            Source::Element { node, .. }
                if node.has_children(self.document)
                    || !node.attributes(self.document).is_empty() =>
            {
                visitor.visit_map(self.entries()?)
            }
            Source::Attributes(_) => visitor.visit_map(self.entries()?),
            _ => visitor.visit_borrowed_str(self.text()?),
        }
    }

    deserialize_parsed! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_i128 => visit_i128,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_u128 => visit_u128,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
    }

    // A lone whitespace char is kept as is, anything longer is trimmed.
    fn deserialize_char<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        let mut chars = self.text()?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => visitor.visit_char(self.parse()?),
        }
    }

    fn deserialize_str<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.text()?)
    }

    fn deserialize_string<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.text()?.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    // Absent keys never reach a deserializer. An element with no text,
    // children or attributes (`<ttl></ttl>`, `<link/>`) is `None`.
    fn deserialize_option<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        match self.source {
            Source::Element { node, .. }
                if node.text(self.document).is_none()
                    && !node.has_children(self.document)
                    && node.attributes(self.document).is_empty() =>
            {
                visitor.visit_none()
            }
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'d>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'d>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        match self.source {
            Source::Element {
                node,
                repeated: true,
            } => visitor.visit_seq(UnkeyedContainer::repeated(self.document, node)),
            Source::Element { .. } => Err(self.mismatch("element, not a nested sequence")),
            _ => Err(self.mismatch("repeated element")),
        }
    }

    fn deserialize_tuple<V: Visitor<'d>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'d>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(self.entries()?)
    }

    fn deserialize_struct<V: Visitor<'d>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let (node, attributes_only) = match self.source {
            Source::Element { node, .. } => (node, false),
            Source::Attributes(node) => (node, true),
            _ => return Err(self.mismatch(name)),
        };
        visitor.visit_map(KeyedAccess {
            container: KeyedContainer::new(self.document, node),
            fields: fields.iter(),
            attributes_only,
            pending: None,
        })
    }

    /// Unit variants, named by the text.
    fn deserialize_enum<V: Visitor<'d>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let text = self.text()?.trim();
        visitor.visit_enum(BorrowedStrDeserializer::<Error>::new(text))
    }

    fn deserialize_identifier<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'d>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

struct KeyedAccess<'d> {
    container: KeyedContainer<'d>,
    fields: std::slice::Iter<'static, &'static str>,
    attributes_only: bool,
    pending: Option<Entry<'d>>,
}

impl<'d> MapAccess<'d> for KeyedAccess<'d> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'d>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        for &field in self.fields.by_ref() {
            let entry = if self.attributes_only {
                self.container.attribute_entry(field)
            } else {
                self.container.resolve(field)
            };
            if let Some(entry) = entry {
                self.pending = Some(entry);
                return seed
                    .deserialize(BorrowedStrDeserializer::<Error>::new(field))
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'d>>(&mut self, seed: V) -> Result<V::Value> {
        match self.pending.take() {
            Some(entry) => seed.deserialize(self.container.entry_deserializer(entry)),
            None => Err(Error::Message("value requested before its key".to_string())),
        }
    }
}

struct EntriesAccess<'d> {
    document: &'d Document,
    entries: std::vec::IntoIter<(&'d str, Source<'d>)>,
    pending: Option<Source<'d>>,
}

impl<'d> MapAccess<'d> for EntriesAccess<'d> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'d>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.entries.next() {
            Some((key, source)) => {
                self.pending = Some(source);
                seed.deserialize(BorrowedStrDeserializer::<Error>::new(key))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'d>>(&mut self, seed: V) -> Result<V::Value> {
        match self.pending.take() {
            Some(source) => seed.deserialize(Deserializer {
                document: self.document,
                source,
            }),
            None => Err(Error::Message("value requested before its key".to_string())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}
