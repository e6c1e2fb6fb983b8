use crate::de::{ATTRIBUTES_KEY, TEXT_KEY};
use crate::document::{Document, ElementBuilder};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::ser::{
    Impossible, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeTuple,
    SerializeTupleStruct, Serializer,
};

/// Encodes `value` as a [`Document`] whose root element is named `root`.
///
/// Struct fields and map entries become child elements, except that
/// [`ATTRIBUTES_KEY`] fills the element's attributes and [`TEXT_KEY`] its
/// text. A sequence field repeats the field's element once per item.
/// `None` fields are omitted.
///
/// # Errors
///
/// - [`Error::Unsupported`]: Nested sequences, enum variants with data,
///   or raw bytes.
/// - [`Error::Unexpected`]: `value` produced no root element, or more than one.
///
/// # Examples
/// ```
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Author {
///     name: Vec<&'static str>,
///     email: Option<&'static str>,
/// }
///
/// let author = Author { name: vec!["A", "B"], email: None };
/// let doc = feed_codec::to_document(&author, "author").unwrap();
/// assert_eq!(
///     doc.write_str().unwrap(),
///     "<author>\n  <name>A</name>\n  <name>B</name>\n</author>"
/// );
/// ```
pub fn to_document<T: ?Sized + Serialize>(value: &T, root: &str) -> Result<Document> {
    let mut container = ElementBuilder::default();
    value.serialize(ElementSerializer {
        parent: &mut container,
        name: root,
        repeated: true,
    })?;
    let mut roots = container.children.into_iter();
    match (roots.next(), roots.next()) {
        (Some(element), None) => Ok(element.into_document()),
        (None, _) => Err(Error::Unexpected {
            reason: format!("`{}` encoded to no element", root),
        }),
        (Some(_), Some(_)) => Err(Error::Unexpected {
            reason: format!("`{}` encoded to more than one root element", root),
        }),
    }
}

macro_rules! text_scalars {
    ($($method:ident($ty:ty),)*) => {
        $(
            fn $method(self, v: $ty) -> Result<Option<String>> {
                Ok(Some(v.to_string()))
            }
        )*
    };
}

macro_rules! element_scalars {
    ($($method:ident($ty:ty),)*) => {
        $(
            fn $method(self, v: $ty) -> Result<()> {
                let text = TextSerializer.$method(v)?;
                self.push(text);
                Ok(())
            }
        )*
    };
}

macro_rules! reject {
    ($what:expr; $($method:ident($($arg:ty),*);)*) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<Self::Ok> {
                Err(Error::Unsupported($what))
            }
        )*
    };
}

/// Scalars to text. `None` means no text at all.
struct TextSerializer;

impl Serializer for TextSerializer {
    type Ok = Option<String>;
    type Error = Error;
    type SerializeSeq = Impossible<Option<String>, Error>;
    type SerializeTuple = Impossible<Option<String>, Error>;
    type SerializeTupleStruct = Impossible<Option<String>, Error>;
    type SerializeTupleVariant = Impossible<Option<String>, Error>;
    type SerializeMap = Impossible<Option<String>, Error>;
    type SerializeStruct = Impossible<Option<String>, Error>;
    type SerializeStructVariant = Impossible<Option<String>, Error>;

    text_scalars! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Option<String>> {
        Err(Error::Unsupported("raw bytes"))
    }

    fn serialize_none(self) -> Result<Option<String>> {
        Ok(None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Option<String>> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Option<String>> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Option<String>> {
        Ok(None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Option<String>> {
        Ok(Some(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Option<String>> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Option<String>> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::Unsupported("a sequence as text"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::Unsupported("a tuple as text"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::Unsupported("a tuple as text"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::Unsupported("a map as text"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Error::Unsupported("a struct as text"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }
}

/// Appends the element(s) for one value to `parent`.
struct ElementSerializer<'a> {
    parent: &'a mut ElementBuilder,
    name: &'a str,
    /// Items of a sequence can't be sequences themselves.
    repeated: bool,
}

impl ElementSerializer<'_> {
    fn push(self, text: Option<String>) {
        let mut element = ElementBuilder::new(self.name);
        element.text = text;
        self.parent.children.push(element);
    }
}

impl<'a> Serializer for ElementSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = StructSerializer<'a>;
    type SerializeStruct = StructSerializer<'a>;
    type SerializeStructVariant = Impossible<(), Error>;

    element_scalars! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(Error::Unsupported("raw bytes"))
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.push(None);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.push(Some(variant.to_owned()));
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqSerializer<'a>> {
        if !self.repeated {
            return Err(Error::Unsupported("nested sequences"));
        }
        Ok(SeqSerializer {
            parent: self.parent,
            name: self.name,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<StructSerializer<'a>> {
        Ok(StructSerializer {
            element: ElementBuilder::new(self.name),
            parent: self.parent,
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<StructSerializer<'a>> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }
}

struct SeqSerializer<'a> {
    parent: &'a mut ElementBuilder,
    name: &'a str,
}

impl SerializeSeq for SeqSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(ElementSerializer {
            parent: &mut *self.parent,
            name: self.name,
            repeated: false,
        })
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl SerializeTuple for SeqSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl SerializeTupleStruct for SeqSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Builds one element from struct fields or map entries, then appends it.
struct StructSerializer<'a> {
    parent: &'a mut ElementBuilder,
    element: ElementBuilder,
    key: Option<String>,
}

impl StructSerializer<'_> {
    fn write_field<T: ?Sized + Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        match key {
            ATTRIBUTES_KEY => value.serialize(AttributesSerializer {
                attributes: &mut self.element.attributes,
                key: None,
            }),
            TEXT_KEY => {
                if let Some(text) = value.serialize(TextSerializer)? {
                    self.element.text = Some(text);
                }
                Ok(())
            }
            _ => value.serialize(ElementSerializer {
                parent: &mut self.element,
                name: key,
                repeated: true,
            }),
        }
    }
}

impl SerializeStruct for StructSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.write_field(key, value)
    }

    fn end(self) -> Result<()> {
        self.parent.children.push(self.element);
        Ok(())
    }
}

impl SerializeMap for StructSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key = Some(text_key(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self.key.take().ok_or_else(|| Error::Message("value without key".to_string()))?;
        self.write_field(&key, value)
    }

    fn end(self) -> Result<()> {
        self.parent.children.push(self.element);
        Ok(())
    }
}

fn text_key<T: ?Sized + Serialize>(key: &T) -> Result<String> {
    key.serialize(TextSerializer)?
        .ok_or(Error::Unsupported("map keys without text"))
}

/// Fills an attribute map from a struct or map of scalars.
/// `None` values leave the attribute out.
struct AttributesSerializer<'a> {
    attributes: &'a mut IndexMap<String, String>,
    key: Option<String>,
}

impl AttributesSerializer<'_> {
    fn insert<T: ?Sized + Serialize>(&mut self, key: String, value: &T) -> Result<()> {
        if let Some(value) = value.serialize(TextSerializer)? {
            self.attributes.insert(key, value);
        }
        Ok(())
    }
}

impl<'a> Serializer for AttributesSerializer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = AttributesSerializer<'a>;
    type SerializeStruct = AttributesSerializer<'a>;
    type SerializeStructVariant = Impossible<(), Error>;

    reject! { "attributes other than a struct or map";
        serialize_bool(bool);
        serialize_i8(i8);
        serialize_i16(i16);
        serialize_i32(i32);
        serialize_i64(i64);
        serialize_u8(u8);
        serialize_u16(u16);
        serialize_u32(u32);
        serialize_u64(u64);
        serialize_f32(f32);
        serialize_f64(f64);
        serialize_char(char);
        serialize_str(&str);
        serialize_bytes(&[u8]);
        serialize_unit_variant(&'static str, u32, &'static str);
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::Unsupported("repeated attributes"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::Unsupported("repeated attributes"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::Unsupported("repeated attributes"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Unsupported("enum variants with data"))
    }
}

impl SerializeStruct for AttributesSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.insert(key.to_owned(), value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl SerializeMap for AttributesSerializer<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key = Some(text_key(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self.key.take().ok_or_else(|| Error::Message("value without key".to_string()))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteOptions;
    use pretty_assertions::assert_eq;
    use serde::Serialize;
    use std::collections::BTreeMap;

    fn compact(doc: &Document) -> String {
        doc.write_str_with_opts(&WriteOptions::compact()).unwrap()
    }

    #[derive(Serialize)]
    struct CategoryAttributes {
        domain: Option<String>,
    }

    #[derive(Serialize)]
    struct Category {
        #[serde(rename = "@attributes")]
        attributes: CategoryAttributes,
        value: String,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "lowercase")]
    enum Kind {
        Html,
    }

    #[derive(Serialize)]
    struct Item {
        title: String,
        author: Option<String>,
        kind: Kind,
        category: Vec<Category>,
        guid: (),
    }

    #[test]
    fn test_struct_layout() {
        let item = Item {
            title: "T".to_string(),
            author: None,
            kind: Kind::Html,
            category: vec![
                Category {
                    attributes: CategoryAttributes {
                        domain: Some("d".to_string()),
                    },
                    value: "a".to_string(),
                },
                Category {
                    attributes: CategoryAttributes { domain: None },
                    value: "b".to_string(),
                },
            ],
            guid: (),
        };
        let doc = to_document(&item, "item").unwrap();
        assert_eq!(
            compact(&doc),
            r#"<item><title>T</title><kind>html</kind><category domain="d">a</category><category>b</category><guid/></item>"#
        );
        let category = doc.root().find(&doc, "category").unwrap();
        assert_eq!(category.parent(&doc), Some(doc.root()));
    }

    #[test]
    fn test_root_count() {
        assert!(matches!(
            to_document(&Option::<u8>::None, "n"),
            Err(Error::Unexpected { .. })
        ));
        assert!(matches!(
            to_document(&vec![1, 2], "n"),
            Err(Error::Unexpected { .. })
        ));
        let doc = to_document(&vec![1], "n").unwrap();
        assert_eq!(compact(&doc), "<n>1</n>");
    }

    #[derive(Serialize)]
    struct Matrix {
        row: Vec<Vec<u8>>,
    }

    #[derive(Serialize)]
    enum Shape {
        Circle(f64),
    }

    #[test]
    fn test_unsupported_shapes() {
        let matrix = Matrix {
            row: vec![vec![1]],
        };
        assert!(matches!(
            to_document(&matrix, "m"),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            to_document(&Shape::Circle(1.0), "shape"),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_map_entries() {
        let mut map = BTreeMap::new();
        map.insert("title", "T");
        map.insert("value", "text");
        let doc = to_document(&map, "entry").unwrap();
        assert_eq!(compact(&doc), "<entry>text<title>T</title></entry>");
    }
}
