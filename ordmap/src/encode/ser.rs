use bytes::{BufMut, Bytes, BytesMut};
use serde::ser::{self, Serialize};

use super::{
    encode_bool, encode_f32, encode_f64, encode_i128, encode_i64, encode_null, encode_str,
    encode_u128, encode_u64,
};
use crate::map::{ESCAPE_HTML_OFF, ESCAPE_HTML_ON};
use crate::{Config, Error, Result};

/// Writes JSON in the order values are handed to it.
///
/// `escape_html` starts out as the configured value. The outermost
/// [`OrderedMap`](crate::OrderedMap) on a path replaces it with the map's own
/// flag for everything below it; maps nested inside that one do not change it
/// again.
pub struct Serializer {
    buf: BytesMut,
    escape_html: bool,
    escape_html_pinned: bool,
    indent: Option<Vec<u8>>,
    depth: usize,
    max_depth: usize,
    writing_map_key: bool,
}

impl Serializer {
    pub fn new(config: &Config) -> Self {
        Self {
            buf: BytesMut::new(),
            escape_html: config.escape_html,
            escape_html_pinned: false,
            indent: config.indent.as_ref().map(|s| s.as_bytes().to_vec()),
            depth: 0,
            max_depth: config.max_depth,
            writing_map_key: false,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn reject_if_writing_map_key(&self) -> Result<()> {
        if self.writing_map_key {
            Err(Error::InvalidMapKey)?
        }

        Ok(())
    }

    /// Map keys must be strings, so scalar keys are quoted.
    fn write_scalar(&mut self, write: impl FnOnce(&mut BytesMut)) {
        if self.writing_map_key {
            self.buf.put_u8(b'"');
            write(&mut self.buf);
            self.buf.put_u8(b'"');
        } else {
            write(&mut self.buf);
        }
    }

    fn newline(&mut self) {
        if let Some(indent) = &self.indent {
            self.buf.put_u8(b'\n');
            for _ in 0..self.depth {
                self.buf.put_slice(indent);
            }
        }
    }

    fn begin(&mut self, open: u8) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimitExceeded(self.max_depth));
        }
        self.buf.put_u8(open);
        self.depth += 1;

        Ok(())
    }

    fn begin_item(&mut self, first: bool) {
        if !first {
            self.buf.put_u8(b',');
        }
        self.newline();
    }

    fn end(&mut self, close: u8, empty: bool) {
        self.depth -= 1;
        if !empty {
            self.newline();
        }
        self.buf.put_u8(close);
    }

    fn key_separator(&mut self) {
        self.buf.put_u8(b':');
        if self.indent.is_some() {
            self.buf.put_u8(b' ');
        }
    }

    fn write_key(&mut self, key: &str) {
        encode_str(key, self.escape_html, &mut self.buf);
        self.key_separator();
    }

    /// Opens `{"variant":` for the externally tagged enum representation.
    fn begin_variant(&mut self, variant: &str) -> Result<()> {
        self.reject_if_writing_map_key()?;
        self.begin(b'{')?;
        self.begin_item(true);
        self.write_key(variant);

        Ok(())
    }
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();

    type Error = Error;

    type SerializeSeq = SeqSerializer<'a>;

    type SerializeTuple = SeqSerializer<'a>;

    type SerializeTupleStruct = SeqSerializer<'a>;

    type SerializeTupleVariant = SeqSerializer<'a>;

    type SerializeMap = MapSerializer<'a>;

    type SerializeStruct = MapSerializer<'a>;

    type SerializeStructVariant = MapSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write_scalar(|buf| encode_bool(v, buf));

        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_scalar(|buf| encode_i64(v, buf));

        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.write_scalar(|buf| encode_i128(v, buf));

        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_scalar(|buf| encode_u64(v, buf));

        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.write_scalar(|buf| encode_u128(v, buf));

        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.reject_if_writing_map_key()?;

        encode_f32(v, &mut self.buf)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.reject_if_writing_map_key()?;

        encode_f64(v, &mut self.buf)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        encode_str(v, self.escape_html, &mut self.buf);

        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        use serde::ser::SerializeSeq;

        let mut seq = self.serialize_seq(Some(v.len()))?;
        for b in v {
            seq.serialize_element(b)?;
        }
        seq.end()
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.reject_if_writing_map_key()?;

        encode_null(&mut self.buf);

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
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized>(self, name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let map_flag = match name {
            ESCAPE_HTML_ON => true,
            ESCAPE_HTML_OFF => false,
            _ => return value.serialize(self),
        };
        if self.escape_html_pinned {
            return value.serialize(self);
        }

        let outer = self.escape_html;
        self.escape_html = map_flag;
        self.escape_html_pinned = true;

        let result = value.serialize(&mut *self);

        self.escape_html = outer;
        self.escape_html_pinned = false;

        result
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: Serialize,
    {
        self.begin_variant(variant)?;
        value.serialize(&mut *self)?;
        self.end(b'}', false);

        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.reject_if_writing_map_key()?;

        SeqSerializer::new(self, false)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.begin_variant(variant)?;

        SeqSerializer::new(self, true)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.reject_if_writing_map_key()?;

        MapSerializer::new(self, false)
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.begin_variant(variant)?;

        MapSerializer::new(self, true)
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    first: bool,
    variant: bool,
}

impl<'a> SeqSerializer<'a> {
    fn new(serializer: &'a mut Serializer, variant: bool) -> Result<Self> {
        serializer.begin(b'[')?;
        Ok(Self {
            serializer,
            first: true,
            variant,
        })
    }

    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.serializer.begin_item(self.first);
        self.first = false;
        value.serialize(&mut *self.serializer)
    }

    fn finish(self) -> Result<()> {
        self.serializer.end(b']', self.first);
        if self.variant {
            self.serializer.end(b'}', false);
        }

        Ok(())
    }
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    first: bool,
    variant: bool,
}

impl<'a> MapSerializer<'a> {
    fn new(serializer: &'a mut Serializer, variant: bool) -> Result<Self> {
        serializer.begin(b'{')?;
        Ok(Self {
            serializer,
            first: true,
            variant,
        })
    }

    fn field<T: ?Sized + Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.serializer.begin_item(self.first);
        self.first = false;
        self.serializer.write_key(key);
        value.serialize(&mut *self.serializer)
    }

    fn finish(self) -> Result<()> {
        self.serializer.end(b'}', self.first);
        if self.variant {
            self.serializer.end(b'}', false);
        }

        Ok(())
    }
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.serializer.begin_item(self.first);
        self.first = false;

        let current = self.serializer.writing_map_key;
        self.serializer.writing_map_key = true;

        key.serialize(&mut *self.serializer)?;

        self.serializer.writing_map_key = current;
        self.serializer.key_separator();

        Ok(())
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut *self.serializer)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();

    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

pub fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Bytes> {
    to_bytes_with(value, &Config::default())
}

/// Encodes `value`. Nothing is returned unless the whole value was written.
pub fn to_bytes_with<T: ?Sized + Serialize>(value: &T, config: &Config) -> Result<Bytes> {
    let mut serializer = Serializer::new(config);
    value.serialize(&mut serializer)?;

    let bytes = serializer.into_bytes();
    tracing::trace!(
        bytes = bytes.len(),
        escape_html = config.escape_html,
        pretty = config.indent.is_some(),
        "encoded value"
    );

    Ok(bytes)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use include_dir::{include_dir, Dir};
    use serde::Serialize;

    use super::*;
    use crate::{OrderedMap, Value};

    static SAMPLES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/benches/samples/");

    fn compact<T: Serialize>(value: &T) -> String {
        String::from_utf8(to_bytes(value).unwrap().to_vec()).unwrap()
    }

    fn pretty<T: Serialize>(value: &T) -> String {
        let config = Config::default().with_indent("  ");
        String::from_utf8(to_bytes_with(value, &config).unwrap().to_vec()).unwrap()
    }

    #[derive(Serialize)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Pair(u8, u8),
    }

    #[derive(Serialize)]
    struct Drawing<'a> {
        name: &'a str,
        shapes: Vec<Shape>,
        note: Option<&'a str>,
        scale: f32,
    }

    #[test]
    fn encodes_structs_and_enums() {
        let drawing = Drawing {
            name: "a<b",
            shapes: vec![
                Shape::Dot,
                Shape::Circle(1.5),
                Shape::Rect { w: 2, h: 3 },
                Shape::Pair(1, 2),
            ],
            note: None,
            scale: 0.5,
        };

        assert_eq!(
            concat!(
                r#"{"name":"a"#,
                "\x5cu003c",
                r#"b","shapes":["Dot",{"Circle":1.5},{"Rect":{"w":2,"h":3}},{"Pair":[1,2]}],"note":null,"scale":0.5}"#
            ),
            compact(&drawing)
        );
    }

    #[test]
    fn pretty_prints_variants() {
        let shapes = vec![Shape::Rect { w: 2, h: 3 }, Shape::Pair(1, 2)];
        assert_eq!(
            r#"[
  {
    "Rect": {
      "w": 2,
      "h": 3
    }
  },
  {
    "Pair": [
      1,
      2
    ]
  }
]"#,
            pretty(&shapes)
        );
    }

    #[test]
    fn empty_containers_stay_compact_when_pretty() {
        let mut map = OrderedMap::new();
        map.insert("x", Value::Array(vec![]));
        map.insert("y", Value::Object(OrderedMap::new()));

        assert_eq!("{}", pretty(&OrderedMap::<Value>::new()));
        assert_eq!("{\n  \"x\": [],\n  \"y\": {}\n}", pretty(&map));
    }

    #[test]
    fn quotes_scalar_map_keys() {
        let mut ints = BTreeMap::new();
        ints.insert(1u32, "one");
        ints.insert(2u32, "two");
        assert_eq!(r#"{"1":"one","2":"two"}"#, compact(&ints));

        let mut bools = BTreeMap::new();
        bools.insert(true, 1);
        assert_eq!(r#"{"true":1}"#, compact(&bools));
    }

    #[test]
    fn rejects_non_string_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(to_bytes(&map), Err(Error::InvalidMapKey)));

        let mut map = BTreeMap::new();
        map.insert((), 1);
        assert!(matches!(to_bytes(&map), Err(Error::InvalidMapKey)));
    }

    #[test]
    fn encodes_bytes_as_number_arrays() {
        struct Raw<'a>(&'a [u8]);

        impl Serialize for Raw<'_> {
            fn serialize<S: ser::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_bytes(self.0)
            }
        }

        assert_eq!("[0,127,255]", compact(&Raw(&[0, 127, 255])));
    }

    #[test]
    fn fails_without_partial_output_on_unsupported_values() {
        let values = vec![1.0, f64::NAN];
        assert!(matches!(to_bytes(&values), Err(Error::UnsupportedValue(_))));
    }

    #[test]
    fn enforces_depth_limit() {
        let nested = vec![vec![vec![1]]];
        let config = Config::default().with_max_depth(2);
        assert!(matches!(
            to_bytes_with(&nested, &config),
            Err(Error::DepthLimitExceeded(2))
        ));
        assert!(to_bytes_with(&nested, &config.with_max_depth(3)).is_ok());
    }

    #[test]
    fn reencodes_samples_byte_for_byte() {
        for sample in SAMPLES_DIR.files() {
            let text = sample.contents_utf8().unwrap().trim_end();
            let value: Value = crate::from_str(text).unwrap();
            assert_eq!(text, pretty(&value), "{}", sample.path().display());
        }
    }
}
