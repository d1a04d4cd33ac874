use std::borrow::Cow;
use std::iter::Peekable;

use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::forward_to_deserialize_any;

use super::{Element, Elements};
use crate::{Error, Result};

/// Feeds a parsed element stream to serde visitors.
pub struct Deserializer<'de> {
    elements: Peekable<std::vec::IntoIter<Element<'de>>>,
}

impl<'de> Deserializer<'de> {
    pub fn new(elements: Elements<'de>) -> Self {
        Self {
            elements: elements.into_iter().peekable(),
        }
    }

    fn next(&mut self) -> Result<Element<'de>> {
        self.elements
            .next()
            .ok_or_else(|| Error::Message("unexpected end of input".to_string()))
    }

    /// Fails if the visitor left part of the document unread.
    pub fn end(&mut self) -> Result<()> {
        match self.elements.next() {
            None => Ok(()),
            Some(_) => Err(Error::Message("trailing elements after value".to_string())),
        }
    }
}

fn visit_number<'de, V>(raw: &str, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    let integral = !raw.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    let (negative, magnitude) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    if integral {
        if negative {
            // `-0` falls through to the float path so the sign survives.
            match lexical::parse::<i64, _>(raw) {
                Ok(0) | Err(_) => {}
                Ok(i) => return visitor.visit_i64(i),
            }
        } else if let Ok(u) = lexical::parse::<u64, _>(raw) {
            return visitor.visit_u64(u);
        }
    }

    let f: f64 = lexical::parse(magnitude)
        .map_err(|_| Error::Message(format!("invalid number: {raw}")))?;
    if !f.is_finite() {
        return Err(Error::Message(format!("number out of range: {raw}")));
    }
    visitor.visit_f64(if negative { -f } else { f })
}

impl<'de, 'a> de::Deserializer<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.next()? {
            Element::Null => visitor.visit_unit(),
            Element::Bool(b) => visitor.visit_bool(b),
            Element::Number(n) => visit_number(n, visitor),
            Element::Str(Cow::Borrowed(s)) => visitor.visit_borrowed_str(s),
            Element::Str(Cow::Owned(s)) => visitor.visit_string(s),
            Element::ArrayBegin(ct) => {
                let mut seq = Compound::new(self, ct);
                let value = visitor.visit_seq(&mut seq)?;
                seq.finish(value)
            }
            Element::ObjectBegin(ct) => {
                let mut map = Compound::new(self, ct);
                let value = visitor.visit_map(&mut map)?;
                map.finish(value)
            }
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.elements.peek() {
            Some(Element::Null) => {
                self.elements.next();
                visitor.visit_none()
            }
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.next()? {
            Element::Str(s) => {
                let variant: StringDeserializer<Error> = s.into_owned().into_deserializer();
                visitor.visit_enum(variant)
            }
            Element::ObjectBegin(1) => visitor.visit_enum(Variant { de: self }),
            _ => Err(Error::Message(
                "expected a string or a single-member object for an enum".to_string(),
            )),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

/// Access to the members of one array or object.
struct Compound<'a, 'de> {
    de: &'a mut Deserializer<'de>,
    remaining: usize,
}

impl<'a, 'de> Compound<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>, remaining: usize) -> Self {
        Self { de, remaining }
    }

    fn finish<T>(self, value: T) -> Result<T> {
        if self.remaining == 0 {
            Ok(value)
        } else {
            Err(Error::Message(format!("{} members left unread", self.remaining)))
        }
    }
}

impl<'a, 'de> SeqAccess<'de> for Compound<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

impl<'a, 'de> MapAccess<'de> for Compound<'a, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// An enum written as `{"Variant": content}`.
struct Variant<'a, 'de> {
    de: &'a mut Deserializer<'de>,
}

impl<'a, 'de> EnumAccess<'de> for Variant<'a, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'a, 'de> VariantAccess<'de> for Variant<'a, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        de::Deserialize::deserialize(self.de)
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.de)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(self.de, visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_map(self.de, visitor)
    }
}
