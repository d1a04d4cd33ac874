use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::Serialize;

use crate::OrderedMap;

/// Any JSON value. Objects are [`OrderedMap`]s, so member order survives at
/// every level of nesting.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(OrderedMap<Value>),
}

/// A JSON number. Non-negative integers are stored as `u64`, negative ones
/// as `i64`, and everything else as a finite `f64`.
#[derive(Clone, Copy, PartialEq)]
pub struct Number(N);

#[derive(Clone, Copy, PartialEq)]
enum N {
    PosInt(u64),
    NegInt(i64),
    Float(f64),
}

impl Number {
    /// `None` for NaN and the infinities, which JSON cannot express.
    pub fn from_f64(f: f64) -> Option<Self> {
        f.is_finite().then_some(Self(N::Float(f)))
    }

    pub fn as_f64(&self) -> f64 {
        match self.0 {
            N::PosInt(u) => u as f64,
            N::NegInt(i) => i as f64,
            N::Float(f) => f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            N::PosInt(u) => i64::try_from(u).ok(),
            N::NegInt(i) => Some(i),
            N::Float(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.0 {
            N::PosInt(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_f64(&self) -> bool {
        matches!(self.0, N::Float(_))
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            N::PosInt(u) => write!(f, "Number({u})"),
            N::NegInt(i) => write!(f, "Number({i})"),
            N::Float(x) => write!(f, "Number({x:?})"),
        }
    }
}

impl From<u64> for Number {
    fn from(u: u64) -> Self {
        Self(N::PosInt(u))
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        match u64::try_from(i) {
            Ok(u) => Self(N::PosInt(u)),
            Err(_) => Self(N::NegInt(i)),
        }
    }
}

impl From<u32> for Number {
    fn from(u: u32) -> Self {
        Self::from(u as u64)
    }
}

impl From<i32> for Number {
    fn from(i: i32) -> Self {
        Self::from(i as i64)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&OrderedMap<Value>> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Number(i.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Number(i.into())
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::Number(u.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(vs: Vec<V>) -> Self {
        Self::Array(vs.into_iter().map(Into::into).collect())
    }
}

impl From<OrderedMap<Value>> for Value {
    fn from(m: OrderedMap<Value>) -> Self {
        Self::Object(m)
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0 {
            N::PosInt(u) => serializer.serialize_u64(u),
            N::NegInt(i) => serializer.serialize_i64(i),
            N::Float(f) => serializer.serialize_f64(f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(vs) => {
                let mut s = serializer.serialize_seq(Some(vs.len()))?;
                for v in vs {
                    s.serialize_element(v)?;
                }
                s.end()
            }
            Self::Object(m) => m.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Number(i.into()))
    }

    fn visit_u64<E>(self, u: u64) -> Result<Value, E> {
        Ok(Value::Number(u.into()))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| E::custom("non-finite number"))
    }

    fn visit_str<E>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        de::Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut vs = Vec::with_capacity(access.size_hint().unwrap_or(0).min(4096));
        while let Some(v) = access.next_element()? {
            vs.push(v);
        }
        Ok(Value::Array(vs))
    }

    fn visit_map<A>(self, access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        OrderedMap::from_map_access(access).map(Value::Object)
    }
}

impl<'de> de::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(feature = "fuzz")]
impl<'a> arbitrary::Arbitrary<'a> for Number {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(match u.int_in_range(0..=2u8)? {
            0 => Number::from(u.arbitrary::<u64>()?),
            1 => Number::from(u.arbitrary::<i64>()?),
            _ => Number::from_f64(u.arbitrary()?).unwrap_or(Number::from(0u64)),
        })
    }
}

#[cfg(feature = "fuzz")]
impl<'a> arbitrary::Arbitrary<'a> for Value {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        // Bound the nesting so encoding never reaches the depth limit.
        fn arbitrary_at(u: &mut arbitrary::Unstructured<'_>, depth: usize) -> arbitrary::Result<Value> {
            let last = if depth >= 16 { 3 } else { 5 };
            Ok(match u.int_in_range(0..=last)? {
                0 => Value::Null,
                1 => Value::Bool(u.arbitrary()?),
                2 => Value::Number(u.arbitrary()?),
                3 => Value::String(u.arbitrary()?),
                4 => {
                    let len = u.arbitrary_len::<u8>()?.min(8);
                    let mut vs = Vec::with_capacity(len);
                    for _ in 0..len {
                        vs.push(arbitrary_at(u, depth + 1)?);
                    }
                    Value::Array(vs)
                }
                _ => {
                    let len = u.arbitrary_len::<u8>()?.min(8);
                    let mut map = OrderedMap::with_capacity(len);
                    for _ in 0..len {
                        let key: String = u.arbitrary()?;
                        map.insert(key, arbitrary_at(u, depth + 1)?);
                    }
                    Value::Object(map)
                }
            })
        }

        arbitrary_at(u, 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers_are_canonical() {
        assert_eq!(Number::from(5u64), Number::from(5i64));
        assert_eq!(Some(-3), Number::from(-3i64).as_i64());
        assert_eq!(None, Number::from(-3i64).as_u64());
        assert!(!Number::from(7).is_f64());
    }

    #[test]
    fn rejects_non_finite_floats() {
        assert!(Number::from_f64(f64::NAN).is_none());
        assert!(Number::from_f64(f64::INFINITY).is_none());
        assert_eq!(Some(1.5), Number::from_f64(1.5).map(|n| n.as_f64()));
    }

    #[test]
    fn builds_nested_values() {
        let mut inner = OrderedMap::new();
        inner.insert("e", Value::from(1));
        inner.insert("a", Value::from(2));

        let value = Value::from(vec![Value::from("1"), Value::from(inner.clone())]);
        let items = value.as_array().unwrap();

        assert_eq!(Some("1"), items[0].as_str());
        assert_eq!(Some(&inner), items[1].as_object());
        assert_eq!(["e", "a"], items[1].as_object().unwrap().keys());
    }

    #[test]
    fn default_is_null() {
        assert!(Value::default().is_null());
        assert_eq!(None, Value::Null.as_bool());
    }
}
