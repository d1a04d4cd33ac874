//! A string-keyed map that remembers insertion order, with a JSON codec that
//! keeps that order in both directions.
//!
//! Decoding an object with repeated keys keeps the last value, placed where
//! the key last appeared. Nested objects keep their order when they decode
//! into [`OrderedMap`] or [`Value`]; an unordered dynamic type such as a
//! `HashMap` loses it.

mod config;
mod decode;
mod encode;
mod error;
mod map;
mod value;

pub use config::Config;
pub use decode::de::Deserializer;
pub use decode::{parse, parse_with_depth, Element, Elements};
pub use encode::ser::{to_bytes, to_bytes_with, Serializer};
pub use error::{Error, Result};
pub use map::{Entry, IntoIter, Iter, OrderedMap};
pub use value::{Number, Value};

use serde::{de, Serialize};

pub fn to_string<T: ?Sized + Serialize>(value: &T) -> Result<String> {
    into_string(to_bytes(value)?.to_vec())
}

/// Like [`to_string`], with every nesting level indented by `indent`.
pub fn to_string_pretty<T: ?Sized + Serialize>(value: &T, indent: &str) -> Result<String> {
    into_string(to_bytes_with(value, &Config::default().with_indent(indent))?.to_vec())
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Message(e.to_string()))
}

pub fn from_slice<'de, T: de::Deserialize<'de>>(input: &'de [u8]) -> Result<T> {
    from_slice_with(input, &Config::default())
}

pub fn from_str<'de, T: de::Deserialize<'de>>(input: &'de str) -> Result<T> {
    from_slice(input.as_bytes())
}

/// Decodes `input` into `T`, rejecting nesting deeper than `config.max_depth`.
/// The whole document has to be consumed by `T`.
pub fn from_slice_with<'de, T: de::Deserialize<'de>>(input: &'de [u8], config: &Config) -> Result<T> {
    let elements = parse_with_depth(input, config.max_depth)?;
    let mut de = Deserializer::new(elements);
    let value = T::deserialize(&mut de)?;
    de.end()?;

    Ok(value)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn marshal_fixture() -> OrderedMap<Value> {
        let mut o = OrderedMap::new();
        o.insert("number", Value::from(3));
        o.insert("string", Value::from("x"));
        o.insert("specialstring", Value::from("\\.<>[]{}_-"));
        o.insert("number", Value::from(4));
        o.insert("z", Value::from(1));
        o.insert("a", Value::from(2));
        o.insert("b", Value::from(3));
        o.insert("slice", Value::from(vec![Value::from("1"), Value::from(1)]));

        let mut v = OrderedMap::new();
        v.insert("e", Value::from(1));
        v.insert("a", Value::from(2));
        o.insert("orderedmap", Value::from(v));

        o.insert("test\n\r\t\\\"ing", Value::from(9));
        o
    }

    fn text(bytes: bytes::Bytes) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn encodes_blank_map() {
        let o = OrderedMap::<Value>::new();
        assert_eq!("{}", text(o.to_json().unwrap()));
        assert_eq!("{}", text(o.to_json_pretty("  ").unwrap()));
    }

    #[test]
    fn encodes_in_insertion_order() {
        let expected = concat!(
            r#"{"number":4,"string":"x","specialstring":"\\."#,
            "\x5cu003c\x5cu003e",
            r#"[]{}_-","z":1,"a":2,"b":3,"slice":["1",1],"orderedmap":{"e":1,"a":2},"test\n\r\t\\\"ing":9}"#
        );
        assert_eq!(expected, text(marshal_fixture().to_json().unwrap()));
        assert_eq!(expected, to_string(&marshal_fixture()).unwrap());
    }

    #[test]
    fn pretty_prints_in_insertion_order() {
        let expected = concat!(
            "{\n",
            "  \"number\": 4,\n",
            "  \"string\": \"x\",\n",
            "  \"specialstring\": \"\\\\.\x5cu003c\x5cu003e[]{}_-\",\n",
            "  \"z\": 1,\n",
            "  \"a\": 2,\n",
            "  \"b\": 3,\n",
            "  \"slice\": [\n",
            "    \"1\",\n",
            "    1\n",
            "  ],\n",
            "  \"orderedmap\": {\n",
            "    \"e\": 1,\n",
            "    \"a\": 2\n",
            "  },\n",
            "  \"test\\n\\r\\t\\\\\\\"ing\": 9\n",
            "}"
        );
        assert_eq!(expected, text(marshal_fixture().to_json_pretty("  ").unwrap()));
        assert_eq!(expected, to_string_pretty(&marshal_fixture(), "  ").unwrap());
    }

    #[test]
    fn encodes_without_html_escaping() {
        let mut o = OrderedMap::new();
        o.set_escape_html(false);
        o.insert("specialstring", "\\.<>[]{}_-");
        assert_eq!(r#"{"specialstring":"\\.<>[]{}_-"}"#, text(o.to_json().unwrap()));
    }

    #[test]
    fn map_flag_applies_to_every_encoder() {
        let mut m = OrderedMap::new();
        m.set_escape_html(false);
        m.insert("k", "<>");

        let literal = r#"{"k":"<>"}"#;
        assert_eq!(literal, text(m.to_json().unwrap()));
        assert_eq!(literal, text(to_bytes(&m).unwrap()));
        assert_eq!(literal, to_string(&m).unwrap());
        assert_eq!("{\n  \"k\": \"<>\"\n}", to_string_pretty(&m, "  ").unwrap());

        #[derive(Serialize)]
        struct Holder<'a> {
            tag: &'a str,
            map: OrderedMap<&'a str>,
        }

        let holder = Holder { tag: "<", map: m };
        assert_eq!(
            concat!(r#"{"tag":""#, "\x5cu003c", r#"","map":{"k":"<>"}}"#),
            to_string(&holder).unwrap()
        );
    }

    #[test]
    fn outermost_map_flag_wins() {
        let mut inner = OrderedMap::new();
        inner.insert("k", "<>");

        let mut outer = OrderedMap::new();
        outer.set_escape_html(false);
        outer.insert("inner", inner.clone());
        assert_eq!(r#"{"inner":{"k":"<>"}}"#, to_string(&outer).unwrap());

        inner.set_escape_html(false);
        outer.set_escape_html(true);
        outer.insert("inner", inner);
        let escaped = "{\"inner\":{\"k\":\"\x5cu003c\x5cu003e\"}}";
        assert_eq!(escaped, to_string(&outer).unwrap());

        // Values after the map fall back to the configured setting.
        let config = Config::default().with_escape_html(false);
        let pair = (outer, "<");
        assert_eq!(
            format!("[{escaped},\"<\"]"),
            String::from_utf8(to_bytes_with(&pair, &config).unwrap().to_vec()).unwrap()
        );
    }

    #[test]
    fn round_trips_after_removal() {
        let mut nested = OrderedMap::new();
        nested.insert("y", Value::from(1));
        nested.insert("x", Value::from(vec![Value::from("<&>"), Value::Array(vec![])]));

        let mut m = OrderedMap::new();
        m.insert("test\n\r\t\\\"ing", Value::from(1));
        m.insert("c", Value::from(0));
        m.insert("b", Value::from(nested));
        m.insert("d", Value::Null);
        m.insert("e", Value::Number(Number::from_f64(-0.5).unwrap()));
        m.remove("c");
        m.insert("c", Value::from(2));
        m.insert("f", Value::Object(OrderedMap::new()));

        assert_eq!(["test\n\r\t\\\"ing", "b", "d", "e", "c", "f"], m.keys());

        let decoded = OrderedMap::<Value>::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(m, decoded);
        assert_eq!(m.keys(), decoded.keys());

        let pretty = m.to_json_pretty("\t").unwrap();
        assert_eq!(m, OrderedMap::<Value>::from_json(&pretty).unwrap());
    }

    #[test]
    fn negative_zero_round_trips() {
        let value: Value = from_str("[-0.0,0.0,-0]").unwrap();
        assert_eq!("[-0.0,0.0,-0.0]", to_string(&value).unwrap());
    }

    #[test]
    fn html_flag_reaches_nested_values() {
        let src = r#"{"x":"<>","y":[{"z":["<>"]}]}"#;
        let config = Config::default().with_escape_html(false);
        let o = OrderedMap::<Value>::from_json_with(src.as_bytes(), &config).unwrap();
        assert!(!o.escape_html());
        assert_eq!(src, text(o.to_json().unwrap()));

        let mut escaped = o.clone();
        escaped.set_escape_html(true);
        assert_eq!(
            "{\"x\":\"\x5cu003c\x5cu003e\",\"y\":[{\"z\":[\"\x5cu003c\x5cu003e\"]}]}",
            text(escaped.to_json().unwrap())
        );
    }

    #[test]
    fn decodes_in_document_order() {
        let s = r#"{
  "number": 4,
  "string": "x",
  "z": 1,
  "a": "should not break with unclosed { character in value",
  "b": 3,
  "slice": [
    "1",
    1
  ],
  "test\"ing": 9,
  "after": 1,
  "should not break with { character in key": 1
}"#;
        let o = OrderedMap::<Value>::from_json(s.as_bytes()).unwrap();
        assert_eq!(
            [
                "number",
                "string",
                "z",
                "a",
                "b",
                "slice",
                "test\"ing",
                "after",
                "should not break with { character in key",
            ],
            o.keys()
        );
        assert_eq!(Some(&Value::from(4)), o.get("number"));
    }

    #[test]
    fn duplicate_keys_keep_last_value_at_last_position() {
        let s = r#"{
		"a": [{}, []],
		"b": {"x":[1]},
		"c": "x",
		"d": {"x":1},
		"b": [{"x":[]}],
		"c": 1,
		"d": {"y": 2},
		"e": [{"x":1}],
		"e": [[]],
		"e": [{"z":2}],
		"a": {},
		"b": [[1]]
	}"#;
        let o = OrderedMap::<Value>::from_json(s.as_bytes()).unwrap();
        assert_eq!(["c", "d", "e", "a", "b"], o.keys());
        assert_eq!(Some(1), o["c"].as_number().and_then(Number::as_u64));
        assert_eq!(
            r#"{"c":1,"d":{"y":2},"e":[{"z":2}],"a":{},"b":[[1]]}"#,
            text(o.to_json().unwrap())
        );
    }

    #[test]
    fn decodes_escaped_keys() {
        let s = concat!(
            r#"{ " "#,
            "\x5cu0041",
            r#"\n\r\t\\\\\\\\\\\\ "  : { "\\\\\\" : "\\\\\"\\" }, "\\":  " \\\\ test ", "\n": "\r" }"#
        );
        let o = OrderedMap::<Value>::from_json(s.as_bytes()).unwrap();
        assert_eq!([" A\n\r\t\\\\\\\\\\\\ ", "\\", "\n"], o.keys());

        let inner = o[" A\n\r\t\\\\\\\\\\\\ "].as_object().unwrap();
        assert_eq!(Some("\\\\\"\\"), inner["\\\\\\"].as_str());
        assert_eq!(Some(" \\\\ test "), o["\\"].as_str());
        assert_eq!(Some("\r"), o["\n"].as_str());
    }

    #[test]
    fn decodes_as_struct_field() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            data: OrderedMap<Value>,
        }

        let v: Wrapper = from_str(r#"{ "data": { "x": 1 } }"#).unwrap();
        assert_eq!(Some(1.0), v.data["x"].as_f64());
    }

    #[test]
    fn sorts_decoded_keys() {
        let s = "\n{\n  \"b\": 2,\n  \"a\": 1,\n  \"c\": 3\n}\n";

        let mut o = OrderedMap::<Value>::from_json(s.as_bytes()).unwrap();
        o.sort_keys();
        assert_eq!(["a", "b", "c"], o.keys());

        let mut o = OrderedMap::<Value>::from_json(s.as_bytes()).unwrap();
        o.sort_by(|a, b| {
            let (a, b) = (a.value().as_f64(), b.value().as_f64());
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
        assert_eq!(["c", "b", "a"], o.keys());
    }

    #[test]
    fn empty_containers_round_trip() {
        for src in [r#"{"x":[]}"#, r#"{"x":{}}"#] {
            let o = OrderedMap::<Value>::from_json(src.as_bytes()).unwrap();
            assert_eq!(src, text(o.to_json().unwrap()));
        }
    }

    #[test]
    fn typed_values_decode_in_order() {
        let o: OrderedMap<u32> = from_str(r#"{"z": 1, "y": 2, "x": 3}"#).unwrap();
        assert_eq!(["z", "y", "x"], o.keys());
        assert_eq!(vec![1, 2, 3], o.values().copied().collect::<Vec<_>>());
        assert!(from_str::<OrderedMap<u32>>(r#"{"z": "one"}"#).is_err());
    }

    #[test]
    fn decoding_requires_an_object() {
        assert!(OrderedMap::<Value>::from_json(b"[1, 2]").is_err());
        assert!(OrderedMap::<Value>::from_json(b"{\"a\": 1").is_err());
        assert!(OrderedMap::<Value>::from_json(b"{\"a\": 1} x").is_err());
    }

    #[test]
    fn depth_limit_applies_to_decoding() {
        let config = Config::default().with_max_depth(2);
        assert!(OrderedMap::<Value>::from_json_with(br#"{"a":{"b":1}}"#, &config).is_ok());
        assert!(matches!(
            OrderedMap::<Value>::from_json_with(br#"{"a":{"b":[1]}}"#, &config),
            Err(Error::DepthLimitExceeded(2))
        ));
    }
}
