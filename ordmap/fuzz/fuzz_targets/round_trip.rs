#![no_main]
use libfuzzer_sys::fuzz_target;

use ordmap::{OrderedMap, Value};

fuzz_target!(|input: OrderedMap<Value>| {
    let encoded = input.to_json().unwrap();
    let decoded = OrderedMap::<Value>::from_json(&encoded).unwrap();
    assert_eq!(input, decoded);
});
