#![no_main]
use libfuzzer_sys::fuzz_target;

use ordmap::{OrderedMap, Value};

fuzz_target!(|input: &[u8]| {
    if let Ok(map) = OrderedMap::<Value>::from_json(input) {
        let encoded = map.to_json().unwrap();
        assert_eq!(map, OrderedMap::<Value>::from_json(&encoded).unwrap());
    }
});
