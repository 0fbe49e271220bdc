//! Canonical JSON: claves de objetos ordenadas, sin espacios.
//!
//! Dos `Value` semánticamente iguales producen la misma cadena sin importar
//! el orden de inserción de sus claves. Es la forma de bytes que alimenta
//! tanto el fingerprint de cache como los hashes de artifacts.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let tree: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = tree.into_iter()
                                         .map(|(k, v)| format!("{}:{}", quote(k), v))
                                         .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

// `Display` de un `Value::String` ya escapa según JSON y no puede fallar.
fn quote(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}
