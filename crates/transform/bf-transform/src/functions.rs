//! Helper functions available to transform scripts.

use rhai::{Dynamic, Engine, Map};

/// Registers every helper in the Rhai engine.
pub fn register_functions(engine: &mut Engine) {
    register_id_functions(engine);
    register_time_functions(engine);
    register_parsing_functions(engine);
    register_string_functions(engine);
    register_record_functions(engine);
}

fn register_id_functions(engine: &mut Engine) {
    engine.register_fn("uuid", || uuid::Uuid::new_v4().to_string());
}

fn register_time_functions(engine: &mut Engine) {
    // RFC 3339, UTC
    engine.register_fn("timestamp", || chrono::Utc::now().to_rfc3339());
    engine.register_fn("unix_timestamp", || chrono::Utc::now().timestamp());
    engine.register_fn("unix_timestamp_ms", || chrono::Utc::now().timestamp_millis());
}

fn register_parsing_functions(engine: &mut Engine) {
    // Unparseable input yields ()
    engine.register_fn("parse_int", |s: &str| -> Dynamic {
        s.trim().parse::<i64>().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("parse_float", |s: &str| -> Dynamic {
        s.trim().parse::<f64>().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("parse_bool", |s: &str| -> Dynamic {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Dynamic::from(true),
            "false" | "0" | "no" => Dynamic::from(false),
            _ => Dynamic::UNIT,
        }
    });
}

fn register_string_functions(engine: &mut Engine) {
    engine.register_fn("to_lowercase", |s: &str| s.to_lowercase());
    engine.register_fn("to_uppercase", |s: &str| s.to_uppercase());
    engine.register_fn("trim", |s: &str| s.trim().to_string());
    engine.register_fn("str_contains", |s: &str, pattern: &str| s.contains(pattern));
    engine.register_fn("starts_with", |s: &str, prefix: &str| s.starts_with(prefix));
    engine.register_fn("ends_with", |s: &str, suffix: &str| s.ends_with(suffix));

    // Length in characters, not bytes
    engine.register_fn("char_count", |s: &str| s.chars().count() as i64);

    engine.register_fn("substring", |s: &str, start: i64, len: i64| -> String {
        let start = start.max(0) as usize;
        let len = len.max(0) as usize;
        s.chars().skip(start).take(len).collect()
    });
}

fn register_record_functions(engine: &mut Engine) {
    engine.register_fn("has_field", |record: &mut Map, key: &str| {
        record.get(key).is_some_and(|v| !v.is_unit())
    });

    // Value of the first present, non-unit field
    engine.register_fn("first_of", |record: &mut Map, keys: rhai::Array| -> Dynamic {
        keys.iter()
            .filter_map(|k| k.clone().into_string().ok())
            .filter_map(|k| record.get(k.as_str()).cloned())
            .find(|v| !v.is_unit())
            .unwrap_or(Dynamic::UNIT)
    });

    engine.register_fn("to_json", |value: Dynamic| -> String {
        serde_json::to_string(&value).unwrap_or_default()
    });
}
