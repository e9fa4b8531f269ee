use toml::Value;

/// Deep merge `overlay` onto `base`. Tables merge key by key; any other
/// overlay value replaces the base value outright.
pub(crate) fn merge_toml_values(base: Value, overlay: Value) -> Value {
    let (mut merged, layer) = match (base, overlay) {
        (Value::Table(merged), Value::Table(layer)) => (merged, layer),
        (_, overlay) => return overlay,
    };
    for (key, value) in layer {
        let next = match merged.remove(&key) {
            Some(lower) => merge_toml_values(lower, value),
            None => value,
        };
        merged.insert(key, next);
    }
    Value::Table(merged)
}

/// Warn about keys that serde would silently ignore in the `[upload]` table.
pub(crate) fn warn_unknown_upload_keys(raw: &Value, source: &str) {
    const KNOWN: &[&str] = &[
        "enabled",
        "clean_on_start",
        "ignore_list",
        "debounce_ms",
    ];
    let Some(upload) = raw.get("upload").and_then(|u| u.as_table()) else {
        return;
    };
    for key in upload.keys() {
        if !KNOWN.contains(&key.as_str()) {
            tracing::warn!(source, key = %key, "unknown key in [upload] settings is ignored");
        }
    }
}
