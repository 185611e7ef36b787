use std::collections::HashMap;

/// Parse a `key=value,key=value` list.
///
/// Entries that do not split into exactly one key and one value are dropped;
/// the rest of the list is kept. A blank list yields an empty map. Later
/// entries overwrite earlier ones with the same key.
pub fn parse_properties(list: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for entry in list.split(',') {
        if entry.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split('=').collect();
        match parts.as_slice() {
            [key, value] if !key.trim().is_empty() => {
                properties.insert(key.trim().to_owned(), value.trim().to_owned());
            }
            _ => tracing::debug!(entry, "dropping malformed property entry"),
        }
    }
    properties
}
