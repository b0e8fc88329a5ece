//! Mirror command implementation.

use super::{payload_json, print_json, OutputFormat, Store};
use std::collections::BTreeMap;
use std::path::Path;

/// Returns the mirrored records of `table`, optionally a single one.
pub fn collect(store: &Store, table: &str, key: Option<&str>) -> BTreeMap<String, serde_json::Value> {
    match key {
        Some(key) => store
            .mirror
            .get(table, key)
            .map(|data| (key.to_string(), payload_json(&data)))
            .into_iter()
            .collect(),
        None => store
            .mirror
            .entries(table)
            .iter()
            .map(|(key, data)| (key.clone(), payload_json(data)))
            .collect(),
    }
}

/// Runs the mirror command.
pub fn run(
    path: &Path,
    table: &str,
    key: Option<&str>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    let records = collect(&store, table, key);

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No mirrored records in {table}");
            }
            for (key, value) in &records {
                println!("{key}: {value}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::Payload;

    #[test]
    fn shows_table_or_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let theme = Payload::encode(&serde_json::json!({"value": "dark"})).unwrap();
        let lang = Payload::encode(&serde_json::json!({"value": "fr"})).unwrap();
        store.mirror.put("settings", "theme", theme).unwrap();
        store.mirror.put("settings", "lang", lang).unwrap();

        let all = collect(&store, "settings", None);
        assert_eq!(all.len(), 2);
        assert_eq!(all["theme"], serde_json::json!({"value": "dark"}));

        let one = collect(&store, "settings", Some("lang"));
        assert_eq!(one.len(), 1);
        assert!(collect(&store, "settings", Some("missing")).is_empty());
        assert!(collect(&store, "users", None).is_empty());
    }
}
