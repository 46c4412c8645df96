//! Merging of config-file sections across files.

use toml::{Table, Value};

/// Whether a top-level config-file value is a section: a `[name]` table or
/// a non-empty `[[name]]` array of tables.
pub fn is_section(value: &Value) -> bool {
    match value {
        Value::Table(_) => true,
        Value::Array(items) => is_table_array(items),
        _ => false,
    }
}

fn is_table_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_table)
}

/// Merge the sections of a later config file on top of earlier ones.
///
/// Tables are merged key by key, later values winning. Arrays of tables
/// accumulate: the entries of a later `[[name]]` are appended to the ones
/// already read. Any other value from `overlay` replaces the one in `base`.
pub fn merge_sections(mut base: Table, overlay: Table) -> Table {
    for (name, incoming) in overlay {
        let merged = match (base.remove(&name), incoming) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                Value::Table(merge_sections(existing, incoming))
            }
            (Some(Value::Array(mut existing)), Value::Array(incoming))
                if is_table_array(&existing) && is_table_array(&incoming) =>
            {
                existing.extend(incoming);
                Value::Array(existing)
            }
            (_, incoming) => incoming,
        };
        base.insert(name, merged);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(toml_str: &str) -> Table {
        toml_str.parse::<Table>().unwrap()
    }

    #[test]
    fn sections_from_both_files_kept() {
        let merged = merge_sections(
            table("[colors]\nerror = \"red\"\n"),
            table("[aliases]\nll = \"ls -l\"\n"),
        );
        assert_eq!(merged["colors"]["error"].as_str(), Some("red"));
        assert_eq!(merged["aliases"]["ll"].as_str(), Some("ls -l"));
    }

    #[test]
    fn later_file_wins_inside_section() {
        let merged = merge_sections(
            table("[colors]\nerror = \"red\"\nwarning = \"yellow\"\n"),
            table("[colors]\nerror = \"magenta\"\n"),
        );
        let colors = merged["colors"].as_table().unwrap();
        assert_eq!(colors["error"].as_str(), Some("magenta"));
        assert_eq!(colors["warning"].as_str(), Some("yellow"));
    }

    #[test]
    fn scalar_replaces_table() {
        let merged = merge_sections(
            table("[colors]\nerror = \"red\"\n"),
            table("colors = \"off\"\n"),
        );
        assert_eq!(merged["colors"].as_str(), Some("off"));
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = table("[a]\nx = 1\n");
        assert_eq!(merge_sections(base.clone(), Table::new()), base);
    }

    #[test]
    fn nested_tables_recurse() {
        let merged = merge_sections(
            table("[a.b]\nkeep = 1\nval = 1\n"),
            table("[a.b]\nval = 2\n"),
        );
        assert_eq!(merged["a"]["b"]["keep"].as_integer(), Some(1));
        assert_eq!(merged["a"]["b"]["val"].as_integer(), Some(2));
    }

    #[test]
    fn table_arrays_accumulate_across_files() {
        let merged = merge_sections(
            table("[[servers]]\nname = \"a\"\n"),
            table("[[servers]]\nname = \"b\"\n[[servers]]\nname = \"c\"\n"),
        );
        let names: Vec<&str> = merged["servers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn plain_arrays_are_replaced() {
        let merged = merge_sections(
            table("[colors]\norder = [\"a\", \"b\"]\n"),
            table("[colors]\norder = [\"c\"]\n"),
        );
        let order = merged["colors"]["order"].as_array().unwrap();
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].as_str(), Some("c"));
    }

    #[test]
    fn sections_recognized() {
        let doc = table(concat!(
            "stray = 1\nlist = [1, 2]\nempty = []\n",
            "[colors]\n",
            "[[servers]]\nname = \"a\"\n",
        ));
        assert!(is_section(&doc["colors"]));
        assert!(is_section(&doc["servers"]));
        assert!(!is_section(&doc["stray"]));
        assert!(!is_section(&doc["list"]));
        assert!(!is_section(&doc["empty"]));
    }
}
