//! Provider results and selection of the requested part.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{FunctionError, FunctionResult};
use crate::reference::Selector;

/// The raw result of a provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum FnOutput {
    /// An ordered list of strings, e.g. region names.
    List(Vec<String>),
    /// A structured record, e.g. credentials or a cluster configuration.
    Record(Value),
}

impl FnOutput {
    /// Narrow the result according to `selector`.
    pub fn select(self, selector: &Selector) -> FunctionResult<Vec<String>> {
        match (self, selector) {
            (FnOutput::List(items), Selector::All) => Ok(items),
            (FnOutput::List(items), Selector::Index(index)) => items
                .get(*index)
                .cloned()
                .map(|item| vec![item])
                .ok_or(FunctionError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                }),
            (FnOutput::List(_), Selector::Attribute(path)) => Err(FunctionError::InvalidSelection(
                format!("attribute '{}' requested on a list result", path.join(".")),
            )),
            (FnOutput::Record(record), Selector::Attribute(path)) => {
                let key = path.join(".").to_lowercase();
                let fields = flatten(&record);
                Ok(vec![fields.get(&key).cloned().unwrap_or_default()])
            }
            (FnOutput::Record(_), Selector::Index(index)) => Err(FunctionError::InvalidSelection(
                format!("index [{}] requested on a structured result", index),
            )),
            (FnOutput::Record(_), Selector::All) => Err(FunctionError::InvalidSelection(
                "structured result requires an attribute".to_string(),
            )),
        }
    }
}

/// Flatten a record into lower-cased dotted keys mapped to their string form.
pub fn flatten(record: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    flatten_into(record, String::new(), &mut fields);
    fields
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = key.to_lowercase();
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(child, path, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        Value::Null => {
            out.insert(prefix, String::new());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_selection() {
        let out = FnOutput::List(vec!["a".into(), "b".into()]);
        assert_eq!(out.clone().select(&Selector::All).unwrap(), vec!["a", "b"]);
        assert_eq!(out.clone().select(&Selector::Index(1)).unwrap(), vec!["b"]);
        assert!(matches!(
            out.select(&Selector::Index(2)),
            Err(FunctionError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_record_attribute_case_insensitive() {
        let out = FnOutput::Record(json!({
            "Cluster": { "Server": "https://k8s.local" },
            "IsAvailable": true
        }));
        let attr = |p: &[&str]| Selector::Attribute(p.iter().map(|s| s.to_string()).collect());
        assert_eq!(
            out.clone().select(&attr(&["cluster", "SERVER"])).unwrap(),
            vec!["https://k8s.local"]
        );
        assert_eq!(out.clone().select(&attr(&["isavailable"])).unwrap(), vec!["true"]);
        assert_eq!(out.clone().select(&attr(&["missing"])).unwrap(), vec![""]);
        assert!(out.select(&Selector::All).is_err());
    }
}
