use std::collections::BTreeMap;
use std::path::Path;

use derive_more::Deref;
use serde_json::Value;

use crate::error::HandlerError;

/// Class index to human-readable label, read from `index_to_name.json`.
///
/// Keys are kept as written in the file. Values are either a label string or
/// an array whose last element is the label (`["n01440764", "tench"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct LabelMapping(BTreeMap<String, String>);

impl LabelMapping {
    pub fn label(&self, index: usize) -> Option<&str> {
        self.0.get(&index.to_string()).map(String::as_str)
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let Value::Object(entries) = value else {
            return Err("expected a JSON object".to_string());
        };

        entries
            .into_iter()
            .map(|(key, value)| {
                let label = match value {
                    Value::String(label) => label,
                    Value::Array(items) => match items.last() {
                        Some(Value::String(label)) => label.clone(),
                        _ => return Err(format!("entry '{key}' has no label string")),
                    },
                    other => return Err(format!("entry '{key}' has unsupported value {other}")),
                };
                Ok((key, label))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(LabelMapping)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HandlerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| HandlerError::io(path, e))?;
        Self::from_json_str(&json).map_err(|reason| HandlerError::LabelMapping {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        LabelMapping(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Loads `<model_dir>/<file_name>` when present.
///
/// A missing file is not an error: the handler serves without labels.
pub fn load_label_mapping(
    model_dir: &Path,
    file_name: &str,
) -> Result<Option<LabelMapping>, HandlerError> {
    let path = model_dir.join(file_name);
    if !path.is_file() {
        log::warn!(
            "Missing the {file_name} file. Inference output will not include class names."
        );
        return Ok(None);
    }
    let mapping = LabelMapping::from_path(&path)?;
    log::debug!("Loaded {} labels from {}", mapping.len(), path.display());
    Ok(Some(mapping))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_indices_to_labels() {
        let mapping = LabelMapping::from_json_str(r#"{"0": "cat", "1": "dog"}"#).unwrap();
        assert_eq!(mapping.label(0), Some("cat"));
        assert_eq!(mapping.label(1), Some("dog"));
        assert_eq!(mapping.label(2), None);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn array_values_use_last_element() {
        let mapping =
            LabelMapping::from_json_str(r#"{"0": ["n01440764", "tench"], "1": ["goldfish"]}"#)
                .unwrap();
        assert_eq!(mapping.label(0), Some("tench"));
        assert_eq!(mapping.label(1), Some("goldfish"));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(LabelMapping::from_json_str(r#"["cat", "dog"]"#).is_err());
        assert!(LabelMapping::from_json_str(r#"{"0": 3}"#).is_err());
        assert!(LabelMapping::from_json_str(r#"{"0": []}"#).is_err());
        assert!(LabelMapping::from_json_str("{").is_err());
    }

    #[test]
    fn absent_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = load_label_mapping(dir.path(), "index_to_name.json").unwrap();
        assert!(mapping.is_none());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index_to_name.json"), "not json").unwrap();
        let err = load_label_mapping(dir.path(), "index_to_name.json").unwrap_err();
        match err {
            HandlerError::LabelMapping { path, .. } => {
                assert_eq!(path, dir.path().join("index_to_name.json"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn collects_from_pairs() {
        let mapping: LabelMapping = [("0", "cat")].into_iter().collect();
        assert_eq!(mapping.label(0), Some("cat"));
    }
}
