use serde::{Deserialize, Serialize};

/// One source's entry in the library: `{Enabled, LastUpdated, Manga: [ids]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SourceDoc {
    #[serde(default = "enabled_by_default")]
    pub(crate) enabled: bool,
    /// Epoch milliseconds of the last bulk refresh; zero when never refreshed.
    #[serde(default)]
    pub(crate) last_updated: i64,
    #[serde(default)]
    pub(crate) manga: Vec<String>,
}
impl Default for SourceDoc {
    fn default() -> Self {
        Self {
            enabled: true,
            last_updated: 0,
            manga: vec![],
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let doc: SourceDoc = serde_json::from_value(json!({"Manga": ["a", "b"]})).unwrap();
        assert!(doc.enabled);
        assert_eq!(doc.last_updated, 0);
        assert_eq!(doc.manga, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_persisted_layout() {
        let doc = SourceDoc {
            enabled: false,
            last_updated: 1_700_000_000_000,
            manga: vec!["a".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"Enabled": false, "LastUpdated": 1_700_000_000_000_i64, "Manga": ["a"]})
        );
    }
}
