use anyhow::{bail, Context, Result};
use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{MessageDef, MessageStore};

/// Load all message definitions from a YAML file.
///
/// The document is a mapping from message key to definition:
/// ```yaml
/// start:
///   text: Welcome!
///   answers:
///     - [Catalog, Contacts]
///     - { text: Send my phone, request_contact: true }
/// price:
///   text: Current price list
///   file: { path: files/price.pdf, name: Prices.pdf }
/// ```
pub async fn load_messages(path: &Path) -> Result<MessageStore> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read messages file: {}", path.display()))?;

    let store = parse_messages(&content)
        .with_context(|| format!("Failed to parse messages file: {}", path.display()))?;

    if store.is_empty() {
        warn!("No messages defined in {}", path.display());
    } else {
        info!("Loaded {} messages from {}", store.len(), path.display());
    }
    debug!("Message keys: {:?}", store.keys().collect::<Vec<_>>());
    Ok(store)
}

/// Parse a messages document. Entries that fail to decode are skipped with a warning.
pub fn parse_messages(content: &str) -> Result<MessageStore> {
    let mut store = MessageStore::new();
    if content.trim().is_empty() {
        return Ok(store);
    }

    let root: Value = serde_yaml::from_str(content).context("Invalid YAML")?;
    let entries = match root {
        Value::Null => return Ok(store),
        Value::Mapping(entries) => entries,
        _ => bail!("Top level must be a mapping of message keys"),
    };

    for (key, body) in entries {
        let key = match key {
            Value::String(key) => key,
            other => {
                warn!("Skipping message with non-string key: {:?}", other);
                continue;
            }
        };

        match serde_yaml::from_value::<MessageDef>(body) {
            Ok(message) => {
                if !message.buttons.is_empty() && !message.answers.is_empty() {
                    warn!(
                        "Message '{}' defines both buttons and answers and cannot be rendered",
                        key
                    );
                }
                store.insert(key, message);
            }
            Err(e) => warn!("Failed to load message '{}': {}", key, e),
        }
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Loader;
    use std::io::Write;

    const MESSAGES: &str = r#"
start:
  text: Welcome!
  answers:
    - [Catalog, Contacts]
    - { text: Send my phone, request_contact: true }
price:
  text: Current price list
  file: { path: files/price.pdf, name: Prices.pdf }
broken:
  text: [not, a, string]
"#;

    #[test]
    fn test_parse_skips_broken_entries() {
        let store = parse_messages(MESSAGES).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("start"));
        assert!(store.contains("price"));
        assert!(!store.contains("broken"));
    }

    #[test]
    fn test_parse_keeps_row_layout() {
        let store = parse_messages(MESSAGES).unwrap();
        let start = store.get_by_key("start");
        assert_eq!(start.answers.len(), 2);
        assert_eq!(start.answers.rows()[0].len(), 2);
        assert_eq!(start.answers.rows()[0][1].text, "Contacts");
        assert!(start.answers.rows()[1][0].request_contact);
    }

    #[test]
    fn test_numeric_scalars_keep_the_message() {
        let store = parse_messages(
            r#"
rate:
  text: Rate us
  buttons: [[{ text: Good, code: 5 }, { text: Bad, code: 1 }]]
score:
  text: Pick a score
  answers: [[1, 2, 3]]
year:
  text: 2024
"#,
        )
        .unwrap();

        assert_eq!(store.len(), 3);
        let rate = store.get_by_key("rate");
        assert_eq!(rate.buttons.rows()[0][0].code.as_deref(), Some("5"));
        let score = store.get_by_key("score");
        let labels: Vec<&str> = score.answers.rows()[0]
            .iter()
            .map(|cell| cell.text.as_str())
            .collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
        assert_eq!(store.get_by_key("year").text, "2024");
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_messages("").unwrap().is_empty());
    }

    #[test]
    fn test_top_level_sequence_is_rejected() {
        assert!(parse_messages("- a\n- b").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MESSAGES.as_bytes()).unwrap();

        let store = load_messages(file.path()).await.unwrap();
        assert_eq!(store.get_by_key("price").text, "Current price list");
    }

    #[tokio::test]
    async fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = load_messages(file.path()).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_messages(&dir.path().join("nope.yaml")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read messages file"));
    }
}
