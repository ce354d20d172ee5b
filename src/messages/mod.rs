pub mod grid;
pub mod loader;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

pub use grid::Grid;

/// A declarative bot response, as written in the messages file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MessageDef {
    /// Message body, or the caption when media is attached. Empty means absent.
    #[serde(deserialize_with = "scalar_text")]
    pub text: String,
    #[serde(deserialize_with = "non_empty_path")]
    pub image: Option<PathBuf>,
    #[serde(deserialize_with = "non_empty_file")]
    pub file: Option<FileRef>,
    /// Inline keyboard, attached to the message itself
    pub buttons: Grid<InlineCell>,
    /// Reply keyboard, shown in place of the text input
    pub answers: Grid<ReplyCell>,
}

impl MessageDef {
    /// True for the sentinel returned on a missing key
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_none() && self.file.is_none()
    }
}

/// Document attachment. Written either as a bare path or as `{ path, name }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    /// File name shown to the user; defaults to the path's own file name
    pub name: Option<String>,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "InlineCellRepr")]
pub struct InlineCell {
    pub text: String,
    /// Callback data sent back when pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// External URL opened when pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "ReplyCellRepr")]
pub struct ReplyCell {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

// A cell may be a bare label or a full mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum InlineCellRepr {
    Label(#[serde(deserialize_with = "scalar_text")] String),
    Full {
        #[serde(default, deserialize_with = "scalar_text")]
        text: String,
        #[serde(default, deserialize_with = "optional_scalar_text")]
        code: Option<String>,
        #[serde(default, deserialize_with = "optional_scalar_text")]
        link: Option<String>,
    },
}

impl From<InlineCellRepr> for InlineCell {
    fn from(repr: InlineCellRepr) -> Self {
        match repr {
            InlineCellRepr::Label(text) => Self {
                text,
                ..Self::default()
            },
            InlineCellRepr::Full { text, code, link } => Self {
                text,
                code: code.filter(|c| !c.is_empty()),
                link: link.filter(|l| !l.is_empty()),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyCellRepr {
    Label(#[serde(deserialize_with = "scalar_text")] String),
    Full {
        #[serde(default, deserialize_with = "scalar_text")]
        text: String,
        #[serde(default)]
        request_contact: bool,
        #[serde(default, deserialize_with = "optional_scalar_text")]
        link: Option<String>,
    },
}

impl From<ReplyCellRepr> for ReplyCell {
    fn from(repr: ReplyCellRepr) -> Self {
        match repr {
            ReplyCellRepr::Label(text) => Self {
                text,
                ..Self::default()
            },
            ReplyCellRepr::Full {
                text,
                request_contact,
                link,
            } => Self {
                text,
                request_contact,
                link: link.filter(|l| !l.is_empty()),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileRepr {
    Path(String),
    Detailed {
        #[serde(default)]
        path: String,
        #[serde(default)]
        name: Option<String>,
    },
}

/// Any YAML scalar as its literal text, so `code: 5` or `text: 2024` load as strings.
/// Null is empty; mappings and sequences are rejected.
fn scalar_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(optional_scalar_text(d)?.unwrap_or_default())
}

fn optional_scalar_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Tagged(tagged) => Err(de::Error::custom(format!(
            "unexpected tagged value {}",
            tagged.tag
        ))),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err(de::Error::custom("expected a scalar, found a sequence or mapping"))
        }
    }
}

fn non_empty_path<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PathBuf>, D::Error> {
    let raw = optional_scalar_text(d)?;
    Ok(raw.filter(|p| !p.is_empty()).map(PathBuf::from))
}

fn non_empty_file<'de, D: Deserializer<'de>>(d: D) -> Result<Option<FileRef>, D::Error> {
    let file = match Option::<FileRepr>::deserialize(d)? {
        None => None,
        Some(FileRepr::Path(path)) => Some((path, None)),
        Some(FileRepr::Detailed { path, name }) => Some((path, name)),
    };
    Ok(file
        .filter(|(path, _)| !path.is_empty())
        .map(|(path, name)| {
            let mut file = FileRef::new(path);
            file.name = name.filter(|n| !n.is_empty());
            file
        }))
}

/// Read access to message definitions by key.
///
/// A missing key yields an empty definition rather than an error; callers
/// check [`MessageDef::is_empty`].
pub trait Loader {
    fn get_by_key(&self, key: &str) -> &MessageDef;
}

/// All message definitions, loaded once at startup and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: HashMap<String, MessageDef>,
    empty: MessageDef,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message definition under `key`, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, message: MessageDef) {
        let key = key.into();
        debug!("Registered message: {}", key);
        self.messages.insert(key, message);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Loader for MessageStore {
    fn get_by_key(&self, key: &str) -> &MessageDef {
        self.messages.get(key).unwrap_or(&self.empty)
    }
}
