use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::messages::{FileRef, Grid, InlineCell, Loader, MessageDef, ReplyCell};

/// What gets sent: plain text, or a single media attachment with an optional caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Photo { path: PathBuf, caption: String },
    Document { file: FileRef, caption: String },
}

impl Payload {
    /// Body text for `Text`, caption for media
    pub fn text(&self) -> &str {
        match self {
            Payload::Text(text) => text,
            Payload::Photo { caption, .. } | Payload::Document { caption, .. } => caption,
        }
    }

    /// Caption for media; `None` for plain text or when the caption is empty
    pub fn caption(&self) -> Option<&str> {
        match self {
            Payload::Text(_) => None,
            Payload::Photo { caption, .. } | Payload::Document { caption, .. } => {
                Some(caption.as_str()).filter(|c| !c.is_empty())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Photo { .. } => "photo",
            Payload::Document { .. } => "document",
        }
    }
}

/// Input controls attached to a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Inline(Grid<InlineCell>),
    Reply {
        rows: Grid<ReplyCell>,
        one_time: bool,
        resize: bool,
    },
    /// No keyboard at all
    None,
}

impl Layout {
    /// Reply keyboard that hides after one use and fits its buttons
    pub fn reply(rows: Grid<ReplyCell>) -> Self {
        Layout::Reply {
            rows,
            one_time: true,
            resize: true,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("message not found{}", describe_key(.key))]
    MessageNotFound { key: Option<String> },
    #[error("cannot use reply keyboard and inline keyboard together")]
    ConflictingLayout,
    #[error("no route for input: {0:?}")]
    NoRoute(String),
}

fn describe_key(key: &Option<String>) -> String {
    key.as_deref()
        .map(|k| format!(": {}", k))
        .unwrap_or_default()
}

/// Turns message definitions into sendable responses
#[derive(Debug, Clone)]
pub struct BaseResolver<L> {
    loader: L,
}

impl<L: Loader> BaseResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Look up a message by key and convert it
    pub fn get(&self, key: &str) -> Result<(Payload, Layout), ResolveError> {
        let message = self.loader.get_by_key(key);
        if message.is_empty() {
            return Err(ResolveError::MessageNotFound {
                key: Some(key.to_string()),
            });
        }
        self.convert(message)
    }

    pub fn convert(&self, message: &MessageDef) -> Result<(Payload, Layout), ResolveError> {
        if message.is_empty() {
            return Err(ResolveError::MessageNotFound { key: None });
        }

        // document > photo > text
        let caption = message.text.clone();
        let payload = match (&message.file, &message.image) {
            (Some(file), _) => Payload::Document {
                file: file.clone(),
                caption,
            },
            (None, Some(image)) => Payload::Photo {
                path: image.clone(),
                caption,
            },
            (None, None) => Payload::Text(caption),
        };

        let layout = match (message.buttons.is_empty(), message.answers.is_empty()) {
            (false, false) => return Err(ResolveError::ConflictingLayout),
            (false, true) => Layout::Inline(message.buttons.clone()),
            (true, false) => Layout::reply(message.answers.clone()),
            (true, true) => Layout::None,
        };

        debug!(
            "Converted message: payload={}, layout rows={}",
            payload.kind(),
            layout_rows(&layout)
        );
        Ok((payload, layout))
    }
}

fn layout_rows(layout: &Layout) -> usize {
    match layout {
        Layout::Inline(rows) => rows.len(),
        Layout::Reply { rows, .. } => rows.len(),
        Layout::None => 0,
    }
}
