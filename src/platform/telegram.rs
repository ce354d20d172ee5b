use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
    KeyboardMarkup, ReplyMarkup,
};
use tracing::debug;
use url::Url;

use crate::messages::{FileRef, Grid, InlineCell, ReplyCell};
use crate::resolver::{Layout, Payload};
use crate::router::RenderTarget;

/// Sends responses into a single Telegram chat
#[derive(Clone)]
pub struct TelegramTarget {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramTarget {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl RenderTarget for TelegramTarget {
    async fn send(&self, payload: Payload, layout: Layout) -> Result<()> {
        let markup = reply_markup(&layout)?;
        let caption = payload.caption().map(str::to_string);
        debug!(
            "Sending {} to chat {}: {:?}",
            payload.kind(),
            self.chat_id,
            payload.text()
        );

        match payload {
            Payload::Text(text) => {
                let mut request = self.bot.send_message(self.chat_id, text);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await.context("Failed to send message")?;
            }
            Payload::Photo { path, .. } => {
                let mut request = self.bot.send_photo(self.chat_id, InputFile::file(path));
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await.context("Failed to send photo")?;
            }
            Payload::Document { file, .. } => {
                let mut request = self.bot.send_document(self.chat_id, input_file(file));
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await.context("Failed to send document")?;
            }
        }

        Ok(())
    }
}

fn input_file(file: FileRef) -> InputFile {
    let input = InputFile::file(file.path);
    match file.name {
        Some(name) => input.file_name(name),
        None => input,
    }
}

/// Telegram markup for a layout; `None` when no keyboard should be attached
pub fn reply_markup(layout: &Layout) -> Result<Option<ReplyMarkup>> {
    let markup = match layout {
        Layout::Inline(rows) => Some(ReplyMarkup::InlineKeyboard(inline_keyboard(rows)?)),
        Layout::Reply {
            rows,
            one_time,
            resize,
        } => {
            let mut keyboard = KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(reply_button).collect::<Vec<_>>()),
            );
            if *one_time {
                keyboard = keyboard.one_time_keyboard();
            }
            if *resize {
                keyboard = keyboard.resize_keyboard();
            }
            Some(ReplyMarkup::Keyboard(keyboard))
        }
        Layout::None => None,
    };
    Ok(markup)
}

fn inline_keyboard(rows: &Grid<InlineCell>) -> Result<InlineKeyboardMarkup> {
    let mut keyboard = Vec::with_capacity(rows.len());
    for row in rows {
        let buttons = row.iter().map(inline_button).collect::<Result<Vec<_>>>()?;
        keyboard.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(keyboard))
}

/// Telegram limit on callback data, in bytes
const MAX_CALLBACK_DATA_LEN: usize = 64;

/// A link wins over a callback code; a cell with neither calls back with its own label.
fn inline_button(cell: &InlineCell) -> Result<InlineKeyboardButton> {
    if let Some(link) = &cell.link {
        let url = Url::parse(link)
            .with_context(|| format!("Invalid link on button '{}': {}", cell.text, link))?;
        return Ok(InlineKeyboardButton::url(cell.text.clone(), url));
    }
    let data = cell.code.clone().unwrap_or_else(|| cell.text.clone());
    if data.len() > MAX_CALLBACK_DATA_LEN {
        bail!(
            "Callback data on button '{}' is {} bytes, limit is {}",
            cell.text,
            data.len(),
            MAX_CALLBACK_DATA_LEN
        );
    }
    Ok(InlineKeyboardButton::callback(cell.text.clone(), data))
}

fn reply_button(cell: &ReplyCell) -> KeyboardButton {
    let button = KeyboardButton::new(cell.text.clone());
    if cell.request_contact {
        button.request(ButtonRequest::Contact)
    } else {
        button
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn inline(yaml: &str) -> Layout {
        Layout::Inline(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_no_layout_no_markup() {
        assert!(reply_markup(&Layout::None).unwrap().is_none());
    }

    #[test]
    fn test_inline_buttons() {
        let layout = inline(
            r#"
- [{ text: "Yes", code: "y" }, { text: Docs, link: "https://example.com/docs" }]
- { text: Plain }
"#,
        );
        let Some(ReplyMarkup::InlineKeyboard(markup)) = reply_markup(&layout).unwrap() else {
            panic!("expected inline keyboard");
        };

        assert_eq!(markup.inline_keyboard.len(), 2);
        let first = &markup.inline_keyboard[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "Yes");
        assert_eq!(first[0].kind, InlineKeyboardButtonKind::CallbackData("y".to_string()));
        assert_eq!(
            first[1].kind,
            InlineKeyboardButtonKind::Url(Url::parse("https://example.com/docs").unwrap())
        );
        assert_eq!(
            markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::CallbackData("Plain".to_string())
        );
    }

    #[test]
    fn test_invalid_link_is_an_error() {
        let layout = inline("[{ text: Broken, link: 'not a url' }]");
        let err = reply_markup(&layout).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn test_callback_data_length_limit() {
        let label = "x".repeat(MAX_CALLBACK_DATA_LEN + 1);
        let layout = inline(&format!("[{{ text: {} }}]", label));
        let err = reply_markup(&layout).unwrap_err();
        assert!(err.to_string().contains("limit is 64"));

        let layout = inline(&format!("[{{ text: Long, code: {} }}]", label));
        assert!(reply_markup(&layout).is_err());

        // a link button carries no callback data
        let layout = inline(&format!(
            "[{{ text: {}, link: 'https://example.com' }}]",
            label
        ));
        assert!(reply_markup(&layout).is_ok());

        let code = "y".repeat(MAX_CALLBACK_DATA_LEN);
        let layout = inline(&format!("[{{ text: Ok, code: {} }}]", code));
        assert!(reply_markup(&layout).is_ok());
    }

    #[test]
    fn test_reply_buttons() {
        let rows: Grid<ReplyCell> =
            serde_yaml::from_str("[[Catalog, Contacts], { text: Call, request_contact: true }]")
                .unwrap();
        let Some(ReplyMarkup::Keyboard(markup)) = reply_markup(&Layout::reply(rows)).unwrap()
        else {
            panic!("expected reply keyboard");
        };

        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0][1].text, "Contacts");
        assert!(markup.keyboard[0][0].request.is_none());
        assert_eq!(markup.keyboard[1][0].request, Some(ButtonRequest::Contact));
    }
}
