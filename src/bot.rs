use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use crate::config::{Config, TelegramConfig};
use crate::messages::MessageStore;
use crate::platform::TelegramTarget;
use crate::resolver::{BaseResolver, ResolveError};
use crate::router::{RenderTarget, RouteError, Router, TriggerResolver};

/// Shared application state
pub struct AppState {
    router: Router<TriggerResolver<MessageStore>>,
    telegram: TelegramConfig,
    fallback: Option<String>,
}

impl AppState {
    pub fn new(config: Config, store: MessageStore) -> Self {
        let fallback = config.fallback_key().map(str::to_string);
        if let Some(key) = &fallback {
            if !store.contains(key) {
                warn!("Fallback message '{}' is not defined", key);
            }
        }
        for (trigger, key) in &config.triggers {
            if !store.contains(key) {
                warn!("Trigger {:?} points to undefined message '{}'", trigger, key);
            }
        }

        let resolver = TriggerResolver::new(BaseResolver::new(store), config.triggers);
        Self {
            router: Router::new(resolver),
            telegram: config.telegram,
            fallback,
        }
    }

    fn base(&self) -> &BaseResolver<MessageStore> {
        self.router.resolver().base()
    }

    /// Route free text to its message
    async fn answer_text(&self, target: &TelegramTarget, text: &str) {
        match self.router.route(target, text).await {
            Ok(()) => {}
            Err(RouteError::Resolve(e)) if is_miss(&e) => {
                warn!("No answer for {:?}: {}", text, e);
                self.send_fallback(target).await;
            }
            Err(e) => error!("Failed to answer {:?}: {}", text, e),
        }
    }

    /// Send the message whose key arrived as callback data
    async fn answer_key(&self, target: &TelegramTarget, key: &str) {
        let (payload, layout) = match self.base().get(key) {
            Ok(response) => response,
            Err(e) if is_miss(&e) => {
                warn!("Callback for unknown message: {}", e);
                self.send_fallback(target).await;
                return;
            }
            Err(e) => {
                error!("Failed to resolve message '{}': {}", key, e);
                return;
            }
        };

        if let Err(e) = target.send(payload, layout).await {
            error!("Failed to deliver message '{}': {:#}", key, e);
        }
    }

    async fn send_fallback(&self, target: &TelegramTarget) {
        let Some(key) = self.fallback.as_deref() else {
            return;
        };
        match self.base().get(key) {
            Ok((payload, layout)) => {
                if let Err(e) = target.send(payload, layout).await {
                    error!("Failed to deliver fallback message: {:#}", e);
                }
            }
            Err(e) => error!("Fallback message '{}' unavailable: {}", key, e),
        }
    }
}

fn is_miss(e: &ResolveError) -> bool {
    matches!(
        e,
        ResolveError::NoRoute(_) | ResolveError::MessageNotFound { .. }
    )
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>, bot: Bot) -> Result<()> {
    info!("Starting Telegram bot...");

    let message_users = state.telegram.clone();
    let callback_users = state.telegram.clone();

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_map(move |msg: Message| {
                    let user = msg.from.as_ref()?;
                    if message_users.is_allowed(user.id.0) {
                        Some(msg)
                    } else {
                        None
                    }
                })
                .endpoint(handle_message),
        )
        .branch(
            Update::filter_callback_query()
                .filter(move |q: CallbackQuery| callback_users.is_allowed(q.from.id.0))
                .endpoint(handle_callback),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Message from user {}: {}", user_id, text);

    let target = TelegramTarget::new(bot, msg.chat.id);
    state.answer_text(&target, &text).await;

    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(key) = q.data.as_deref() else {
        return Ok(());
    };

    // Stop the button's loading spinner
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback '{}': {}", key, e);
    }

    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        warn!("Callback '{}' without a source message", key);
        return Ok(());
    };

    info!("Callback from user {}: {}", q.from.id.0, key);

    let target = TelegramTarget::new(bot, chat_id);
    state.answer_key(&target, key).await;

    Ok(())
}
