use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::messages::Loader;
use crate::resolver::{BaseResolver, Layout, Payload, ResolveError};

/// Resolves free-text user input to the next response
pub trait RoutableResolver {
    fn find_next_by_text(&self, text: &str) -> Result<(Payload, Layout), ResolveError>;
}

/// Where resolved responses are delivered (a chat, in practice)
#[async_trait]
pub trait RenderTarget: Send + Sync {
    async fn send(&self, payload: Payload, layout: Layout) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to deliver response: {0:#}")]
    Delivery(anyhow::Error),
}

/// Resolves input text and hands the result to a render target
pub struct Router<R> {
    resolver: R,
}

impl<R: RoutableResolver> Router<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Nothing is sent when resolution fails.
    pub async fn route(&self, target: &dyn RenderTarget, text: &str) -> Result<(), RouteError> {
        let (payload, layout) = self.resolver.find_next_by_text(text)?;
        target
            .send(payload, layout)
            .await
            .map_err(RouteError::Delivery)
    }
}

/// Maps trigger phrases (button labels, commands) to message keys
pub struct TriggerResolver<L> {
    base: BaseResolver<L>,
    triggers: HashMap<String, String>,
}

impl<L: Loader> TriggerResolver<L> {
    pub fn new(base: BaseResolver<L>, triggers: HashMap<String, String>) -> Self {
        let triggers: HashMap<String, String> = triggers
            .into_iter()
            .map(|(trigger, key)| (normalize(&trigger).to_string(), key))
            .collect();
        info!("Registered {} triggers", triggers.len());
        Self { base, triggers }
    }

    pub fn base(&self) -> &BaseResolver<L> {
        &self.base
    }

    /// Message key bound to `text`, if any
    pub fn key_for(&self, text: &str) -> Option<&str> {
        self.triggers.get(normalize(text)).map(String::as_str)
    }
}

impl<L: Loader> RoutableResolver for TriggerResolver<L> {
    fn find_next_by_text(&self, text: &str) -> Result<(Payload, Layout), ResolveError> {
        let key = self
            .key_for(text)
            .ok_or_else(|| ResolveError::NoRoute(text.to_string()))?;
        debug!("Input {:?} routed to message '{}'", text, key);
        self.base.get(key)
    }
}

/// Trim whitespace and drop a `@botname` suffix from commands
fn normalize(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('/') {
        if let Some((command, _bot)) = text.split_once('@') {
            return command;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MessageDef, MessageStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTarget {
        sent: Mutex<Vec<(Payload, Layout)>>,
    }

    #[async_trait]
    impl RenderTarget for RecordingTarget {
        async fn send(&self, payload: Payload, layout: Layout) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((payload, layout));
            Ok(())
        }
    }

    struct FailingTarget;

    #[async_trait]
    impl RenderTarget for FailingTarget {
        async fn send(&self, _payload: Payload, _layout: Layout) -> anyhow::Result<()> {
            anyhow::bail!("chat not found")
        }
    }

    struct FixedResolver(Result<(Payload, Layout), ResolveError>);

    impl RoutableResolver for FixedResolver {
        fn find_next_by_text(&self, _text: &str) -> Result<(Payload, Layout), ResolveError> {
            self.0.clone()
        }
    }

    fn store() -> MessageStore {
        let mut store = MessageStore::new();
        let start: MessageDef =
            serde_yaml::from_str("text: Welcome\nanswers: [[Catalog, Contacts]]").unwrap();
        let contacts: MessageDef = serde_yaml::from_str("text: Call us").unwrap();
        store.insert("start", start);
        store.insert("contacts", contacts);
        store
    }

    fn triggers() -> TriggerResolver<MessageStore> {
        let table = HashMap::from([
            ("/start".to_string(), "start".to_string()),
            ("Contacts".to_string(), "contacts".to_string()),
            ("Catalog".to_string(), "catalog".to_string()),
        ]);
        TriggerResolver::new(BaseResolver::new(store()), table)
    }

    #[tokio::test]
    async fn test_route_sends_resolved_response() {
        let router = Router::new(triggers());
        let target = RecordingTarget::default();

        router.route(&target, "Contacts").await.unwrap();

        let sent = target.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Payload::Text("Call us".to_string()));
        assert_eq!(sent[0].1, Layout::None);
    }

    #[tokio::test]
    async fn test_resolver_error_is_propagated_unchanged() {
        let router = Router::new(FixedResolver(Err(ResolveError::ConflictingLayout)));
        let target = RecordingTarget::default();

        let err = router.route(&target, "anything").await.unwrap_err();
        assert!(matches!(
            err,
            RouteError::Resolve(ResolveError::ConflictingLayout)
        ));
        assert!(target.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_text_is_not_sent() {
        let router = Router::new(triggers());
        let target = RecordingTarget::default();

        let err = router.route(&target, "hello?").await.unwrap_err();
        assert!(matches!(
            err,
            RouteError::Resolve(ResolveError::NoRoute(ref text)) if text == "hello?"
        ));
        assert!(target.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_to_missing_message() {
        let router = Router::new(triggers());
        let err = router
            .route(&RecordingTarget::default(), "Catalog")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::Resolve(ResolveError::MessageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure() {
        let router = Router::new(triggers());
        let err = router.route(&FailingTarget, "/start").await.unwrap_err();
        assert!(matches!(err, RouteError::Delivery(_)));
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn test_trigger_normalization() {
        let triggers = triggers();
        assert_eq!(triggers.key_for("  Contacts "), Some("contacts"));
        assert_eq!(triggers.key_for("/start@blueprint_bot"), Some("start"));
        assert_eq!(triggers.key_for("contacts"), None);
    }
}
