//! DispatcherBuilder - Dispatcher の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）
//!
//! # Fail-fast
//! - `expect_message::<M>()` でアプリが前提とする message type を登録
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use crate::domain::{Message, MessageKind};
use crate::ports::SelectorFactory;
use crate::typed::HandlerRegistry;

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;

/// DispatcherBuilder は [`Dispatcher`] を構築する
///
/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .with_registry(registry)
///     .expect_message::<OrderPlaced>()
///     .build()?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    selectors: Option<Selectors>,
    config: DispatcherConfig,
    expected: Vec<MessageKind>,
}

enum Selectors {
    Registry(HandlerRegistry),
    Factory(SelectorFactory),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no handler registry or selector factory was configured")]
    MissingSelector,

    #[error("missing handlers for message types: {0:?}")]
    MissingHandlers(Vec<&'static str>),

    /// Expectations can only be checked against a registry.
    #[error("expected message types cannot be checked against a custom selector factory")]
    UncheckedExpectations,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves handlers from `registry`. Replaces any selector factory.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.selectors = Some(Selectors::Registry(registry));
        self
    }

    /// Resolves handlers through `factory`. Replaces any registry.
    pub fn with_selector_factory(mut self, factory: SelectorFactory) -> Self {
        self.selectors = Some(Selectors::Factory(factory));
        self
    }

    /// 省略時は `DispatcherConfig::default()`。
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// `build()` 時に handler の存在を確認する message type を追加
    pub fn expect_message<M: Message>(mut self) -> Self {
        let kind = MessageKind::of::<M>();
        if !self.expected.contains(&kind) {
            self.expected.push(kind);
        }
        self
    }

    /// Dispatcher を構築
    ///
    /// # Errors
    /// - selector が未設定: `MissingSelector`
    /// - 期待した message type に handler がない: `MissingHandlers`
    /// - custom factory に期待を設定した: `UncheckedExpectations`
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let factory = match self.selectors.ok_or(BuildError::MissingSelector)? {
            Selectors::Registry(registry) => {
                let registered = registry.registered_types();
                let missing: Vec<&'static str> = self
                    .expected
                    .iter()
                    .filter(|kind| !registered.contains(kind))
                    .map(MessageKind::name)
                    .collect();
                if !missing.is_empty() {
                    return Err(BuildError::MissingHandlers(missing));
                }
                registry.into_selector_factory()
            }
            Selectors::Factory(_) if !self.expected.is_empty() => {
                return Err(BuildError::UncheckedExpectations);
            }
            Selectors::Factory(factory) => factory,
        };

        Ok(Dispatcher::new(factory).with_config(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CancelToken;
    use crate::ports::{HandlerSelector, constant_selector};
    use crate::test_support::{Journal, Orphan, Ping, PingHandler, PingPongHandler, Pong};
    use std::sync::Arc;

    fn registry_with<F: FnOnce(&mut HandlerRegistry)>(f: F) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        f(&mut registry);
        registry
    }

    #[tokio::test]
    async fn build_success() {
        let journal = Journal::default();
        let dispatcher = DispatcherBuilder::new()
            .with_registry(registry_with(|r| {
                r.register_type::<PingPongHandler>();
            }))
            .expect_message::<Ping>()
            .expect_message::<Pong>()
            .build()
            .unwrap();

        let result = dispatcher
            .dispatch(Arc::new(Ping::new(1, &journal)), &CancelToken::new())
            .await
            .unwrap();
        assert!(result.handled());
    }

    #[test]
    fn build_missing_handlers() {
        let result = DispatcherBuilder::new()
            .with_registry(registry_with(|r| {
                r.register_type::<PingHandler>();
            }))
            .expect_message::<Ping>()
            .expect_message::<Pong>()
            .expect_message::<Pong>()
            .build();

        match result {
            Err(BuildError::MissingHandlers(missing)) => {
                assert_eq!(missing, vec![MessageKind::of::<Pong>().name()]);
            }
            other => panic!("expected missing handlers, got {other:?}"),
        }
    }

    #[test]
    fn build_without_selector_fails() {
        assert!(matches!(
            DispatcherBuilder::new().build(),
            Err(BuildError::MissingSelector)
        ));
    }

    #[test]
    fn custom_factory_cannot_check_expectations() {
        let factory = constant_selector(Arc::new(HandlerRegistry::new()) as Arc<dyn HandlerSelector>);

        let unchecked = DispatcherBuilder::new()
            .with_selector_factory(factory.clone())
            .expect_message::<Orphan>()
            .build();
        assert!(matches!(unchecked, Err(BuildError::UncheckedExpectations)));

        assert!(DispatcherBuilder::new().with_selector_factory(factory).build().is_ok());
    }

    #[test]
    fn config_is_carried_over() {
        let dispatcher = DispatcherBuilder::new()
            .with_registry(HandlerRegistry::new())
            .with_config(DispatcherConfig {
                name: "billing".to_string(),
                ..DispatcherConfig::default()
            })
            .build()
            .unwrap();

        assert_eq!(dispatcher.config().name, "billing");
    }
}
