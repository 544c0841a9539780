//! relay-core
//!
//! message の具象型で handler を選び、入力順に `DispatchResult` を 1 件ずつ返す。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, result, ids, errors, summary）
//! - **ports**: 抽象化レイヤー（`HandlerSelector` と任意の `Release`）
//! - **typed**: 型付き Handler API（`Handler<M>`, `HandlerRegistry`, `CompositeHandler`, scan）
//! - **app**: アプリケーションロジック（`Dispatcher`, builder, config, cancel）

pub mod app;
pub mod domain;
pub mod ports;
pub mod typed;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{CancelToken, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use domain::{DispatchError, DispatchResult, HandlerError, Message};
pub use typed::{CompositeHandler, ExecutionMode, Handler, HandlerRegistry, HandlerType};
