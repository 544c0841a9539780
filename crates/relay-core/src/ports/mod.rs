//! Ports - dispatcher と handler 解決の境界
//!
//! crate 内の実装は `typed::HandlerRegistry`。アプリ側は正確な message type で
//! 答える限り、独自の selector（DI コンテナの scope、ルーティング表など）を差し込める。

pub mod selector;

pub use self::selector::{
    HandlerSelector, Release, SelectedHandler, SelectorFactory, constant_selector,
    selector_factory,
};
