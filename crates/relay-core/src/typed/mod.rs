//! Typed - 型付き Handler API
//!
//! # 2 つのレイヤー
//! - **Typed**: `Handler<M>`, `HandlerType`, `CompositeHandler<M>`
//!   （アプリが実装・合成するもの）
//! - **Erased**: `HandlerRegistry` は `TypeId` ごとに factory を 1 つ持ち、
//!   handler を `SelectedHandler` として渡す。dispatcher は具象型を知らずに
//!   `Arc<dyn Message>` をルーティングできる。

pub mod composite;
pub mod handler;
pub mod registry;
pub mod scan;

pub use self::composite::{CompositeHandler, ExecutionMode};
pub use self::handler::{Handler, HandlerType, MessageTypes};
pub use self::registry::HandlerRegistry;
pub use self::scan::{HandlerDescriptor, HandlerModule};
