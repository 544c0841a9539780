//! App - アプリケーション層
//!
//! このモジュールは、ports と typed を組み合わせて dispatcher を実装します。
//!
//! # 主要コンポーネント
//! - **Dispatcher**: message stream を受け取り、順序付きの `DispatchResult` stream を返す
//! - **DispatcherBuilder**: Dispatcher の構築と起動時検証
//! - **ShimCache**: 型ごとの invocation shim（初回に構築）
//! - **SelectorLease**: message ごとの selector と確実な release
//! - **CancelToken**: subscription と handler で共有するキャンセル

pub mod builder;
pub mod cancel;
pub mod config;
pub mod dispatcher;
pub mod lease;
pub mod shim;
pub mod spawn;

pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::cancel::CancelToken;
pub use self::config::{ConfigError, DispatcherConfig};
pub use self::dispatcher::{DispatchStream, Dispatcher};
pub use self::lease::SelectorLease;
pub use self::shim::{InvocationShim, ShimCache};
pub use self::spawn::DispatchHandle;
