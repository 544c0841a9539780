//! Domain - ドメインモデル（message, dispatch result, ids, errors, summary）

pub mod errors;
pub mod ids;
pub mod message;
pub mod summary;

pub use self::errors::{BoxError, DispatchError, HandlerError, RegistryError};
pub use self::ids::SubscriptionId;
pub use self::message::{DispatchResult, Message, MessageKind};
pub use self::summary::DispatchSummary;
