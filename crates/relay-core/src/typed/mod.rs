//! Typed - 型付き Command API
//!
//! command_type の typo を型で排除し、consumer との対応付けを静的に保証します。

pub mod command;
pub mod consumer;

pub use self::command::{Command, DynCommand};
pub use self::consumer::{Consume, TypedConsumer};
