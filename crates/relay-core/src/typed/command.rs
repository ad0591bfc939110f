//! Command trait - 型付きコマンドの定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Blanket impl で object-safe な `DynCommand` を自動実装

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::CommandType;

/// Command は command_type と Rust の型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Deposit {
///     account: String,
///     amount: i64,
/// }
///
/// impl Command for Deposit {
///     const TYPE: &'static str = "ledger.deposit.v1";
/// }
/// ```
pub trait Command: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// # 命名規約
    /// - `{namespace}.{domain}.{action}.v{major}`
    const TYPE: &'static str;
}

/// DynCommand は異なる Command 型を 1 つのスライスに並べるための object-safe 版
///
/// 送信側（`CommandSender`）は `&[&dyn DynCommand]` を受け取ります。
pub trait DynCommand: Send + Sync {
    fn command_type(&self) -> CommandType;
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl<C: Command> DynCommand for C {
    fn command_type(&self) -> CommandType {
        CommandType::new(C::TYPE)
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
