use crate::bot::command::{parse_command, BotCommand, CommandParseError};
use crate::error::BondResult;
use crate::format::{format_coming, format_saved};
use crate::ingest::cache;
use crate::storage::{watchlist, KvStore};
use std::sync::Arc;

pub const HELP_TEXT: &str = "- 添加可转债: `/add 转债名`\n- 删除可转债: `/rm 转债名`\n- 显示已添加可转债: `/list`\n- 显示近期可转债: `/coming`\n\n[了解更多](https://github.com/xuqingfeng/BondReminderBot)";
pub const ACK_TEXT: &str = "✔";
pub const UNKNOWN_COMMAND_TEXT: &str = "⚠️ 未能识别指令";
pub const NOT_A_COMMAND_TEXT: &str = "⚠️ 请输入指令";
pub const MISSING_ARGUMENT_TEXT: &str = "⚠️ 请输入转债名, 例如: `/add 东财转债`";
const ERROR_PREFIX: &str = "⚠️ 出错信息: ";

/// Turns one inbound chat message into one reply, mutating the chat's watchlist as needed.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn KvStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Never fails: handler errors are logged and rendered into the reply.
    pub async fn handle(&self, chat_id: i64, text: Option<&str>) -> String {
        let chat_key = chat_id.to_string();

        if let Err(err) = watchlist::register_chat(self.store.as_ref(), &chat_key).await {
            tracing::error!(chat_id, error = %err, "failed to register chat id");
        }

        let command = match parse_command(text.unwrap_or_default()) {
            Ok(command) => command,
            Err(CommandParseError::NotACommand) => return NOT_A_COMMAND_TEXT.to_string(),
            Err(CommandParseError::UnknownCommand(_)) => return UNKNOWN_COMMAND_TEXT.to_string(),
            Err(CommandParseError::MissingArgument(_)) => return MISSING_ARGUMENT_TEXT.to_string(),
        };

        match self.execute(&chat_key, &command).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(chat_id, ?command, error = %err, "command failed");
                error_reply(&err)
            }
        }
    }

    async fn execute(&self, chat_key: &str, command: &BotCommand) -> BondResult<String> {
        let store = self.store.as_ref();
        match command {
            BotCommand::Start => Ok(HELP_TEXT.to_string()),
            BotCommand::Add(fragment) => {
                watchlist::add_fragment(store, chat_key, fragment).await?;
                Ok(ACK_TEXT.to_string())
            }
            BotCommand::Remove(fragment) => {
                watchlist::remove_fragment(store, chat_key, fragment).await?;
                Ok(ACK_TEXT.to_string())
            }
            BotCommand::List => {
                let entries = watchlist::list_fragments(store, chat_key).await?;
                Ok(format_saved(&entries))
            }
            BotCommand::Coming => {
                let bonds = cache::get_bonds(store, true).await?;
                Ok(format_coming(&bonds))
            }
        }
    }
}

/// Error text goes inside a code span so `_` and `*` in it cannot break Markdown parsing.
fn error_reply(err: &dyn std::fmt::Display) -> String {
    let text = err.to_string().replace('`', "'");
    format!("{ERROR_PREFIX}`{text}`")
}
