//! Slash-command parsing.

/// Commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Add(String),
    Remove(String),
    List,
    Coming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    NotACommand,
    UnknownCommand(String),
    MissingArgument(&'static str),
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotACommand => write!(f, "message is not a command"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command `{cmd}`"),
            Self::MissingArgument(name) => write!(f, "missing argument `{name}`"),
        }
    }
}

impl std::error::Error for CommandParseError {}

/// Parses `/command[@bot] arguments`. Arguments are the trimmed remainder of the line.
pub fn parse_command(text: &str) -> Result<BotCommand, CommandParseError> {
    let text = text.trim_start();
    let Some(rest) = text.strip_prefix('/') else {
        return Err(CommandParseError::NotACommand);
    };

    let (raw_command, args) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (rest, ""),
    };
    let command = raw_command
        .split_once('@')
        .map_or(raw_command, |(head, _)| head);
    if command.is_empty() {
        return Err(CommandParseError::NotACommand);
    }

    match command {
        "start" => Ok(BotCommand::Start),
        "add" => required(args).map(BotCommand::Add),
        "rm" => required(args).map(BotCommand::Remove),
        "list" => Ok(BotCommand::List),
        "coming" => Ok(BotCommand::Coming),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn required(args: &str) -> Result<String, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::MissingArgument("转债名"));
    }
    Ok(args.to_string())
}
