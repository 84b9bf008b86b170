//! Ordered dispatch tables for protocol lines.
//!
//! Every table is a fixed list of `(Pattern, command)` entries. A line is
//! checked against the entries in the order they were declared and the first
//! match wins, so a catch-all must always come last.

/// How an entry recognises a line. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// The line starts with the literal.
    Prefix(&'static str),
    Any,
}

impl Pattern {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => line.starts_with(prefix),
            Pattern::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandEntry<T> {
    pub pattern: Pattern,
    pub command: T,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandTable<T: 'static> {
    entries: &'static [CommandEntry<T>],
}

impl<T: Copy + 'static> CommandTable<T> {
    pub const fn new(entries: &'static [CommandEntry<T>]) -> Self {
        Self { entries }
    }

    /// Returns the command of the first entry whose pattern matches `line`.
    pub fn dispatch(&self, line: &str) -> Option<T> {
        self.entries
            .iter()
            .find(|entry| entry.pattern.matches(line))
            .map(|entry| entry.command)
    }

    pub fn entries(&self) -> &'static [CommandEntry<T>] {
        self.entries
    }
}

/// Requests a server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Hello,
    Close,
    NotFound,
}

pub const SERVER_COMMANDS: CommandTable<ServerCommand> = CommandTable::new(&[
    CommandEntry { pattern: Pattern::Prefix("HELLO"), command: ServerCommand::Hello },
    CommandEntry { pattern: Pattern::Prefix("CLOSE"), command: ServerCommand::Close },
    CommandEntry { pattern: Pattern::Any, command: ServerCommand::NotFound },
]);

/// Lines a client acts on when they arrive from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerReply {
    Message,
    CloseConfirm,
}

pub const MESSAGE_PREFIX: &str = "MSG ";
pub const CLOSE_CONFIRM: &str = "CLOSE CONFIRM";

// No catch-all: anything else from the server is dropped.
pub const CLIENT_RECEIVE_COMMANDS: CommandTable<ServerReply> = CommandTable::new(&[
    CommandEntry { pattern: Pattern::Prefix(MESSAGE_PREFIX), command: ServerReply::Message },
    CommandEntry {
        pattern: Pattern::Prefix(CLOSE_CONFIRM),
        command: ServerReply::CloseConfirm,
    },
]);

/// What the client does with a line typed at the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Close,
    Forward,
}

pub const CLIENT_SEND_COMMANDS: CommandTable<ConsoleCommand> = CommandTable::new(&[
    CommandEntry { pattern: Pattern::Prefix("CLOSE"), command: ConsoleCommand::Close },
    CommandEntry { pattern: Pattern::Any, command: ConsoleCommand::Forward },
]);

/// Builds a `MSG <text>` line.
pub fn message_line(text: &str) -> String {
    format!("{MESSAGE_PREFIX}{text}")
}

/// Strips the `MSG ` prefix from a server message, if present.
pub fn message_text(line: &str) -> &str {
    line.strip_prefix(MESSAGE_PREFIX).unwrap_or(line)
}
