//! Command definitions
//!
//! Represents validated queries from clients.

use crate::wal::Entry;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Set,
    Del,
}

impl CommandType {
    /// Map a query keyword; keywords are case-sensitive
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "GET" => Some(CommandType::Get),
            "SET" => Some(CommandType::Set),
            "DEL" => Some(CommandType::Del),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            CommandType::Get => "GET",
            CommandType::Set => "SET",
            CommandType::Del => "DEL",
        }
    }

    /// Number of tokens after the keyword
    pub fn arity(&self) -> usize {
        match self {
            CommandType::Get | CommandType::Del => 1,
            CommandType::Set => 2,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set { key: String, value: String },

    /// Delete a key
    Del { key: String },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Del { .. } => CommandType::Del,
        }
    }

    /// WAL entry for a mutating command; `None` for reads
    pub fn to_entry(&self) -> Option<Entry> {
        match self {
            Command::Get { .. } => None,
            Command::Set { key, value } => Some(Entry::set(key.as_str(), value.as_str())),
            Command::Del { key } => Some(Entry::del(key.as_str())),
        }
    }
}
