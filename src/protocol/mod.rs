//! Protocol Module
//!
//! Defines the line protocol for client-server communication.
//!
//! ## Protocol Format
//!
//! One query per `\n`-terminated line, one response line back.
//!
//! ### Commands
//! - `SET <key> <value>`
//! - `GET <key>`
//! - `DEL <key>`
//!
//! Tokens are separated by spaces or tabs and may contain only
//! `[A-Za-z0-9*/_]`.
//!
//! ### Responses
//! - `[ok]` / `[ok] <value>`
//! - `[error] not found`
//! - `[error] <message>`

mod codec;
mod command;
mod parser;
mod response;

pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_response,
    write_command, write_response,
};
pub use command::{Command, CommandType};
pub use parser::tokenize;
pub use response::{Response, Status};
