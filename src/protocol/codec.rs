//! Protocol codec
//!
//! Encoding and decoding functions for the line protocol.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! SET <key> <value>\n
//! GET <key>\n
//! DEL <key>\n
//! ```
//!
//! ### Response
//! ```text
//! [ok]\n                 SET / DEL succeeded
//! [ok] <value>\n         GET hit
//! [error] not found\n    GET miss
//! [error] <message>\n    anything else
//! ```

use std::io::{BufRead, Write};

use crate::error::{Result, TideError};

use super::parser::tokenize;
use super::{Command, CommandType, Response, Status};

const OK_PREFIX: &str = "[ok]";
const ERROR_PREFIX: &str = "[error]";
const NOT_FOUND_MESSAGE: &str = "not found";

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command as a query line (with trailing newline)
pub fn encode_command(command: &Command) -> String {
    match command {
        Command::Get { key } => format!("GET {}\n", key),
        Command::Set { key, value } => format!("SET {} {}\n", key, value),
        Command::Del { key } => format!("DEL {}\n", key),
    }
}

/// Parse and validate a query line
pub fn decode_command(line: &str) -> Result<Command> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut tokens = tokenize(line)?.into_iter();

    let keyword = tokens
        .next()
        .ok_or_else(|| TideError::Protocol("invalid command".to_string()))?;
    let command_type = CommandType::from_keyword(&keyword)
        .ok_or_else(|| TideError::Protocol("invalid command".to_string()))?;

    let arguments: Vec<String> = tokens.collect();
    if arguments.len() != command_type.arity() {
        tracing::debug!(command = command_type.keyword(), given = arguments.len(), "invalid query arguments");
        return Err(TideError::Protocol("invalid arguments".to_string()));
    }

    let mut arguments = arguments.into_iter();
    let mut next = || arguments.next().unwrap_or_default();

    Ok(match command_type {
        CommandType::Get => Command::Get { key: next() },
        CommandType::Set => {
            let key = next();
            Command::Set { key, value: next() }
        }
        CommandType::Del => Command::Del { key: next() },
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response as one line (with trailing newline)
pub fn encode_response(response: &Response) -> String {
    match (response.status, &response.payload) {
        (Status::Ok, Some(value)) => format!("{} {}\n", OK_PREFIX, value),
        (Status::Ok, None) => format!("{}\n", OK_PREFIX),
        (Status::NotFound, _) => format!("{} {}\n", ERROR_PREFIX, NOT_FOUND_MESSAGE),
        (Status::Error, message) => format!(
            "{} {}\n",
            ERROR_PREFIX,
            message.as_deref().unwrap_or("internal error")
        ),
    }
}

/// Decode a response line
pub fn decode_response(line: &str) -> Result<Response> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(OK_PREFIX) {
        let value = rest.strip_prefix(' ').filter(|v| !v.is_empty());
        return Ok(Response::ok(value.map(str::to_string)));
    }

    if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
        let message = rest.trim_start();
        if message == NOT_FOUND_MESSAGE {
            return Ok(Response::not_found());
        }
        return Ok(Response::error(message));
    }

    Err(TideError::Protocol(format!("malformed response: {:?}", line)))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(encode_command(command).as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read one response line from a stream
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(TideError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        )));
    }
    decode_response(&line)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(encode_response(response).as_bytes())?;
    writer.flush()?;
    Ok(())
}
