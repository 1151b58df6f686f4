//! Query tokenizer
//!
//! Splits a query line into tokens. Tokens are separated by runs of space,
//! tab, or newline and may only contain `[A-Za-z0-9*/_]`.

use crate::error::{Result, TideError};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    InToken,
    AfterSpace,
}

/// Tokenize a query
///
/// Leading whitespace is a parse error; trailing whitespace is not.
pub fn tokenize(query: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut state = State::Initial;

    for symbol in query.chars() {
        match state {
            State::Initial if is_space(symbol) => {
                return Err(TideError::Protocol("can't parse query".to_string()));
            }
            State::AfterSpace if is_space(symbol) => {}
            State::InToken if is_space(symbol) => {
                tokens.push(std::mem::take(&mut token));
                state = State::AfterSpace;
            }
            _ if is_token_symbol(symbol) => {
                token.push(symbol);
                state = State::InToken;
            }
            _ => {
                return Err(TideError::Protocol(format!("invalid symbol {:?}", symbol)));
            }
        }
    }

    if state == State::InToken {
        tokens.push(token);
    }

    Ok(tokens)
}

fn is_space(symbol: char) -> bool {
    matches!(symbol, ' ' | '\t' | '\n')
}

fn is_token_symbol(symbol: char) -> bool {
    symbol.is_ascii_alphanumeric() || matches!(symbol, '*' | '/' | '_')
}
