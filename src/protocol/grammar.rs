//! Token and `key="value"` grammar
//!
//! ```text
//! line   := token (ws token)* (ws pair)*
//! pair   := key ws? '=' ws? value
//! value  := '"' [^"]* '"' | [^ \t"]+
//! ```
//!
//! A closing quote may be followed directly by the next key, which is what
//! older clients send for `comp="x"tag="y"`.

use thiserror::Error;

use crate::store::{Field, FieldSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("empty key")]
    EmptyKey,

    #[error("expected '=' after `{0}`")]
    MissingEquals(String),

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("unexpected '\"' in `{0}`")]
    StrayQuote(String),

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("invalid number `{value}` for `{key}`")]
    InvalidNumber { key: String, value: String },

    #[error("missing argument")]
    MissingArgument,
}

impl GrammarError {
    /// Errors caused by a bad value rather than bad syntax
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidNumber { .. })
    }
}

fn is_ws(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Split off the next whitespace-delimited token
pub fn split_token(input: &str) -> (&str, &str) {
    let input = input.trim_start_matches(is_ws);
    let end = input.find(is_ws).unwrap_or(input.len());
    (&input[..end], &input[end..])
}

/// Parse every `key=value` pair of `input`, in order
pub fn parse_pairs(input: &str) -> Result<Vec<(&str, &str)>, GrammarError> {
    let mut pairs = Vec::new();
    let mut rest = input.trim_start_matches(is_ws);

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || is_ws(c))
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return Err(GrammarError::EmptyKey);
        }
        if key.contains('"') {
            return Err(GrammarError::StrayQuote(key.to_string()));
        }

        rest = rest[key_end..].trim_start_matches(is_ws);
        rest = rest
            .strip_prefix('=')
            .ok_or_else(|| GrammarError::MissingEquals(key.to_string()))?
            .trim_start_matches(is_ws);

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let close = quoted.find('"').ok_or(GrammarError::UnterminatedQuote)?;
            value = &quoted[..close];
            rest = &quoted[close + 1..];
        } else {
            let end = rest.find(is_ws).unwrap_or(rest.len());
            value = &rest[..end];
            if value.contains('"') {
                return Err(GrammarError::StrayQuote(value.to_string()));
            }
            rest = &rest[end..];
        }

        pairs.push((key, value));
        rest = rest.trim_start_matches(is_ws);
    }

    Ok(pairs)
}

/// Parse entry field pairs into a `FieldSet`
pub fn parse_field_set(input: &str) -> Result<FieldSet, GrammarError> {
    let mut set = FieldSet::new();
    for (key, value) in parse_pairs(input)? {
        let field = Field::from_name(key).ok_or_else(|| GrammarError::UnknownKey(key.to_string()))?;
        if field.is_numeric() {
            let number = value
                .trim()
                .parse::<i32>()
                .map_err(|_| GrammarError::InvalidNumber {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            set.set_number(field, number);
        } else {
            set.set_text(field, value.to_string());
        }
    }
    Ok(set)
}

/// Parse a single free-text argument: a quoted run or one bare token
pub fn parse_text_argument(input: &str) -> Result<String, GrammarError> {
    let input = input.trim_start_matches(is_ws);
    if let Some(quoted) = input.strip_prefix('"') {
        let close = quoted.find('"').ok_or(GrammarError::UnterminatedQuote)?;
        return match &quoted[..close] {
            "" => Err(GrammarError::MissingArgument),
            text => Ok(text.to_string()),
        };
    }
    match split_token(input).0 {
        "" => Err(GrammarError::MissingArgument),
        token => Ok(token.to_string()),
    }
}

/// Whether `value` can travel inside a quoted wire value
pub fn is_encodable(value: &str) -> bool {
    !value.contains(['"', '\r', '\n'])
}

/// Encode the given fields of `set` as `key="value"` / `key=N` pairs
pub fn encode_field_set(set: &FieldSet) -> String {
    Field::ALL
        .into_iter()
        .filter_map(|field| {
            if let Some(number) = set.number(field) {
                Some(format!("{}={}", field.name(), number))
            } else {
                set.text(field)
                    .map(|text| format!("{}=\"{}\"", field.name(), text))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
