//! Input line tokenizer.
//!
//! Splits a shell line into whitespace-separated tokens. Single and double
//! quotes group text containing whitespace; inside double quotes a
//! backslash escapes `"` and `\`. Whether a token is a path segment, an
//! option or a value is decided later by the dispatcher.

/// One token of an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// True when the token began with a quote. Quoted tokens are never
    /// treated as options or command names.
    pub quoted: bool,
}

impl Token {
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// True for an unquoted token that starts an option (`-x`, `--xyz`).
    pub fn is_option(&self) -> bool {
        !self.quoted && self.text.len() > 1 && self.text.starts_with('-')
    }
}

/// Error raised for malformed input lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unterminated {quote} quote starting at column {column}")]
    UnterminatedQuote { quote: char, column: usize },
}

/// Trims the line and strips one optional leading `/`.
///
/// `/sessions list` and `sessions list` normalize to the same text.
pub fn normalize(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix('/').map(str::trim_start).unwrap_or(line)
}

/// Normalizes and tokenizes a line.
pub fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    let mut chars = normalize(line).chars().enumerate().peekable();
    while let Some((column, c)) = chars.next() {
        match c {
            '"' | '\'' => {
                quoted |= !in_token;
                in_token = true;
                let mut closed = false;
                while let Some((_, inner)) = chars.next() {
                    if inner == c {
                        closed = true;
                        break;
                    }
                    if c == '"' && inner == '\\' {
                        if let Some(&(_, escaped @ ('"' | '\\'))) = chars.peek() {
                            current.push(escaped);
                            chars.next();
                            continue;
                        }
                    }
                    current.push(inner);
                }
                if !closed {
                    return Err(ParseError::UnterminatedQuote {
                        quote: c,
                        column: column + 1,
                    });
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                    in_token = false;
                    quoted = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(Token {
            text: current,
            quoted,
        });
    }
    Ok(tokens)
}
