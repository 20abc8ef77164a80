//! Tokenizer for dependency expressions.

use crate::error::{ExprError, ExprResult};

/// Kinds of tokens recognized by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    And,
    Or,
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
    Match,
    NotMatch,
    Eof,
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Split an expression into tokens, ending with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> ExprResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let peek = chars.get(i + 1).map(|(_, c)| *c);
        let two = |kind: TokenKind| (kind, 2);
        let one = |kind: TokenKind| (kind, 1);

        let (kind, width) = match (c, peek) {
            ('(', _) => one(TokenKind::LParen),
            (')', _) => one(TokenKind::RParen),
            (',', _) => one(TokenKind::Comma),
            ('?', _) => one(TokenKind::Question),
            (':', _) => one(TokenKind::Colon),
            ('+', _) => one(TokenKind::Plus),
            ('-', _) => one(TokenKind::Minus),
            ('*', _) => one(TokenKind::Star),
            ('/', _) => one(TokenKind::Slash),
            ('%', _) => one(TokenKind::Percent),
            ('&', Some('&')) => two(TokenKind::And),
            ('|', Some('|')) => two(TokenKind::Or),
            ('=', Some('=')) => two(TokenKind::Eq),
            ('=', Some('~')) => two(TokenKind::Match),
            ('!', Some('=')) => two(TokenKind::NotEq),
            ('!', Some('~')) => two(TokenKind::NotMatch),
            ('!', _) => one(TokenKind::Not),
            ('>', Some('=')) => two(TokenKind::Ge),
            ('>', _) => one(TokenKind::Gt),
            ('<', Some('=')) => two(TokenKind::Le),
            ('<', _) => one(TokenKind::Lt),
            ('\'', _) | ('"', _) => {
                let (text, consumed) = read_string(&chars, i)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    position,
                });
                i += consumed;
                continue;
            }
            (c, _) if c.is_ascii_digit() => {
                let (number, consumed) = read_number(&chars, i)?;
                tokens.push(Token {
                    kind: TokenKind::Number(number),
                    position,
                });
                i += consumed;
                continue;
            }
            (c, _) if c.is_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_alphanumeric() || chars[end].1 == '_') {
                    end += 1;
                }
                let word: String = chars[i..end].iter().map(|(_, c)| *c).collect();
                let kind = match word.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => TokenKind::Ident(word),
                };
                tokens.push(Token { kind, position });
                i = end;
                continue;
            }
            (c, _) => {
                return Err(ExprError::syntax(
                    position,
                    format!("unexpected character '{}'", c),
                ))
            }
        };

        tokens.push(Token { kind, position });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: source.len(),
    });
    Ok(tokens)
}

fn read_string(chars: &[(usize, char)], start: usize) -> ExprResult<(String, usize)> {
    let (position, quote) = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == '\\' {
            if let Some((_, escaped)) = chars.get(i + 1) {
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
                continue;
            }
        } else if c == quote {
            return Ok((text, i - start + 1));
        }
        text.push(c);
        i += 1;
    }

    Err(ExprError::syntax(position, "unterminated string literal"))
}

fn read_number(chars: &[(usize, char)], start: usize) -> ExprResult<(f64, usize)> {
    let mut end = start;
    let mut seen_dot = false;
    while end < chars.len() {
        let c = chars[end].1;
        if c.is_ascii_digit() {
            end += 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }

    let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
    let number = text
        .parse::<f64>()
        .map_err(|_| ExprError::syntax(chars[start].0, format!("invalid number '{}'", text)))?;
    Ok((number, end - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a >= 2 && !b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Number(2.0),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_bools() {
        assert_eq!(
            kinds("Bar == 'testing' || true"),
            vec![
                TokenKind::Ident("Bar".into()),
                TokenKind::Eq,
                TokenKind::Str("testing".into()),
                TokenKind::Or,
                TokenKind::True,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_decimal_number() {
        assert_eq!(kinds("10.5"), vec![TokenKind::Number(10.5), TokenKind::Eof]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("'abc"),
            Err(ExprError::Syntax { position: 0, .. })
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("a # b").is_err());
    }
}
