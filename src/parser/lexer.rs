//! Lexer (tokenizer) for CFG source
//!
//! Converts source text into a stream of located [`Token`]s, pulled one at a
//! time with [`Lexer::get_token`]. After the end of input it keeps returning
//! [`TokenKind::Eof`] tokens. Comments (`#` to end of line) are folded into a
//! single [`TokenKind::Newline`] token whose text spans the comment;
//! backslash-newline pairs are consumed silently as line continuations.

use super::ast::{Location, Token, TokenKind, TokenValue};
use num_complex::Complex64;
use std::fmt;

/// Lexer error type
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub location: Location,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// A Unicode code-point stream with push-back support and location tracking.
///
/// Two locations are maintained: `char_location` is the position of the last
/// character returned by [`CharSource::read`], and `location` is the position
/// the next character will have. Pushing a character back restores both.
pub struct CharSource {
    chars: Vec<char>,
    pos: usize,
    pushed_back: Vec<(char, Location)>,
    location: Location,
    char_location: Location,
}

impl CharSource {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            pushed_back: Vec::new(),
            location: Location::default(),
            char_location: Location::default(),
        }
    }

    /// Read the next code point, or `None` at end of stream.
    pub fn read(&mut self) -> Option<char> {
        let result = if let Some((c, loc)) = self.pushed_back.pop() {
            self.char_location = loc;
            self.location = loc;
            Some(c)
        } else {
            self.char_location = self.location;
            let c = self.chars.get(self.pos).copied();
            if c.is_some() {
                self.pos += 1;
            }
            c
        };
        if let Some(c) = result {
            self.location.column += 1;
            if c == '\n' {
                self.location.next_line();
            }
        }
        result
    }

    /// Push `c` back so that the next [`CharSource::read`] returns it again.
    pub fn push_back(&mut self, c: char) {
        self.pushed_back.push((c, self.char_location));
    }

    pub fn at_end(&self) -> bool {
        self.pushed_back.is_empty() && self.pos >= self.chars.len()
    }

    /// Position the next character will have.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Position of the last character returned.
    pub fn char_location(&self) -> Location {
        self.char_location
    }
}

/// Lexer for CFG source text
pub struct Lexer {
    source: CharSource,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            source: CharSource::new(input),
        }
    }

    /// Get the next token.
    ///
    /// Once the end of input is reached, every subsequent call returns an
    /// [`TokenKind::Eof`] token.
    pub fn get_token(&mut self) -> Result<Token, LexError> {
        loop {
            let c = self.source.read();
            let start = self.source.char_location();

            match c {
                None => {
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        text: String::new(),
                        value: TokenValue::None,
                        start,
                        end: start,
                    });
                }
                Some('#') => return Ok(self.read_comment(start)),
                Some('\n') => {
                    return Ok(self.make_token(TokenKind::Newline, "\n", start));
                }
                Some('\r') => {
                    // \r or \r\n both collapse to a single newline token
                    match self.source.read() {
                        Some('\n') | None => {}
                        Some(nch) => self.source.push_back(nch),
                    }
                    return Ok(self.make_token(TokenKind::Newline, "\n", start));
                }
                Some('\\') => {
                    // line continuation: backslash must be directly followed
                    // by a line ending
                    match self.source.read() {
                        Some('\n') => continue,
                        Some('\r') => match self.source.read() {
                            Some('\n') => continue,
                            _ => {
                                return Err(LexError {
                                    message: "Unexpected character: \\".to_string(),
                                    location: start,
                                });
                            }
                        },
                        _ => {
                            return Err(LexError {
                                message: "Unexpected character: \\".to_string(),
                                location: start,
                            });
                        }
                    }
                }
                Some(ch) if ch.is_whitespace() => continue,
                Some(ch) if ch.is_alphabetic() || ch == '_' => {
                    return Ok(self.read_word(ch, start));
                }
                Some('`') => return self.read_backtick(start),
                Some(ch) if ch == '\'' || ch == '"' => return self.read_string(ch, start),
                Some(ch) if ch.is_ascii_digit() => {
                    let mut text = String::new();
                    text.push(ch);
                    return self.read_number_token(text, start);
                }
                Some('=') => {
                    return Ok(match self.source.read() {
                        Some('=') => self.make_token(TokenKind::Equal, "==", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::Assign, "=", start)
                        }
                        None => self.make_token(TokenKind::Assign, "=", start),
                    });
                }
                Some('-') => {
                    return match self.source.read() {
                        Some(nch) if nch.is_ascii_digit() || nch == '.' => {
                            let mut text = String::new();
                            text.push('-');
                            text.push(nch);
                            self.read_number_token(text, start)
                        }
                        Some(nch) => {
                            self.source.push_back(nch);
                            Ok(self.make_token(TokenKind::Minus, "-", start))
                        }
                        None => Ok(self.make_token(TokenKind::Minus, "-", start)),
                    };
                }
                Some('.') => {
                    return match self.source.read() {
                        Some(nch) if nch.is_ascii_digit() => {
                            let mut text = String::new();
                            text.push('.');
                            text.push(nch);
                            self.read_number_token(text, start)
                        }
                        Some(nch) => {
                            self.source.push_back(nch);
                            Ok(self.make_token(TokenKind::Dot, ".", start))
                        }
                        None => Ok(self.make_token(TokenKind::Dot, ".", start)),
                    };
                }
                Some('<') => {
                    return Ok(match self.source.read() {
                        Some('=') => self.make_token(TokenKind::LessThanOrEqual, "<=", start),
                        Some('<') => self.make_token(TokenKind::LeftShift, "<<", start),
                        Some('>') => self.make_token(TokenKind::AltUnequal, "<>", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::LessThan, "<", start)
                        }
                        None => self.make_token(TokenKind::LessThan, "<", start),
                    });
                }
                Some('>') => {
                    return Ok(match self.source.read() {
                        Some('=') => self.make_token(TokenKind::GreaterThanOrEqual, ">=", start),
                        Some('>') => self.make_token(TokenKind::RightShift, ">>", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::GreaterThan, ">", start)
                        }
                        None => self.make_token(TokenKind::GreaterThan, ">", start),
                    });
                }
                Some('!') => {
                    return Ok(match self.source.read() {
                        Some('=') => self.make_token(TokenKind::Unequal, "!=", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::Not, "!", start)
                        }
                        None => self.make_token(TokenKind::Not, "!", start),
                    });
                }
                Some('*') => {
                    return Ok(match self.source.read() {
                        Some('*') => self.make_token(TokenKind::Power, "**", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::Star, "*", start)
                        }
                        None => self.make_token(TokenKind::Star, "*", start),
                    });
                }
                Some('/') => {
                    return Ok(match self.source.read() {
                        Some('/') => self.make_token(TokenKind::SlashSlash, "//", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::Slash, "/", start)
                        }
                        None => self.make_token(TokenKind::Slash, "/", start),
                    });
                }
                Some('&') => {
                    return Ok(match self.source.read() {
                        Some('&') => self.make_token(TokenKind::And, "&&", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::BitwiseAnd, "&", start)
                        }
                        None => self.make_token(TokenKind::BitwiseAnd, "&", start),
                    });
                }
                Some('|') => {
                    return Ok(match self.source.read() {
                        Some('|') => self.make_token(TokenKind::Or, "||", start),
                        Some(nch) => {
                            self.source.push_back(nch);
                            self.make_token(TokenKind::BitwiseOr, "|", start)
                        }
                        None => self.make_token(TokenKind::BitwiseOr, "|", start),
                    });
                }
                Some(':') => return Ok(self.make_token(TokenKind::Colon, ":", start)),
                Some(',') => return Ok(self.make_token(TokenKind::Comma, ",", start)),
                Some('{') => return Ok(self.make_token(TokenKind::LeftCurly, "{", start)),
                Some('}') => return Ok(self.make_token(TokenKind::RightCurly, "}", start)),
                Some('[') => return Ok(self.make_token(TokenKind::LeftBracket, "[", start)),
                Some(']') => return Ok(self.make_token(TokenKind::RightBracket, "]", start)),
                Some('(') => return Ok(self.make_token(TokenKind::LeftParen, "(", start)),
                Some(')') => return Ok(self.make_token(TokenKind::RightParen, ")", start)),
                Some('@') => return Ok(self.make_token(TokenKind::At, "@", start)),
                Some('$') => return Ok(self.make_token(TokenKind::Dollar, "$", start)),
                Some('+') => return Ok(self.make_token(TokenKind::Plus, "+", start)),
                Some('%') => return Ok(self.make_token(TokenKind::Modulo, "%", start)),
                Some('~') => return Ok(self.make_token(TokenKind::Tilde, "~", start)),
                Some('^') => return Ok(self.make_token(TokenKind::BitwiseXor, "^", start)),
                Some(ch) => {
                    return Err(LexError {
                        message: format!("Unexpected character: {}", ch),
                        location: start,
                    });
                }
            }
        }
    }

    fn make_token(&self, kind: TokenKind, text: &str, start: Location) -> Token {
        Token {
            kind,
            text: text.to_string(),
            value: TokenValue::None,
            start,
            end: self.source.char_location(),
        }
    }

    /// Consume `#` comment content up to (and including) the line ending and
    /// emit a single newline token spanning the comment text.
    fn read_comment(&mut self, start: Location) -> Token {
        let mut text = String::from('#');
        let mut end = start;

        loop {
            match self.source.read() {
                None | Some('\n') => break,
                Some(ch) => {
                    text.push(ch);
                    end = self.source.char_location();
                }
            }
        }
        if text.ends_with('\r') {
            text.pop();
        }
        Token {
            kind: TokenKind::Newline,
            text,
            value: TokenValue::None,
            start,
            end,
        }
    }

    /// Read an identifier or keyword.
    fn read_word(&mut self, first: char, start: Location) -> Token {
        let mut text = String::new();
        text.push(first);
        let mut end = self.source.char_location();

        while let Some(c) = self.source.read() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                end = self.source.char_location();
            } else {
                self.source.push_back(c);
                break;
            }
        }
        let (kind, value) = match text.as_str() {
            "true" => (TokenKind::True, TokenValue::Bool(true)),
            "false" => (TokenKind::False, TokenValue::Bool(false)),
            "null" => (TokenKind::Null, TokenValue::Null),
            "is" => (TokenKind::Is, TokenValue::None),
            "in" => (TokenKind::In, TokenValue::None),
            "not" => (TokenKind::Not, TokenValue::None),
            "and" => (TokenKind::And, TokenValue::None),
            "or" => (TokenKind::Or, TokenValue::None),
            _ => (TokenKind::Word, TokenValue::Str(text.clone())),
        };
        Token {
            kind,
            text,
            value,
            start,
            end,
        }
    }

    /// Read a quoted string, handling triple-quoted multi-line variants.
    fn read_string(&mut self, quote: char, start: Location) -> Result<Token, LexError> {
        let unterminated = || LexError {
            message: "Unterminated quoted string".to_string(),
            location: start,
        };
        let mut text = vec![quote];
        let mut multi_line = false;

        // check for a triple-quote opener
        match self.source.read() {
            None => return Err(unterminated()),
            Some(c1) => {
                if c1 != quote {
                    self.source.push_back(c1);
                } else {
                    match self.source.read() {
                        Some(c2) if c2 == quote => {
                            multi_line = true;
                            text.push(quote);
                            text.push(quote);
                        }
                        Some(c2) => {
                            self.source.push_back(c2);
                            self.source.push_back(c1);
                        }
                        None => self.source.push_back(c1),
                    }
                }
            }
        }
        let quoter = text.len();
        let mut escaped = false;
        let mut end = self.source.char_location();

        loop {
            match self.source.read() {
                None => return Err(unterminated()),
                Some(ch) => {
                    if ch == '\n' && !multi_line {
                        return Err(unterminated());
                    }
                    text.push(ch);
                    end = self.source.char_location();
                    if ch == quote && !escaped {
                        let n = text.len();
                        if !multi_line
                            || (n >= 2 * quoter
                                && text[n - 3..n] == text[..3]
                                && text[n - 4] != '\\')
                        {
                            break;
                        }
                    }
                    escaped = if ch == '\\' { !escaped } else { false };
                }
            }
        }
        let value = self.parse_escapes(&text[quoter..text.len() - quoter], start)?;
        Ok(Token {
            kind: TokenKind::Str,
            text: text.iter().collect(),
            value: TokenValue::Str(value),
            start,
            end,
        })
    }

    /// Read a backtick-delimited special-value string.
    fn read_backtick(&mut self, start: Location) -> Result<Token, LexError> {
        let mut text = vec!['`'];
        let mut end = start;

        loop {
            match self.source.read() {
                None => {
                    return Err(LexError {
                        message: "Unterminated `-string".to_string(),
                        location: start,
                    });
                }
                Some(ch) if ch.is_control() => {
                    return Err(LexError {
                        message: "Invalid character in `-string".to_string(),
                        location: self.source.char_location(),
                    });
                }
                Some(ch) => {
                    text.push(ch);
                    end = self.source.char_location();
                    if ch == '`' {
                        break;
                    }
                }
            }
        }
        let value = self.parse_escapes(&text[1..text.len() - 1], start)?;
        Ok(Token {
            kind: TokenKind::BackTick,
            text: text.iter().collect(),
            value: TokenValue::Str(value),
            start,
            end,
        })
    }

    /// Decode backslash escapes in string content.
    ///
    /// `\xHH`, `\uHHHH` and `\UHHHHHHHH` must decode to a valid Unicode
    /// scalar value: lone surrogates and code points above 0x10FFFF are
    /// rejected.
    fn parse_escapes(&self, text: &[char], loc: Location) -> Result<String, LexError> {
        let invalid = || LexError {
            message: "Invalid escape sequence".to_string(),
            location: loc,
        };
        let mut out = String::new();
        let mut i = 0;
        let n = text.len();

        while i < n {
            let c = text[i];
            if c != '\\' {
                out.push(c);
                i += 1;
                continue;
            }
            if i + 1 >= n {
                return Err(invalid());
            }
            let e = text[i + 1];
            let simple = match e {
                'a' => Some('\u{0007}'),
                'b' => Some('\u{0008}'),
                'f' => Some('\u{000C}'),
                'n' => Some('\n'),
                'r' => Some('\r'),
                't' => Some('\t'),
                'v' => Some('\u{000B}'),
                '\\' => Some('\\'),
                '\'' => Some('\''),
                '"' => Some('"'),
                _ => None,
            };
            if let Some(ch) = simple {
                out.push(ch);
                i += 2;
                continue;
            }
            let digits = match e {
                'x' | 'X' => 2,
                'u' => 4,
                'U' => 8,
                _ => return Err(invalid()),
            };
            if i + 2 + digits > n {
                return Err(invalid());
            }
            let hex: String = text[i + 2..i + 2 + digits].iter().collect();
            let code_point = u32::from_str_radix(&hex, 16).map_err(|_| invalid())?;
            // from_u32 rejects surrogates and out-of-range code points
            match char::from_u32(code_point) {
                Some(ch) => {
                    out.push(ch);
                    i += 2 + digits;
                }
                None => return Err(invalid()),
            }
        }
        Ok(out)
    }

    fn read_number_token(&mut self, text: String, start: Location) -> Result<Token, LexError> {
        let mut text = text;
        let (kind, value, end) = self.read_number(&mut text, start)?;
        Ok(Token {
            kind,
            text,
            value,
            start,
            end,
        })
    }

    /// Scan the remainder of a numeric literal.
    ///
    /// `text` already holds the leading characters (a digit, `.` plus digit,
    /// or `-` plus digit/`.`). Handles decimal, hex/octal/binary prefixes,
    /// digit-grouping underscores, exponents and the `j` complex suffix.
    fn read_number(
        &mut self,
        text: &mut String,
        start: Location,
    ) -> Result<(TokenKind, TokenValue, Location), LexError> {
        let mut kind = TokenKind::Integer;
        let mut in_exponent = false;
        let mut radix: u32 = 0; // 0 means decimal, no prefix seen
        let mut dot_seen = text.contains('.');
        let mut last_was_digit = text.chars().last().is_some_and(|c| c.is_ascii_hexdigit());
        let mut end = self.source.char_location();
        let mut failure: Option<(String, Location)> = None;
        let mut last_char: Option<char> = None;

        loop {
            let c = self.source.read();
            last_char = c;
            let ch = match c {
                None => break,
                Some(ch) => ch,
            };
            if ch == '.' {
                dot_seen = true;
            }
            if ch == '_' {
                if last_was_digit {
                    text.push(ch);
                    end = self.source.char_location();
                    last_was_digit = false;
                    continue;
                }
                if failure.is_none() {
                    failure = Some((
                        format!("Invalid '_' in number: {}{}", text, ch),
                        self.source.char_location(),
                    ));
                }
            }
            last_was_digit = false; // unless set again below
            let in_radix = match radix {
                0 => ch.is_ascii_digit(),
                2 => ('0'..='1').contains(&ch),
                8 => ('0'..='7').contains(&ch),
                _ => ch.is_ascii_hexdigit(),
            };
            if in_radix {
                text.push(ch);
                end = self.source.char_location();
                last_was_digit = true;
            } else if matches!(ch, 'o' | 'O' | 'x' | 'X' | 'b' | 'B') && text.as_str() == "0" {
                radix = match ch {
                    'o' | 'O' => 8,
                    'x' | 'X' => 16,
                    _ => 2,
                };
                text.push(ch);
                end = self.source.char_location();
            } else if radix == 0 && ch == '.' && !in_exponent && !text.contains('.') {
                text.push(ch);
                end = self.source.char_location();
            } else if radix == 0 && ch == '-' && in_exponent && !text[1..].contains('-') {
                text.push(ch);
                end = self.source.char_location();
            } else if radix == 0
                && (ch == 'e' || ch == 'E')
                && !text.contains('e')
                && !text.contains('E')
            {
                if text.ends_with('_') {
                    if failure.is_none() {
                        failure = Some((
                            format!("Invalid '_' in number: {}{}", text, ch),
                            self.source.char_location(),
                        ));
                    }
                    break;
                }
                text.push(ch);
                end = self.source.char_location();
                in_exponent = true;
            } else {
                break;
            }
        }
        if text.ends_with('_') {
            if failure.is_none() {
                failure = Some((
                    format!("Invalid '_' at end of number: {}", text),
                    end,
                ));
            }
        } else if let Some(ch) = last_char {
            if radix == 0 && (ch == 'j' || ch == 'J') {
                text.push(ch);
                end = self.source.char_location();
                kind = TokenKind::Complex;
            } else if ch == '.' || ch.is_alphanumeric() {
                // a letter or digit which wasn't accepted above
                if failure.is_none() {
                    failure = Some((
                        "Invalid character in number".to_string(),
                        self.source.char_location(),
                    ));
                }
            } else {
                self.source.push_back(ch);
            }
        }
        let mut value = TokenValue::None;

        if failure.is_none() {
            let s = text.replace('_', "");
            if radix != 0 {
                match i64::from_str_radix(&s[2..], radix) {
                    Ok(v) => value = TokenValue::Integer(v),
                    Err(_) => failure = Some(("Invalid character in number".to_string(), start)),
                }
            } else if kind == TokenKind::Complex {
                match s[..s.len() - 1].parse::<f64>() {
                    Ok(v) => value = TokenValue::Complex(Complex64::new(0.0, v)),
                    Err(_) => failure = Some(("Invalid character in number".to_string(), start)),
                }
            } else if in_exponent || dot_seen {
                kind = TokenKind::Float;
                match s.parse::<f64>() {
                    Ok(v) => value = TokenValue::Float(v),
                    Err(_) => failure = Some(("Invalid character in number".to_string(), start)),
                }
            } else {
                // a bare leading zero means octal, for historical reasons
                let base = if s.starts_with('0') && s.len() > 1 {
                    8
                } else {
                    10
                };
                match i64::from_str_radix(&s, base) {
                    Ok(v) => value = TokenValue::Integer(v),
                    Err(_) => failure = Some(("Invalid character in number".to_string(), start)),
                }
            }
        }
        match failure {
            Some((message, location)) => Err(LexError { message, location }),
            None => Ok((kind, value, end)),
        }
    }
}
