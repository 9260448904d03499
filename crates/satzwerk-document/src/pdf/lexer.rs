// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream lexer.
//
// Splits a decoded content stream into operators with their operands and
// records the exact byte span of each, so untouched operators can be copied
// through verbatim. Inline images (`BI ... ID ... EI`) come out as one opaque
// operator.

use std::ops::Range;

use lopdf::{Dictionary, Object, StringFormat};

use satzwerk_core::error::{Result, SatzwerkError};

/// One operator with its operands and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOp {
    pub operator: String,
    pub operands: Vec<Object>,
    /// Byte range covering the operands and the operator itself.
    pub span: Range<usize>,
}

impl RawOp {
    /// Numeric operand `index`, if present and numeric.
    pub fn number(&self, index: usize) -> Option<f64> {
        self.operands.get(index).and_then(as_number)
    }
}

/// Integer or real operand as `f64`.
pub fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Tokenize a whole content stream.
pub fn tokenize(data: &[u8]) -> Result<Vec<RawOp>> {
    Lexer::new(data).run()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

enum Token {
    Object(Object),
    Keyword(String),
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn error(&self, what: impl std::fmt::Display) -> SatzwerkError {
        SatzwerkError::ContentExtraction(format!("{what} at byte {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn run(mut self) -> Result<Vec<RawOp>> {
        let mut ops = Vec::new();
        let mut operands = Vec::new();
        let mut start = None;

        loop {
            self.skip_whitespace();
            let Some(_) = self.peek() else { break };

            let token_start = self.pos;
            match self.token()? {
                Token::Object(obj) => {
                    start.get_or_insert(token_start);
                    operands.push(obj);
                }
                Token::Keyword(word) => {
                    let op_start = start.take().unwrap_or(token_start);
                    if word == "BI" {
                        if !operands.is_empty() {
                            return Err(self.error("operands before inline image"));
                        }
                        self.inline_image()?;
                    }
                    ops.push(RawOp {
                        operator: word,
                        operands: std::mem::take(&mut operands),
                        span: op_start..self.pos,
                    });
                }
            }
        }

        if !operands.is_empty() {
            return Err(self.error("stream ends with operands but no operator"));
        }
        Ok(ops)
    }

    /// Skip whitespace, comments, and stray braces (PostScript procedure
    /// delimiters that only appear in CMap programs).
    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) || b == b'{' || b == b'}' {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> Result<Token> {
        let Some(b) = self.peek() else {
            return Err(self.error("unexpected end of stream"));
        };
        match b {
            b'(' => Ok(Token::Object(self.literal_string()?)),
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                Ok(Token::Object(self.dictionary()?))
            }
            b'<' => Ok(Token::Object(self.hex_string()?)),
            b'[' => Ok(Token::Object(self.array()?)),
            b'/' => Ok(Token::Object(self.name()?)),
            b'+' | b'-' | b'.' | b'0'..=b'9' => Ok(Token::Object(self.number()?)),
            b')' | b'>' | b']' => Err(self.error(format!("unexpected '{}'", b as char))),
            _ => {
                let word = self.regular_run();
                Ok(match word.as_str() {
                    "true" => Token::Object(Object::Boolean(true)),
                    "false" => Token::Object(Object::Boolean(false)),
                    "null" => Token::Object(Object::Null),
                    _ => Token::Keyword(word),
                })
            }
        }
    }

    /// An operand (never a bare operator) inside an array or dictionary.
    fn object(&mut self) -> Result<Object> {
        match self.token()? {
            Token::Object(obj) => Ok(obj),
            Token::Keyword(word) => Err(self.error(format!("unexpected operator '{word}'"))),
        }
    }

    fn regular_run(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Result<Object> {
        let start = self.pos;
        let word = self.regular_run();
        if word.contains('.') {
            word.parse::<f32>()
                .map(Object::Real)
                .map_err(|_| SatzwerkError::ContentExtraction(format!("bad number '{word}' at byte {start}")))
        } else {
            match word.parse::<i64>() {
                Ok(i) => Ok(Object::Integer(i)),
                // Integers too large for i64 still parse as reals.
                Err(_) => word.parse::<f32>().map(Object::Real).map_err(|_| {
                    SatzwerkError::ContentExtraction(format!("bad number '{word}' at byte {start}"))
                }),
            }
        }
    }

    fn name(&mut self) -> Result<Object> {
        self.pos += 1; // '/'
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
        }
        Ok(Object::Name(decode_name(&self.data[start..self.pos])))
    }

    fn literal_string(&mut self) -> Result<Object> {
        self.pos += 1; // '('
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.peek() else {
                        return Err(self.error("unterminated escape"));
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xff) as u8);
                        }
                        // Line continuation.
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }
        Ok(Object::String(out, StringFormat::Literal))
    }

    fn hex_string(&mut self) -> Result<Object> {
        self.pos += 1; // '<'
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated hex string"));
            };
            self.pos += 1;
            match b {
                b'>' => break,
                b if b.is_ascii_hexdigit() => digits.push(b),
                b if is_whitespace(b) => {}
                other => return Err(self.error(format!("bad hex digit '{}'", other as char))),
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        let bytes = digits
            .chunks(2)
            .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
            .collect();
        Ok(Object::String(bytes, StringFormat::Hexadecimal))
    }

    fn array(&mut self) -> Result<Object> {
        self.pos += 1; // '['
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => items.push(self.object()?),
            }
        }
        Ok(Object::Array(items))
    }

    fn dictionary(&mut self) -> Result<Object> {
        self.pos += 2; // '<<'
        let mut dict = Dictionary::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated dictionary")),
                Some(b'>') if self.data.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    break;
                }
                Some(b'/') => {
                    let Object::Name(key) = self.name()? else {
                        return Err(self.error("dictionary key"));
                    };
                    self.skip_whitespace();
                    let value = self.object()?;
                    dict.set(key, value);
                }
                Some(_) => return Err(self.error("dictionary key is not a name")),
            }
        }
        Ok(Object::Dictionary(dict))
    }

    /// Skip an inline image: parameters up to `ID`, one whitespace byte, then
    /// binary data up to an `EI` that stands alone.
    fn inline_image(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                return Err(self.error("unterminated inline image"));
            }
            match self.token()? {
                Token::Keyword(word) if word == "ID" => break,
                Token::Keyword(word) => {
                    return Err(self.error(format!("unexpected '{word}' in inline image")));
                }
                Token::Object(_) => {}
            }
        }
        // Single whitespace byte separates ID from the data.
        self.pos += 1;

        while self.pos + 1 < self.data.len() {
            let before_ok = self.pos == 0 || is_whitespace(self.data[self.pos - 1]);
            let after_ok = self
                .data
                .get(self.pos + 2)
                .is_none_or(|&b| is_whitespace(b) || is_delimiter(b));
            if before_ok && after_ok && &self.data[self.pos..self.pos + 2] == b"EI" {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(self.error("inline image without EI"))
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

/// Resolve `#xx` escapes in a name.
fn decode_name(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#'
            && i + 2 < raw.len()
            && raw[i + 1].is_ascii_hexdigit()
            && raw[i + 2].is_ascii_hexdigit()
        {
            out.push((hex_value(raw[i + 1]) << 4) | hex_value(raw[i + 2]));
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

// -- Writing ------------------------------------------------------------------

/// Format a number the way content streams expect: no exponent, trimmed.
pub fn fmt_num(value: f64) -> String {
    if !value.is_finite() {
        return "0".into();
    }
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        return format!("{}", rounded as i64);
    }
    let s = format!("{rounded:.4}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Hex string operand (`<...>`).
pub fn hex_operand(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push('<');
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('>');
    out
}

/// Name operand with delimiters and non-printables escaped.
pub fn name_operand(name: &[u8]) -> String {
    let mut out = String::from("/");
    for &b in name {
        if is_regular(b) && b != b'#' && (b'!'..=b'~').contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("#{b:02X}"));
        }
    }
    out
}
