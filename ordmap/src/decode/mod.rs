pub mod de;

use std::borrow::Cow;

use crate::{Config, Error, Result};

/// One token of a parsed document. Container headers carry the number of
/// members that follow them (key/value pairs for objects).
#[derive(Debug, PartialEq)]
pub enum Element<'a> {
    ObjectBegin(usize),
    ArrayBegin(usize),
    Str(Cow<'a, str>),
    Number(&'a str),
    Bool(bool),
    Null,
}

#[derive(Debug, PartialEq)]
pub struct Elements<'a> {
    elements: Vec<Element<'a>>,
}

impl<'a> Elements<'a> {
    pub(crate) fn from_parts(elements: Vec<Element<'a>>) -> Self {
        Self { elements }
    }
}

impl<'a, 'e> IntoIterator for &'e Elements<'a> {
    type Item = &'e Element<'a>;
    type IntoIter = std::slice::Iter<'e, Element<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<'a> IntoIterator for Elements<'a> {
    type Item = Element<'a>;
    type IntoIter = std::vec::IntoIter<Element<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

pub fn parse(input: &[u8]) -> Result<Elements<'_>> {
    parse_with_depth(input, Config::DEFAULT_MAX_DEPTH)
}

pub fn parse_with_depth(input: &[u8], max_depth: usize) -> Result<Elements<'_>> {
    let input = std::str::from_utf8(input)
        .map_err(|e| Error::invalid_json(e.valid_up_to(), "invalid UTF-8"))?;
    Parser::new(input, max_depth).parse()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ExpectValue,
    ExpectValueOrEnd,
    ExpectKey,
    ExpectKeyOrEnd,
    ExpectColon,
    ExpectCommaOrEnd,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

struct Frame {
    kind: Kind,
    header: usize,
    count: usize,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    max_depth: usize,
    elements: Vec<Element<'a>>,
    stack: Vec<Frame>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, max_depth: usize) -> Self {
        Self {
            input,
            pos: 0,
            max_depth,
            elements: Vec::with_capacity(16),
            stack: Vec::new(),
        }
    }

    #[inline(always)]
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    #[inline(always)]
    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, reason: &'static str) -> Error {
        Error::invalid_json(self.pos, reason)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.bump();
        }
    }

    fn after_value(&self) -> State {
        if self.stack.is_empty() {
            State::Done
        } else {
            State::ExpectCommaOrEnd
        }
    }

    fn step(&mut self, state: State) -> Result<State> {
        match (state, self.peek()) {
            (State::Done, _) => Ok(State::Done),
            (_, None) => Err(self.error("unexpected end of input")),

            (State::ExpectValueOrEnd, Some(b']')) => self.close(Kind::Array),
            (State::ExpectValue | State::ExpectValueOrEnd, Some(_)) => {
                if let Some(frame) = self.stack.last_mut() {
                    if frame.kind == Kind::Array {
                        frame.count += 1;
                    }
                }
                self.parse_value()
            }

            (State::ExpectKeyOrEnd, Some(b'}')) => self.close(Kind::Object),
            (State::ExpectKey | State::ExpectKeyOrEnd, Some(b'"')) => {
                let key = self.parse_string()?;
                self.elements.push(Element::Str(key));
                if let Some(frame) = self.stack.last_mut() {
                    frame.count += 1;
                }
                Ok(State::ExpectColon)
            }
            (State::ExpectKey | State::ExpectKeyOrEnd, Some(_)) => {
                Err(self.error("expected a string key"))
            }

            (State::ExpectColon, Some(b':')) => {
                self.bump();
                Ok(State::ExpectValue)
            }
            (State::ExpectColon, Some(_)) => Err(self.error("expected ':'")),

            (State::ExpectCommaOrEnd, Some(b',')) => {
                self.bump();
                match self.stack.last().map(|f| f.kind) {
                    Some(Kind::Object) => Ok(State::ExpectKey),
                    _ => Ok(State::ExpectValue),
                }
            }
            (State::ExpectCommaOrEnd, Some(b'}')) => self.close(Kind::Object),
            (State::ExpectCommaOrEnd, Some(b']')) => self.close(Kind::Array),
            (State::ExpectCommaOrEnd, Some(_)) => Err(self.error("expected ',' or a closing bracket")),
        }
    }

    fn open(&mut self, kind: Kind) -> Result<State> {
        if self.stack.len() >= self.max_depth {
            return Err(Error::DepthLimitExceeded(self.max_depth));
        }
        self.bump();

        let header = self.elements.len();
        let (element, state) = match kind {
            Kind::Object => (Element::ObjectBegin(0), State::ExpectKeyOrEnd),
            Kind::Array => (Element::ArrayBegin(0), State::ExpectValueOrEnd),
        };
        self.elements.push(element);
        self.stack.push(Frame {
            kind,
            header,
            count: 0,
        });

        Ok(state)
    }

    fn close(&mut self, kind: Kind) -> Result<State> {
        let frame = match self.stack.pop() {
            Some(frame) if frame.kind == kind => frame,
            _ => return Err(self.error("mismatched closing bracket")),
        };
        self.bump();

        self.elements[frame.header] = match kind {
            Kind::Object => Element::ObjectBegin(frame.count),
            Kind::Array => Element::ArrayBegin(frame.count),
        };

        Ok(self.after_value())
    }

    fn parse_value(&mut self) -> Result<State> {
        let element = match self.peek() {
            Some(b'{') => return self.open(Kind::Object),
            Some(b'[') => return self.open(Kind::Array),
            Some(b'"') => Element::Str(self.parse_string()?),
            Some(b'-' | b'0'..=b'9') => Element::Number(self.parse_number()?),
            Some(b't') => self.parse_literal("true", Element::Bool(true))?,
            Some(b'f') => self.parse_literal("false", Element::Bool(false))?,
            Some(b'n') => self.parse_literal("null", Element::Null)?,
            _ => return Err(self.error("expected a value")),
        };
        self.elements.push(element);

        Ok(self.after_value())
    }

    fn parse_literal(&mut self, literal: &'static str, element: Element<'a>) -> Result<Element<'a>> {
        if self.input[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(element)
        } else {
            Err(self.error("invalid literal"))
        }
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.bump();
        }
        self.pos > start
    }

    fn parse_number(&mut self) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;

        if self.peek() == Some(b'-') {
            self.bump();
        }
        match self.peek() {
            Some(b'0') => self.bump(),
            Some(b'1'..=b'9') => {
                self.skip_digits();
            }
            _ => return Err(self.error("invalid number")),
        }
        if self.peek() == Some(b'.') {
            self.bump();
            if !self.skip_digits() {
                return Err(self.error("expected digits after '.'"));
            }
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.bump();
            if let Some(b'+' | b'-') = self.peek() {
                self.bump();
            }
            if !self.skip_digits() {
                return Err(self.error("expected exponent digits"));
            }
        }

        Ok(&input[start..self.pos])
    }

    /// Reads a quoted string, borrowing from the input unless it contains
    /// escapes.
    fn parse_string(&mut self) -> Result<Cow<'a, str>> {
        let input = self.input;
        let bytes = input.as_bytes();
        let open = self.pos;
        self.bump();

        let mut owned: Option<String> = None;

        loop {
            let start = self.pos;
            let rest = &bytes[start..];
            let idx = match memchr::memchr2(b'"', b'\\', rest) {
                Some(idx) => idx,
                None => return Err(Error::invalid_json(open, "unterminated string")),
            };
            if let Some(bad) = rest[..idx].iter().position(|&b| b < 0x20) {
                return Err(Error::invalid_json(start + bad, "control character in string"));
            }

            let chunk = &input[start..start + idx];
            self.pos = start + idx + 1;

            if rest[idx] == b'"' {
                return Ok(match owned {
                    Some(mut s) => {
                        s.push_str(chunk);
                        Cow::Owned(s)
                    }
                    None => Cow::Borrowed(chunk),
                });
            }

            let buf = owned.get_or_insert_with(String::new);
            buf.push_str(chunk);
            self.parse_escape(buf)?;
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let at = self.pos - 1;
        let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
        self.bump();

        match c {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\x08'),
            b'f' => out.push('\x0c'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => out.push(self.parse_unicode_escape()?),
            _ => return Err(Error::invalid_json(at, "invalid escape sequence")),
        }

        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u16> {
        let input = self.input;
        let digits = input
            .get(self.pos..self.pos + 4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid unicode escape"))?;
        let unit = u16::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos += 4;
        Ok(unit)
    }

    /// Decodes the digits of a `\u` escape. Surrogate pairs are combined;
    /// an unpaired surrogate becomes U+FFFD.
    fn parse_unicode_escape(&mut self) -> Result<char> {
        let first = self.parse_hex4()?;

        if !(0xD800..0xDC00).contains(&first) {
            return Ok(char::from_u32(first as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        let bytes = self.input.as_bytes();
        if bytes.get(self.pos) == Some(&b'\\') && bytes.get(self.pos + 1) == Some(&b'u') {
            let resume = self.pos;
            self.pos += 2;
            let second = self.parse_hex4()?;
            if (0xDC00..0xE000).contains(&second) {
                let c = 0x10000 + (((first as u32) - 0xD800) << 10) + ((second as u32) - 0xDC00);
                return Ok(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            // Not a low surrogate; decode it as its own escape.
            self.pos = resume;
        }

        Ok(char::REPLACEMENT_CHARACTER)
    }

    fn parse(mut self) -> Result<Elements<'a>> {
        let mut state = State::ExpectValue;
        while state != State::Done {
            self.skip_whitespace();
            state = self.step(state)?;
        }

        self.skip_whitespace();
        if self.pos != self.input.len() {
            return Err(self.error("trailing characters"));
        }

        tracing::trace!(
            bytes = self.input.len(),
            elements = self.elements.len(),
            "parsed JSON input"
        );

        Ok(Elements::from_parts(self.elements))
    }
}
