//! Stateful XPath 2.0 lexer.
//!
//! XPath has no reserved words, so whether `div` is an operator or an element
//! name depends on what precedes it. The lexer tracks that with an explicit
//! [`LexMode`] plus a mode stack: predicates and kind-test parentheses push the
//! mode to restore when they close. Names are always read greedily up to the
//! last name character, which keeps `divisor`, `div2` and `instanceof2` single
//! names.

use compact_str::CompactString;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::collections::VecDeque;

use super::token::{Token, TokenKind, TokenValue};
use crate::engine::runtime::{Error, ErrorCode, SourcePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Expecting an operand.
    Default,
    /// Expecting an operator after a complete operand.
    Operator,
    /// After `$`.
    VarName,
    /// After `cast as` / `castable as`.
    SingleType,
    /// After `instance of` / `treat as`.
    ItemType,
    /// Inside `element(`, `attribute(`, `document-node(`, ...
    KindTest,
    /// Inside `processing-instruction(`.
    KindTestForProcessingInstruction,
    /// After the type name of `element(N, T`: only `?` or `)` may follow.
    CloseKindTest,
    /// After an item type: an optional `?`, `*` or `+`.
    OccurrenceIndicator,
}

const AXES: &[&str] = &[
    "child",
    "descendant",
    "attribute",
    "self",
    "descendant-or-self",
    "following-sibling",
    "following",
    "namespace",
    "parent",
    "ancestor",
    "preceding-sibling",
    "preceding",
    "ancestor-or-self",
];

const KIND_KEYWORDS: &[&str] = &[
    "element",
    "attribute",
    "schema-element",
    "schema-attribute",
    "document-node",
    "text",
    "comment",
    "node",
    "processing-instruction",
    "item",
    "empty-sequence",
];

/// Names that can never be function names.
const RESERVED_FUNCTION_NAMES: &[&str] = &["if", "typeswitch"];

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_numeric() || matches!(c, '-' | '.' | '\u{B7}') || is_combining(c)
}

fn is_combining(c: char) -> bool {
    matches!(c, '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

#[derive(Clone, Copy)]
struct Mark {
    start: usize,
    line: usize,
    column: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    mode: LexMode,
    stack: SmallVec<[LexMode; 8]>,
    queue: VecDeque<Token>,
    current: Option<Token>,
    last_kind: Option<TokenKind>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            mode: LexMode::Default,
            stack: SmallVec::new(),
            queue: VecDeque::new(),
            current: None,
            last_kind: None,
        }
    }

    /// Tokenize a whole expression, including the trailing `EndOfInput`.
    pub fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let done = tok.kind == TokenKind::EndOfInput;
            out.push(tok);
            if done {
                return Ok(out);
            }
        }
    }

    /// Pull the next token into the current slot. Returns `false` at end of input.
    pub fn advance(&mut self) -> Result<bool, Error> {
        let tok = self.next_token()?;
        let more = tok.kind != TokenKind::EndOfInput;
        self.current = Some(tok);
        Ok(more)
    }

    /// Kind of the current token.
    pub fn token(&self) -> TokenKind {
        self.current.as_ref().map_or(TokenKind::EndOfInput, |t| t.kind)
    }

    /// Payload of the current token.
    pub fn value(&self) -> &TokenValue {
        self.current.as_ref().map_or(&TokenValue::None, |t| &t.value)
    }

    pub fn position(&self) -> SourcePosition {
        SourcePosition {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    pub fn mode(&self) -> LexMode {
        self.mode
    }

    pub fn next_token(&mut self) -> Result<Token, Error> {
        let tok = match self.queue.pop_front() {
            Some(t) => t,
            None => self.scan()?,
        };
        tracing::trace!(kind = ?tok.kind, line = tok.line, column = tok.column, mode = ?self.mode, "token");
        self.last_kind = Some(tok.kind);
        Ok(tok)
    }

    // ----- character level -----

    fn peek(&self, k: usize) -> Option<char> {
        self.chars.get(self.pos + k).copied()
    }

    fn read(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn read_n(&mut self, n: usize) {
        for _ in 0..n {
            self.read();
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            start: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn error_at(&self, m: Mark, msg: impl Into<String>) -> Error {
        Error::from_code(ErrorCode::XPST0003, msg).with_position(SourcePosition {
            offset: m.start,
            line: m.line,
            column: m.column,
        })
    }

    fn make(&self, kind: TokenKind, value: TokenValue, m: Mark) -> Token {
        Token {
            kind,
            value,
            start: m.start,
            len: self.pos - m.start,
            line: m.line,
            column: m.column,
        }
    }

    fn push_mode(&mut self, restore: LexMode) {
        tracing::trace!(restore = ?restore, depth = self.stack.len() + 1, "push lexical mode");
        self.stack.push(restore);
    }

    fn pop_mode(&mut self) -> LexMode {
        let m = self.stack.pop().unwrap_or(LexMode::Operator);
        tracing::trace!(restored = ?m, depth = self.stack.len(), "pop lexical mode");
        m
    }

    /// Index of the first character at or after `i` that is not whitespace or
    /// part of a comment. Does not consume.
    fn skip_index(&self, mut i: usize) -> usize {
        loop {
            match self.chars.get(i) {
                Some(c) if c.is_whitespace() => i += 1,
                Some('(') if self.chars.get(i + 1) == Some(&':') => {
                    let mut depth = 0usize;
                    while i < self.chars.len() {
                        if self.chars[i] == '(' && self.chars.get(i + 1) == Some(&':') {
                            depth += 1;
                            i += 2;
                        } else if self.chars[i] == ':' && self.chars.get(i + 1) == Some(&')') {
                            depth -= 1;
                            i += 2;
                            if depth == 0 {
                                break;
                            }
                        } else {
                            i += 1;
                        }
                    }
                }
                _ => return i,
            }
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), Error> {
        loop {
            match self.peek(0) {
                Some(c) if c.is_whitespace() => {
                    self.read();
                }
                Some('(') if self.peek(1) == Some(':') => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) -> Result<(), Error> {
        let start = self.mark();
        let mut depth = 0usize;
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('('), Some(':')) => {
                    depth += 1;
                    self.read_n(2);
                }
                (Some(':'), Some(')')) => {
                    self.read_n(2);
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                (Some(_), _) => {
                    self.read();
                }
                (None, _) => return Err(self.error_at(start, "unterminated comment")),
            }
        }
    }

    fn char_at(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    /// NCName starting at index `i` (not consumed).
    fn ncname_at(&self, i: usize) -> Option<String> {
        let first = self.char_at(i)?;
        if !is_name_start(first) {
            return None;
        }
        let mut j = i + 1;
        while self.char_at(j).is_some_and(is_name_char) {
            j += 1;
        }
        Some(self.chars[i..j].iter().collect())
    }

    fn read_ncname(&mut self) -> Option<String> {
        let name = self.ncname_at(self.pos)?;
        self.read_n(name.chars().count());
        Some(name)
    }

    /// `prefix:local` or `local`, with no whitespace around the colon.
    fn read_qname(&mut self) -> Option<(Option<String>, String)> {
        let first = self.read_ncname()?;
        if self.peek(0) == Some(':') && self.peek(1).is_some_and(is_name_start) {
            self.read();
            let local = self.read_ncname()?;
            return Some((Some(first), local));
        }
        Some((None, first))
    }

    /// True when the next word (after whitespace) is exactly `word`; consumes it.
    fn eat_word(&mut self, word: &str) -> bool {
        let j = self.skip_index(self.pos);
        match self.ncname_at(j) {
            Some(w) if w == word => {
                let end = j + w.chars().count();
                self.read_n(end - self.pos);
                true
            }
            _ => false,
        }
    }

    fn name_value(prefix: Option<String>, local: String) -> TokenValue {
        TokenValue::Name {
            prefix: prefix.map(CompactString::from),
            local: CompactString::from(local),
        }
    }

    // ----- token level -----

    fn scan(&mut self) -> Result<Token, Error> {
        self.skip_whitespace()?;
        match self.mode {
            LexMode::Default => self.scan_default(),
            LexMode::Operator => self.scan_operator(),
            LexMode::VarName => self.scan_var_name(),
            LexMode::SingleType => self.scan_single_type(),
            LexMode::ItemType => self.scan_item_type(),
            LexMode::KindTest => self.scan_kind_test(),
            LexMode::KindTestForProcessingInstruction => self.scan_pi_test(),
            LexMode::CloseKindTest => self.scan_close_kind_test(),
            LexMode::OccurrenceIndicator => self.scan_occurrence(),
        }
    }

    fn eof(&mut self) -> Token {
        let m = self.mark();
        self.make(TokenKind::EndOfInput, TokenValue::None, m)
    }

    fn simple(&mut self, kind: TokenKind, len: usize, next: LexMode) -> Token {
        let m = self.mark();
        self.read_n(len);
        self.mode = next;
        self.make(kind, TokenValue::None, m)
    }

    fn scan_default(&mut self) -> Result<Token, Error> {
        let Some(c) = self.peek(0) else {
            return Ok(self.eof());
        };
        let tok = match c {
            '0'..='9' => self.scan_number()?,
            '.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.scan_number()?,
            '"' | '\'' => self.scan_string()?,
            '$' => {
                self.read();
                self.mode = LexMode::VarName;
                self.skip_whitespace()?;
                return self.scan_var_name();
            }
            '(' => self.simple(TokenKind::LParen, 1, LexMode::Default),
            ')' => self.simple(TokenKind::RParen, 1, LexMode::Operator),
            '[' => {
                self.push_mode(LexMode::Operator);
                self.simple(TokenKind::LBracket, 1, LexMode::Default)
            }
            ']' => {
                let restore = self.pop_mode();
                self.simple(TokenKind::RBracket, 1, restore)
            }
            '@' => self.simple(TokenKind::At, 1, LexMode::Default),
            '.' if self.peek(1) == Some('.') => self.simple(TokenKind::DotDot, 2, LexMode::Operator),
            '.' => self.simple(TokenKind::Dot, 1, LexMode::Operator),
            '/' if self.peek(1) == Some('/') => self.simple(TokenKind::DoubleSlash, 2, LexMode::Default),
            '/' => self.simple(TokenKind::Slash, 1, LexMode::Default),
            '*' if self.peek(1) == Some(':') && self.peek(2).is_some_and(is_name_start) => {
                let m = self.mark();
                self.read_n(2);
                let local = self.read_ncname().unwrap_or_default();
                self.mode = LexMode::Operator;
                self.make(TokenKind::LocalWildcard, TokenValue::Str(local.into()), m)
            }
            '*' => self.simple(TokenKind::Wildcard, 1, LexMode::Operator),
            '+' => self.simple(TokenKind::Plus, 1, LexMode::Default),
            '-' => self.simple(TokenKind::Minus, 1, LexMode::Default),
            ',' => self.simple(TokenKind::Comma, 1, LexMode::Default),
            c if is_name_start(c) => self.scan_name_default()?,
            other => {
                let m = self.mark();
                return Err(self.error_at(m, format!("unexpected character '{other}'")));
            }
        };
        Ok(tok)
    }

    fn scan_name_default(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let first = self.read_ncname().unwrap_or_default();
        // prefix:* wildcard
        if self.peek(0) == Some(':') && self.peek(1) == Some('*') {
            self.read_n(2);
            self.mode = LexMode::Operator;
            return Ok(self.make(TokenKind::PrefixWildcard, TokenValue::Str(first.into()), m));
        }
        // axis::
        if self.peek(0) == Some(':') && self.peek(1) == Some(':') {
            if !AXES.contains(&first.as_str()) {
                return Err(self.error_at(m, format!("unknown axis '{first}'")));
            }
            self.read_n(2);
            self.mode = LexMode::Default;
            return Ok(self.make(TokenKind::AxisName, TokenValue::Str(first.into()), m));
        }
        let (prefix, local) = if self.peek(0) == Some(':') && self.peek(1).is_some_and(is_name_start) {
            self.read();
            let local = self.read_ncname().unwrap_or_default();
            (Some(first), local)
        } else {
            (None, first)
        };
        let after = self.skip_index(self.pos);
        let next = self.char_at(after);
        // axis name separated from '::' by whitespace
        if prefix.is_none() && next == Some(':') && self.char_at(after + 1) == Some(':') {
            if !AXES.contains(&local.as_str()) {
                return Err(self.error_at(m, format!("unknown axis '{local}'")));
            }
            self.read_n(after + 2 - self.pos);
            self.mode = LexMode::Default;
            return Ok(self.make(TokenKind::AxisName, TokenValue::Str(local.into()), m));
        }
        if prefix.is_none() && next == Some('$') {
            let kind = match local.as_str() {
                "for" => Some(TokenKind::For),
                "some" => Some(TokenKind::Some),
                "every" => Some(TokenKind::Every),
                _ => None,
            };
            if let Some(kind) = kind {
                self.mode = LexMode::Default;
                return Ok(self.make(kind, TokenValue::None, m));
            }
        }
        if next == Some('(') && self.char_at(after + 1) != Some(':') {
            if prefix.is_none() {
                if local == "if" {
                    self.mode = LexMode::Default;
                    return Ok(self.make(TokenKind::If, TokenValue::None, m));
                }
                if KIND_KEYWORDS.contains(&local.as_str()) {
                    return Ok(self.enter_kind_test(m, local, LexMode::Operator));
                }
                if RESERVED_FUNCTION_NAMES.contains(&local.as_str()) {
                    return Err(self.error_at(m, format!("'{local}' is not a valid function name")));
                }
            }
            self.mode = LexMode::Default;
            return Ok(self.make(TokenKind::FunctionName, Self::name_value(prefix, local), m));
        }
        self.mode = LexMode::Operator;
        Ok(self.make(TokenKind::QName, Self::name_value(prefix, local), m))
    }

    /// Emit a kind keyword, consume its `(` into the queue and switch into the
    /// kind-test interior; `restore` is the mode after the matching `)`.
    fn enter_kind_test(&mut self, m: Mark, keyword: String, restore: LexMode) -> Token {
        let tok = self.make(TokenKind::KindKeyword, TokenValue::Str(CompactString::from(keyword.as_str())), m);
        let paren_at = self.skip_index(self.pos);
        self.read_n(paren_at - self.pos);
        let pm = self.mark();
        self.read();
        let paren = self.make(TokenKind::LParen, TokenValue::None, pm);
        self.queue.push_back(paren);
        self.push_mode(restore);
        self.mode = if keyword == "processing-instruction" {
            LexMode::KindTestForProcessingInstruction
        } else {
            LexMode::KindTest
        };
        tok
    }

    fn scan_operator(&mut self) -> Result<Token, Error> {
        let Some(c) = self.peek(0) else {
            return Ok(self.eof());
        };
        use LexMode::{Default as D, Operator as O};
        let tok = match c {
            ',' => self.simple(TokenKind::Comma, 1, D),
            ')' => self.simple(TokenKind::RParen, 1, O),
            '(' => self.simple(TokenKind::LParen, 1, D),
            '[' => {
                self.push_mode(O);
                self.simple(TokenKind::LBracket, 1, D)
            }
            ']' => {
                let restore = self.pop_mode();
                self.simple(TokenKind::RBracket, 1, restore)
            }
            '/' if self.peek(1) == Some('/') => self.simple(TokenKind::DoubleSlash, 2, D),
            '/' => self.simple(TokenKind::Slash, 1, D),
            '=' => self.simple(TokenKind::GeneralEq, 1, D),
            '!' if self.peek(1) == Some('=') => self.simple(TokenKind::GeneralNe, 2, D),
            '<' if self.peek(1) == Some('=') => self.simple(TokenKind::GeneralLe, 2, D),
            '<' if self.peek(1) == Some('<') => self.simple(TokenKind::Precedes, 2, D),
            '<' => self.simple(TokenKind::GeneralLt, 1, D),
            '>' if self.peek(1) == Some('=') => self.simple(TokenKind::GeneralGe, 2, D),
            '>' if self.peek(1) == Some('>') => self.simple(TokenKind::Follows, 2, D),
            '>' => self.simple(TokenKind::GeneralGt, 1, D),
            '+' => self.simple(TokenKind::Plus, 1, D),
            '-' => self.simple(TokenKind::Minus, 1, D),
            '*' => self.simple(TokenKind::Multiply, 1, D),
            '|' => self.simple(TokenKind::Union, 1, D),
            c if is_name_start(c) => self.scan_word_operator()?,
            other => {
                let m = self.mark();
                return Err(self.error_at(m, format!("expected an operator, found '{other}'")));
            }
        };
        Ok(tok)
    }

    fn scan_word_operator(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let word = self.read_ncname().unwrap_or_default();
        let kind = match word.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "div" => TokenKind::Div,
            "idiv" => TokenKind::IDiv,
            "mod" => TokenKind::Mod,
            "eq" => TokenKind::ValueEq,
            "ne" => TokenKind::ValueNe,
            "lt" => TokenKind::ValueLt,
            "le" => TokenKind::ValueLe,
            "gt" => TokenKind::ValueGt,
            "ge" => TokenKind::ValueGe,
            "is" => TokenKind::Is,
            "to" => TokenKind::To,
            "union" => TokenKind::Union,
            "intersect" => TokenKind::Intersect,
            "except" => TokenKind::Except,
            "return" => TokenKind::Return,
            "satisfies" => TokenKind::Satisfies,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "in" => TokenKind::In,
            "instance" | "treat" | "castable" | "cast" => {
                let (second, kind, next) = match word.as_str() {
                    "instance" => ("of", TokenKind::InstanceOf, LexMode::ItemType),
                    "treat" => ("as", TokenKind::TreatAs, LexMode::ItemType),
                    "castable" => ("as", TokenKind::CastableAs, LexMode::SingleType),
                    _ => ("as", TokenKind::CastAs, LexMode::SingleType),
                };
                if !self.eat_word(second) {
                    return Err(self.error_at(m, format!("expected '{word} {second}'")));
                }
                self.mode = next;
                return Ok(self.make(kind, TokenValue::None, m));
            }
            w => {
                for op in ["idiv", "div", "mod"] {
                    if let Some(rest) = w.strip_prefix(op)
                        && !rest.is_empty()
                        && rest.chars().all(|c| c.is_ascii_digit())
                    {
                        return Err(self.error_at(
                            m,
                            format!("operator '{op}' must be separated from the following number"),
                        ));
                    }
                }
                return Err(self.error_at(m, format!("expected an operator, found name '{w}'")));
            }
        };
        self.mode = LexMode::Default;
        Ok(self.make(kind, TokenValue::None, m))
    }

    fn scan_var_name(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let Some((prefix, local)) = self.read_qname() else {
            return Err(self.error_at(m, "expected a variable name after '$'"));
        };
        self.mode = LexMode::Operator;
        Ok(self.make(TokenKind::VarName, Self::name_value(prefix, local), m))
    }

    fn scan_single_type(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let Some((prefix, local)) = self.read_qname() else {
            return Err(self.error_at(m, "expected an atomic type name"));
        };
        let tok = self.make(TokenKind::QName, Self::name_value(prefix, local), m);
        let after = self.skip_index(self.pos);
        if self.char_at(after) == Some('?') {
            self.read_n(after - self.pos);
            let qm = self.mark();
            self.read();
            let q = self.make(TokenKind::OccurrenceOptional, TokenValue::None, qm);
            self.queue.push_back(q);
        }
        self.mode = LexMode::Operator;
        Ok(tok)
    }

    fn scan_item_type(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let Some((prefix, local)) = self.read_qname() else {
            return Err(self.error_at(m, "expected a sequence type"));
        };
        let after = self.skip_index(self.pos);
        if prefix.is_none() && self.char_at(after) == Some('(') && KIND_KEYWORDS.contains(&local.as_str()) {
            let restore = if local == "empty-sequence" {
                LexMode::Operator
            } else {
                LexMode::OccurrenceIndicator
            };
            return Ok(self.enter_kind_test(m, local, restore));
        }
        self.mode = LexMode::OccurrenceIndicator;
        Ok(self.make(TokenKind::QName, Self::name_value(prefix, local), m))
    }

    fn scan_kind_test(&mut self) -> Result<Token, Error> {
        let Some(c) = self.peek(0) else {
            return Ok(self.eof());
        };
        match c {
            ')' => {
                let restore = self.pop_mode();
                Ok(self.simple(TokenKind::RParen, 1, restore))
            }
            '*' => Ok(self.simple(TokenKind::Wildcard, 1, LexMode::KindTest)),
            ',' => Ok(self.simple(TokenKind::Comma, 1, LexMode::KindTest)),
            c if is_name_start(c) => {
                let after_comma = self.last_kind == Some(TokenKind::Comma);
                let m = self.mark();
                let Some((prefix, local)) = self.read_qname() else {
                    return Err(self.error_at(m, "expected a name"));
                };
                let after = self.skip_index(self.pos);
                if prefix.is_none() && self.char_at(after) == Some('(') && KIND_KEYWORDS.contains(&local.as_str()) {
                    return Ok(self.enter_kind_test(m, local, LexMode::KindTest));
                }
                self.mode = if after_comma {
                    LexMode::CloseKindTest
                } else {
                    LexMode::KindTest
                };
                Ok(self.make(TokenKind::QName, Self::name_value(prefix, local), m))
            }
            other => {
                let m = self.mark();
                Err(self.error_at(m, format!("unexpected '{other}' in kind test")))
            }
        }
    }

    fn scan_close_kind_test(&mut self) -> Result<Token, Error> {
        match self.peek(0) {
            None => Ok(self.eof()),
            Some('?') => Ok(self.simple(TokenKind::OccurrenceOptional, 1, LexMode::CloseKindTest)),
            Some(')') => {
                let restore = self.pop_mode();
                Ok(self.simple(TokenKind::RParen, 1, restore))
            }
            Some(other) => {
                let m = self.mark();
                Err(self.error_at(m, format!("expected '?' or ')', found '{other}'")))
            }
        }
    }

    fn scan_pi_test(&mut self) -> Result<Token, Error> {
        match self.peek(0) {
            None => Ok(self.eof()),
            Some(')') => {
                let restore = self.pop_mode();
                Ok(self.simple(TokenKind::RParen, 1, restore))
            }
            Some('"' | '\'') => {
                let tok = self.scan_string()?;
                self.mode = LexMode::KindTestForProcessingInstruction;
                Ok(tok)
            }
            Some(c) if is_name_start(c) => {
                let m = self.mark();
                let name = self.read_ncname().unwrap_or_default();
                Ok(self.make(TokenKind::QName, Self::name_value(None, name), m))
            }
            Some(other) => {
                let m = self.mark();
                Err(self.error_at(m, format!("unexpected '{other}' in processing-instruction test")))
            }
        }
    }

    fn scan_occurrence(&mut self) -> Result<Token, Error> {
        let kind = match self.peek(0) {
            Some('?') => TokenKind::OccurrenceOptional,
            Some('*') => TokenKind::OccurrenceZeroOrMore,
            Some('+') => TokenKind::OccurrenceOneOrMore,
            _ => {
                self.mode = LexMode::Operator;
                return self.scan_operator();
            }
        };
        Ok(self.simple(kind, 1, LexMode::Operator))
    }

    fn scan_number(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let mut text = String::new();
        while let Some(d) = self.peek(0).filter(char::is_ascii_digit) {
            text.push(d);
            self.read();
        }
        let mut has_dot = false;
        if self.peek(0) == Some('.') {
            has_dot = true;
            text.push('.');
            self.read();
            while let Some(d) = self.peek(0).filter(char::is_ascii_digit) {
                text.push(d);
                self.read();
            }
        }
        let mut has_exp = false;
        if matches!(self.peek(0), Some('e' | 'E')) {
            let sign = matches!(self.peek(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                has_exp = true;
                for _ in 0..digit_at {
                    if let Some(c) = self.read() {
                        text.push(c);
                    }
                }
                while let Some(d) = self.peek(0).filter(char::is_ascii_digit) {
                    text.push(d);
                    self.read();
                }
            }
        }
        if self.peek(0).is_some_and(is_name_start) {
            return Err(self.error_at(m, format!("numeric literal '{text}' must not be followed by a name")));
        }
        self.mode = LexMode::Operator;
        if has_exp {
            let v: f64 = text
                .parse()
                .map_err(|_| self.error_at(m, format!("invalid double literal '{text}'")))?;
            if v.is_infinite() {
                return Err(self.error_at(m, format!("double literal '{text}' is out of range")));
            }
            Ok(self.make(TokenKind::DoubleLiteral, TokenValue::Double(v), m))
        } else if has_dot {
            // `.5` and `5.` are valid XPath decimals
            let digits = match (text.starts_with('.'), text.ends_with('.')) {
                (true, _) => format!("0{text}"),
                (_, true) => format!("{text}0"),
                _ => text.clone(),
            };
            let v: Decimal = digits.parse().map_err(|_| {
                Error::from_code(ErrorCode::FOAR0002, format!("decimal literal '{text}' is out of range")).with_position(
                    SourcePosition {
                        offset: m.start,
                        line: m.line,
                        column: m.column,
                    },
                )
            })?;
            Ok(self.make(TokenKind::DecimalLiteral, TokenValue::Decimal(v), m))
        } else {
            let v: i64 = text.parse().map_err(|_| {
                Error::from_code(ErrorCode::FOAR0002, format!("integer literal '{text}' is out of range")).with_position(
                    SourcePosition {
                        offset: m.start,
                        line: m.line,
                        column: m.column,
                    },
                )
            })?;
            Ok(self.make(TokenKind::IntegerLiteral, TokenValue::Integer(v), m))
        }
    }

    fn scan_string(&mut self) -> Result<Token, Error> {
        let m = self.mark();
        let Some(quote) = self.read() else {
            return Err(self.error_at(m, "expected a string literal"));
        };
        let mut out = String::new();
        loop {
            match self.read() {
                None => return Err(self.error_at(m, "unterminated string literal")),
                Some(c) if c == quote => {
                    if self.peek(0) == Some(quote) {
                        self.read();
                        out.push(quote);
                    } else {
                        break;
                    }
                }
                Some('\r') => {
                    if self.peek(0) == Some('\n') {
                        self.read();
                    }
                    out.push('\n');
                }
                Some(c) => out.push(c),
            }
        }
        self.mode = LexMode::Operator;
        Ok(self.make(TokenKind::StringLiteral, TokenValue::Str(out.into()), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn predicate_restores_operator_mode() {
        let mut lx = Lexer::new("a[1] div 2");
        let mut seen = Vec::new();
        while lx.advance().unwrap() {
            seen.push(lx.token());
        }
        assert_eq!(
            seen,
            vec![
                TokenKind::QName,
                TokenKind::LBracket,
                TokenKind::IntegerLiteral,
                TokenKind::RBracket,
                TokenKind::Div,
                TokenKind::IntegerLiteral
            ]
        );
        assert!(lx.stack.is_empty());
    }

    #[test]
    fn kind_test_in_item_type_returns_to_occurrence() {
        assert_eq!(
            kinds("$x instance of element(a, xs:untyped?)*"),
            vec![
                TokenKind::VarName,
                TokenKind::InstanceOf,
                TokenKind::KindKeyword,
                TokenKind::LParen,
                TokenKind::QName,
                TokenKind::Comma,
                TokenKind::QName,
                TokenKind::OccurrenceOptional,
                TokenKind::RParen,
                TokenKind::OccurrenceZeroOrMore,
                TokenKind::EndOfInput
            ]
        );
    }

    #[test]
    fn star_is_wildcard_or_multiply_by_mode() {
        assert_eq!(
            kinds("* * *"),
            vec![TokenKind::Wildcard, TokenKind::Multiply, TokenKind::Wildcard, TokenKind::EndOfInput]
        );
    }

    #[test]
    fn minus_delimits_numeric_literals() {
        assert_eq!(
            kinds("1-2"),
            vec![TokenKind::IntegerLiteral, TokenKind::Minus, TokenKind::IntegerLiteral, TokenKind::EndOfInput]
        );
        assert_eq!(
            kinds("1.5-1"),
            vec![TokenKind::DecimalLiteral, TokenKind::Minus, TokenKind::IntegerLiteral, TokenKind::EndOfInput]
        );
        assert_eq!(
            kinds("1--2"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::Minus,
                TokenKind::Minus,
                TokenKind::IntegerLiteral,
                TokenKind::EndOfInput
            ]
        );
        assert_eq!(
            kinds("1e2-1"),
            vec![TokenKind::DoubleLiteral, TokenKind::Minus, TokenKind::IntegerLiteral, TokenKind::EndOfInput]
        );
    }

    #[test]
    fn numeric_literal_followed_by_name_is_rejected() {
        for input in ["1a", "2div 3", "1.5e", "3_"] {
            let err = Lexer::tokenize(input).unwrap_err();
            assert_eq!(err.code_enum(), ErrorCode::XPST0003, "{input}");
        }
    }
}
