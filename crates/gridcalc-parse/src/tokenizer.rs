use std::fmt::{self, Display};
use std::ops::Range;

use thiserror::Error;

/// Bytes that end an operand being accumulated.
fn ends_operand_text(byte: u8) -> bool {
    matches!(
        byte,
        b',' | b';'
            | b')'
            | b'}'
            | b' '
            | b'\n'
            | b'\t'
            | b'\r'
            | b'+'
            | b'-'
            | b'*'
            | b'/'
            | b'^'
            | b'&'
            | b'='
            | b'>'
            | b'<'
            | b'%'
    )
}

const ERROR_LITERALS: [&str; 7] = [
    "#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {pos})")]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl TokenizerError {
    fn at(pos: usize, message: &str) -> Self {
        Self {
            message: message.to_string(),
            pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Operand,
    /// A function name together with its opening parenthesis, e.g. `SUM(`.
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Open,
    Close,
    Arg,
    Row,
}

impl Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token of a formula together with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {:?}", self.token_type, self.subtype, self.value)
    }
}

impl Token {
    pub fn new(
        value: String,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value,
            token_type,
            subtype,
            start,
            end,
        }
    }

    fn spanning(source: &str, token_type: TokenType, subtype: TokenSubType, span: Range<usize>) -> Self {
        Token::new(source[span.clone()].to_string(), token_type, subtype, span.start, span.end)
    }

    fn operand(source: &str, span: Range<usize>) -> Self {
        let subtype = operand_kind(&source[span.clone()]);
        Token::spanning(source, TokenType::Operand, subtype, span)
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }

    /// Binding power and associativity of an operator token. Tighter
    /// operators bind higher: range, intersection, union, prefix sign,
    /// percent, exponent, multiplicative, additive, concatenation and
    /// finally comparison.
    pub fn binding_power(&self) -> Option<(u8, Associativity)> {
        use Associativity::{Left, Right};

        if self.token_type == TokenType::OpPrefix {
            return Some((8, Right));
        }
        let power = match self.value.as_str() {
            ":" => 11,
            " " => 10,
            "," => 9,
            "%" => 7,
            "^" => 6,
            "*" | "/" => 5,
            "+" | "-" => 4,
            "&" => 3,
            "=" | "<>" | "<" | "<=" | ">" | ">=" => 2,
            _ => return None,
        };
        Some((power, Left))
    }

    /// Whether this token can end an operand (a reference, a literal or a
    /// closed group).
    pub fn ends_operand(&self) -> bool {
        self.token_type == TokenType::Operand || self.subtype == TokenSubType::Close
    }

    /// Whether this token can start an operand.
    pub fn starts_operand(&self) -> bool {
        match self.token_type {
            TokenType::Operand | TokenType::Func => true,
            TokenType::Paren => self.subtype == TokenSubType::Open,
            _ => false,
        }
    }
}

fn operand_kind(text: &str) -> TokenSubType {
    match text.as_bytes().first() {
        Some(b'"') => TokenSubType::Text,
        Some(b'#') => TokenSubType::Error,
        _ if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") => {
            TokenSubType::Logical
        }
        // `inf` and `NaN` parse as floats but are names here
        Some(b) if (b.is_ascii_digit() || *b == b'.') && text.parse::<f64>().is_ok() => {
            TokenSubType::Number
        }
        _ => TokenSubType::Range,
    }
}

/// A tokenizer for worksheet formulas. The leading `=` is optional.
///
/// Operand text (references, numbers, names) is accumulated as a pending
/// span and emitted when a delimiter ends it.
#[derive(Debug)]
pub struct Tokenizer {
    source: String,
    pub items: Vec<Token>,
    /// Unclosed `(`, `{` and call tokens, innermost last.
    groups: Vec<Token>,
    pos: usize,
    pending: Range<usize>,
}

impl Tokenizer {
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            source: formula.to_string(),
            items: Vec::with_capacity(formula.len() / 2),
            groups: Vec::new(),
            pos: 0,
            pending: 0..0,
        };
        tokenizer.run()?;
        Ok(tokenizer)
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.source.as_bytes().get(at).copied()
    }

    fn restart_pending(&mut self) {
        self.pending = self.pos..self.pos;
    }

    /// Emits the pending operand, if any, and starts a new one at `pos`.
    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let token = Token::operand(&self.source, self.pending.clone());
            self.items.push(token);
        }
        self.restart_pending();
    }

    fn pending_ends_with(&self, byte: u8) -> bool {
        !self.pending.is_empty() && self.byte(self.pending.end - 1) == Some(byte)
    }

    /// Pushes a single-byte token at `pos` and moves past it.
    fn push_byte_token(&mut self, token_type: TokenType, subtype: TokenSubType) {
        let token = Token::spanning(&self.source, token_type, subtype, self.pos..self.pos + 1);
        self.items.push(token);
        self.pos += 1;
        self.restart_pending();
    }

    fn run(&mut self) -> Result<(), TokenizerError> {
        if self.source.starts_with('=') {
            self.pos = 1;
        }
        self.restart_pending();

        while let Some(byte) = self.byte(self.pos) {
            // the sign of an exponent belongs to the number: 1.5E-3
            if matches!(byte, b'+' | b'-') && self.pending_is_mantissa() {
                self.pos += 1;
                self.pending.end = self.pos;
                continue;
            }
            if ends_operand_text(byte) && !self.pending.is_empty() {
                self.flush_pending();
            }
            match byte {
                b'"' => self.quoted_text()?,
                b'\'' => self.quoted_sheet()?,
                b'#' => self.error_literal()?,
                b' ' | b'\n' | b'\t' | b'\r' => self.whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.operator()
                }
                b'(' | b'{' => self.open_group(byte),
                b')' | b'}' => self.close_group(byte)?,
                b',' | b';' => self.separator(byte),
                _ => {
                    if self.pending.is_empty() {
                        self.restart_pending();
                    }
                    // whole UTF-8 scalars keep every span on a char boundary
                    let width = self.source[self.pos..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
                    self.pos += width;
                    self.pending.end = self.pos;
                }
            }
        }
        self.flush_pending();

        match self.groups.last() {
            Some(open) => Err(TokenizerError::at(
                open.start,
                "Unmatched opening parenthesis or brace",
            )),
            None => Ok(()),
        }
    }

    /// Whether the pending text is a mantissa awaiting its exponent sign,
    /// like `9E` or `1.25e`.
    fn pending_is_mantissa(&self) -> bool {
        let text = &self.source.as_bytes()[self.pending.clone()];
        let [first, middle @ .., last] = text else {
            return false;
        };
        first.is_ascii_digit()
            && matches!(*last, b'E' | b'e')
            && middle.iter().all(|b| b.is_ascii_digit() || *b == b'.')
            && middle.iter().filter(|b| **b == b'.').count() <= 1
    }

    /// Index just past the closing `delim` of a quoted run starting at
    /// `pos`. A doubled delimiter is an escaped one.
    fn scan_quoted(&self, delim: u8) -> Result<usize, TokenizerError> {
        let mut at = self.pos + 1;
        while let Some(byte) = self.byte(at) {
            at += 1;
            if byte == delim {
                if self.byte(at) == Some(delim) {
                    at += 1;
                } else {
                    return Ok(at);
                }
            }
        }
        Err(TokenizerError::at(
            self.pos,
            "Reached end of formula while parsing string",
        ))
    }

    fn quoted_text(&mut self) -> Result<(), TokenizerError> {
        self.flush_pending();
        let end = self.scan_quoted(b'"')?;
        self.items.push(Token::operand(&self.source, self.pos..end));
        self.pos = end;
        self.restart_pending();
        Ok(())
    }

    /// A single-quoted sheet name becomes part of the reference being
    /// accumulated, as in `'Q1 Data'!B2` or `A1:'Q1 Data'!B2`.
    fn quoted_sheet(&mut self) -> Result<(), TokenizerError> {
        if !self.pending_ends_with(b':') {
            self.flush_pending();
        }
        let end = self.scan_quoted(b'\'')?;
        self.pos = end;
        self.pending.end = end;
        Ok(())
    }

    /// An error literal such as `#N/A`, matched case-insensitively. After a
    /// sheet qualifier (`Sheet1!#REF!`) it joins the pending text.
    fn error_literal(&mut self) -> Result<(), TokenizerError> {
        if !self.pending_ends_with(b'!') {
            self.flush_pending();
        }
        let start = if self.pending.is_empty() {
            self.pos
        } else {
            self.pending.start
        };
        let rest = &self.source.as_bytes()[self.pos..];
        let Some(len) = ERROR_LITERALS
            .iter()
            .find(|code| {
                rest.get(..code.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(code.as_bytes()))
            })
            .map(|code| code.len())
        else {
            return Err(TokenizerError::at(self.pos, "Invalid error literal"));
        };
        let end = self.pos + len;
        self.items.push(Token::operand(&self.source, start..end));
        self.pos = end;
        self.restart_pending();
        Ok(())
    }

    fn whitespace(&mut self) {
        self.flush_pending();
        let start = self.pos;
        while let Some(b' ' | b'\n' | b'\t' | b'\r') = self.byte(self.pos) {
            self.pos += 1;
        }
        let token = Token::spanning(
            &self.source,
            TokenType::Whitespace,
            TokenSubType::None,
            start..self.pos,
        );
        self.items.push(token);
        self.restart_pending();
    }

    fn operator(&mut self) {
        self.flush_pending();

        let pair = self.source.as_bytes().get(self.pos..self.pos + 2);
        if let Some(b">=" | b"<=" | b"<>") = pair {
            let span = self.pos..self.pos + 2;
            let token = Token::spanning(&self.source, TokenType::OpInfix, TokenSubType::None, span);
            self.items.push(token);
            self.pos += 2;
            self.restart_pending();
            return;
        }

        let token_type = match self.byte(self.pos) {
            Some(b'%') => TokenType::OpPostfix,
            // a sign is infix only right after something that ends an operand
            Some(b'+' | b'-') => {
                let previous = self
                    .items
                    .iter()
                    .rev()
                    .find(|t| t.token_type != TokenType::Whitespace);
                match previous {
                    Some(t) if t.ends_operand() || t.token_type == TokenType::OpPostfix => {
                        TokenType::OpInfix
                    }
                    _ => TokenType::OpPrefix,
                }
            }
            _ => TokenType::OpInfix,
        };
        self.push_byte_token(token_type, TokenSubType::None);
    }

    /// `{` opens an array literal. `(` opens a call when it directly
    /// follows a name, and a plain group otherwise.
    fn open_group(&mut self, byte: u8) {
        let token = if byte == b'{' {
            self.flush_pending();
            Token::spanning(&self.source, TokenType::Array, TokenSubType::Open, self.pos..self.pos + 1)
        } else if self.pending.is_empty() {
            Token::spanning(&self.source, TokenType::Paren, TokenSubType::Open, self.pos..self.pos + 1)
        } else {
            let span = self.pending.start..self.pos + 1;
            Token::spanning(&self.source, TokenType::Func, TokenSubType::Open, span)
        };
        self.items.push(token.clone());
        self.groups.push(token);
        self.pos += 1;
        self.restart_pending();
    }

    fn close_group(&mut self, byte: u8) -> Result<(), TokenizerError> {
        self.flush_pending();
        let Some(open) = self.groups.pop() else {
            return Err(TokenizerError::at(self.pos, "No matching opener for closer"));
        };
        if (open.token_type == TokenType::Array) != (byte == b'}') {
            return Err(TokenizerError::at(self.pos, "Mismatched ( and { pair"));
        }
        self.push_byte_token(open.token_type, TokenSubType::Close);
        Ok(())
    }

    /// `;` separates array rows. `,` separates arguments inside a call or an
    /// array literal and is the union operator everywhere else.
    fn separator(&mut self, byte: u8) {
        self.flush_pending();
        let in_list = self
            .groups
            .last()
            .is_some_and(|g| matches!(g.token_type, TokenType::Func | TokenType::Array));
        let (token_type, subtype) = match byte {
            b';' => (TokenType::Sep, TokenSubType::Row),
            _ if in_list => (TokenType::Sep, TokenSubType::Arg),
            _ => (TokenType::OpInfix, TokenSubType::None),
        };
        self.push_byte_token(token_type, subtype);
    }

    /// The formula text rebuilt from the tokens, with a leading `=`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.source.len() + 1);
        out.push('=');
        for token in &self.items {
            out.push_str(&token.value);
        }
        out
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, TokenSubType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.subtype, t.value))
            .collect()
    }

    #[test]
    fn operands_and_operators() {
        let toks = kinds("=A1+-2.5E-3%");
        assert_eq!(toks[0], (TokenType::Operand, TokenSubType::Range, "A1".into()));
        assert_eq!(toks[1], (TokenType::OpInfix, TokenSubType::None, "+".into()));
        assert_eq!(toks[2], (TokenType::OpPrefix, TokenSubType::None, "-".into()));
        assert_eq!(toks[3], (TokenType::Operand, TokenSubType::Number, "2.5E-3".into()));
        assert_eq!(toks[4], (TokenType::OpPostfix, TokenSubType::None, "%".into()));
    }

    #[test]
    fn calls_and_separators() {
        let toks = kinds("=IF(a1<>\"x\",,1)");
        assert_eq!(toks[0].0, TokenType::Func);
        assert_eq!(toks[0].2, "IF(");
        assert_eq!(toks[2], (TokenType::OpInfix, TokenSubType::None, "<>".into()));
        assert_eq!(toks[3].1, TokenSubType::Text);
        assert_eq!(toks[4], (TokenType::Sep, TokenSubType::Arg, ",".into()));
        assert_eq!(toks[5], (TokenType::Sep, TokenSubType::Arg, ",".into()));
        assert_eq!(toks.last().unwrap().1, TokenSubType::Close);
    }

    #[test]
    fn comma_in_plain_parens_is_union() {
        let toks = kinds("=SUM((A1,B2))");
        assert!(toks.contains(&(TokenType::OpInfix, TokenSubType::None, ",".into())));
    }

    #[test]
    fn quoted_sheet_names_stay_in_reference() {
        let toks = kinds("='My Sheet'!A1:B2*2");
        assert_eq!(
            toks[0],
            (TokenType::Operand, TokenSubType::Range, "'My Sheet'!A1:B2".into())
        );
    }

    #[test]
    fn error_literals_and_logicals() {
        let toks = kinds("=#n/a&true");
        assert_eq!(toks[0], (TokenType::Operand, TokenSubType::Error, "#n/a".into()));
        assert_eq!(toks[2], (TokenType::Operand, TokenSubType::Logical, "true".into()));
        assert!(Tokenizer::new("=#BOGUS!").is_err());
    }

    #[test]
    fn leading_equals_is_optional() {
        assert_eq!(kinds("1+2"), kinds("=1+2"));
    }

    #[test]
    fn identifiers_are_not_numbers() {
        let toks = kinds("=inf");
        assert_eq!(toks[0].1, TokenSubType::Range);
    }

    #[test]
    fn unbalanced_groups_report_position() {
        let err = Tokenizer::new("=SUM(1,2").unwrap_err();
        assert_eq!(err.pos, 1);
        let err = Tokenizer::new("=1)").unwrap_err();
        assert_eq!(err.pos, 2);
        assert!(Tokenizer::new("=(1}").is_err());
        assert!(Tokenizer::new("=\"open").is_err());
    }

    #[test]
    fn render_round_trips() {
        for f in ["=SUM(A1:B2, 3)", "=-A1%^2", "={1,2;3,4}", "='a b'!C3 D4"] {
            assert_eq!(Tokenizer::new(f).unwrap().render(), f);
        }
    }
}
