use std::fmt::{self, Display};

use gridcalc_common::{ExcelError, LiteralValue, Reference, parse_reference};
use thiserror::Error;

use crate::tokenizer::{Associativity, Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

/// Longest accepted formula, in characters.
pub const MAX_FORMULA_LEN: usize = 8192;

/// Deepest accepted nesting of calls, parentheses, array literals and prefix
/// signs.
pub const MAX_NESTING: usize = 64;

/// A formula that could not be parsed. `position` is the byte offset of the
/// offending token in the formula text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct ParserError {
    pub message: String,
    pub position: usize,
}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: err.pos,
        }
    }
}

/// The different types of AST nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(LiteralValue),
    Reference {
        original: String,
        reference: Reference,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    /// `op` is one of the arithmetic/comparison operators, `&`, `,` (union)
    /// or `" "` (intersection).
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    /// `name` is stored upper-cased.
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
    Array(Vec<Vec<ASTNode>>),
}

impl Display for ASTNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNodeType::Literal(value) => write!(f, "Literal({value})"),
            ASTNodeType::Reference { reference, .. } => write!(f, "Reference({reference})"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "UnaryOp({op}, {expr})"),
            ASTNodeType::BinaryOp { op, left, right } => {
                write!(f, "BinaryOp({op:?}, {left}, {right})")
            }
            ASTNodeType::Function { name, args } => {
                write!(f, "Function({name}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                write!(f, ")")
            }
            ASTNodeType::Array(rows) => write!(f, "Array({} rows)", rows.len()),
        }
    }
}

/// An immutable parsed formula element.
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub source_token: Option<Token>,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, source_token: Option<Token>) -> Self {
        ASTNode {
            node_type,
            source_token,
        }
    }

    /// Every reference in the tree, left to right.
    pub fn get_dependencies(&self) -> Vec<&Reference> {
        let mut dependencies = Vec::new();
        self.collect_dependencies(&mut dependencies);
        dependencies
    }

    fn collect_dependencies<'a>(&'a self, dependencies: &mut Vec<&'a Reference>) {
        match &self.node_type {
            ASTNodeType::Reference { reference, .. } => dependencies.push(reference),
            ASTNodeType::UnaryOp { expr, .. } => expr.collect_dependencies(dependencies),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_dependencies(dependencies);
                right.collect_dependencies(dependencies);
            }
            ASTNodeType::Function { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(dependencies);
                }
            }
            ASTNodeType::Array(rows) => {
                for item in rows.iter().flatten() {
                    item.collect_dependencies(dependencies);
                }
            }
            ASTNodeType::Literal(_) => {}
        }
    }
}

impl Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_type)
    }
}

/// A precedence-climbing parser over a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    source_len: usize,
    depth: usize,
}

impl Parser {
    /// Whitespace between two operands becomes the intersection operator;
    /// all other whitespace is dropped.
    pub fn new(tokens: Vec<Token>, source_len: usize) -> Self {
        let mut filtered: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut iter = tokens.into_iter().peekable();
        while let Some(tok) = iter.next() {
            if tok.token_type != TokenType::Whitespace {
                filtered.push(tok);
                continue;
            }
            let after_operand = filtered.last().is_some_and(Token::ends_operand);
            let before_operand = iter.peek().is_some_and(Token::starts_operand);
            if after_operand && before_operand {
                filtered.push(Token::new(
                    " ".to_string(),
                    TokenType::OpInfix,
                    TokenSubType::None,
                    tok.start,
                    tok.end,
                ));
            }
        }
        Parser {
            tokens: filtered,
            position: 0,
            source_len,
            depth: 0,
        }
    }

    /// Enters one nesting level, failing at the current token once the
    /// limit is passed.
    fn descend(&mut self) -> Result<(), ParserError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here(format!(
                "Formula nests deeper than {MAX_NESTING} levels"
            )));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn error_here<S: Into<String>>(&self, message: S) -> ParserError {
        let position = self
            .tokens
            .get(self.position)
            .map_or(self.source_len, |t| t.start);
        ParserError {
            message: message.into(),
            position,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_is(&self, token_type: TokenType, subtype: TokenSubType) -> bool {
        self.peek()
            .is_some_and(|t| t.token_type == token_type && t.subtype == subtype)
    }

    /// Parse the tokens into an AST.
    pub fn parse(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(self.error_here("Empty formula"));
        }
        let ast = self.parse_expression()?;
        if let Some(token) = self.peek() {
            let message = format!("Unexpected token '{}'", token.value);
            return Err(self.error_here(message));
        }
        Ok(ast)
    }

    fn parse_expression(&mut self) -> Result<ASTNode, ParserError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParserError> {
        let mut left = self.parse_unary_op()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpInfix {
                break;
            }

            let (precedence, associativity) =
                token.binding_power().unwrap_or((0, Associativity::Left));
            if precedence < min_precedence {
                break;
            }

            let op_token = token.clone();
            self.position += 1;

            let next_min_precedence = if associativity == Associativity::Left {
                precedence + 1
            } else {
                precedence
            };

            let right = self.parse_binary_op(next_min_precedence)?;
            left = ASTNode::new(
                ASTNodeType::BinaryOp {
                    op: op_token.value.clone(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(op_token),
            );
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParserError> {
        if let Some(token) = self.peek() {
            if token.token_type == TokenType::OpPrefix {
                let op_token = token.clone();
                self.descend()?;
                self.position += 1;
                let expr = self.parse_unary_op()?;
                self.ascend();
                return Ok(ASTNode::new(
                    ASTNodeType::UnaryOp {
                        op: op_token.value.clone(),
                        expr: Box::new(expr),
                    },
                    Some(op_token),
                ));
            }
        }
        self.parse_postfix_op()
    }

    fn parse_postfix_op(&mut self) -> Result<ASTNode, ParserError> {
        let mut expr = self.parse_primary()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpPostfix {
                break;
            }
            let op_token = token.clone();
            self.position += 1;
            expr = ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(op_token),
            );
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParserError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("Unexpected end of formula"));
        };

        if token.token_type == TokenType::Operand {
            let node = self.parse_operand(&token)?;
            self.position += 1;
            return Ok(node);
        }
        self.descend()?;
        let node = self.parse_group(token)?;
        self.ascend();
        Ok(node)
    }

    /// A call, parenthesised expression or array literal opened by `token`.
    fn parse_group(&mut self, token: Token) -> Result<ASTNode, ParserError> {
        match (token.token_type, token.subtype) {
            (TokenType::Func, TokenSubType::Open) => {
                self.position += 1;
                self.parse_function(token)
            }
            (TokenType::Paren, TokenSubType::Open) => {
                self.position += 1;
                let expr = self.parse_expression()?;
                if !self.peek_is(TokenType::Paren, TokenSubType::Close) {
                    return Err(self.error_here("Expected closing parenthesis"));
                }
                self.position += 1;
                Ok(expr)
            }
            (TokenType::Array, TokenSubType::Open) => {
                self.position += 1;
                self.parse_array(token)
            }
            _ => Err(self.error_here(format!("Unexpected token '{}'", token.value))),
        }
    }

    fn parse_operand(&self, token: &Token) -> Result<ASTNode, ParserError> {
        let literal = |value| Ok(ASTNode::new(ASTNodeType::Literal(value), Some(token.clone())));
        match token.subtype {
            TokenSubType::Number => match token.value.parse::<f64>() {
                Ok(n) => literal(LiteralValue::Number(n)),
                Err(_) => Err(self.error_here(format!("Invalid number '{}'", token.value))),
            },
            TokenSubType::Text => {
                let inner = &token.value[1..token.value.len() - 1];
                literal(LiteralValue::Text(inner.replace("\"\"", "\"")))
            }
            TokenSubType::Logical => {
                literal(LiteralValue::Boolean(token.value.eq_ignore_ascii_case("TRUE")))
            }
            TokenSubType::Error => match ExcelError::from_error_string(&token.value) {
                Some(err) => literal(LiteralValue::Error(err)),
                None => Err(self.error_here(format!("Invalid error literal '{}'", token.value))),
            },
            TokenSubType::Range => {
                let reference = parse_reference(&token.value)
                    .map_err(|e| self.error_here(e.to_string()))?;
                Ok(ASTNode::new(
                    ASTNodeType::Reference {
                        original: token.value.clone(),
                        reference,
                    },
                    Some(token.clone()),
                ))
            }
            _ => Err(self.error_here(format!("Unexpected operand '{}'", token.value))),
        }
    }

    fn parse_function(&mut self, func_token: Token) -> Result<ASTNode, ParserError> {
        let name = &func_token.value[..func_token.value.len() - 1];
        if !is_function_name(name) {
            return Err(ParserError {
                message: format!("Invalid function name '{name}'"),
                position: func_token.start,
            });
        }
        let name = name.to_ascii_uppercase();
        let args = self.parse_function_arguments()?;
        Ok(ASTNode::new(
            ASTNodeType::Function { name, args },
            Some(func_token),
        ))
    }

    fn empty_argument() -> ASTNode {
        ASTNode::new(ASTNodeType::Literal(LiteralValue::Empty), None)
    }

    /// Arguments up to the closing parenthesis. Omitted arguments
    /// (`IF(A1,,1)`) become `Empty` literals.
    fn parse_function_arguments(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut args = Vec::new();

        if self.peek_is(TokenType::Func, TokenSubType::Close) {
            self.position += 1;
            return Ok(args);
        }

        loop {
            if self.peek_is(TokenType::Sep, TokenSubType::Arg)
                || self.peek_is(TokenType::Func, TokenSubType::Close)
            {
                args.push(Self::empty_argument());
            } else {
                args.push(self.parse_expression()?);
            }

            if self.peek_is(TokenType::Sep, TokenSubType::Arg) {
                self.position += 1;
            } else if self.peek_is(TokenType::Func, TokenSubType::Close) {
                self.position += 1;
                return Ok(args);
            } else {
                return Err(self.error_here("Expected ',' or ')' in function arguments"));
            }
        }
    }

    fn parse_array(&mut self, open: Token) -> Result<ASTNode, ParserError> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if self.peek_is(TokenType::Array, TokenSubType::Close) {
            return Err(self.error_here("Empty array literal"));
        }

        loop {
            current_row.push(self.parse_expression()?);
            match self.peek().map(|t| (t.token_type, t.subtype)) {
                Some((TokenType::Sep, TokenSubType::Arg)) => self.position += 1,
                Some((TokenType::Sep, TokenSubType::Row)) => {
                    self.position += 1;
                    rows.push(std::mem::take(&mut current_row));
                }
                Some((TokenType::Array, TokenSubType::Close)) => {
                    self.position += 1;
                    rows.push(current_row);
                    break;
                }
                _ => return Err(self.error_here("Unexpected token in array literal")),
            }
        }

        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(ParserError {
                message: "Array rows have different lengths".to_string(),
                position: open.start,
            });
        }
        Ok(ASTNode::new(ASTNodeType::Array(rows), Some(open)))
    }
}

fn is_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Parse a formula (with or without the leading `=`) into an AST.
pub fn parse<T: AsRef<str>>(formula: T) -> Result<ASTNode, ParserError> {
    let formula = formula.as_ref();
    let body = usize::from(formula.starts_with('='));
    if let Some((offset, _)) = formula[body..].char_indices().nth(MAX_FORMULA_LEN) {
        return Err(ParserError {
            message: format!("Formula is longer than {MAX_FORMULA_LEN} characters"),
            position: body + offset,
        });
    }
    let tokens = Tokenizer::new(formula)?.items;
    Parser::new(tokens, formula.len()).parse()
}
