pub mod parser;
pub mod tokenizer;

pub use parser::{ASTNode, ASTNodeType, MAX_FORMULA_LEN, MAX_NESTING, Parser, ParserError, parse};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

// Re-export common types
pub use gridcalc_common::{ExcelError, ExcelErrorKind, LiteralValue, Reference};
