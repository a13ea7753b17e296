//! Tokenizer for the Copper language.
//!
//! `tokenize` is the sole entry point: it never stops at the first bad
//! character, instead collecting every [`LexError`] alongside the token
//! stream so a caller can report everything it found in one pass.

pub mod lexer;
pub mod token;

pub use lexer::{tokenize, LexError};
pub use token::{Token, TokenKind};
