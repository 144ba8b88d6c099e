//! Earley parsing for arbitrary context-free grammars (ambiguous, left
//! recursive or with empty productions). `parse` returns a shared packed
//! forest of every full derivation; `Forest::accept` picks one reading with
//! per-production choosers and evaluates it with reducers.

#![deny(warnings)]

mod grammar;
pub use crate::grammar::{Chooser, Grammar, ProdId, Production, Reducer, Symbol};

mod items;
mod parser;
pub use crate::parser::{parse, EarleyParser, Error, Scan, Token, Tokenizer};

mod spans;
mod forest;
pub use crate::forest::{Branch, Child, Forest, ForestNode, NodeId};

mod trees;
pub use crate::trees::Resolution;

pub mod lexer;
pub use crate::lexer::{parse_str, Lexer, Pattern};

pub mod template;
