//! Stencil template syntax
//!
//! Syntax tree and parser for the HTML template dialect compiled by
//! `stencil-bundle`.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{ParseError, decode_entities, parse_template};
