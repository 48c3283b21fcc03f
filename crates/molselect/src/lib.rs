//! molselect - Atom selection language for molecular structures
//!
//! Selections such as `protein and resid 10 to 20` or
//! `same resid as exwithin 4 of water` filter the rows of a tabular
//! structure. The pipeline:
//!
//! 1. **Grammar assembly**: the macro and keyword tables are compiled into
//!    token rules and substituted into a grammar template, together with a
//!    computed fallback token for free-form values.
//! 2. **Parsing**: an LALR(1) parser with two entry rules, `start` for a full
//!    selection and `expr` for macro expansions.
//! 3. **AST building**: parse trees become [`Node`] trees.
//! 4. **Macro expansion**: macro references are re-parsed and spliced in,
//!    with a depth guard against cycles.
//! 5. **Evaluation**: [`Evaluator`] walks the tree against any backend
//!    implementing [`Structure`] and [`Array`].
//!
//! # Examples
//!
//! ```ignore
//! use molselect::Selector;
//!
//! let selector = Selector::embedded()?;
//! let tree = selector.parse("name CA and resname ALA")?;
//! let node = selector.build("within 5 of water")?;
//! let subset = selector.select("protein and not backbone", &structure)?;
//! ```

pub mod ast;
pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod eval;
pub mod grammar;
pub mod macros;
pub mod parser;
pub mod selector;

#[cfg(test)]
mod testing;

pub use ast::*;
pub use backend::*;
pub use builder::AstBuilder;
pub use config::*;
pub use error::*;
pub use eval::*;
pub use grammar::{assemble, AssembledGrammar, FallbackPattern};
pub use macros::MacroMap;
pub use parser::{CompiledParser, ParseNode, ParseTree, StartRule, Token};
pub use selector::*;
