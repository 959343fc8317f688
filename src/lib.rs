//! Tag-search query engine: parser, AST, pretty-printers, and
//! normalization toward conjunctive form.
//!
//! Users of a content site type free-form queries mixing tags, metatags,
//! boolean connectives, grouping, negation, and soft-match markers. This
//! crate turns such a query into a structured tree suitable for later
//! translation into a database query. Executing the tree against an index
//! is out of scope.
//!
//! # Example
//!
//! ```rust
//! use tagdex::{QueryParser, Vocabulary};
//!
//! let parser = QueryParser::new(Vocabulary::new(["rating", "order"]).unwrap());
//! let mut ast = parser.parse("-cat ~dog ~fox rating:s").unwrap();
//! assert_eq!(ast.to_sexp(), "(and (not cat) (opt dog) (opt fox) rating:s)");
//!
//! // Hoist the soft-match markers into a single disjunction.
//! ast.to_cnf();
//! assert_eq!(ast.to_sexp(), "(and (or dog fox) (not cat) rating:s)");
//! ```

pub mod error;
pub mod query;

pub use error::{Result, TagdexError};
pub use query::{NodeKind, QueryAst, QueryParser, Vocabulary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
