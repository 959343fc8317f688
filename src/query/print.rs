//! Canonical string forms of a query tree.
//!
//! Two printers: the infix form mirrors the search-box syntax and
//! round-trips through the parser; the s-expression form is unambiguous
//! and is what the test suite asserts against. Both are total functions
//! on well-formed trees.

use std::fmt;

use super::ast::QueryAst;

impl QueryAst {
    /// Infix form, mirroring the input syntax.
    ///
    /// `All` prints as the empty string. A composite child with more than
    /// one direct child is parenthesized; everything else prints bare.
    pub fn to_infix(&self) -> String {
        match self {
            QueryAst::All => String::new(),
            QueryAst::None => "none".to_string(),
            QueryAst::Tag(name) | QueryAst::Wildcard(name) => name.clone(),
            QueryAst::Metatag {
                name,
                value,
                quoted,
            } => format_metatag(name, value, *quoted),
            QueryAst::Not(_) => format!("-{}", join_infix(self.children(), "")),
            QueryAst::Opt(_) => format!("~{}", join_infix(self.children(), "")),
            QueryAst::And(_) => join_infix(self.children(), " "),
            QueryAst::Or(_) => join_infix(self.children(), " or "),
        }
    }

    /// S-expression form.
    ///
    /// Leaves print bare (`all`, `none`, the tag text, the metatag pair);
    /// a wildcard prints as `(wildcard pattern)`; a composite prints as
    /// `(kind child ...)` with no extra parenthesization of children.
    pub fn to_sexp(&self) -> String {
        match self {
            QueryAst::All | QueryAst::None => self.kind().name().to_string(),
            QueryAst::Tag(name) => name.clone(),
            QueryAst::Wildcard(name) => format!("(wildcard {})", name),
            QueryAst::Metatag {
                name,
                value,
                quoted,
            } => format_metatag(name, value, *quoted),
            _ => {
                let children: Vec<String> =
                    self.children().iter().map(QueryAst::to_sexp).collect();
                format!("({} {})", self.kind().name(), children.join(" "))
            }
        }
    }
}

impl fmt::Display for QueryAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_infix())
    }
}

/// Join children in infix form with `sep`, parenthesizing any child that
/// has more than one direct child.
fn join_infix(children: &[QueryAst], sep: &str) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| {
            if child.child_count() > 1 {
                format!("({})", child.to_infix())
            } else {
                child.to_infix()
            }
        })
        .collect();

    parts.join(sep)
}

/// `name:value`, or `name:"value"` with `"` and `\` backslash-escaped.
fn format_metatag(name: &str, value: &str, quoted: bool) -> String {
    if quoted {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            if c == '"' || c == '\\' {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        format!("{}:\"{}\"", name, escaped)
    } else {
        format!("{}:{}", name, value)
    }
}
