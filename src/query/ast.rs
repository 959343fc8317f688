//! Abstract syntax tree for parsed queries.
//!
//! A query is a tree of owned nodes; composite nodes exclusively own their
//! children, so there is no sharing and no cycles. Nodes are immutable
//! except for the in-place opt-hoist pass (`to_cnf`).

use serde::{Deserialize, Serialize};
use std::slice;

use super::whitespace;

/// The closed set of node kinds a query tree is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    All,
    None,
    Tag,
    Wildcard,
    Metatag,
    Not,
    Opt,
    And,
    Or,
}

impl NodeKind {
    /// Lowercase name of the kind, as used in the s-expression form.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::All => "all",
            NodeKind::None => "none",
            NodeKind::Tag => "tag",
            NodeKind::Wildcard => "wildcard",
            NodeKind::Metatag => "metatag",
            NodeKind::Not => "not",
            NodeKind::Opt => "opt",
            NodeKind::And => "and",
            NodeKind::Or => "or",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A node in the query tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAst {
    /// Matches everything; produced by an empty query.
    All,
    /// Matches nothing; produced when parsing fails softly.
    None,
    /// A literal tag. Lowercased.
    Tag(String),
    /// A tag pattern containing at least one `*`. Lowercased.
    Wildcard(String),
    /// A `name:value` pair drawn from the metatag vocabulary.
    Metatag {
        name: String,
        value: String,
        quoted: bool,
    },
    /// Negation.
    Not(Box<QueryAst>),
    /// Soft-match marker (`~x`): prefer results matching the child but do
    /// not require them.
    Opt(Box<QueryAst>),
    /// Conjunction.
    And(Vec<QueryAst>),
    /// Disjunction.
    Or(Vec<QueryAst>),
}

impl QueryAst {
    /// Create a tag node. The name is folded to lowercase, ASCII-only.
    pub fn tag(name: impl Into<String>) -> Self {
        let mut name = name.into();
        name.make_ascii_lowercase();
        QueryAst::Tag(name)
    }

    /// Create a wildcard node. The pattern is folded to lowercase,
    /// ASCII-only.
    pub fn wildcard(pattern: impl Into<String>) -> Self {
        let mut pattern = pattern.into();
        pattern.make_ascii_lowercase();
        QueryAst::Wildcard(pattern)
    }

    /// Create a metatag node. The name is folded to lowercase; the value
    /// is kept verbatim. A value containing Unicode whitespace is forced
    /// into quoted form so the infix printout stays unambiguous.
    pub fn metatag(name: impl Into<String>, value: impl Into<String>, quoted: bool) -> Self {
        let mut name = name.into();
        name.make_ascii_lowercase();
        let value = value.into();
        let quoted = quoted || value.chars().any(whitespace::is_space);

        QueryAst::Metatag {
            name,
            value,
            quoted,
        }
    }

    /// Create a negation node.
    pub fn not(child: QueryAst) -> Self {
        QueryAst::Not(Box::new(child))
    }

    /// Create a soft-match node.
    pub fn opt(child: QueryAst) -> Self {
        QueryAst::Opt(Box::new(child))
    }

    /// Create a conjunction over `children`. The child list is taken
    /// verbatim; the caller is responsible for arity.
    pub fn and(children: Vec<QueryAst>) -> Self {
        QueryAst::And(children)
    }

    /// Create a disjunction over `children`. The child list is taken
    /// verbatim; the caller is responsible for arity.
    pub fn or(children: Vec<QueryAst>) -> Self {
        QueryAst::Or(children)
    }

    /// The kind tag of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            QueryAst::All => NodeKind::All,
            QueryAst::None => NodeKind::None,
            QueryAst::Tag(_) => NodeKind::Tag,
            QueryAst::Wildcard(_) => NodeKind::Wildcard,
            QueryAst::Metatag { .. } => NodeKind::Metatag,
            QueryAst::Not(_) => NodeKind::Not,
            QueryAst::Opt(_) => NodeKind::Opt,
            QueryAst::And(_) => NodeKind::And,
            QueryAst::Or(_) => NodeKind::Or,
        }
    }

    /// Direct children as a contiguous slice: empty for leaves, length 1
    /// for `Not`/`Opt`, the full child list for `And`/`Or`.
    pub fn children(&self) -> &[QueryAst] {
        match self {
            QueryAst::Not(child) | QueryAst::Opt(child) => slice::from_ref(&**child),
            QueryAst::And(children) | QueryAst::Or(children) => children,
            _ => &[],
        }
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_folds_ascii_only() {
        assert_eq!(QueryAst::tag("CatGirl"), QueryAst::Tag("catgirl".into()));
        // Non-ASCII letters are left alone.
        assert_eq!(QueryAst::tag("ÜBER"), QueryAst::Tag("Über".into()));
    }

    #[test]
    fn test_metatag_preserves_value_case() {
        let node = QueryAst::metatag("USER", "Bob", false);
        assert_eq!(
            node,
            QueryAst::Metatag {
                name: "user".into(),
                value: "Bob".into(),
                quoted: false,
            }
        );
    }

    #[test]
    fn test_metatag_auto_quotes_on_whitespace() {
        for value in ["a b", "a\u{00A0}b", "a\u{3000}b"] {
            let node = QueryAst::metatag("user", value, false);
            assert!(matches!(node, QueryAst::Metatag { quoted: true, .. }));
        }

        let node = QueryAst::metatag("user", "a_b", false);
        assert!(matches!(node, QueryAst::Metatag { quoted: false, .. }));
    }

    #[test]
    fn test_children_slices() {
        assert!(QueryAst::All.children().is_empty());
        assert!(QueryAst::tag("a").children().is_empty());

        let not = QueryAst::not(QueryAst::tag("a"));
        assert_eq!(not.children(), &[QueryAst::tag("a")]);
        assert_eq!(not.child_count(), 1);

        let and = QueryAst::and(vec![QueryAst::tag("a"), QueryAst::tag("b")]);
        assert_eq!(and.child_count(), 2);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(QueryAst::All.kind().name(), "all");
        assert_eq!(QueryAst::opt(QueryAst::tag("a")).kind().name(), "opt");
        assert_eq!(QueryAst::or(vec![]).kind().to_string(), "or");
    }
}
