//! Normalization toward conjunctive form.
//!
//! The pass performed here is the opt-hoist: every `~x` soft-match marker
//! is absorbed into a single disjunction at its parent scope, so a later
//! query planner only ever sees `and`/`or`/`not` over leaves.

use std::mem;

use super::ast::QueryAst;

impl QueryAst {
    /// Rewrite the tree in place so that no `Opt` nodes remain, then
    /// return it.
    ///
    /// Within each `And`/`Or`, all opt children are stripped of their
    /// marker and merged into one `Or` that takes the place of the first
    /// of them; the remaining children keep their relative order. An opt
    /// with no enclosing `And`/`Or` to absorb it becomes a single-child
    /// `Or` on its own.
    ///
    /// Only the opt-hoist is performed: `or` is not distributed over
    /// `and` and negations stay where they are. The pass is idempotent.
    pub fn to_cnf(&mut self) -> &mut Self {
        self.rewrite_opts();
        self
    }

    /// Pre-order rewrite: the node first, then its (possibly replaced)
    /// children.
    fn rewrite_opts(&mut self) {
        match self {
            QueryAst::Opt(_) => {
                if let QueryAst::Opt(child) = mem::replace(self, QueryAst::All) {
                    *self = QueryAst::Or(vec![*child]);
                }
            }
            QueryAst::And(children) | QueryAst::Or(children) => {
                if children.iter().any(|c| matches!(c, QueryAst::Opt(_))) {
                    let (opts, rest): (Vec<_>, Vec<_>) = mem::take(children)
                        .into_iter()
                        .partition(|c| matches!(c, QueryAst::Opt(_)));

                    let unwrapped = opts
                        .into_iter()
                        .map(|c| match c {
                            QueryAst::Opt(inner) => *inner,
                            _ => unreachable!(),
                        })
                        .collect();

                    children.push(QueryAst::Or(unwrapped));
                    children.extend(rest);
                }
            }
            _ => {}
        }

        match self {
            QueryAst::Not(child) | QueryAst::Opt(child) => child.rewrite_opts(),
            QueryAst::And(children) | QueryAst::Or(children) => {
                for child in children {
                    child.rewrite_opts();
                }
            }
            _ => {}
        }
    }
}
