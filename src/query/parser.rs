//! Recursive descent parser for tag-search query strings.
//!
//! # Grammar
//!
//! ```text
//! root        = { or_clause } ;
//! or_clause   = and_clause [ "or" or_clause ] ;
//! and_clause  = factor_list [ "and" and_clause ] ;
//! factor_list = factor { factor } ;
//! factor      = "-" expr | "~" expr | expr ;
//! expr        = "(" or_clause ")" | term ;
//! term        = metatag | tag | wildcard ;
//! ```
//!
//! `and` and `or` are keywords only when followed by whitespace; any
//! Unicode space separator counts. The parser works directly on the UTF-8
//! bytes and backtracks by rewinding the cursor when a production fails.
//!
//! Tokens are ambiguous: `order:score` is a metatag only when `order` is
//! in the vocabulary, `a*` is a wildcard, `:)` is a tag even though `)`
//! normally closes a group. A bare token greedily runs to the next
//! whitespace, then gives back trailing `)` bytes that plausibly close an
//! open group (unless the remainder is parenthesis-balanced, as in
//! `fate_(series)`, or one of the smiley tags).

use crate::error::{Result, TagdexError};

use super::ast::QueryAst;
use super::vocabulary::Vocabulary;
use super::whitespace::space_len_at;

/// Tokens ending in `)` that are never subject to trailing-paren
/// stripping.
const SMILEYS: [&[u8]; 6] = [b":)", b":(", b";)", b";(", b">:)", b">:("];

/// Parser for tag-search query strings.
///
/// Holds the metatag vocabulary; one parser can be reused across any
/// number of queries.
pub struct QueryParser {
    vocabulary: Vocabulary,
}

impl QueryParser {
    /// Create a parser over the given metatag vocabulary.
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Parse a query string into its AST.
    ///
    /// Empty or whitespace-only input yields [`QueryAst::All`]. Input the
    /// grammar cannot fully consume yields [`QueryAst::None`] and a
    /// warning carrying the parsed prefix and the leftover suffix. A
    /// group that is opened but never closed yields
    /// [`TagdexError::UnclosedParens`].
    pub fn parse(&self, input: &str) -> Result<QueryAst> {
        Scan::new(input, self.vocabulary.names()).root()
    }

    /// Parse raw bytes, enforcing the boundary contract first: the input
    /// must be valid UTF-8 and free of NUL bytes.
    pub fn parse_bytes(&self, input: &[u8]) -> Result<QueryAst> {
        if let Some(offset) = input.iter().position(|&b| b == 0) {
            return Err(TagdexError::NulByte(offset));
        }
        let input = std::str::from_utf8(input)?;

        self.parse(input)
    }
}

/// Per-parse state: the input bytes, a cursor, and the running count of
/// opened-but-unclosed groups.
///
/// Productions return `None` on failure and the caller rewinds the cursor
/// to its snapshot. The paren counter is deliberately not rewound when a
/// group with content turns out to be missing its `)`; that is what lets
/// the unclosed count survive to the root check. A `(` whose inside never
/// parsed at all is uncounted again when its bytes are retried as a
/// literal token.
struct Scan<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    unclosed_parens: i32,
    metatags: &'a [String],
}

impl<'a> Scan<'a> {
    fn new(input: &'a str, metatags: &'a [String]) -> Self {
        Scan {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            unclosed_parens: 0,
            metatags,
        }
    }

    /// root = { or_clause }
    fn root(mut self) -> Result<QueryAst> {
        let mut clauses = Vec::new();
        loop {
            let mark = self.pos;
            match self.or_clause() {
                Some(clause) => clauses.push(clause),
                None => {
                    self.pos = mark;
                    break;
                }
            }
        }
        self.skip_space();

        if self.unclosed_parens != 0 {
            return Err(TagdexError::UnclosedParens(
                self.unclosed_parens.unsigned_abs() as usize,
            ));
        }

        if self.pos < self.bytes.len() {
            tracing::warn!(
                "query not fully parsed: consumed {:?}, leftover {:?}",
                &self.input[..self.pos],
                &self.input[self.pos..]
            );
            return Ok(QueryAst::None);
        }

        Ok(match clauses.len() {
            0 => QueryAst::All,
            1 => clauses.into_iter().next().unwrap(),
            _ => QueryAst::And(clauses),
        })
    }

    /// or_clause = and_clause [ "or" or_clause ]
    ///
    /// Consecutive `or` clauses flatten into one n-ary node;
    /// parenthesized groups stay nested.
    fn or_clause(&mut self) -> Option<QueryAst> {
        let mut clauses = vec![self.and_clause()?];
        loop {
            let mark = self.pos;
            if self.eat_keyword(b"or") {
                if let Some(clause) = self.and_clause() {
                    clauses.push(clause);
                    continue;
                }
            }
            self.pos = mark;
            break;
        }

        if clauses.len() == 1 {
            clauses.pop()
        } else {
            Some(QueryAst::Or(clauses))
        }
    }

    /// and_clause = factor_list [ "and" and_clause ]
    ///
    /// A one-element list elides the `And` wrapper.
    fn and_clause(&mut self) -> Option<QueryAst> {
        let mut factors = self.factor_list()?;
        loop {
            let mark = self.pos;
            if self.eat_keyword(b"and") {
                if let Some(mut more) = self.factor_list() {
                    factors.append(&mut more);
                    continue;
                }
            }
            self.pos = mark;
            break;
        }

        if factors.len() == 1 {
            factors.pop()
        } else {
            Some(QueryAst::And(factors))
        }
    }

    /// factor_list = factor { factor }
    fn factor_list(&mut self) -> Option<Vec<QueryAst>> {
        let mut factors = vec![self.factor()?];
        loop {
            let mark = self.pos;
            match self.factor() {
                Some(factor) => factors.push(factor),
                None => {
                    self.pos = mark;
                    break;
                }
            }
        }

        Some(factors)
    }

    /// factor = "-" expr | "~" expr | expr
    fn factor(&mut self) -> Option<QueryAst> {
        self.skip_space();
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Some(QueryAst::not(self.expr()?))
            }
            Some(b'~') => {
                self.pos += 1;
                Some(QueryAst::opt(self.expr()?))
            }
            _ => self.expr(),
        }
    }

    /// expr = "(" or_clause ")" | term
    fn expr(&mut self) -> Option<QueryAst> {
        self.skip_space();
        let mark = self.pos;

        if self.peek() == Some(b'(') {
            self.pos += 1;
            self.unclosed_parens += 1;
            match self.or_clause() {
                Some(inner) => {
                    self.skip_space();
                    if self.peek() == Some(b')') {
                        self.pos += 1;
                        self.unclosed_parens -= 1;
                        return Some(inner);
                    }
                    // The group had content but its `)` never came:
                    // rewind the cursor only and leave the paren counted,
                    // so the dangling open surfaces as UnclosedParens at
                    // root.
                    self.pos = mark;
                }
                None => {
                    // Nothing parseable after the `(` at all. The byte is
                    // reinterpreted as literal token text below, so it no
                    // longer counts as an open group.
                    self.unclosed_parens -= 1;
                    self.pos = mark;
                }
            }
        }

        self.term()
    }

    /// term = metatag | tag | wildcard
    fn term(&mut self) -> Option<QueryAst> {
        self.skip_space();
        let mark = self.pos;

        if let Some(node) = self.metatag() {
            return Some(node);
        }
        self.pos = mark;

        self.tag_or_wildcard()
    }

    /// metatag = name ":" value, trying vocabulary names longest first.
    fn metatag(&mut self) -> Option<QueryAst> {
        let metatags = self.metatags;
        for name in metatags {
            let mark = self.pos;
            if self.eat_ignore_case(name.as_bytes()) && self.peek() == Some(b':') {
                self.pos += 1;
                if let Some((value, quoted)) = self.metatag_value() {
                    return Some(QueryAst::metatag(name.as_str(), value, quoted));
                }
            }
            self.pos = mark;
        }

        None
    }

    fn metatag_value(&mut self) -> Option<(String, bool)> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                Some((self.quoted_value(quote)?, true))
            }
            _ => Some((self.unquoted_value()?, false)),
        }
    }

    /// Quoted value: runs to the matching close quote. The only escape
    /// recognized is a backslash before the quote character itself; any
    /// other escape, or end of input, fails the production.
    fn quoted_value(&mut self, quote: u8) -> Option<String> {
        let mut value = Vec::new();
        while let Some(byte) = self.peek() {
            self.pos += 1;
            if byte == quote {
                return String::from_utf8(value).ok();
            }
            if byte == b'\\' {
                if self.peek() != Some(quote) {
                    return None;
                }
                self.pos += 1;
                value.push(quote);
            } else {
                value.push(byte);
            }
        }

        None
    }

    /// Unquoted value: runs to the next unescaped whitespace and must be
    /// non-empty. A backslash before whitespace escapes it into the
    /// value; a backslash before anything else is kept verbatim,
    /// backslash included (compatibility quirk with the upstream search
    /// engine).
    fn unquoted_value(&mut self) -> Option<String> {
        let mut value = Vec::new();
        while let Some(byte) = self.peek() {
            if byte == b'\\' {
                let escaped = space_len_at(self.bytes, self.pos + 1);
                if escaped > 0 {
                    value.extend_from_slice(&self.bytes[self.pos + 1..self.pos + 1 + escaped]);
                    self.pos += 1 + escaped;
                } else {
                    value.push(b'\\');
                    self.pos += 1;
                }
                continue;
            }
            if space_len_at(self.bytes, self.pos) > 0 {
                break;
            }
            value.push(byte);
            self.pos += 1;
        }

        self.give_back_trailing_parens(&mut value, true);
        if value.is_empty() {
            return None;
        }

        String::from_utf8(value).ok()
    }

    /// tag | wildcard: one bare token, then decide by content.
    fn tag_or_wildcard(&mut self) -> Option<QueryAst> {
        let token = self.bare_token()?;

        // Boolean keywords are never swallowed as tags.
        if token.eq_ignore_ascii_case(b"and") || token.eq_ignore_ascii_case(b"or") {
            return None;
        }
        // Tokens shaped like a recognized metatag belong to the metatag
        // production, which already failed here.
        if self.is_reserved_metatag(&token) {
            return None;
        }

        let text = std::str::from_utf8(&token).ok()?;
        if token.contains(&b'*') {
            Some(QueryAst::wildcard(text))
        } else {
            Some(QueryAst::tag(text))
        }
    }

    /// Scan a bare token: from a byte that is not whitespace and not one
    /// of `)`, `~`, `-`, through the next whitespace.
    fn bare_token(&mut self) -> Option<Vec<u8>> {
        match self.peek() {
            None | Some(b')') | Some(b'~') | Some(b'-') => return None,
            Some(_) => {}
        }

        let start = self.pos;
        while self.pos < self.bytes.len() && space_len_at(self.bytes, self.pos) == 0 {
            self.pos += 1;
        }

        let mut token = self.bytes[start..self.pos].to_vec();
        self.give_back_trailing_parens(&mut token, false);

        Some(token)
    }

    /// Give back trailing `)` bytes greedily consumed into a bare token
    /// when they plausibly close an open group. Stops once the remainder
    /// is parenthesis-balanced or a smiley, or no opened groups are
    /// pending. A tag token must keep at least one byte; a metatag value
    /// may be emptied, which then fails the metatag production.
    fn give_back_trailing_parens(&mut self, token: &mut Vec<u8>, allow_empty: bool) {
        let mut pending = self.unclosed_parens;
        while pending > 0
            && (allow_empty || token.len() > 1)
            && token.last() == Some(&b')')
            && !balanced_parens(token)
            && !is_smiley(token)
        {
            token.pop();
            self.pos -= 1;
            pending -= 1;
        }
    }

    /// True when the token is a vocabulary name, a colon, and at least
    /// one more byte.
    fn is_reserved_metatag(&self, token: &[u8]) -> bool {
        self.metatags.iter().any(|name| {
            token.len() > name.len() + 1
                && token[name.len()] == b':'
                && token[..name.len()].eq_ignore_ascii_case(name.as_bytes())
        })
    }

    /// Keywords only count when followed by at least one whitespace
    /// character, which is consumed along with them.
    fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        self.skip_space();
        let mark = self.pos;
        if self.eat_ignore_case(keyword) {
            let trailing = space_len_at(self.bytes, self.pos);
            if trailing > 0 {
                self.pos += trailing;
                return true;
            }
        }

        self.pos = mark;
        false
    }

    fn eat_ignore_case(&mut self, expected: &[u8]) -> bool {
        let end = self.pos + expected.len();
        if end <= self.bytes.len() && self.bytes[self.pos..end].eq_ignore_ascii_case(expected) {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn skip_space(&mut self) {
        loop {
            let len = space_len_at(self.bytes, self.pos);
            if len == 0 {
                break;
            }
            self.pos += len;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}

/// A token with as many `(` as `)`, scanning left to right without the
/// count ever going negative.
fn balanced_parens(token: &[u8]) -> bool {
    let mut depth: i32 = 0;
    for &byte in token {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }

    depth == 0
}

fn is_smiley(token: &[u8]) -> bool {
    SMILEYS.iter().any(|smiley| *smiley == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<QueryAst> {
        QueryParser::new(Vocabulary::empty()).parse(input)
    }

    fn parse_with(input: &str, metatags: &[&str]) -> Result<QueryAst> {
        QueryParser::new(Vocabulary::new(metatags.iter().copied()).unwrap()).parse(input)
    }

    fn sexp(input: &str) -> String {
        parse(input).unwrap().to_sexp()
    }

    fn sexp_with(input: &str, metatags: &[&str]) -> String {
        parse_with(input, metatags).unwrap().to_sexp()
    }

    #[test]
    fn test_empty_input_is_all() {
        assert_eq!(sexp(""), "all");
        assert_eq!(sexp("   "), "all");
        assert_eq!(sexp("\u{3000}\u{00A0}"), "all");
    }

    #[test]
    fn test_single_tag() {
        assert_eq!(sexp("cat"), "cat");
        assert_eq!(sexp("  cat  "), "cat");
    }

    #[test]
    fn test_implicit_and() {
        assert_eq!(sexp("cat dog"), "(and cat dog)");
        assert_eq!(sexp("a b c"), "(and a b c)");
    }

    #[test]
    fn test_explicit_and() {
        assert_eq!(sexp("cat and dog"), "(and cat dog)");
        assert_eq!(sexp("a and b and c"), "(and a b c)");
    }

    #[test]
    fn test_or() {
        assert_eq!(sexp("cat or dog"), "(or cat dog)");
        assert_eq!(sexp("a or b or c"), "(or a b c)");
    }

    #[test]
    fn test_precedence() {
        assert_eq!(sexp("a b or c"), "(or (and a b) c)");
        assert_eq!(sexp("a or b c"), "(or a (and b c))");
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(sexp("CAT AND DOG"), "(and cat dog)");
        assert_eq!(sexp("cat Or dog"), "(or cat dog)");
    }

    #[test]
    fn test_not_and_opt() {
        assert_eq!(sexp("-cat"), "(not cat)");
        assert_eq!(sexp("~dog"), "(opt dog)");
        assert_eq!(sexp("-cat ~dog cat"), "(and (not cat) (opt dog) cat)");
    }

    #[test]
    fn test_negated_group() {
        assert_eq!(sexp("-(a b)"), "(not (and a b))");
        assert_eq!(sexp("~(a or b)"), "(opt (or a b))");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(sexp("a (b or c) d"), "(and a (or b c) d)");
        assert_eq!(sexp("a (b c)"), "(and a (and b c))");
        assert_eq!(sexp("(a)"), "a");
    }

    #[test]
    fn test_group_keeps_nesting() {
        assert_eq!(sexp("a or (b or c)"), "(or a (or b c))");
        assert_eq!(sexp("(a b) or c"), "(or (and a b) c)");
    }

    #[test]
    fn test_tags_may_contain_parens() {
        assert_eq!(sexp("fate_(series)"), "fate_(series)");
        assert_eq!(sexp("(fate_(series))"), "fate_(series)");
        assert_eq!(sexp("a)"), "a)");
    }

    #[test]
    fn test_smileys() {
        assert_eq!(sexp(":)"), ":)");
        assert_eq!(sexp(">:("), ">:(");
        assert_eq!(sexp("(a :))"), "(and a :))");
        assert_eq!(sexp("(:))"), ":)");
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(sexp("a*"), "(wildcard a*)");
        assert_eq!(sexp("*cat* dog"), "(and (wildcard *cat*) dog)");
    }

    #[test]
    fn test_metatag() {
        assert_eq!(sexp_with("order:score", &["order"]), "order:score");
        assert_eq!(
            sexp_with("rating:s cat", &["rating"]),
            "(and rating:s cat)"
        );
    }

    #[test]
    fn test_metatag_requires_vocabulary() {
        // Unrecognized name:value stays a plain tag.
        assert_eq!(sexp("order:score"), "order:score");
        assert_eq!(parse("order:score").unwrap(), QueryAst::tag("order:score"));
    }

    #[test]
    fn test_metatag_name_is_case_insensitive() {
        let ast = parse_with("ORDER:Score", &["order"]).unwrap();
        assert_eq!(
            ast,
            QueryAst::Metatag {
                name: "order".into(),
                value: "Score".into(),
                quoted: false,
            }
        );
    }

    #[test]
    fn test_metatag_longest_match() {
        assert_eq!(sexp_with("ordered:x", &["order", "ordered"]), "ordered:x");
        assert_eq!(sexp_with("order:x", &["order", "ordered"]), "order:x");
    }

    #[test]
    fn test_metatag_quoted_value() {
        assert_eq!(
            sexp_with("user:\"Space Name\"", &["user"]),
            "user:\"Space Name\""
        );
        assert_eq!(sexp_with("user:'Space Name'", &["user"]), "user:\"Space Name\"");
        assert_eq!(sexp_with("user:\"\"", &["user"]), "user:\"\"");
    }

    #[test]
    fn test_metatag_quoted_escape() {
        let ast = parse_with(r#"note:"say \"hi\"""#, &["note"]).unwrap();
        assert_eq!(
            ast,
            QueryAst::Metatag {
                name: "note".into(),
                value: "say \"hi\"".into(),
                quoted: true,
            }
        );
    }

    #[test]
    fn test_metatag_bad_escape_falls_through() {
        // \n is not a recognized escape inside quotes, and the token then
        // fails the tag production too because of its reserved prefix.
        assert_eq!(parse_with(r#"note:"a\nb""#, &["note"]).unwrap(), QueryAst::None);
    }

    #[test]
    fn test_metatag_unterminated_quote_is_soft_error() {
        assert_eq!(parse_with("user:\"cat", &["user"]).unwrap(), QueryAst::None);
    }

    #[test]
    fn test_metatag_unquoted_escaped_space() {
        let ast = parse_with(r"source:a\ b", &["source"]).unwrap();
        assert_eq!(
            ast,
            QueryAst::Metatag {
                name: "source".into(),
                value: "a b".into(),
                quoted: true,
            }
        );

        // Multi-byte whitespace can be escaped the same way.
        let ast = parse_with("source:a\\\u{3000}b", &["source"]).unwrap();
        assert_eq!(
            ast,
            QueryAst::Metatag {
                name: "source".into(),
                value: "a\u{3000}b".into(),
                quoted: true,
            }
        );
    }

    #[test]
    fn test_metatag_unquoted_backslash_kept_verbatim() {
        let ast = parse_with(r"source:a\b", &["source"]).unwrap();
        assert_eq!(
            ast,
            QueryAst::Metatag {
                name: "source".into(),
                value: r"a\b".into(),
                quoted: false,
            }
        );
    }

    #[test]
    fn test_metatag_empty_value_parses_as_tag() {
        assert_eq!(parse_with("user:", &["user"]).unwrap(), QueryAst::tag("user:"));
    }

    #[test]
    fn test_metatag_empty_value_in_group_parses_as_tag() {
        // The value strip may empty a metatag value; the production then
        // fails, `user:` reparses as a tag and the group still closes.
        assert_eq!(sexp_with("(user:)", &["user"]), "user:");
        assert_eq!(sexp_with("a (user:)", &["user"]), "(and a user:)");
    }

    #[test]
    fn test_metatag_value_gives_back_group_paren() {
        assert_eq!(sexp_with("(rating:s)", &["rating"]), "rating:s");
        assert_eq!(
            sexp_with("(a or rating:s)", &["rating"]),
            "(or a rating:s)"
        );
    }

    #[test]
    fn test_bare_keyword_is_soft_error() {
        assert_eq!(parse("and").unwrap(), QueryAst::None);
        assert_eq!(parse("or").unwrap(), QueryAst::None);
    }

    #[test]
    fn test_trailing_keyword_is_soft_error() {
        assert_eq!(parse("cat or").unwrap(), QueryAst::None);
        assert_eq!(parse("cat and").unwrap(), QueryAst::None);
    }

    #[test]
    fn test_unclosed_parens_is_hard_error() {
        for input in ["(a", "(a b", "((a) b", "( a", "(user:"] {
            assert!(
                matches!(parse(input), Err(TagdexError::UnclosedParens(_))),
                "{:?} should report unclosed parens",
                input
            );
        }
    }

    #[test]
    fn test_empty_group_parses_as_literal_tag() {
        // A `(` with nothing parseable inside is literal token text, not
        // an open group, so balanced inputs stay error-free.
        assert_eq!(sexp("()"), "()");
        assert_eq!(sexp("(())"), "()");
        assert_eq!(sexp("(-)"), "(-)");
        assert_eq!(sexp("a ()"), "(and a ())");
    }

    #[test]
    fn test_unicode_whitespace_separates_tokens() {
        for space in ['\u{00A0}', '\u{2007}', '\u{202F}', '\u{3000}'] {
            let query = format!("cat{}dog", space);
            assert_eq!(sexp(&query), "(and cat dog)", "U+{:04X}", space as u32);
        }
    }

    #[test]
    fn test_keyword_followed_by_unicode_space() {
        assert_eq!(sexp("cat\u{3000}or\u{3000}dog"), "(or cat dog)");
    }

    #[test]
    fn test_keyword_without_trailing_space_is_a_tag() {
        // `or(b)` has no whitespace after `or`, so it scans as one token.
        assert_eq!(sexp("a or(b)"), "(and a or(b))");
    }

    #[test]
    fn test_tags_fold_to_lowercase() {
        assert_eq!(sexp("CaT DoG"), "(and cat dog)");
    }

    #[test]
    fn test_parse_bytes_boundary_checks() {
        let parser = QueryParser::new(Vocabulary::empty());

        assert!(matches!(
            parser.parse_bytes(b"cat\x00dog"),
            Err(TagdexError::NulByte(3))
        ));
        assert!(matches!(
            parser.parse_bytes(&[0x63, 0xFF, 0x61]),
            Err(TagdexError::InvalidUtf8(_))
        ));
        assert_eq!(parser.parse_bytes(b"cat dog").unwrap(), parse("cat dog").unwrap());
    }

    #[test]
    fn test_parser_is_reusable() {
        let parser = QueryParser::new(Vocabulary::new(["rating"]).unwrap());
        assert_eq!(parser.parse("rating:s").unwrap().to_sexp(), "rating:s");
        assert_eq!(parser.parse("cat").unwrap().to_sexp(), "cat");
    }
}
