//! Reading the leading CTE chain of a view
//!
//! Handles `WITH a AS (...), b AS (...) SELECT ...`, returning each named
//! CTE with its verbatim parenthesized body and the text that follows.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::{Malformed, Result};
use crate::scanner::find_matching_paren;

static FIRST_CTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^WITH\s+`?(\w+)`?\s*(?:AS\b\s*)?").unwrap()
});

static NEXT_CTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^,\s*`?(\w+)`?\s*(?:AS\b\s*)?").unwrap()
});

/// A named common table expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CteDefinition {
    /// CTE name
    pub name: String,

    /// Parenthesized body, including the enclosing `(` and `)`
    pub body: String,
}

impl CteDefinition {
    /// Create a CTE definition
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// Which introducer the reader is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// `WITH name`
    First,

    /// `, name`
    More,
}

impl Expect {
    fn pattern(self) -> &'static Regex {
        match self {
            Expect::First => &*FIRST_CTE_RE,
            Expect::More => &*NEXT_CTE_RE,
        }
    }
}

/// Skip leading whitespace and whole-line `--` comments
fn skip_comment_lines(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if !text.starts_with("--") {
            return text;
        }
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => "",
        };
    }
}

/// Read the CTEs at the start of `text`
///
/// `text` is positioned right after a view header. Returns the CTEs in
/// source order and the remaining body text. Comment lines between CTEs are
/// dropped; comments before the body are kept with it.
pub fn read_subs(text: &str) -> Result<(Vec<CteDefinition>, &str)> {
    let mut ctes = Vec::new();
    let mut rest = text.trim_start();
    let mut expect = Expect::First;

    loop {
        let candidate = skip_comment_lines(rest);
        let Some(found) = expect.pattern().captures(candidate) else {
            return Ok((ctes, rest));
        };

        let name = found[1].to_string();
        let after = &candidate[found[0].len()..];

        if !after.starts_with('(') {
            return Err(Malformed::MissingCteBody { name }.into());
        }

        // `after` is always a suffix of `text`, so offsets stay absolute
        let open = text.len() - after.len();
        let close = find_matching_paren(text, open + 1)?;
        ctes.push(CteDefinition::new(name, &text[open..=close]));

        rest = text[close + 1..].trim_start();
        expect = Expect::More;
    }
}
