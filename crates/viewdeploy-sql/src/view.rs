//! Structured `CREATE VIEW` statements

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::cte::{read_subs, CteDefinition};
use crate::error::{Malformed, Result};
use crate::scanner::code_mask;

static VIEW_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?VIEW\s+(?:(?:\[[^\[\]]*\]|`[^`]*`|\w+)\.)?`?(\w+)`?(?:\s+AS\b)?",
    )
    .unwrap()
});

/// A parsed `CREATE [OR REPLACE] VIEW` statement
///
/// Rendering `preamble`, `header`, the CTE block and `body` in that order
/// reproduces the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewDefinition {
    /// Bare view name (any qualifier is left in the header)
    pub name: String,

    /// Text preceding the header, such as comments or a `DROP VIEW`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preamble: String,

    /// Verbatim header, e.g. `CREATE OR REPLACE VIEW [reporting].sales AS`
    pub header: String,

    /// Leading CTEs in source order
    pub ctes: Vec<CteDefinition>,

    /// Remaining statement after the CTEs
    pub body: String,
}

impl ViewDefinition {
    /// Parse a view definition from raw SQL text
    ///
    /// The header is the first `CREATE [OR REPLACE] VIEW <name> [AS]` found
    /// outside comments and quotes.
    pub fn parse(text: &str) -> Result<Self> {
        let mask = code_mask(text);
        let header = VIEW_HEADER_RE
            .captures_iter(text)
            .find(|caps| caps.get(0).is_some_and(|m| mask[m.start()]))
            .ok_or(Malformed::MissingHeader)?;

        let (Some(matched), Some(name)) = (header.get(0), header.get(1)) else {
            return Err(Malformed::MissingHeader.into());
        };

        let (ctes, body) = read_subs(text[matched.end()..].trim())?;

        tracing::debug!(view = name.as_str(), ctes = ctes.len(), "parsed view definition");

        Ok(Self {
            name: name.as_str().to_string(),
            preamble: text[..matched.start()].trim().to_string(),
            header: matched.as_str().to_string(),
            ctes,
            body: body.to_string(),
        })
    }

    /// Render back to SQL text
    ///
    /// The first CTE is introduced by `WITH`, later ones by a leading comma.
    pub fn render(&self) -> String {
        let mut sql = String::new();

        if !self.preamble.is_empty() {
            sql.push_str(&self.preamble);
            sql.push('\n');
        }

        sql.push_str(&self.header);
        sql.push('\n');

        for (i, cte) in self.ctes.iter().enumerate() {
            let introducer = if i == 0 { "WITH " } else { "," };
            sql.push_str(&format!("{}{} AS\n{}\n", introducer, cte.name, cte.body));
        }

        sql.push_str(&self.body);
        sql
    }

    /// Names of this view's own CTEs
    pub fn cte_names(&self) -> impl Iterator<Item = &str> {
        self.ctes.iter().map(|cte| cte.name.as_str())
    }

    /// Fold `dependencies` into a copy of this view (see [`crate::inline()`])
    pub fn inline(&self, dependencies: &[ViewDefinition]) -> Result<ViewDefinition> {
        crate::inline::inline(self, dependencies)
    }

    /// Whether the body refers to `[schema].<name>` after its `FROM`
    pub fn references(&self, name: &str) -> bool {
        crate::inline::rewritable_references(&self.body)
            .is_some_and(|refs| refs.iter().any(|r| r.name == name))
    }
}

impl std::fmt::Display for ViewDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
