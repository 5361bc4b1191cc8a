//! Folding dependency views into a consuming view
//!
//! Each dependency contributes its own CTEs plus one CTE named after the
//! dependency that wraps its body. Bracket-qualified references to any known
//! CTE (`[warehouse].orders`) in the consumer's `FROM` portion become bare
//! names, so the result no longer reads the dependency views at all.

use std::collections::HashSet;

use crate::cte::CteDefinition;
use crate::error::{Malformed, Result};
use crate::scanner::{find_keyword, qualified_references, QualifiedRef};
use crate::view::ViewDefinition;

/// Produce a copy of `consumer` with every dependency folded in
///
/// Dependencies are appended in the order given. CTE names are not
/// deduplicated: a name clash renders as-is. Fails with
/// [`Malformed::MissingFrom`] when the consumer body has no `FROM`.
pub fn inline(consumer: &ViewDefinition, dependencies: &[ViewDefinition]) -> Result<ViewDefinition> {
    let mut ctes = consumer.ctes.clone();

    for dependency in dependencies {
        ctes.extend(dependency.ctes.iter().cloned());
        ctes.push(CteDefinition::new(&dependency.name, wrap_body(&dependency.body)));
    }

    let known: HashSet<&str> = ctes.iter().map(|cte| cte.name.as_str()).collect();
    let body = rewrite_references(&consumer.body, &known).ok_or_else(|| Malformed::MissingFrom {
        view: consumer.name.clone(),
    })?;

    tracing::debug!(
        view = consumer.name.as_str(),
        dependencies = dependencies.len(),
        ctes = ctes.len(),
        "inlined dependencies"
    );

    Ok(ViewDefinition {
        name: consumer.name.clone(),
        preamble: consumer.preamble.clone(),
        header: consumer.header.clone(),
        ctes,
        body,
    })
}

/// Parenthesize a dependency body, dropping its trailing semicolon
fn wrap_body(body: &str) -> String {
    let query = body.trim_end().trim_end_matches(';').trim_end();
    format!("(\n{}\n)", query)
}

/// Qualified references from the first `FROM` onward, with spans relative to `body`
///
/// Returns `None` when the body has no `FROM` keyword in plain code.
pub(crate) fn rewritable_references(body: &str) -> Option<Vec<QualifiedRef<'_>>> {
    let from = find_keyword(body, "FROM")?;

    let refs = qualified_references(&body[from..])
        .into_iter()
        .map(|r| QualifiedRef {
            span: r.span.start + from..r.span.end + from,
            ..r
        })
        .collect();

    Some(refs)
}

/// Replace `[qualifier].name` with `name` for every known name after `FROM`
fn rewrite_references(body: &str, known: &HashSet<&str>) -> Option<String> {
    let refs = rewritable_references(body)?;

    let mut rewritten = String::with_capacity(body.len());
    let mut copied = 0;

    for r in refs.iter().filter(|r| known.contains(r.name)) {
        rewritten.push_str(&body[copied..r.span.start]);
        rewritten.push_str(r.name);
        copied = r.span.end;
    }

    rewritten.push_str(&body[copied..]);
    Some(rewritten)
}
