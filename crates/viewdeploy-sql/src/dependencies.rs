//! Ordered collection of dependency views available for inlining

use crate::error::Result;
use crate::view::ViewDefinition;

/// Dependency views, in the order they were supplied
///
/// Each inserted view is first expanded against the dependencies already
/// held, so a dependency that reads an earlier one is self-contained.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    views: Vec<ViewDefinition>,
}

impl DependencySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, replacing any held view with the same name
    pub fn insert(&mut self, view: ViewDefinition) -> Result<()> {
        let expanded = self.inline_into(&view)?;

        match self.views.iter_mut().find(|held| held.name == expanded.name) {
            Some(slot) => {
                tracing::warn!(view = expanded.name.as_str(), "replacing dependency with the same name");
                *slot = expanded;
            }
            None => self.views.push(expanded),
        }

        Ok(())
    }

    /// Held dependencies that `consumer` references, in insertion order
    pub fn referenced_by(&self, consumer: &ViewDefinition) -> Vec<&ViewDefinition> {
        self.views
            .iter()
            .filter(|dep| dep.name != consumer.name && consumer.references(&dep.name))
            .collect()
    }

    /// Inline the dependencies `consumer` references
    ///
    /// A consumer referencing none of them is returned unchanged.
    pub fn inline_into(&self, consumer: &ViewDefinition) -> Result<ViewDefinition> {
        let used: Vec<ViewDefinition> = self.referenced_by(consumer).into_iter().cloned().collect();

        if used.is_empty() {
            return Ok(consumer.clone());
        }

        consumer.inline(&used)
    }

    /// Look up a dependency by view name
    pub fn get(&self, name: &str) -> Option<&ViewDefinition> {
        self.views.iter().find(|view| view.name == name)
    }

    /// Iterate over held dependencies
    pub fn iter(&self) -> impl Iterator<Item = &ViewDefinition> {
        self.views.iter()
    }

    /// Number of held dependencies
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(sql: &str) -> ViewDefinition {
        ViewDefinition::parse(sql).unwrap()
    }

    #[test]
    fn only_referenced_dependencies_are_inlined() {
        let mut deps = DependencySet::new();
        deps.insert(view("CREATE VIEW a AS SELECT 1 FROM t")).unwrap();
        deps.insert(view("CREATE VIEW b AS SELECT 2 FROM t")).unwrap();

        let consumer = view("CREATE VIEW c AS SELECT * FROM [w].b");
        let inlined = deps.inline_into(&consumer).unwrap();

        assert_eq!(inlined.cte_names().collect::<Vec<_>>(), ["b"]);
        assert_eq!(inlined.body, "SELECT * FROM b");
    }

    #[test]
    fn unreferenced_consumer_is_unchanged() {
        let mut deps = DependencySet::new();
        deps.insert(view("CREATE VIEW a AS SELECT 1 FROM t")).unwrap();

        // No FROM at all: nothing to inline, so no error either
        let consumer = view("CREATE VIEW c AS SELECT 1");
        assert_eq!(deps.inline_into(&consumer).unwrap(), consumer);
    }

    #[test]
    fn chained_dependencies_expand_on_insert() {
        let mut deps = DependencySet::new();
        deps.insert(view("CREATE VIEW base AS SELECT id FROM raw")).unwrap();
        deps.insert(view("CREATE VIEW mid AS SELECT id FROM [w].base")).unwrap();

        let mid = deps.get("mid").unwrap();
        assert_eq!(mid.cte_names().collect::<Vec<_>>(), ["base"]);
        assert_eq!(mid.body, "SELECT id FROM base");

        let top = view("CREATE VIEW top AS SELECT id FROM [w].mid");
        let inlined = deps.inline_into(&top).unwrap();
        assert_eq!(inlined.cte_names().collect::<Vec<_>>(), ["base", "mid"]);
    }

    #[test]
    fn same_name_replaces() {
        let mut deps = DependencySet::new();
        deps.insert(view("CREATE VIEW a AS SELECT 1 FROM t")).unwrap();
        deps.insert(view("CREATE VIEW a AS SELECT 2 FROM t")).unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps.get("a").unwrap().body, "SELECT 2 FROM t");
    }

    #[test]
    fn view_does_not_inline_itself() {
        let mut deps = DependencySet::new();
        deps.insert(view("CREATE VIEW a AS SELECT 1 FROM t")).unwrap();

        let again = view("CREATE VIEW a AS SELECT * FROM [w].a");
        assert!(deps.referenced_by(&again).is_empty());
    }
}
