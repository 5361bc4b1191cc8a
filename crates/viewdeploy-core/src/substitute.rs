//! Schema placeholder substitution
//!
//! SQL files refer to schemas through placeholders such as `[warehouse]`.
//! Before deployment every placeholder is replaced, in a single pass, with
//! the schema name configured for the target environment.

use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::config::{Config, ConfigError, Environment};

/// Single-pass replacement of `[schema]` placeholders
#[derive(Debug, Clone)]
pub struct SchemaSubstitution {
    replacements: BTreeMap<String, String>,
    pattern: Option<Regex>,
}

impl SchemaSubstitution {
    /// Build a substitution from placeholder name -> schema name
    ///
    /// Keys are bare schema names; the matched tokens are `[key]`.
    pub fn new(schemas: BTreeMap<String, String>) -> Self {
        let replacements: BTreeMap<String, String> = schemas
            .into_iter()
            .map(|(placeholder, schema)| (format!("[{}]", placeholder), schema))
            .collect();

        let mut tokens: Vec<&str> = replacements.keys().map(String::as_str).collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let alternation = tokens
            .iter()
            .map(|token| regex::escape(token))
            .collect::<Vec<_>>()
            .join("|");

        // Escaped literals joined by `|` always form a valid pattern
        let pattern = if tokens.is_empty() {
            None
        } else {
            Regex::new(&alternation).ok()
        };

        Self { replacements, pattern }
    }

    /// Build the substitution for one environment of a config
    ///
    /// Every schema listed in the config must be mapped by the environment.
    pub fn for_environment(config: &Config, env: Environment) -> Result<Self, ConfigError> {
        let settings = config.environment(env)?;

        let schemas = config
            .schemas
            .iter()
            .map(|schema| {
                settings
                    .schema(schema)
                    .map(|name| (schema.clone(), name.to_string()))
                    .ok_or_else(|| ConfigError::MissingSchema {
                        environment: env.as_str().to_string(),
                        schema: schema.clone(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        tracing::debug!(environment = env.as_str(), schemas = schemas.len(), "built schema substitution");
        Ok(Self::new(schemas))
    }

    /// Replace every known placeholder in `text`
    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &Captures| {
                    self.replacements.get(&caps[0]).cloned().unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    /// Placeholder tokens this substitution replaces, e.g. `[reporting]`
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.replacements.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitution(pairs: &[(&str, &str)]) -> SchemaSubstitution {
        SchemaSubstitution::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn replaces_placeholders() {
        let sub = substitution(&[("reporting", "rep_uat"), ("warehouse", "wh_uat")]);
        let sql = "CREATE VIEW [reporting].v AS SELECT * FROM [warehouse].t JOIN [warehouse].u";

        assert_eq!(
            sub.apply(sql),
            "CREATE VIEW rep_uat.v AS SELECT * FROM wh_uat.t JOIN wh_uat.u"
        );
    }

    #[test]
    fn single_pass() {
        // A replacement that looks like a placeholder is not replaced again
        let sub = substitution(&[("a", "[b]"), ("b", "x")]);
        assert_eq!(sub.apply("[a].t [b].t"), "[b].t x.t");
    }

    #[test]
    fn unknown_placeholders_untouched() {
        let sub = substitution(&[("events", "ev")]);
        assert_eq!(sub.apply("[other].t [events].e"), "[other].t ev.e");
    }

    #[test]
    fn empty_map_is_identity() {
        let sub = substitution(&[]);
        assert_eq!(sub.apply("[reporting].v"), "[reporting].v");
        assert_eq!(sub.tokens().count(), 0);
    }

    #[test]
    fn for_environment_requires_every_schema() {
        let config = Config::from_toml(
            "schemas = [\"reporting\", \"events\"]\n[environments.uat]\nreporting = \"r\"\n",
        )
        .unwrap();

        let err = SchemaSubstitution::for_environment(&config, Environment::Uat).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSchema { ref schema, .. } if schema == "events"));
    }

    #[test]
    fn for_environment_builds_tokens() {
        let config = Config::from_toml(
            "[environments.local]\nreporting = \"r\"\nwarehouse = \"w\"\nevents = \"e\"\nextra = \"ignored\"\n",
        )
        .unwrap();

        let sub = SchemaSubstitution::for_environment(&config, Environment::Local).unwrap();
        assert_eq!(sub.tokens().collect::<Vec<_>>(), ["[events]", "[reporting]", "[warehouse]"]);
        assert_eq!(sub.apply("[extra].t"), "[extra].t");
    }
}
