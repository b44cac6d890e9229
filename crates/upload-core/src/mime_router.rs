//! Mime routing: decides which adapter and display template handle a MIME type.
//!
//! The routing table is ordered. Resolution returns the first rule whose
//! pattern matches the whole MIME string, so specific patterns must come
//! before catch-alls such as `^image\/.*` or `.*`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_TEMPLATE;
use crate::error::{ConfigError, UploadError};

/// Target of a routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeRoute {
    pub adapter: String,
    pub template: String,
}

impl MimeRoute {
    pub fn new(adapter: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            template: template.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct RoutingRule {
    pattern: String,
    regex: Regex,
    route: MimeRoute,
}

/// Ordered pattern → route mapping.
#[derive(Debug, Clone, Default)]
pub struct MimeRoutingTable {
    rules: Vec<RoutingRule>,
}

impl MimeRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. The pattern is anchored against the full MIME string.
    pub fn push(&mut self, pattern: &str, route: MimeRoute) -> Result<(), ConfigError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.rules.push(RoutingRule {
            pattern: pattern.to_string(),
            regex,
            route,
        });
        Ok(())
    }

    pub fn with_route(
        mut self,
        pattern: &str,
        adapter: &str,
        template: &str,
    ) -> Result<Self, ConfigError> {
        self.push(pattern, MimeRoute::new(adapter, template))?;
        Ok(self)
    }

    /// Parse the stored JSON form: an object whose key order is the rule order.
    ///
    /// Values are either `{"adapter": "...", "template": "..."}` or a bare
    /// adapter name, in which case the template defaults to `file`.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: "mimeTypes".to_string(),
            reason,
        };

        let entries: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

        let mut table = Self::new();
        for (pattern, value) in entries {
            let route = match value {
                Value::String(adapter) => MimeRoute::new(adapter, DEFAULT_TEMPLATE),
                Value::Object(fields) => {
                    let adapter = fields
                        .get("adapter")
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid(format!("rule '{}' has no adapter", pattern)))?;
                    let template = fields
                        .get("template")
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_TEMPLATE);
                    MimeRoute::new(adapter, template)
                }
                other => {
                    return Err(invalid(format!(
                        "rule '{}' must be an object or a string, got {}",
                        pattern, other
                    )))
                }
            };
            table.push(&pattern, route)?;
        }

        Ok(table)
    }

    /// Table used when no routing has been configured: images go to local storage.
    pub fn default_for(adapter: &str) -> Result<Self, ConfigError> {
        Self::new().with_route(r"^image\/.*", adapter, "image-preview")
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }

    /// First route whose pattern matches `mime_type`, in table order.
    pub fn resolve(&self, mime_type: &str) -> Result<&MimeRoute, UploadError> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(mime_type))
            .map(|rule| {
                tracing::debug!(
                    mime_type = %mime_type,
                    pattern = %rule.pattern,
                    adapter = %rule.route.adapter,
                    "Resolved mime route"
                );
                &rule.route
            })
            .ok_or_else(|| UploadError::NoAdapterForMime(mime_type.to_string()))
    }
}
