//! Parameterized configuration templates
//!
//! A template is a named default [`WidgetConfiguration`] with a declared
//! parameter list; instantiation substitutes parameter values into the
//! document by dotted path. The widget catalog registers one template per
//! widget type; users may register their own.

use card_config::{DocumentError, PathError, PropertyPath, WidgetConfiguration};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One declared template parameter
#[derive(Debug, Clone)]
pub struct TemplateParameter {
    /// Parameter name, as supplied by callers
    pub name: String,
    /// Where the value lands in the document
    pub path: PropertyPath,
    /// Fallback when the caller omits the parameter
    pub default_value: Option<Value>,
    /// Whether omission (with no default) fails instantiation
    pub required: bool,
}

impl TemplateParameter {
    /// Convenience constructor for an optional parameter with a default
    #[must_use]
    pub fn optional(name: impl Into<String>, path: PropertyPath, default_value: Value) -> Self {
        Self {
            name: name.into(),
            path,
            default_value: Some(default_value),
            required: false,
        }
    }

    /// Convenience constructor for a required parameter
    #[must_use]
    pub fn required(name: impl Into<String>, path: PropertyPath) -> Self {
        Self {
            name: name.into(),
            path,
            default_value: None,
            required: true,
        }
    }
}

/// A named, parameterized default configuration
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    /// Stable template identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// One-line description
    pub description: String,
    /// Declared parameters
    pub parameters: Vec<TemplateParameter>,
    /// The default document parameters are substituted into
    pub document: WidgetConfiguration,
}

impl ConfigTemplate {
    /// Substitute parameter values into the template document
    ///
    /// Unknown entries in `params` are ignored; declared parameters use the
    /// supplied value, then their default, and a required parameter with
    /// neither fails.
    ///
    /// # Errors
    /// Returns error on a missing required parameter, an unassignable
    /// path, or a substituted document that no longer deserializes.
    pub fn instantiate(
        &self,
        params: &Map<String, Value>,
    ) -> Result<WidgetConfiguration, TemplateError> {
        let mut document = self.document.to_value()?;

        for parameter in &self.parameters {
            let value = params
                .get(&parameter.name)
                .cloned()
                .or_else(|| parameter.default_value.clone());

            match value {
                Some(value) => parameter.path.assign(&mut document, value)?,
                None if parameter.required => {
                    return Err(TemplateError::MissingParameter {
                        template: self.id.clone(),
                        name: parameter.name.clone(),
                    });
                }
                None => {}
            }
        }

        Ok(WidgetConfiguration::from_value(document)?)
    }
}

/// Registry of templates by id
#[derive(Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, Arc<ConfigTemplate>>>,
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl TemplateRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a template
    pub fn register(&self, template: ConfigTemplate) {
        self.templates
            .write()
            .insert(template.id.clone(), Arc::new(template));
    }

    /// Look up a template by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ConfigTemplate>> {
        self.templates.read().get(id).cloned()
    }

    /// Registered template ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.templates.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

/// Errors during template handling
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Required parameter missing and no default declared
    #[error("template '{template}': missing required parameter '{name}'")]
    MissingParameter {
        /// Template id
        template: String,
        /// Parameter name
        name: String,
    },

    /// Unknown template id
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// Parameter path could not be assigned
    #[error("parameter path error: {0}")]
    Path(#[from] PathError),

    /// Substituted document no longer matches the schema
    #[error("template document error: {0}")]
    Document(#[from] DocumentError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn sample_template() -> ConfigTemplate {
        let mut document = WidgetConfiguration::empty();
        document.component.set("showLegend", json!(true));
        ConfigTemplate {
            id: "line-chart".to_string(),
            name: "Line chart".to_string(),
            description: "Telemetry line chart".to_string(),
            parameters: vec![
                TemplateParameter::required(
                    "title",
                    PropertyPath::from_str("base.title").unwrap(),
                ),
                TemplateParameter::optional(
                    "color",
                    PropertyPath::from_str("component.color").unwrap(),
                    json!("#4080ff"),
                ),
            ],
            document,
        }
    }

    #[test]
    fn instantiate_substitutes_params() {
        let template = sample_template();
        let mut params = Map::new();
        params.insert("title".to_string(), json!("Temperature"));
        params.insert("color".to_string(), json!("#ff0000"));

        let config = template.instantiate(&params).unwrap();
        assert_eq!(config.base.title.as_deref(), Some("Temperature"));
        assert_eq!(config.component.get("color"), Some(&json!("#ff0000")));
        // Non-parameterized defaults survive.
        assert_eq!(config.component.get("showLegend"), Some(&json!(true)));
    }

    #[test]
    fn instantiate_uses_defaults() {
        let template = sample_template();
        let mut params = Map::new();
        params.insert("title".to_string(), json!("Humidity"));

        let config = template.instantiate(&params).unwrap();
        assert_eq!(config.component.get("color"), Some(&json!("#4080ff")));
    }

    #[test]
    fn instantiate_missing_required_fails() {
        let template = sample_template();
        let result = template.instantiate(&Map::new());
        assert!(matches!(
            result,
            Err(TemplateError::MissingParameter { ref name, .. }) if name == "title"
        ));
    }

    #[test]
    fn registry_register_and_get() {
        let registry = TemplateRegistry::new();
        registry.register(sample_template());
        assert!(registry.get("line-chart").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.ids(), vec!["line-chart".to_string()]);
    }
}
