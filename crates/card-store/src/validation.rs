//! Configuration validation rule engine
//!
//! Structural checks plus a registrable, priority-ordered rule set.
//! Validation always produces a structured [`ValidationReport`] — it never
//! panics and never throws; callers decide whether errors block.

use card_config::{DataSourceConfig, WidgetConfiguration};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Issue severity
///
/// `Error` blocks persistence (unless validation is skipped); `Warning`
/// never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// Blocks persistence
    Error,
    /// Surfaced inline, never blocks
    Warning,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Dotted field path the issue is anchored at
    pub path: String,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Name of the rule that produced the issue
    pub rule: String,
}

/// Aggregated validation outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// All findings, in rule-priority order
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether no error-severity issues were found
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    /// Error-severity findings
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    /// Warning-severity findings
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return f.write_str("valid");
        }
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        write!(f, "{errors} error(s), {warnings} warning(s)")
    }
}

/// Context a validation run happens in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationContext {
    /// Widget type tag from the catalog, when known
    pub component_type: Option<String>,
    /// Free-form context passed through to custom rules
    pub extra: Map<String, Value>,
}

/// A registrable validation rule
pub trait ValidationRule: Send + Sync {
    /// Stable rule name (used in findings and for deregistration)
    fn name(&self) -> &str;

    /// Execution priority; lower runs first
    fn priority(&self) -> i32 {
        100
    }

    /// Produce findings for a configuration
    fn validate(
        &self,
        config: &WidgetConfiguration,
        context: &ValidationContext,
    ) -> Vec<ValidationIssue>;
}

/// Priority-ordered rule registry
pub struct RuleSet {
    rules: RwLock<Vec<Arc<dyn ValidationRule>>>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .rules
            .read()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        f.debug_struct("RuleSet").field("rules", &names).finish()
    }
}

impl RuleSet {
    /// Empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Rule set with the built-in structural rules
    #[must_use]
    pub fn with_defaults() -> Self {
        let set = Self::new();
        set.register(Arc::new(BaseStyleRule));
        set.register(Arc::new(DataSourceRule));
        set.register(Arc::new(InteractionRule));
        set
    }

    /// Register a rule, keeping priority order
    pub fn register(&self, rule: Arc<dyn ValidationRule>) {
        let mut rules = self.rules.write();
        rules.push(rule);
        rules.sort_by_key(|r| r.priority());
    }

    /// Remove a rule by name; returns whether it existed
    pub fn deregister(&self, name: &str) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.name() != name);
        rules.len() != before
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Run every rule against a configuration
    #[must_use]
    pub fn run(
        &self,
        config: &WidgetConfiguration,
        context: &ValidationContext,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in self.rules.read().iter() {
            report.issues.extend(rule.validate(config, context));
        }
        report
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Built-in checks on the base layer's style fields
struct BaseStyleRule;

impl ValidationRule for BaseStyleRule {
    fn name(&self) -> &str {
        "base-style"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn validate(
        &self,
        config: &WidgetConfiguration,
        _context: &ValidationContext,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !(0.0..=1.0).contains(&config.base.opacity) {
            issues.push(ValidationIssue {
                path: "base.opacity".to_string(),
                message: format!("opacity {} outside [0, 1]", config.base.opacity),
                severity: Severity::Error,
                rule: self.name().to_string(),
            });
        }

        if let Some(width) = config.base.border_width {
            if width < 0.0 {
                issues.push(ValidationIssue {
                    path: "base.borderWidth".to_string(),
                    message: format!("negative border width {width}"),
                    severity: Severity::Error,
                    rule: self.name().to_string(),
                });
            }
        }

        if config.base.device_id.is_some() && config.base.metrics_list.is_empty() {
            issues.push(ValidationIssue {
                path: "base.metricsList".to_string(),
                message: "device bound but no metrics selected".to_string(),
                severity: Severity::Warning,
                rule: self.name().to_string(),
            });
        }

        issues
    }
}

/// Built-in checks on the data-source layer
struct DataSourceRule;

impl DataSourceRule {
    fn check(source: &DataSourceConfig, path: &str, issues: &mut Vec<ValidationIssue>) {
        match source {
            DataSourceConfig::Api {
                url,
                refresh_interval_ms,
                ..
            } => {
                if url.trim().is_empty() {
                    issues.push(ValidationIssue {
                        path: format!("{path}.url"),
                        message: "api source requires a url".to_string(),
                        severity: Severity::Error,
                        rule: "data-source".to_string(),
                    });
                }
                if let Some(interval) = refresh_interval_ms {
                    if *interval < 500 {
                        issues.push(ValidationIssue {
                            path: format!("{path}.refreshIntervalMs"),
                            message: format!("refresh interval {interval}ms is aggressive"),
                            severity: Severity::Warning,
                            rule: "data-source".to_string(),
                        });
                    }
                }
            }
            DataSourceConfig::Websocket { url, .. } => {
                if url.trim().is_empty() {
                    issues.push(ValidationIssue {
                        path: format!("{path}.url"),
                        message: "websocket source requires a url".to_string(),
                        severity: Severity::Error,
                        rule: "data-source".to_string(),
                    });
                }
            }
            DataSourceConfig::MultiSource { sources } => {
                if sources.is_empty() {
                    issues.push(ValidationIssue {
                        path: format!("{path}.sources"),
                        message: "multi-source with no sources".to_string(),
                        severity: Severity::Warning,
                        rule: "data-source".to_string(),
                    });
                }
                for (i, inner) in sources.iter().enumerate() {
                    Self::check(inner, &format!("{path}.sources.{i}"), issues);
                }
            }
            _ => {}
        }
    }
}

impl ValidationRule for DataSourceRule {
    fn name(&self) -> &str {
        "data-source"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn validate(
        &self,
        config: &WidgetConfiguration,
        _context: &ValidationContext,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        Self::check(&config.data_source, "dataSource", &mut issues);
        issues
    }
}

/// Built-in checks on interaction rules
struct InteractionRule;

impl ValidationRule for InteractionRule {
    fn name(&self) -> &str {
        "interaction"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn validate(
        &self,
        config: &WidgetConfiguration,
        _context: &ValidationContext,
    ) -> Vec<ValidationIssue> {
        config
            .interaction
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| {
                rule.well_formed().err().map(|defect| ValidationIssue {
                    path: format!("interaction.{i}"),
                    message: defect.to_string(),
                    severity: Severity::Error,
                    rule: self.name().to_string(),
                })
            })
            .collect()
    }
}
