//! Built-in widget definitions
//!
//! The stock palette: charts, a gauge, a switch, a text card and a video
//! panel. Each carries a parameterized default template; chart and gauge
//! types declare their metric selector as a data-binding parameter.

use crate::catalog::{WidgetCategory, WidgetDefinition};
use card_config::{PropertyPath, WidgetConfiguration};
use card_store::{ConfigTemplate, TemplateParameter};
use serde_json::json;
use std::str::FromStr;

fn path(p: &str) -> PropertyPath {
    PropertyPath::from_str(p).expect("builtin path is valid")
}

/// Every built-in definition
#[must_use]
pub fn all() -> Vec<WidgetDefinition> {
    vec![
        line_chart(),
        bar_chart(),
        gauge(),
        toggle_switch(),
        text_card(),
        video_player(),
    ]
}

fn chart_template(type_id: &str, name: &str, description: &str, extra: &[(&str, serde_json::Value)]) -> ConfigTemplate {
    let mut document = WidgetConfiguration::empty();
    document.component.set("showLegend", json!(true));
    document.component.set("timeRange", json!("1h"));
    for (key, value) in extra {
        document.component.set(*key, value.clone());
    }
    ConfigTemplate {
        id: type_id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        parameters: vec![
            TemplateParameter::optional("title", path("base.title"), json!(name)),
            TemplateParameter::optional("deviceId", path("base.deviceId"), json!(null)),
            TemplateParameter::optional("metricsList", path("base.metricsList"), json!([])),
        ],
        document,
    }
}

fn device_bindings() -> Vec<PropertyPath> {
    vec![path("base.deviceId"), path("base.metricsList")]
}

fn line_chart() -> WidgetDefinition {
    WidgetDefinition {
        type_id: "line-chart".to_string(),
        name: "Line chart".to_string(),
        category: WidgetCategory::Chart,
        template: chart_template(
            "line-chart",
            "Line chart",
            "Telemetry over time",
            &[("smooth", json!(true))],
        ),
        binding_params: device_bindings(),
    }
}

fn bar_chart() -> WidgetDefinition {
    WidgetDefinition {
        type_id: "bar-chart".to_string(),
        name: "Bar chart".to_string(),
        category: WidgetCategory::Chart,
        template: chart_template(
            "bar-chart",
            "Bar chart",
            "Aggregated telemetry by bucket",
            &[("stacked", json!(false))],
        ),
        binding_params: device_bindings(),
    }
}

fn gauge() -> WidgetDefinition {
    let mut document = WidgetConfiguration::empty();
    document.component.set("min", json!(0));
    document.component.set("max", json!(100));
    document.component.set("unit", json!(""));
    WidgetDefinition {
        type_id: "gauge".to_string(),
        name: "Gauge".to_string(),
        category: WidgetCategory::Chart,
        template: ConfigTemplate {
            id: "gauge".to_string(),
            name: "Gauge".to_string(),
            description: "Single-metric dial".to_string(),
            parameters: vec![
                TemplateParameter::optional("title", path("base.title"), json!("Gauge")),
                TemplateParameter::optional("deviceId", path("base.deviceId"), json!(null)),
                TemplateParameter::optional("max", path("component.max"), json!(100)),
                TemplateParameter::optional("unit", path("component.unit"), json!("")),
            ],
            document,
        },
        binding_params: device_bindings(),
    }
}

fn toggle_switch() -> WidgetDefinition {
    let mut document = WidgetConfiguration::empty();
    document.component.set("onLabel", json!("On"));
    document.component.set("offLabel", json!("Off"));
    document.component.set("state", json!(false));
    WidgetDefinition {
        type_id: "toggle-switch".to_string(),
        name: "Toggle switch".to_string(),
        category: WidgetCategory::Control,
        template: ConfigTemplate {
            id: "toggle-switch".to_string(),
            name: "Toggle switch".to_string(),
            description: "Two-state actuator control".to_string(),
            parameters: vec![
                TemplateParameter::optional("title", path("base.title"), json!("Switch")),
                TemplateParameter::optional("deviceId", path("base.deviceId"), json!(null)),
            ],
            document,
        },
        binding_params: device_bindings(),
    }
}

fn text_card() -> WidgetDefinition {
    let mut document = WidgetConfiguration::empty();
    document.component.set("content", json!(""));
    document.component.set("fontSize", json!(14));
    WidgetDefinition {
        type_id: "text-card".to_string(),
        name: "Text".to_string(),
        category: WidgetCategory::Information,
        template: ConfigTemplate {
            id: "text-card".to_string(),
            name: "Text".to_string(),
            description: "Static or data-bound text".to_string(),
            parameters: vec![
                TemplateParameter::optional("title", path("base.title"), json!(null)),
                TemplateParameter::optional("content", path("component.content"), json!("")),
            ],
            document,
        },
        binding_params: Vec::new(),
    }
}

fn video_player() -> WidgetDefinition {
    let mut document = WidgetConfiguration::empty();
    document.component.set("src", json!(""));
    document.component.set("autoplay", json!(false));
    WidgetDefinition {
        type_id: "video-player".to_string(),
        name: "Video".to_string(),
        category: WidgetCategory::Media,
        template: ConfigTemplate {
            id: "video-player".to_string(),
            name: "Video".to_string(),
            description: "Camera or stream panel".to_string(),
            parameters: vec![
                TemplateParameter::optional("title", path("base.title"), json!(null)),
                TemplateParameter::required("src", path("component.src")),
            ],
            document,
        },
        binding_params: Vec::new(),
    }
}
