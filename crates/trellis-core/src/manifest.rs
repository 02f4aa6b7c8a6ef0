use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log level vocabulary the widget server may hand down in its manifest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl LogLevel {
    /// Directive understood by the tracing env filter.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::None => "off",
        }
    }
}

/// The JSON document returned by `GET /api/widgets`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidgetManifest {
    pub session_id: String,
    #[serde(
        default,
        rename = "logLevel",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub widgets: HashMap<String, WidgetConfig>,
}

/// Per-widget entry in the manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(rename = "moduleUrl")]
    pub module_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default)]
    pub defaults: HashMap<String, Value>,
}
