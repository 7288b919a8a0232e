//! Per-application flow documents.

use crate::errors::Result;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Open and close step lists for one application.
///
/// Steps stay as raw JSON until a flow runs, so one malformed step does not
/// make the rest of the document unreadable or uneditable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub open: Vec<Value>,
    #[serde(default)]
    pub close: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl FlowConfig {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Default::default()
        }
    }

    pub fn open_steps(&self) -> Result<Vec<Step>> {
        Step::parse_all(&self.open)
    }

    pub fn close_steps(&self) -> Result<Vec<Step>> {
        Step::parse_all(&self.close)
    }

    pub fn raw_steps(&self, action: FlowAction) -> &[Value] {
        match action {
            FlowAction::Open => &self.open,
            FlowAction::Close => &self.close,
        }
    }

    pub fn steps(&self, action: FlowAction) -> Result<Vec<Step>> {
        match action {
            FlowAction::Open => self.open_steps(),
            FlowAction::Close => self.close_steps(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Open,
    Close,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowAction::Open => "open",
            FlowAction::Close => "close",
        })
    }
}

impl std::str::FromStr for FlowAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(FlowAction::Open),
            "close" => Ok(FlowAction::Close),
            other => Err(format!("unknown flow action: {other}")),
        }
    }
}
