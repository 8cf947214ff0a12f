use serde::{Deserialize, Serialize};

/// Label list visibility that keeps a label shown in the sidebar
pub const LABEL_LIST_SHOW: &str = "labelShow";

/// Message list visibility that keeps a label shown on messages
pub const MESSAGE_LIST_SHOW: &str = "show";

/// Text color applied to every label this tool creates
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

/// A label that configuration wants to exist in the mailbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelDefinition {
    pub name: String,
    /// Hex background color, e.g. `#ff0000`
    pub color: String,
}

impl LabelDefinition {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Background/text color pair as understood by the label API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelColorSpec {
    pub background_color: String,
    pub text_color: String,
}

/// A label as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteLabel {
    pub id: String,
    pub name: String,
    pub color: Option<LabelColorSpec>,
    pub label_list_visibility: Option<String>,
    pub message_list_visibility: Option<String>,
}

/// Create request for a label that does not exist yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewLabel {
    pub name: String,
    pub label_list_visibility: String,
    pub message_list_visibility: String,
    pub color: LabelColorSpec,
}

impl NewLabel {
    /// Always-shown label with the definition's background and black text
    pub fn from_definition(definition: &LabelDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            label_list_visibility: LABEL_LIST_SHOW.to_string(),
            message_list_visibility: MESSAGE_LIST_SHOW.to_string(),
            color: LabelColorSpec {
                background_color: definition.color.clone(),
                text_color: DEFAULT_TEXT_COLOR.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedLabel {
    pub name: String,
    pub id: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub created: Vec<CreatedLabel>,
    /// Names that already existed remotely
    pub skipped: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.skipped.is_empty()
    }

    pub fn created_names(&self) -> Vec<&str> {
        self.created.iter().map(|c| c.name.as_str()).collect()
    }
}
