use serde::Serialize;

use crate::ir::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Completed,
    NoChanges,
    Failed,
    /// Another run was already in flight.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: RunStatus,
    pub edges_added: usize,
    pub crossings_before: usize,
    pub crossings_after: usize,
    pub crossings_removed: usize,
    pub moved_nodes: usize,
    pub relayout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn with_status(status: RunStatus) -> Self {
        Self {
            status,
            edges_added: 0,
            crossings_before: 0,
            crossings_after: 0,
            crossings_removed: 0,
            moved_nodes: 0,
            relayout: false,
            error: None,
        }
    }

    pub fn summary(&self) -> String {
        match self.status {
            RunStatus::Busy => "Smart Connect is already running".to_string(),
            RunStatus::NoChanges => "Layout already optimal, nothing to change".to_string(),
            RunStatus::Failed => format!(
                "Smart Connect failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            RunStatus::Completed => {
                let mut parts = Vec::new();
                if self.edges_added > 0 {
                    parts.push(format!("added {} connection(s)", self.edges_added));
                }
                if self.crossings_removed > 0 {
                    parts.push(format!("removed {} crossing(s)", self.crossings_removed));
                }
                if self.moved_nodes > 0 {
                    parts.push(format!("rearranged {} module(s)", self.moved_nodes));
                }
                format!("Smart Connect {}", parts.join(", "))
            }
        }
    }
}

/// Presentation hooks published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ComposerEvent {
    RunStarted,
    LayoutApplied { nodes: usize, pass: usize },
    EdgeCreated { edge: Edge },
    RunFinished { report: RunReport },
    HistoryRestored { index: usize, label: String },
    Notification { level: NotificationLevel, message: String },
}
