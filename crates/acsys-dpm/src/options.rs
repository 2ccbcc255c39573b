use std::time::Duration;

/// Task name of the list service.
pub const DPM_TASK: &str = "DPMJ";

/// Discovery destination answered by every available list service.
pub const DISCOVERY_DESTINATION: &str = "DPMJ@MCAST";

/// How list data is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Reading the list waits for data.
    #[default]
    Blocking,
    /// Reading the list returns what has already arrived.
    Polling,
}

/// Request timeouts handed to the list service, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTimeouts {
    /// Request/reply exchanges (discovery, list management, settings).
    pub rpc_ms: u32,
    /// The open-list request that carries the list's data stream.
    pub open_ms: u32,
}

impl Default for ListTimeouts {
    fn default() -> Self {
        Self {
            rpc_ms: 500,
            open_ms: 6000,
        }
    }
}

/// Configuration for a list session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Service to use: `TASK@NODE`, a bare node (task `DPMJ`), or `None` to
    /// discover one.
    pub target: Option<String>,
    pub mode: Mode,
    /// Pause between discovery attempts.
    pub discovery_interval: Duration,
    pub timeouts: ListTimeouts,
    /// Realm a credential must belong to before settings are sent.
    pub settings_realm: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            target: None,
            mode: Mode::default(),
            discovery_interval: Duration::from_secs(5),
            timeouts: ListTimeouts::default(),
            settings_realm: "FNAL.GOV".to_string(),
        }
    }
}

impl ListOptions {
    /// Options for an explicit service.
    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn polling(mut self) -> Self {
        self.mode = Mode::Polling;
        self
    }

    /// Destination for an explicit target, if one is set.
    pub fn target_task(&self) -> Option<String> {
        self.target.as_deref().map(task_for)
    }
}

/// Destination of the list service on `node` (or `node` itself if it
/// already names a task).
pub fn task_for(node: &str) -> String {
    if node.contains('@') {
        node.to_string()
    } else {
        format!("{DPM_TASK}@{node}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ListOptions::default();
        assert_eq!(options.target_task(), None);
        assert_eq!(options.mode, Mode::Blocking);
        assert_eq!(options.discovery_interval, Duration::from_secs(5));
        assert_eq!(options.timeouts.rpc_ms, 500);
        assert_eq!(options.timeouts.open_ms, 6000);
        assert_eq!(options.settings_realm, "FNAL.GOV");
    }

    #[test]
    fn explicit_targets() {
        assert_eq!(
            ListOptions::with_target("DPM05").target_task().as_deref(),
            Some("DPMJ@DPM05")
        );
        assert_eq!(
            ListOptions::with_target("MYDPM@DPM05").target_task().as_deref(),
            Some("MYDPM@DPM05")
        );
        assert_eq!(ListOptions::with_target("X").polling().mode, Mode::Polling);
    }
}
