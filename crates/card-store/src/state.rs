//! Per-component configuration state
//!
//! Wraps a [`WidgetConfiguration`] with its current version, a bounded
//! version-history ring and the in-memory snapshots that back rollback.

use card_config::{ChangeSource, ConfigHash, ConfigSection, WidgetConfiguration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of retained historic versions
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// One entry in a component's version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersion {
    /// Monotonically increasing version number (starts at 1)
    pub version: u64,
    /// Content hash of the configuration at this version
    pub hash: ConfigHash,
    /// When the version was recorded
    pub timestamp: DateTime<Utc>,
    /// Who initiated the write
    pub source: ChangeSource,
    /// The section that changed, when the write was a section update
    pub change_type: Option<ConfigSection>,
}

/// Versioned state of one component's configuration
///
/// # Invariants
/// - `current.version` strictly increases across [`record`](Self::record)
/// - a snapshot exists for the current version and every version still in
///   the history ring
#[derive(Debug)]
pub struct ConfigurationState {
    configuration: WidgetConfiguration,
    current: ConfigVersion,
    history: VecDeque<ConfigVersion>,
    snapshots: HashMap<u64, WidgetConfiguration>,
    history_cap: usize,
    dirty: bool,
}

impl ConfigurationState {
    /// Create initial state at version 1
    #[must_use]
    pub fn new(
        configuration: WidgetConfiguration,
        source: ChangeSource,
        history_cap: usize,
    ) -> Self {
        let current = ConfigVersion {
            version: 1,
            hash: configuration.content_hash(),
            timestamp: Utc::now(),
            source,
            change_type: None,
        };
        let mut snapshots = HashMap::new();
        snapshots.insert(1, configuration.clone());
        Self {
            configuration,
            current,
            history: VecDeque::new(),
            snapshots,
            history_cap,
            dirty: false,
        }
    }

    /// The live configuration (callers outside the store get deep copies)
    #[inline]
    #[must_use]
    pub fn configuration(&self) -> &WidgetConfiguration {
        &self.configuration
    }

    /// The current version entry
    #[inline]
    #[must_use]
    pub fn current(&self) -> &ConfigVersion {
        &self.current
    }

    /// Current version number
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.version
    }

    /// Current content hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> ConfigHash {
        self.current.hash
    }

    /// Record a new configuration as the next version
    ///
    /// The previous version moves into the bounded history ring; its
    /// snapshot is kept until the ring evicts it.
    pub fn record(
        &mut self,
        configuration: WidgetConfiguration,
        source: ChangeSource,
        change_type: Option<ConfigSection>,
    ) -> &ConfigVersion {
        self.history.push_back(self.current.clone());
        if self.history.len() > self.history_cap {
            if let Some(evicted) = self.history.pop_front() {
                self.snapshots.remove(&evicted.version);
            }
        }

        let next = ConfigVersion {
            version: self.current.version + 1,
            hash: configuration.content_hash(),
            timestamp: Utc::now(),
            source,
            change_type,
        };
        self.snapshots.insert(next.version, configuration.clone());
        self.configuration = configuration;
        self.current = next;
        self.dirty = true;
        &self.current
    }

    /// Version history, oldest first, ending with the current version
    #[must_use]
    pub fn versions(&self) -> Vec<ConfigVersion> {
        let mut out: Vec<ConfigVersion> = self.history.iter().cloned().collect();
        out.push(self.current.clone());
        out
    }

    /// The configuration snapshot recorded at `version`, if still retained
    #[must_use]
    pub fn snapshot(&self, version: u64) -> Option<&WidgetConfiguration> {
        self.snapshots.get(&version)
    }

    /// Whether the state changed since the last [`mark_clean`](Self::mark_clean)
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag (e.g. after the owning dashboard was saved)
    #[inline]
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
