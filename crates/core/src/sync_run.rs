use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::SyncRunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Node,
    ExtClient,
    Dns,
    Host,
    Acl,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        Self::Network,
        Self::Node,
        Self::ExtClient,
        Self::Dns,
        Self::Host,
        Self::Acl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Node => "node",
            Self::ExtClient => "ext_client",
            Self::Dns => "dns",
            Self::Host => "host",
            Self::Acl => "acl",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "network" => Ok(Self::Network),
            "node" => Ok(Self::Node),
            "ext_client" => Ok(Self::ExtClient),
            "dns" => Ok(Self::Dns),
            "host" => Ok(Self::Host),
            "acl" => Ok(Self::Acl),
            _ => Err(CoreError::UnknownResourceKind(s.to_string())),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(CoreError::UnknownSyncStatus(s.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run tallies of what the upsert engine did with each fetched item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl RunCounts {
    pub fn written(&self) -> u32 {
        self.created + self.updated
    }

    pub fn absorb(&mut self, other: RunCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// One row of the sync run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub run_id: SyncRunId,
    pub resource_kind: ResourceKind,
    /// Network the run was scoped to, for network-scoped kinds.
    pub scope: Option<String>,
    pub status: SyncStatus,
    pub message: Option<String>,
    pub counts: RunCounts,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_string_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(ResourceKind::parse("gateway").is_err());
    }

    #[test]
    fn sync_status_terminality() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert_eq!(SyncStatus::parse("failed").unwrap(), SyncStatus::Failed);
        assert!(SyncStatus::parse("running").is_err());
    }

    #[test]
    fn counts_absorb_sums_each_field() {
        let mut a = RunCounts {
            created: 1,
            updated: 2,
            unchanged: 3,
            failed: 0,
        };
        a.absorb(RunCounts {
            created: 0,
            updated: 1,
            unchanged: 0,
            failed: 2,
        });
        assert_eq!(
            a,
            RunCounts {
                created: 1,
                updated: 3,
                unchanged: 3,
                failed: 2,
            }
        );
        assert_eq!(a.written(), 4);
    }
}
