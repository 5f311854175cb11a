// action.rs — The closed action vocabulary.
//
// Every operation the control plane can mediate is one of these variants.
// The enumeration is the stable wire vocabulary: clients send the snake_case
// identifier, and every layer that branches on action identity (validator,
// policy engine, backend adapter) matches exhaustively so that adding a
// variant forces each of them to take a position.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical operation against a Proxmox VE cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Read the current status of a single VM.
    ReadVm,
    /// List cluster resources (VMs and containers).
    ReadInventory,
    /// Read the status of one asynchronous task by UPID.
    ReadTaskStatus,
    /// List recent tasks on a node.
    ReadTasks,
    /// Start a VM.
    StartVm,
    /// Stop a VM.
    StopVm,
    /// Take a snapshot of a VM.
    SnapshotVm,
    /// Clone a VM.
    CloneVm,
    /// Migrate a VM to another node.
    MigrateVm,
    /// Delete a VM.
    DeleteVm,
    /// Arbitrary storage configuration change via the custom-endpoint form.
    StorageEdit,
    /// Arbitrary firewall configuration change via the custom-endpoint form.
    FirewallEdit,
}

impl ActionType {
    /// All variants, in declaration order. Used by table-driven tests.
    pub const ALL: [ActionType; 12] = [
        ActionType::ReadVm,
        ActionType::ReadInventory,
        ActionType::ReadTaskStatus,
        ActionType::ReadTasks,
        ActionType::StartVm,
        ActionType::StopVm,
        ActionType::SnapshotVm,
        ActionType::CloneVm,
        ActionType::MigrateVm,
        ActionType::DeleteVm,
        ActionType::StorageEdit,
        ActionType::FirewallEdit,
    ];

    /// Returns `true` for the read-only actions.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            ActionType::ReadVm
                | ActionType::ReadInventory
                | ActionType::ReadTaskStatus
                | ActionType::ReadTasks
        )
    }

    /// Returns `true` for actions targeting a single VM (`vm/<vmid>` grammar).
    pub fn is_vm_action(&self) -> bool {
        matches!(
            self,
            ActionType::ReadVm
                | ActionType::StartVm
                | ActionType::StopVm
                | ActionType::SnapshotVm
                | ActionType::CloneVm
                | ActionType::MigrateVm
                | ActionType::DeleteVm
        )
    }

    /// The canonical wire identifier (snake_case, same as the serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ReadVm => "read_vm",
            ActionType::ReadInventory => "read_inventory",
            ActionType::ReadTaskStatus => "read_task_status",
            ActionType::ReadTasks => "read_tasks",
            ActionType::StartVm => "start_vm",
            ActionType::StopVm => "stop_vm",
            ActionType::SnapshotVm => "snapshot_vm",
            ActionType::CloneVm => "clone_vm",
            ActionType::MigrateVm => "migrate_vm",
            ActionType::DeleteVm => "delete_vm",
            ActionType::StorageEdit => "storage_edit",
            ActionType::FirewallEdit => "firewall_edit",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
