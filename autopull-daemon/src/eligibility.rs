//! Decides from a snapshot alone whether a process is ours to update.

use autopull_core::{ManagedProcess, SkipReason};

/// Rules, in order:
/// 1. management-tool processes (reserved name prefix, or flagged as a
///    supervisor module) are never touched;
/// 2. processes without version-control metadata have nothing to pull.
///
/// An empty `reserved_prefix` disables the name rule.
pub fn check(process: &ManagedProcess, reserved_prefix: &str) -> Result<(), SkipReason> {
    let reserved_name =
        !reserved_prefix.is_empty() && process.name.as_str().starts_with(reserved_prefix);
    if reserved_name || process.is_module {
        return Err(SkipReason::Reserved);
    }
    if process.versioning.is_none() {
        return Err(SkipReason::Unversioned);
    }
    Ok(())
}

pub fn is_eligible(process: &ManagedProcess, reserved_prefix: &str) -> bool {
    check(process, reserved_prefix).is_ok()
}
