/// Process monitor
///
/// Every tick enumerates running processes, matches their executable paths
/// against the block rules that are active at the current local time, and
/// terminates the matches. Enforcement is best effort: a blocked program may
/// run for up to one poll interval, and a respawned one is caught again on
/// the next tick.

pub mod enforcement;
pub mod process;
pub mod runner;

pub use enforcement::BlockEnforcer;
pub use process::{ProcessEntry, ProcessTable, SysinfoProcessTable, TerminateOutcome};
pub use runner::{AppMonitor, SharedRules};
