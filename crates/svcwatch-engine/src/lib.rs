//! svcwatch-engine — the auto-healing watch cycle.
//!
//! Evaluates every enabled service once per cycle, decides whether it must
//! be restarted, and enforces a restart-rate policy so a crash-looping unit
//! cannot cause a restart storm.
//!
//! # Cycle
//!
//! ```text
//! for each enabled service:
//!   ProcessManager::state()            → UnitState
//!   check_dependencies()               → instance id changed?
//!   probe() (Active + check enabled)   → HealthVerdict
//!   decide()                           → Option<RestartReason>
//!   admit()                            → Proceed | Suppressed
//!   ProcessManager::restart()          (Proceed only)
//!   RuntimeStore::put()
//!   CycleAccumulator::record()
//! render_prometheus() + emit()
//! ```
//!
//! # Decision priority
//!
//! First match wins: `Failed` (on_failed) → `Inactive` (on_inactive) →
//! `Health` (threshold reached) → `Dependency` (instance id changed).
//! Whatever the reason, an active cooldown or a full rate-limit window
//! suppresses the restart.

pub mod decision;
pub mod dependency;
pub mod error;
pub mod process;
pub mod rate_limit;
pub mod watcher;

pub use decision::{RestartReason, decide, health_check_to_run};
pub use dependency::{check_dependencies, observe_instance};
pub use error::{ProcessError, ProcessResult};
pub use process::{ProcessFuture, ProcessManager, SystemdManager, UnitState};
pub use rate_limit::{Admission, admit};
pub use watcher::{CycleOutcome, CycleReport, Watcher};
