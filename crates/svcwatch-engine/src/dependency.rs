//! Dependency restart propagation.
//!
//! A service restarts when a unit it depends on has been restarted since
//! the previous cycle, detected by a change in the dependency's instance
//! identifier rather than by wall-clock timing.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::process::ProcessManager;

/// Fold one observed instance identifier into the stored map.
///
/// Returns true if a previously stored identifier changed. The first
/// observation only records. An absent or empty identifier is unknown:
/// the stored value is kept and nothing triggers.
pub fn observe_instance(
    known: &mut BTreeMap<String, String>,
    dependency: &str,
    current: Option<&str>,
) -> bool {
    let Some(current) = current.filter(|id| !id.is_empty()) else {
        return false;
    };

    match known.insert(dependency.to_string(), current.to_string()) {
        Some(previous) if previous != current => {
            info!(%dependency, %previous, %current, "dependency instance changed");
            true
        }
        Some(_) => false,
        None => {
            debug!(%dependency, instance = %current, "dependency first observed");
            false
        }
    }
}

/// Refresh the stored instance identifiers of every declared dependency.
///
/// Every dependency is queried even after a change has been seen, so the
/// stored map is always current. Entries for dependencies no longer
/// declared are dropped. Returns true if any dependency changed.
pub async fn check_dependencies(
    processes: &dyn ProcessManager,
    service: &str,
    dependencies: &[String],
    known: &mut BTreeMap<String, String>,
) -> bool {
    known.retain(|name, _| dependencies.contains(name));

    let mut changed = false;
    for dependency in dependencies {
        let current = match processes.instance_id(dependency).await {
            Ok(id) => id,
            Err(e) => {
                warn!(%service, %dependency, error = %e, "dependency instance id unavailable");
                None
            }
        };
        changed |= observe_instance(known, dependency, current.as_deref());
    }
    changed
}
