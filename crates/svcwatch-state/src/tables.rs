//! redb table definitions for the svcwatch state store.

use redb::TableDefinition;

/// Per-service runtime state keyed by service name.
pub const SERVICE_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("service_state");
