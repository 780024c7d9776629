//! Port enumeration.

use serde_json::Value;
use tracing::warn;

use super::session::Session;
use super::PortId;
use crate::error::{Result, TelemetryError};

/// Command listing the ethdev ports of an endpoint.
pub const LIST_COMMAND: &str = "/ethdev/list";

/// Lists the ports behind `session` in the order the endpoint reports them.
pub async fn list_ports(session: &mut Session) -> Result<Vec<PortId>> {
    let value = session.command(LIST_COMMAND).await?;
    decode_port_list(&value)
}

/// Decodes the `/ethdev/list` payload. Order is preserved.
///
/// Entries that are not valid port ids are skipped.
pub fn decode_port_list(value: &Value) -> Result<Vec<PortId>> {
    let items = value
        .as_array()
        .ok_or_else(|| TelemetryError::protocol(LIST_COMMAND, "port list is not an array"))?;

    let mut ports = Vec::with_capacity(items.len());
    for item in items {
        match item.as_u64().and_then(|id| PortId::try_from(id).ok()) {
            Some(port) => ports.push(port),
            None => warn!("Skipping invalid port id in {}: {}", LIST_COMMAND, item),
        }
    }
    Ok(ports)
}
