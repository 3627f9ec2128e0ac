//! Metric descriptions for the serving surface.

use metrics::{describe_counter, describe_gauge};

/// Register metric descriptions once at startup.
pub fn describe() {
    describe_counter!(
        "recall_tool_calls_total",
        "Tool invocations, labeled by tool name"
    );
    describe_counter!("recall_rpc_errors_total", "RPC envelopes answered with an error");
    describe_gauge!(
        "recall_ws_connections_active",
        "Currently registered websocket connections"
    );
    describe_counter!(
        "recall_push_drops_total",
        "Instruction frames dropped because a client buffer was full"
    );
    describe_counter!(
        "recall_push_undeliverable_total",
        "Instructions with no online client"
    );
    describe_counter!(
        "recall_push_ack_timeouts_total",
        "Instruction acknowledgements that never arrived in time"
    );
}
