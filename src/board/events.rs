use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::AssignmentState;

/// Pushed to websocket subscribers as the board changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    AssignmentRequested {
        attempt_id: Uuid,
        delivery_id: u64,
        courier_id: Option<u64>,
    },
    AssignmentSettled {
        delivery_id: u64,
        state: AssignmentState,
    },
    StatusUpdated {
        delivery_id: u64,
        status: String,
    },
    BoardRefreshed {
        generation: u64,
        deliveries: usize,
        error: Option<String>,
    },
}
