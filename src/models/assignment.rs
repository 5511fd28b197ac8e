use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request state of the most recent courier assignment made from the table
/// for one delivery row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentState {
    #[default]
    Idle,
    Pending {
        attempt_id: Uuid,
        courier_id: Option<u64>,
        requested_at: DateTime<Utc>,
    },
    Succeeded {
        attempt_id: Uuid,
        courier_id: Option<u64>,
        settled_at: DateTime<Utc>,
    },
    Failed {
        attempt_id: Uuid,
        courier_id: Option<u64>,
        message: String,
        settled_at: DateTime<Utc>,
    },
}

impl AssignmentState {
    pub fn pending(courier_id: Option<u64>) -> Self {
        Self::Pending {
            attempt_id: Uuid::new_v4(),
            courier_id,
            requested_at: Utc::now(),
        }
    }

    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            Self::Idle => None,
            Self::Pending { attempt_id, .. }
            | Self::Succeeded { attempt_id, .. }
            | Self::Failed { attempt_id, .. } => Some(*attempt_id),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Settles a pending attempt. Any other state is returned unchanged.
    pub fn settle(&self, result: Result<(), String>) -> Self {
        let Self::Pending {
            attempt_id,
            courier_id,
            ..
        } = self
        else {
            return self.clone();
        };

        match result {
            Ok(()) => Self::Succeeded {
                attempt_id: *attempt_id,
                courier_id: *courier_id,
                settled_at: Utc::now(),
            },
            Err(message) => Self::Failed {
                attempt_id: *attempt_id,
                courier_id: *courier_id,
                message,
                settled_at: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AssignmentState;

    #[test]
    fn settle_keeps_attempt_identity() {
        let pending = AssignmentState::pending(Some(3));
        let attempt = pending.attempt_id();

        let failed = pending.settle(Err("courier is off shift".to_string()));
        assert_eq!(failed.attempt_id(), attempt);
        assert!(matches!(
            failed,
            AssignmentState::Failed { ref message, courier_id: Some(3), .. }
                if message == "courier is off shift"
        ));
    }

    #[test]
    fn settle_ignores_non_pending_states() {
        assert_eq!(AssignmentState::Idle.settle(Ok(())), AssignmentState::Idle);
    }

    #[test]
    fn serializes_with_state_tag() {
        let value = serde_json::to_value(AssignmentState::pending(None)).unwrap();
        assert_eq!(value["state"], "pending");
        assert!(value["courier_id"].is_null());
    }
}
