use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::enums::CustomStepType;

/// An operator-defined ordered step list attached to a single contact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomFlow {
    pub id: i64,
    pub contact_id: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomFlowStep {
    pub id: i64,
    pub flow_id: i64,
    pub step_order: i32,
    pub step_type: String,
    pub subject: String,
    pub body: String,
    pub delay_days: i32,
}

impl CustomFlowStep {
    pub fn step_type(&self) -> CustomStepType {
        match self.step_type.as_str() {
            "task" => CustomStepType::Task,
            "notification" => CustomStepType::Notification,
            _ => CustomStepType::Email,
        }
    }

    pub fn is_first(&self) -> bool {
        self.step_order == 1
    }
}
