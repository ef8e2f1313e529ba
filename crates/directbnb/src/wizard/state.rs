use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::leads::LeadId;
use crate::repository::RepositoryError;

pub const TOTAL_STEPS: u8 = 7;

/// Per-session wizard progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    pub step: u8,
    /// Cleaned submissions keyed `step_1` .. `step_7`.
    pub data: Map<String, Value>,
    pub lead_id: Option<LeadId>,
    /// Package, hosting and add-on details with the total, set by step 6.
    pub summary: Option<Value>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: 1,
            data: Map::new(),
            lead_id: None,
            summary: None,
        }
    }
}

impl WizardState {
    pub fn step_key(step: u8) -> String {
        format!("step_{step}")
    }

    pub fn step_data(&self, step: u8) -> Option<&Value> {
        self.data.get(&Self::step_key(step))
    }

    pub fn set_step_data(&mut self, step: u8, value: Value) {
        self.data.insert(Self::step_key(step), value);
    }

    /// String field of a stored step, `None` when absent, null or blank.
    pub fn text(&self, step: u8, field: &str) -> Option<String> {
        self.step_data(step)
            .and_then(|data| data.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn id(&self, step: u8, field: &str) -> Option<u64> {
        self.step_data(step)
            .and_then(|data| data.get(field))
            .and_then(Value::as_u64)
    }

    pub fn flag(&self, step: u8, field: &str) -> bool {
        self.step_data(step)
            .and_then(|data| data.get(field))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Wizard state keyed by an opaque session id.
pub trait SessionStore: Send + Sync {
    fn load(&self, session: &str) -> Result<Option<WizardState>, RepositoryError>;
    fn save(&self, session: &str, state: WizardState) -> Result<(), RepositoryError>;
    fn remove(&self, session: &str) -> Result<(), RepositoryError>;
}
