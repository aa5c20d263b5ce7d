use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::break_request::BreakType;

/// Per-type duration bounds, minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DurationLimits {
    pub min_minutes: i32,
    pub max_minutes: i32,
}

/// Advisory window the shift prefers breaks to fall into. Surfaced to
/// clients; not enforced by the state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreferredWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Type-level rules stored as a JSONB document on the policy row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakRules {
    pub allowed_types: Vec<BreakType>,
    pub limits: HashMap<BreakType, DurationLimits>,
    pub preferred_window: Option<PreferredWindow>,
}

/// Ruleset limiting break type, duration, count, and cooldown for a shift.
/// Read-only from the session's perspective.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BreakPolicy {
    pub id: Uuid,
    pub name: String,
    pub max_breaks_per_day: i32,
    pub cooldown_minutes: i32,
    pub requires_approval: bool,
    pub rules: Json<BreakRules>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BreakPolicy {
    pub fn allows(&self, break_type: BreakType) -> bool {
        self.rules.allowed_types.contains(&break_type)
    }

    pub fn limits_for(&self, break_type: BreakType) -> Option<DurationLimits> {
        self.rules.limits.get(&break_type).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_round_trip_as_json() {
        let rules = BreakRules {
            allowed_types: vec![BreakType::Short, BreakType::Lunch],
            limits: HashMap::from([
                (BreakType::Short, DurationLimits { min_minutes: 5, max_minutes: 15 }),
                (BreakType::Lunch, DurationLimits { min_minutes: 30, max_minutes: 60 }),
            ]),
            preferred_window: None,
        };

        let json = serde_json::to_value(&rules).unwrap();
        assert!(json["limits"]["short"]["min_minutes"] == 5);

        let back: BreakRules = serde_json::from_value(json).unwrap();
        assert!(back.allowed_types.contains(&BreakType::Lunch));
        assert_eq!(back.limits[&BreakType::Lunch].max_minutes, 60);
    }
}
