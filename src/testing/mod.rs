//! Fixtures and a ready-made in-memory harness for exercising the
//! attendance state machine without a database. Used by the integration
//! suites under `tests/` and handy for local experiments.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::attendance::AttendanceService;
use crate::clock::ManualClock;
use crate::config::AttendanceConfig;
use crate::database::models::{
    Agent, AgentRole, BreakPolicy, BreakRules, BreakType, DurationLimits, Shift,
};
use crate::store::MemoryAttendanceStore;

/// Knobs the suites vary. Defaults: 09:00-17:00 shift with a 10 minute
/// grace period, short (5-15) and lunch (30-60) breaks, two breaks a day,
/// 30 minute cooldown, no approval required, clock just before shift start.
pub struct HarnessConfig {
    pub requires_approval: bool,
    pub max_breaks_per_day: i32,
    pub cooldown_minutes: i32,
    pub grace_period_minutes: i32,
    pub attendance: AttendanceConfig,
    pub clock_start: &'static str,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            requires_approval: false,
            max_breaks_per_day: 2,
            cooldown_minutes: 30,
            grace_period_minutes: 10,
            attendance: AttendanceConfig {
                allow_recheck_in: false,
                late_checkin_cutoff_minutes: None,
            },
            clock_start: "2024-03-11T08:55:00Z",
        }
    }
}

pub struct Harness {
    pub store: Arc<MemoryAttendanceStore>,
    pub clock: Arc<ManualClock>,
    pub service: AttendanceService,
    pub agent: Agent,
    pub admin: Agent,
    pub shift: Shift,
    pub policy: BreakPolicy,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(HarnessConfig::default()).await
    }

    pub async fn with_approval() -> Self {
        Self::build(HarnessConfig {
            requires_approval: true,
            ..Default::default()
        })
        .await
    }

    pub async fn build(cfg: HarnessConfig) -> Self {
        let clock = Arc::new(ManualClock::at(cfg.clock_start));
        let store = Arc::new(MemoryAttendanceStore::new(clock.clone()));
        let now = Utc::now();

        let policy = BreakPolicy {
            id: Uuid::new_v4(),
            name: "standard".to_string(),
            max_breaks_per_day: cfg.max_breaks_per_day,
            cooldown_minutes: cfg.cooldown_minutes,
            requires_approval: cfg.requires_approval,
            rules: Json(BreakRules {
                allowed_types: vec![BreakType::Short, BreakType::Lunch],
                limits: HashMap::from([
                    (
                        BreakType::Short,
                        DurationLimits {
                            min_minutes: 5,
                            max_minutes: 15,
                        },
                    ),
                    (
                        BreakType::Lunch,
                        DurationLimits {
                            min_minutes: 30,
                            max_minutes: 60,
                        },
                    ),
                ]),
                preferred_window: None,
            }),
            created_at: now,
            updated_at: now,
        };

        let shift = Shift {
            id: Uuid::new_v4(),
            name: "morning".to_string(),
            start_time: "09:00:00".parse().unwrap(),
            end_time: "17:00:00".parse().unwrap(),
            grace_period_minutes: cfg.grace_period_minutes,
            overtime_allowed: true,
            overtime_requires_approval: false,
            break_policy_id: policy.id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let agent = Agent {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: AgentRole::Agent,
            shift_id: Some(shift.id),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let admin = Agent {
            id: Uuid::new_v4(),
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            role: AgentRole::Admin,
            shift_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        store.seed_policy(policy.clone()).await;
        store.seed_shift(shift.clone()).await;
        store.seed_agent(agent.clone()).await;
        store.seed_agent(admin.clone()).await;

        let service = AttendanceService::new(
            store.clone(),
            store.clone(),
            clock.clone(),
            cfg.attendance,
        );

        Self {
            store,
            clock,
            service,
            agent,
            admin,
            shift,
            policy,
        }
    }

    /// Register a second agent on the same shift.
    pub async fn add_agent(&self, name: &str) -> Agent {
        let now = Utc::now();
        let agent = Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            role: AgentRole::Agent,
            shift_id: Some(self.shift.id),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_agent(agent.clone()).await;
        agent
    }
}
