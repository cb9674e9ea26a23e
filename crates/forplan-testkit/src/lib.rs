// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use forplan_app::{PlanMacro, PlanMacroId};
use forplan_store::{
    DuplicateOutcome, EventBus, PlanStore, StoreAction, StoreEvent, Subscription,
};
use time::{Date, Month};

/// Store double for view tests: records every dispatched action and lets the
/// test publish events to subscribers at the moment of its choosing.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    bus: EventBus,
    dispatched: Vec<StoreAction>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> &[StoreAction] {
        &self.dispatched
    }

    pub fn dispatched_labels(&self) -> Vec<&'static str> {
        self.dispatched.iter().map(StoreAction::label).collect()
    }

    pub fn last_duplicate_request(&self) -> Option<&forplan_app::DuplicateRequest> {
        self.dispatched.iter().rev().find_map(|action| match action {
            StoreAction::Duplicate(request) => Some(request),
            _ => None,
        })
    }

    pub fn publish(&self, event: StoreEvent) {
        self.bus.publish(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

impl PlanStore for ScriptedStore {
    fn dispatch(&mut self, action: StoreAction) -> Result<()> {
        self.dispatched.push(action);
        Ok(())
    }

    fn subscribe(&mut self) -> Subscription {
        self.bus.subscribe()
    }
}

pub fn plan_fixture(id: i64, name: &str) -> Result<PlanMacro> {
    Ok(PlanMacro {
        id: PlanMacroId::new(id),
        name: name.to_owned(),
        begin: Date::from_calendar_date(2020, Month::January, 1)?,
        end: Date::from_calendar_date(2020, Month::December, 31)?,
        description: String::new(),
        documented: false,
        archived: false,
    })
}

pub fn documented_plan_fixture(id: i64, name: &str) -> Result<PlanMacro> {
    let mut plan = plan_fixture(id, name)?;
    plan.documented = true;
    Ok(plan)
}

pub fn success_outcome(new_plan_id: i64) -> DuplicateOutcome {
    DuplicateOutcome {
        status: None,
        new_plan_id: Some(PlanMacroId::new(new_plan_id)),
        message: None,
    }
}

pub fn failed_outcome(status: u16, message: &str) -> DuplicateOutcome {
    DuplicateOutcome::failure(status, message.to_owned())
}
