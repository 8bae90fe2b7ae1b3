// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Conditions shared by every resource status, and the bookkeeping that keeps
//! them ordered, deduplicated and folded into a single `Ready` condition.

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";
pub const CONDITION_UNKNOWN: &str = "Unknown";

/// A non-blocking severity; an empty severity blocks readiness.
#[cfg(test)]
pub const SEVERITY_INFO: &str = "Info";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == CONDITION_TRUE
    }

    pub fn is_false(&self) -> bool {
        self.status == CONDITION_FALSE
    }

    fn is_blocking(&self) -> bool {
        self.severity.as_deref().unwrap_or_default().is_empty()
    }
}

/// Read access to the conditions of a status block.
pub trait ResourceStatus {
    fn conditions(&self) -> &[Condition];

    fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions()
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    fn is_ready(&self) -> bool {
        self.condition(crate::constants::conditions::READY)
            .is_some_and(Condition::is_true)
    }
}

/// The shape of a resource's conditions: one "happy" condition that is true
/// only when every dependent condition is true.
#[derive(Debug, Clone, Copy)]
pub struct ConditionSet {
    happy: &'static str,
    dependents: &'static [&'static str],
}

impl ConditionSet {
    pub const fn new(happy: &'static str, dependents: &'static [&'static str]) -> Self {
        Self { happy, dependents }
    }

    pub fn manage<'a>(&self, conditions: &'a mut Vec<Condition>) -> ConditionManager<'a> {
        ConditionManager {
            set: *self,
            baseline: conditions.clone(),
            conditions,
        }
    }
}

pub struct ConditionManager<'a> {
    set: ConditionSet,
    /// Conditions as they were before this pass; a type that ends the pass
    /// with its original status keeps its original transition time.
    baseline: Vec<Condition>,
    conditions: &'a mut Vec<Condition>,
}

impl ConditionManager<'_> {
    /// Ensure the happy condition and every dependent exist, in declaration
    /// order, starting as Unknown.
    pub fn initialize(&mut self) {
        let order: Vec<&'static str> = std::iter::once(self.set.happy)
            .chain(self.set.dependents.iter().copied())
            .collect();
        for condition_type in &order {
            if !self.has(condition_type) {
                self.conditions.push(new_condition(
                    condition_type,
                    CONDITION_UNKNOWN,
                    None,
                    None,
                ));
            }
        }
        // Known types first in declaration order; anything else keeps its place after them.
        self.conditions.sort_by_key(|c| {
            order
                .iter()
                .position(|t| *t == c.condition_type)
                .unwrap_or(order.len())
        });
    }

    pub fn mark_true(&mut self, condition_type: &str) {
        self.set(new_condition(condition_type, CONDITION_TRUE, None, None));
    }

    pub fn mark_true_with_reason(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.set(new_condition(
            condition_type,
            CONDITION_TRUE,
            Some(reason),
            Some(message),
        ));
    }

    pub fn mark_false(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.set(new_condition(
            condition_type,
            CONDITION_FALSE,
            Some(reason),
            Some(message),
        ));
    }

    #[cfg(test)]
    pub fn mark_unknown(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.set(new_condition(
            condition_type,
            CONDITION_UNKNOWN,
            Some(reason),
            Some(message),
        ));
    }

    #[cfg(test)]
    pub fn is_happy(&self) -> bool {
        self.get(self.set.happy).is_some_and(Condition::is_true)
    }

    fn has(&self, condition_type: &str) -> bool {
        self.get(condition_type).is_some()
    }

    fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    fn set(&mut self, new: Condition) {
        let is_dependent = self.set.dependents.contains(&new.condition_type.as_str());
        let new = self.settle(new);
        set_condition(self.conditions, new);
        if is_dependent {
            self.recompute_happy();
        }
    }

    fn recompute_happy(&mut self) {
        let observed: Vec<&Condition> = self
            .set
            .dependents
            .iter()
            .filter_map(|t| self.get(t))
            .collect();
        let all_observed = observed.len() == self.set.dependents.len();
        let blocking: Vec<&Condition> = observed.into_iter().filter(|c| c.is_blocking()).collect();

        let happy = if let Some(failed) = blocking.iter().find(|c| c.is_false()) {
            new_condition(
                self.set.happy,
                CONDITION_FALSE,
                failed.reason.as_deref(),
                failed.message.as_deref(),
            )
        } else if let Some(pending) = blocking.iter().find(|c| !c.is_true()) {
            new_condition(
                self.set.happy,
                CONDITION_UNKNOWN,
                pending.reason.as_deref(),
                pending.message.as_deref(),
            )
        } else if all_observed {
            new_condition(self.set.happy, CONDITION_TRUE, None, None)
        } else {
            new_condition(self.set.happy, CONDITION_UNKNOWN, None, None)
        };

        let happy = self.settle(happy);
        set_condition(self.conditions, happy);
    }

    fn settle(&self, mut new: Condition) -> Condition {
        if let Some(prior) = self
            .baseline
            .iter()
            .find(|c| c.condition_type == new.condition_type && c.status == new.status)
        {
            new.last_transition_time = prior.last_transition_time.clone();
        }
        new
    }
}

fn new_condition(
    condition_type: &str,
    status: &str,
    reason: Option<&str>,
    message: Option<&str>,
) -> Condition {
    Condition {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.map(str::to_string),
        message: message.map(str::to_string),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        severity: None,
    }
}

/// Replace the condition of the same type, preserving lastTransitionTime
/// when the status hasn't changed. Never appends a duplicate type.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == new.condition_type)
    {
        if existing.status != new.status {
            *existing = new;
        } else {
            existing.reason = new.reason;
            existing.message = new.message;
            existing.severity = new.severity;
        }
    } else {
        conditions.push(new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET: ConditionSet = ConditionSet::new("Ready", &["First", "Second"]);

    struct Status(Vec<Condition>);

    impl ResourceStatus for Status {
        fn conditions(&self) -> &[Condition] {
            &self.0
        }
    }

    fn status_of<'a>(conditions: &'a [Condition], t: &str) -> &'a str {
        &conditions
            .iter()
            .find(|c| c.condition_type == t)
            .unwrap()
            .status
    }

    #[test]
    fn test_initialize_orders_happy_first() {
        let mut conditions = Vec::new();
        SET.manage(&mut conditions).initialize();

        let types: Vec<&str> = conditions
            .iter()
            .map(|c| c.condition_type.as_str())
            .collect();
        assert_eq!(types, vec!["Ready", "First", "Second"]);
        assert!(conditions.iter().all(|c| c.status == CONDITION_UNKNOWN));
    }

    #[test]
    fn test_ready_only_when_all_dependents_true() {
        let mut conditions = Vec::new();
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_true("First");
        assert!(!manager.is_happy());
        manager.mark_true("Second");
        assert!(manager.is_happy());
    }

    #[test]
    fn test_false_dependent_drives_ready_reason() {
        let mut conditions = Vec::new();
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_unknown("First", "Waiting", "waiting on first");
        manager.mark_false("Second", "Broken", "second is broken");

        let ready = conditions.iter().find(|c| c.condition_type == "Ready").unwrap();
        assert_eq!(ready.status, CONDITION_FALSE);
        assert_eq!(ready.reason.as_deref(), Some("Broken"));
        assert_eq!(ready.message.as_deref(), Some("second is broken"));
    }

    #[test]
    fn test_informational_condition_does_not_block() {
        let mut conditions = Vec::new();
        SET.manage(&mut conditions).initialize();
        conditions.push(Condition {
            condition_type: "Second".to_string(),
            status: CONDITION_FALSE.to_string(),
            reason: Some("Advisory".to_string()),
            message: None,
            last_transition_time: None,
            severity: Some(SEVERITY_INFO.to_string()),
        });
        conditions.retain(|c| !(c.condition_type == "Second" && c.severity.is_none()));

        let mut manager = SET.manage(&mut conditions);
        manager.mark_true("First");
        assert!(manager.is_happy());
    }

    #[test]
    fn test_new_observation_replaces_prior_of_same_type() {
        let mut conditions = Vec::new();
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_false("First", "A", "a");
        manager.mark_false("First", "B", "b");
        manager.mark_true("First");

        assert_eq!(
            conditions
                .iter()
                .filter(|c| c.condition_type == "First")
                .count(),
            1
        );
        assert_eq!(status_of(&conditions, "First"), CONDITION_TRUE);
    }

    #[test]
    fn test_set_condition_preserves_transition_time_on_same_status() {
        let mut conditions = vec![Condition {
            condition_type: "Ready".to_string(),
            status: CONDITION_TRUE.to_string(),
            reason: Some("First".to_string()),
            message: None,
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            severity: None,
        }];

        set_condition(
            &mut conditions,
            new_condition("Ready", CONDITION_TRUE, Some("Second"), None),
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("Second"));
    }

    #[test]
    fn test_set_condition_updates_transition_time_on_status_change() {
        let mut conditions = vec![Condition {
            condition_type: "Ready".to_string(),
            status: CONDITION_FALSE.to_string(),
            reason: None,
            message: None,
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            severity: None,
        }];

        set_condition(
            &mut conditions,
            new_condition("Ready", CONDITION_TRUE, None, None),
        );

        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_recomputing_an_unchanged_state_keeps_transition_times() {
        let mut conditions = Vec::new();
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_true("First");
        manager.mark_true("Second");
        for c in conditions.iter_mut() {
            c.last_transition_time = Some("2024-01-01T00:00:00Z".to_string());
        }
        let before = conditions.clone();

        // Ready passes through Unknown while First is re-marked, then settles on True
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_unknown("First", "Checking", "checking");
        manager.mark_true("First");
        manager.mark_true("Second");

        assert_eq!(conditions, before);
    }

    #[test]
    fn test_resource_status_is_ready() {
        let mut conditions = Vec::new();
        let mut manager = SET.manage(&mut conditions);
        manager.initialize();
        manager.mark_true("First");
        manager.mark_true("Second");

        assert!(Status(conditions).is_ready());
        assert!(!Status(Vec::new()).is_ready());
    }
}
