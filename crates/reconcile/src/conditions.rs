//! `Ready` and `Synced` status conditions.

use chrono::{SecondsFormat, Utc};
use fetchsync_core::Condition;

pub const TYPE_READY: &str = "Ready";
pub const TYPE_SYNCED: &str = "Synced";

fn now() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true) }

fn condition(type_: &str, status: bool, reason: &str, message: Option<String>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time: now(),
    }
}

pub fn available() -> Condition { condition(TYPE_READY, true, "Available", None) }

pub fn creating() -> Condition { condition(TYPE_READY, false, "Creating", None) }

pub fn deleting() -> Condition { condition(TYPE_READY, false, "Deleting", None) }

pub fn unavailable(message: impl ToString) -> Condition {
    condition(TYPE_READY, false, "Unavailable", Some(message.to_string()))
}

pub fn reconcile_success() -> Condition { condition(TYPE_SYNCED, true, "ReconcileSuccess", None) }

pub fn reconcile_error(message: impl ToString) -> Condition {
    condition(TYPE_SYNCED, false, "ReconcileError", Some(message.to_string()))
}

/// Insert or replace the condition of `c.type_`. The previous
/// `lastTransitionTime` is kept unless the status changed.
pub fn set_condition(conditions: &mut Vec<Condition>, mut c: Condition) {
    match conditions.iter_mut().find(|x| x.type_ == c.type_) {
        Some(old) => {
            if old.status == c.status {
                c.last_transition_time = std::mem::take(&mut old.last_transition_time);
            }
            *old = c;
        }
        None => conditions.push(c),
    }
}

pub fn get<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
