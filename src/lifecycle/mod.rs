//! Lifecycle state machine.
//!
//! The engine is a strategy parameterized over a [`LifecycleDefinition`]:
//! the state set, the adjacency table, the actor permitted to trigger each
//! transition, and the fields a transition requires. The surrounding
//! application selects exactly one definition at startup; nothing here is
//! tied to a presentation layer.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::RequestStatus;

pub mod escalation;
mod fulfillment;
mod shipping;

/// Which lifecycle a deployment runs. Selected once from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleModel {
    /// Six-state shipping workflow:
    /// Requested → Shipped → Received → In Progress → Complete → Picked Up.
    #[default]
    Shipping,
    /// Four-state fulfillment workflow:
    /// Pending → In Progress → Fulfilled, with Cancelled reachable from any
    /// open state.
    Fulfillment,
}

impl fmt::Display for LifecycleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleModel::Shipping => write!(f, "shipping"),
            LifecycleModel::Fulfillment => write!(f, "fulfillment"),
        }
    }
}

/// Who is permitted to trigger a transition. The engine records this on the
/// rule; authenticating the actor is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Technician,
    HubOperator,
    /// Fired by the auto-escalation rule, never by a user action.
    System,
}

/// Timestamp field a transition stamps on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    None,
    Shipped,
    Started,
    Completed,
    PickedUp,
    Fulfilled,
}

/// One row of the adjacency table.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor: Actor,
    pub stamp: Stamp,
}

/// Side-data supplied with a transition attempt. Fields irrelevant to the
/// requested transition are ignored.
#[derive(Debug, Clone, Default)]
pub struct TransitionPayload {
    pub expected_delivery: Option<NaiveDate>,
    pub quantity_fulfilled: Option<i32>,
    pub fulfilled_by: Option<String>,
    pub fulfillment_notes: Option<String>,
}

/// A transition attempt the adjacency table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedTransition {
    #[error("status '{status}' is not part of the {model} lifecycle")]
    UnknownState {
        status: RequestStatus,
        model: LifecycleModel,
    },
    #[error("cannot transition from '{from}' to '{to}'")]
    NotAdjacent {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("transition to '{to}' requires {field}")]
    MissingField {
        to: RequestStatus,
        field: &'static str,
    },
}

/// A lifecycle definition: state set plus validated adjacency table.
#[derive(Debug)]
pub struct LifecycleDefinition {
    model: LifecycleModel,
    initial: RequestStatus,
    states: &'static [RequestStatus],
    rules: &'static [TransitionRule],
}

impl LifecycleDefinition {
    /// Returns the static definition for a model.
    pub fn for_model(model: LifecycleModel) -> &'static LifecycleDefinition {
        match model {
            LifecycleModel::Shipping => &shipping::DEFINITION,
            LifecycleModel::Fulfillment => &fulfillment::DEFINITION,
        }
    }

    pub fn model(&self) -> LifecycleModel {
        self.model
    }

    /// Status assigned at submission.
    pub fn initial_status(&self) -> RequestStatus {
        self.initial
    }

    /// The states this deployment recognizes, in flow order.
    pub fn states(&self) -> &'static [RequestStatus] {
        self.states
    }

    pub fn contains(&self, status: RequestStatus) -> bool {
        self.states.contains(&status)
    }

    /// Looks up the rule for an exact (from, to) edge.
    pub fn rule(&self, from: RequestStatus, to: RequestStatus) -> Option<&'static TransitionRule> {
        self.rules.iter().find(|r| r.from == from && r.to == to)
    }

    /// Validates a transition attempt against the adjacency table and the
    /// payload the target state requires.
    ///
    /// Any non-adjacent attempt, including a same-state attempt, is a
    /// rejected operation rather than a silent no-op.
    pub fn attempt_transition(
        &self,
        current: RequestStatus,
        requested: RequestStatus,
        payload: &TransitionPayload,
    ) -> Result<&'static TransitionRule, RejectedTransition> {
        for status in [current, requested] {
            if !self.contains(status) {
                return Err(RejectedTransition::UnknownState {
                    status,
                    model: self.model,
                });
            }
        }

        let rule = self
            .rule(current, requested)
            .ok_or(RejectedTransition::NotAdjacent {
                from: current,
                to: requested,
            })?;

        match rule.to {
            RequestStatus::Shipped if payload.expected_delivery.is_none() => {
                Err(RejectedTransition::MissingField {
                    to: rule.to,
                    field: "expected_delivery",
                })
            }
            RequestStatus::Fulfilled if payload.quantity_fulfilled.is_none() => {
                Err(RejectedTransition::MissingField {
                    to: rule.to,
                    field: "quantity_fulfilled",
                })
            }
            RequestStatus::Fulfilled if payload.fulfilled_by.is_none() => {
                Err(RejectedTransition::MissingField {
                    to: rule.to,
                    field: "fulfilled_by",
                })
            }
            _ => Ok(rule),
        }
    }
}
