//! Four-state fulfillment workflow definition.

use super::{Actor, LifecycleDefinition, LifecycleModel, Stamp, TransitionRule};
use crate::entities::RequestStatus;

const STATES: &[RequestStatus] = &[
    RequestStatus::Pending,
    RequestStatus::InProgress,
    RequestStatus::Fulfilled,
    RequestStatus::Cancelled,
];

// All transitions operator-initiated from the management surface; no
// automatic escalation in this variant. Cancellation is reachable from any
// open state.
const RULES: &[TransitionRule] = &[
    TransitionRule {
        from: RequestStatus::Pending,
        to: RequestStatus::InProgress,
        actor: Actor::HubOperator,
        stamp: Stamp::None,
    },
    TransitionRule {
        from: RequestStatus::InProgress,
        to: RequestStatus::Fulfilled,
        actor: Actor::HubOperator,
        stamp: Stamp::Fulfilled,
    },
    TransitionRule {
        from: RequestStatus::Pending,
        to: RequestStatus::Cancelled,
        actor: Actor::HubOperator,
        stamp: Stamp::None,
    },
    TransitionRule {
        from: RequestStatus::InProgress,
        to: RequestStatus::Cancelled,
        actor: Actor::HubOperator,
        stamp: Stamp::None,
    },
];

pub(super) static DEFINITION: LifecycleDefinition = LifecycleDefinition {
    model: LifecycleModel::Fulfillment,
    initial: RequestStatus::Pending,
    states: STATES,
    rules: RULES,
};
