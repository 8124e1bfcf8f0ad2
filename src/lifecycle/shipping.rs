//! Six-state shipping workflow definition.

use super::{Actor, LifecycleDefinition, LifecycleModel, Stamp, TransitionRule};
use crate::entities::RequestStatus;

const STATES: &[RequestStatus] = &[
    RequestStatus::Requested,
    RequestStatus::Shipped,
    RequestStatus::Received,
    RequestStatus::InProgress,
    RequestStatus::Complete,
    RequestStatus::PickedUp,
];

// Strictly linear; the source deployment exposes no cancellation path in
// this variant.
const RULES: &[TransitionRule] = &[
    TransitionRule {
        from: RequestStatus::Requested,
        to: RequestStatus::Shipped,
        actor: Actor::HubOperator,
        stamp: Stamp::Shipped,
    },
    TransitionRule {
        from: RequestStatus::Shipped,
        to: RequestStatus::Received,
        actor: Actor::System,
        stamp: Stamp::None,
    },
    TransitionRule {
        from: RequestStatus::Received,
        to: RequestStatus::InProgress,
        actor: Actor::Technician,
        stamp: Stamp::Started,
    },
    TransitionRule {
        from: RequestStatus::InProgress,
        to: RequestStatus::Complete,
        actor: Actor::Technician,
        stamp: Stamp::Completed,
    },
    TransitionRule {
        from: RequestStatus::Complete,
        to: RequestStatus::PickedUp,
        actor: Actor::HubOperator,
        stamp: Stamp::PickedUp,
    },
];

pub(super) static DEFINITION: LifecycleDefinition = LifecycleDefinition {
    model: LifecycleModel::Shipping,
    initial: RequestStatus::Requested,
    states: STATES,
    rules: RULES,
};
