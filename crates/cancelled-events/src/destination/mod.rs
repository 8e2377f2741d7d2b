/*
[INPUT]:  Destination states/actions, parent CancellationToken
[OUTPUT]: Presented destination with its own cancellation scope, child action routing
[POS]:    Destination layer - the mutually exclusive screens owned by the root reducer
[UPDATE]: When adding destinations or changing scope teardown rules
*/

pub mod destination1;
pub mod destination2;

use crate::effect::Effect;
use std::fmt;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationState {
    Destination1(destination1::State),
    Destination2(destination2::State),
}

impl DestinationState {
    pub fn kind(&self) -> DestinationKind {
        match self {
            DestinationState::Destination1(_) => DestinationKind::Destination1,
            DestinationState::Destination2(_) => DestinationKind::Destination2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationAction {
    Destination1(destination1::Action),
    Destination2(destination2::Action),
}

/// Tag of the active destination, published to the render boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Destination1,
    Destination2,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::Destination1 => write!(f, "destination1"),
            DestinationKind::Destination2 => write!(f, "destination2"),
        }
    }
}

/// Actions addressed to whatever destination is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationAction {
    Presented(DestinationAction),
    /// Tear the active destination down, leaving none
    Dismiss,
}

/// The active destination together with its cancellation scope.
///
/// The scope token is a child of the token passed to [`Presented::new`] and is
/// cancelled as soon as this value is dropped, which is what happens when the
/// root replaces or dismisses the destination.
#[derive(Debug)]
pub struct Presented {
    id: Uuid,
    state: DestinationState,
    scope: CancellationToken,
    _guard: DropGuard,
}

impl Presented {
    pub fn new(state: DestinationState, parent: &CancellationToken) -> Self {
        let scope = parent.child_token();
        let guard = scope.clone().drop_guard();
        Self {
            id: Uuid::new_v4(),
            state,
            scope,
            _guard: guard,
        }
    }

    /// Identity of this presentation; a fresh value gets a fresh id even when
    /// the state is identical.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> DestinationKind {
        self.state.kind()
    }

    pub fn state(&self) -> &DestinationState {
        &self.state
    }

    pub fn scope_token(&self) -> CancellationToken {
        self.scope.clone()
    }

    /// Route a child action to the matching destination reducer.
    ///
    /// Returns `None` when the action targets a destination that is not the
    /// one currently presented.
    pub fn reduce(&mut self, action: DestinationAction) -> Option<Effect<DestinationAction>> {
        match (&mut self.state, action) {
            (DestinationState::Destination1(state), DestinationAction::Destination1(action)) => {
                Some(destination1::reduce(state, action).map(DestinationAction::Destination1))
            }
            (DestinationState::Destination2(state), DestinationAction::Destination2(action)) => {
                Some(destination2::reduce(state, action).map(DestinationAction::Destination2))
            }
            _ => None,
        }
    }
}
