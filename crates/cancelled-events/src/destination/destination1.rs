/*
[INPUT]:  Destination1 actions (activation from the view layer)
[OUTPUT]: Output signal consumed by the root reducer
[POS]:    Leaf destination - signals completion as soon as it is activated
[UPDATE]: When Destination1 gains state or actions
*/

use crate::effect::Effect;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Sent by the view when the screen appears
    Task,
    Output,
}

pub fn reduce(_state: &mut State, action: Action) -> Effect<Action> {
    match action {
        Action::Task => Effect::Send(Action::Output),
        Action::Output => Effect::None,
    }
}
