/*
[INPUT]:  None (Destination2 accepts no actions)
[OUTPUT]: None
[POS]:    Leaf destination - inert "screen reached" marker
[UPDATE]: When Destination2 gains state or actions
*/

use crate::effect::Effect;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {}

pub fn reduce(_state: &mut State, action: Action) -> Effect<Action> {
    match action {}
}
