//! Progress code ↔ state resolution.
//!
//! Pure functions; no storage access. [`resolve`] is total, and
//! [`code_for`] is partial because the dispatch and briefing states have no
//! code of their own.

use crate::progress::{ProgressCode, StateId};

/// Maps a progress code to the state a resuming user belongs in.
#[must_use]
pub fn resolve(code: ProgressCode) -> StateId {
    match code {
        ProgressCode::Default => StateId::Start,
        ProgressCode::FirstAct => StateId::FirstAct,
        ProgressCode::SecondAct => StateId::SecondAct,
        ProgressCode::ThirdAct => StateId::ThirdAct,
        ProgressCode::Final => StateId::Final,
        ProgressCode::Present => StateId::Present,
    }
}

/// Resolves a raw persisted string. Unknown strings land on [`StateId::Start`].
#[must_use]
pub fn resolve_raw(raw: &str) -> StateId {
    raw.parse::<ProgressCode>()
        .map_or(StateId::Start, resolve)
}

/// Inverse of [`resolve`].
#[must_use]
pub fn code_for(state: StateId) -> Option<ProgressCode> {
    match state {
        StateId::PreCheck | StateId::Info => None,
        StateId::Start => Some(ProgressCode::Default),
        StateId::FirstAct => Some(ProgressCode::FirstAct),
        StateId::SecondAct => Some(ProgressCode::SecondAct),
        StateId::ThirdAct => Some(ProgressCode::ThirdAct),
        StateId::Final => Some(ProgressCode::Final),
        StateId::Present => Some(ProgressCode::Present),
    }
}

/// The state that follows `state` when its secret is entered.
#[must_use]
pub fn successor(state: StateId) -> Option<StateId> {
    match state {
        StateId::FirstAct => Some(StateId::SecondAct),
        StateId::SecondAct => Some(StateId::ThirdAct),
        StateId::ThirdAct => Some(StateId::Final),
        StateId::Final => Some(StateId::Present),
        StateId::PreCheck | StateId::Start | StateId::Info | StateId::Present => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_code_resolves_to_a_state_that_maps_back() {
        for code in ProgressCode::ALL {
            let state = resolve(code);
            assert_eq!(code_for(state), Some(code), "round trip failed for {code}");
        }
    }

    #[test]
    fn test_dispatch_and_briefing_states_have_no_code() {
        assert_eq!(code_for(StateId::PreCheck), None);
        assert_eq!(code_for(StateId::Info), None);
    }

    #[test]
    fn test_final_and_present_are_distinct() {
        assert_eq!(resolve_raw("final"), StateId::Final);
        assert_eq!(resolve_raw("present"), StateId::Present);
        assert_ne!(code_for(StateId::Final), code_for(StateId::Present));
    }

    #[test]
    fn test_unmapped_raw_code_falls_back_to_start() {
        assert_eq!(resolve_raw(""), StateId::Start);
        assert_eq!(resolve_raw("first_act"), StateId::Start);
    }

    #[test]
    fn test_successor_chain_ends_at_present() {
        let mut state = StateId::FirstAct;
        let mut visited = vec![state];
        while let Some(next) = successor(state) {
            visited.push(next);
            state = next;
        }
        assert_eq!(
            visited,
            vec![
                StateId::FirstAct,
                StateId::SecondAct,
                StateId::ThirdAct,
                StateId::Final,
                StateId::Present
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_resolve_raw_is_total(raw in ".{0,12}") {
            let state = resolve_raw(&raw);
            match raw.parse::<ProgressCode>() {
                Ok(code) => prop_assert_eq!(state, resolve(code)),
                Err(_) => prop_assert_eq!(state, StateId::Start),
            }
        }

        #[test]
        fn prop_successor_advances_the_code(idx in 1usize..5) {
            let code = ProgressCode::ALL[idx];
            let next = successor(resolve(code)).and_then(code_for);
            prop_assert_eq!(next, ProgressCode::ALL.get(idx + 1).copied());
        }
    }
}
