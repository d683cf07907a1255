//! Decides which gate stands between a reader and a paste.

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::paste::Paste;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Password,
    Actions,
    HumanCheck,
    Reveal,
}

pub struct GateInput<'a> {
    pub paste: &'a Paste,
    pub completed: &'a BTreeSet<usize>,
    /// The reader already proved the password for the payload at hand.
    pub password_satisfied: bool,
    pub verified_this_session: bool,
}

/// Picks the next gate. The first match wins: password, then outstanding
/// actions, then the human check unless this session already passed it.
#[must_use]
pub fn evaluate(input: &GateInput<'_>) -> Gate {
    if input.paste.is_password_protected && !input.password_satisfied {
        return Gate::Password;
    }

    let progress = Progress::of(input.paste, input.completed);
    if input.paste.require_actions && !progress.is_complete() {
        return Gate::Actions;
    }

    if input.verified_this_session {
        Gate::Reveal
    } else {
        Gate::HumanCheck
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    #[must_use]
    pub fn of(paste: &Paste, completed: &BTreeSet<usize>) -> Self {
        let total = paste.required_actions();
        Self {
            completed: completed.range(..total).count(),
            total,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Completion as a whole percentage. An empty gate counts as done.
    #[must_use]
    pub const fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        #[allow(clippy::cast_possible_truncation)]
        let percent = (self.completed * 100 / self.total) as u8;
        percent
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unlock Progress {}/{}", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paste::{Action, ActionType};

    fn paste(password: bool, actions: usize) -> Paste {
        let mut paste: Paste = serde_json::from_str("{}").unwrap();
        paste.is_password_protected = password;
        paste.require_actions = actions > 0;
        paste.actions = (0..actions)
            .map(|i| Action {
                action_type: ActionType::Custom,
                action_url: format!("https://example.com/{i}"),
                action_label: None,
            })
            .collect();
        paste
    }

    fn gate(paste: &Paste, completed: &[usize], password: bool, verified: bool) -> Gate {
        evaluate(&GateInput {
            paste,
            completed: &completed.iter().copied().collect(),
            password_satisfied: password,
            verified_this_session: verified,
        })
    }

    #[test]
    fn password_comes_first() {
        let paste = paste(true, 2);
        assert_eq!(gate(&paste, &[], false, true), Gate::Password);
        assert_eq!(gate(&paste, &[], true, true), Gate::Actions);
    }

    #[test]
    fn outstanding_actions_gate_the_paste() {
        let paste = paste(false, 2);
        assert_eq!(gate(&paste, &[], false, false), Gate::Actions);
        assert_eq!(gate(&paste, &[1], false, false), Gate::Actions);
        assert_eq!(gate(&paste, &[0, 1], false, false), Gate::HumanCheck);
    }

    #[test]
    fn stale_indices_do_not_count() {
        let paste = paste(false, 2);
        assert_eq!(gate(&paste, &[0, 5], false, false), Gate::Actions);
    }

    #[test]
    fn human_check_runs_once_per_session() {
        let paste = paste(false, 0);
        assert_eq!(gate(&paste, &[], false, false), Gate::HumanCheck);
        assert_eq!(gate(&paste, &[], false, true), Gate::Reveal);
    }

    #[test]
    fn empty_action_gate_is_satisfied() {
        let mut paste = paste(false, 0);
        paste.require_actions = true;
        assert_eq!(gate(&paste, &[], false, false), Gate::HumanCheck);

        let progress = Progress::of(&paste, &BTreeSet::new());
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn progress_stays_within_bounds() {
        let paste = paste(false, 3);
        for completed in [vec![], vec![0], vec![0, 2], vec![0, 1, 2], vec![0, 1, 2, 3, 9]] {
            let set = completed.into_iter().collect();
            let progress = Progress::of(&paste, &set);
            assert!(progress.completed <= progress.total);
            assert_eq!(progress.is_complete(), progress.completed == 3);
        }

        let progress = Progress::of(&paste, &BTreeSet::from([0]));
        assert_eq!(progress.percent(), 33);
        assert_eq!(progress.to_string(), "Unlock Progress 1/3");
    }
}
