//! Navigation state machine
//!
//! Single source of truth for the current page. An animated page turn is
//! split in two timed phases: at *commit* the page index changes and data
//! starts loading, at *settle* the turn is over and new commands are accepted
//! again. Commands that arrive in between are dropped, not queued.

use std::time::{Duration, Instant};

use super::types::Direction;

/// Default delay before a requested page turn commits
pub const DEFAULT_COMMIT_DELAY: Duration = Duration::from_millis(200);
/// Default delay between commit and the end of the turn
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Phase of an in-flight page turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Old spread animating out, page index unchanged
    Exiting { commit_at: Instant },
    /// Page index committed, new spread animating in
    Entering { settle_at: Instant },
}

/// Navigation state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavState {
    #[default]
    Idle,
    Transitioning {
        direction: Direction,
        target: usize,
        phase: Phase,
    },
}

impl NavState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Idle => None,
            Self::Transitioning { direction, .. } => Some(*direction),
        }
    }
}

/// Commands that drive navigation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Turn forward by one spread
    RequestNext,
    /// Turn backward by one spread
    RequestPrev,
    /// Jump straight to a page, no animation
    GoToPage(usize),
    /// The document reported its page count
    SetTotalPages(usize),
    /// Display mode changed the number of pages per spread
    SetSpreadStep(usize),
}

/// Effects produced by navigation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Make sure the pages of the current spread are loaded
    RequestVisible,
    /// Warm the neighbourhood of `center`
    Schedule { center: usize, direction: Direction },
    /// Persist the committed page
    SavePosition(usize),
}

/// Navigation state machine.
///
/// Time is passed in explicitly so the machine can be driven by any clock.
#[derive(Clone, Debug)]
pub struct Navigator {
    current_page: usize,
    total_pages: Option<usize>,
    spread_step: usize,
    state: NavState,
    commit_delay: Duration,
    settle_delay: Duration,
}

impl Navigator {
    #[must_use]
    pub fn new(start_page: usize, spread_step: usize) -> Self {
        Self::with_timings(
            start_page,
            spread_step,
            DEFAULT_COMMIT_DELAY,
            DEFAULT_SETTLE_DELAY,
        )
    }

    #[must_use]
    pub fn with_timings(
        start_page: usize,
        spread_step: usize,
        commit_delay: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            current_page: start_page.max(1),
            total_pages: None,
            spread_step: spread_step.max(1),
            state: NavState::Idle,
            commit_delay,
            settle_delay,
        }
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn total_pages(&self) -> Option<usize> {
        self.total_pages
    }

    #[must_use]
    pub fn spread_step(&self) -> usize {
        self.spread_step
    }

    #[must_use]
    pub fn state(&self) -> NavState {
        self.state
    }

    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.total_pages
            .is_some_and(|total| self.current_page + self.spread_step <= total)
    }

    #[must_use]
    pub fn can_go_prev(&self) -> bool {
        self.current_page > self.spread_step
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command, now: Instant) -> Vec<Effect> {
        match cmd {
            Command::RequestNext => self.begin(Direction::Next, now),
            Command::RequestPrev => self.begin(Direction::Prev, now),

            Command::GoToPage(page) => {
                if !self.state.is_idle() {
                    log::debug!("Ignoring go to page {page} during a page turn");
                    return vec![];
                }
                let Some(total) = self.total_pages.filter(|&t| t > 0) else {
                    log::debug!("Ignoring go to page {page}: page count unknown");
                    return vec![];
                };
                let target = page.clamp(1, total);
                let direction = if target >= self.current_page {
                    Direction::Next
                } else {
                    Direction::Prev
                };
                self.commit(target, direction)
            }

            Command::SetTotalPages(0) => {
                log::debug!("Ignoring empty page count");
                vec![]
            }

            Command::SetTotalPages(count) => {
                self.total_pages = Some(count);
                if self.current_page > count {
                    self.current_page = count;
                }
                vec![]
            }

            Command::SetSpreadStep(step) => {
                let step = step.max(1);
                if self.spread_step == step {
                    return vec![];
                }
                self.spread_step = step;
                vec![
                    Effect::RequestVisible,
                    Effect::Schedule {
                        center: self.current_page,
                        direction: Direction::Next,
                    },
                ]
            }
        }
    }

    fn begin(&mut self, direction: Direction, now: Instant) -> Vec<Effect> {
        if !self.state.is_idle() {
            log::debug!("Dropping {} request during a page turn", direction.as_str());
            return vec![];
        }

        let allowed = match direction {
            Direction::Next => self.can_go_next(),
            Direction::Prev => self.can_go_prev(),
        };
        if !allowed {
            log::debug!(
                "Ignoring {} request at page {} of {:?}",
                direction.as_str(),
                self.current_page,
                self.total_pages
            );
            return vec![];
        }

        let target = match direction {
            Direction::Next => self.current_page + self.spread_step,
            Direction::Prev => self.current_page - self.spread_step,
        };
        self.state = NavState::Transitioning {
            direction,
            target,
            phase: Phase::Exiting {
                commit_at: now + self.commit_delay,
            },
        };
        vec![]
    }

    /// Advance timed phases up to `now`.
    ///
    /// A late tick runs commit and settle together; neither is ever skipped.
    #[must_use]
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = vec![];

        if let NavState::Transitioning {
            direction,
            target,
            phase: Phase::Exiting { commit_at },
        } = self.state
        {
            if now < commit_at {
                return effects;
            }
            let target = self.clamp(target);
            effects = self.commit(target, direction);
            self.state = NavState::Transitioning {
                direction,
                target,
                phase: Phase::Entering {
                    settle_at: commit_at + self.settle_delay,
                },
            };
        }

        if let NavState::Transitioning {
            phase: Phase::Entering { settle_at },
            ..
        } = self.state
        {
            if now >= settle_at {
                self.state = NavState::Idle;
            }
        }

        effects
    }

    /// When the next timed phase is due, if any
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            NavState::Idle => None,
            NavState::Transitioning { phase, .. } => match phase {
                Phase::Exiting { commit_at } => Some(commit_at),
                Phase::Entering { settle_at } => Some(settle_at),
            },
        }
    }

    fn clamp(&self, page: usize) -> usize {
        match self.total_pages {
            Some(total) if total > 0 => page.clamp(1, total),
            _ => page.max(1),
        }
    }

    fn commit(&mut self, page: usize, direction: Direction) -> Vec<Effect> {
        self.current_page = page;
        log::info!("Committed page {page} ({})", direction.as_str());
        vec![
            Effect::RequestVisible,
            Effect::Schedule {
                center: page,
                direction,
            },
            Effect::SavePosition(page),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: Duration = DEFAULT_COMMIT_DELAY;
    const SETTLE: Duration = DEFAULT_SETTLE_DELAY;

    fn navigator(start: usize, step: usize, total: usize) -> Navigator {
        let mut nav = Navigator::new(start, step);
        let _ = nav.apply(Command::SetTotalPages(total), Instant::now());
        nav
    }

    #[test]
    fn request_next_enters_transition_without_moving() {
        let t0 = Instant::now();
        let mut nav = navigator(1, 2, 10);

        let effects = nav.apply(Command::RequestNext, t0);
        assert!(effects.is_empty());
        assert_eq!(nav.current_page(), 1);
        assert_eq!(nav.state().direction(), Some(Direction::Next));
    }

    #[test]
    fn commit_then_settle() {
        let t0 = Instant::now();
        let mut nav = navigator(1, 2, 10);
        let _ = nav.apply(Command::RequestNext, t0);

        assert!(nav.tick(t0 + COMMIT - Duration::from_millis(1)).is_empty());
        assert_eq!(nav.current_page(), 1);

        let effects = nav.tick(t0 + COMMIT);
        assert_eq!(nav.current_page(), 3);
        assert_eq!(
            effects,
            vec![
                Effect::RequestVisible,
                Effect::Schedule {
                    center: 3,
                    direction: Direction::Next
                },
                Effect::SavePosition(3),
            ]
        );
        assert!(!nav.state().is_idle());

        assert!(nav.tick(t0 + COMMIT + SETTLE).is_empty());
        assert!(nav.state().is_idle());
    }

    #[test]
    fn late_tick_runs_both_phases() {
        let t0 = Instant::now();
        let mut nav = navigator(5, 1, 10);
        let _ = nav.apply(Command::RequestPrev, t0);

        let effects = nav.tick(t0 + Duration::from_secs(5));
        assert_eq!(effects.len(), 3);
        assert_eq!(nav.current_page(), 4);
        assert!(nav.state().is_idle());
    }

    #[test]
    fn requests_during_transition_are_dropped() {
        let t0 = Instant::now();
        let mut nav = navigator(1, 1, 10);
        let _ = nav.apply(Command::RequestNext, t0);

        let later = t0 + Duration::from_millis(10);
        assert!(nav.apply(Command::RequestNext, later).is_empty());
        assert!(nav.apply(Command::RequestPrev, later).is_empty());
        assert!(nav.apply(Command::GoToPage(8), later).is_empty());

        let _ = nav.tick(t0 + COMMIT + SETTLE);
        assert_eq!(nav.current_page(), 2);
    }

    #[test]
    fn next_is_denied_past_last_spread() {
        let t0 = Instant::now();
        let mut nav = navigator(9, 2, 10);
        assert!(!nav.can_go_next());
        let _ = nav.apply(Command::RequestNext, t0);
        assert!(nav.state().is_idle());
    }

    #[test]
    fn next_is_denied_while_page_count_unknown() {
        let mut nav = Navigator::new(1, 1);
        let _ = nav.apply(Command::RequestNext, Instant::now());
        assert!(nav.state().is_idle());
        assert!(nav.apply(Command::GoToPage(3), Instant::now()).is_empty());
    }

    #[test]
    fn prev_is_denied_before_first_page() {
        let t0 = Instant::now();
        let mut nav = navigator(2, 2, 10);
        let _ = nav.apply(Command::RequestPrev, t0);
        assert!(nav.state().is_idle());

        let mut nav = navigator(3, 2, 10);
        let _ = nav.apply(Command::RequestPrev, t0);
        let _ = nav.tick(t0 + COMMIT);
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn go_to_page_clamps_and_commits() {
        let mut nav = navigator(1, 1, 10);

        let effects = nav.apply(Command::GoToPage(999), Instant::now());
        assert_eq!(nav.current_page(), 10);
        assert_eq!(effects.last(), Some(&Effect::SavePosition(10)));

        let effects = nav.apply(Command::GoToPage(0), Instant::now());
        assert_eq!(nav.current_page(), 1);
        assert_eq!(
            effects[1],
            Effect::Schedule {
                center: 1,
                direction: Direction::Prev
            }
        );
    }

    #[test]
    fn go_to_current_page_still_schedules_and_saves() {
        let mut nav = navigator(5, 1, 10);

        let effects = nav.apply(Command::GoToPage(5), Instant::now());
        assert_eq!(nav.current_page(), 5);
        assert!(nav.state().is_idle());
        assert!(effects.contains(&Effect::SavePosition(5)));
        assert!(effects.iter().any(|e| matches!(e, Effect::Schedule { center: 5, .. })));
    }

    #[test]
    fn page_count_clamps_restored_page() {
        let mut nav = Navigator::new(40, 1);
        let _ = nav.apply(Command::SetTotalPages(12), Instant::now());
        assert_eq!(nav.current_page(), 12);
    }

    #[test]
    fn empty_page_count_is_not_recorded() {
        let mut nav = Navigator::new(1, 2);
        assert!(nav.apply(Command::SetTotalPages(0), Instant::now()).is_empty());
        assert_eq!(nav.total_pages(), None);
        assert_eq!(nav.current_page(), 1);
        assert!(!nav.can_go_next());
    }

    #[test]
    fn commit_clamps_if_document_shrank() {
        let t0 = Instant::now();
        let mut nav = navigator(7, 2, 10);
        let _ = nav.apply(Command::RequestNext, t0);
        let _ = nav.apply(Command::SetTotalPages(8), t0);
        let _ = nav.tick(t0 + COMMIT);
        assert_eq!(nav.current_page(), 8);
    }

    #[test]
    fn spread_step_change_requests_new_spread() {
        let mut nav = navigator(3, 1, 10);
        assert!(nav.apply(Command::SetSpreadStep(1), Instant::now()).is_empty());

        let effects = nav.apply(Command::SetSpreadStep(2), Instant::now());
        assert_eq!(nav.spread_step(), 2);
        assert_eq!(effects[0], Effect::RequestVisible);
    }

    #[test]
    fn page_stays_in_bounds_for_any_request_sequence() {
        let mut now = Instant::now();
        let mut nav = navigator(1, 2, 7);
        let pattern = [true, true, false, true, true, true, true, false, false, false, false];

        for forward in pattern {
            let cmd = if forward {
                Command::RequestNext
            } else {
                Command::RequestPrev
            };
            let _ = nav.apply(cmd, now);
            let before = nav.current_page();
            // Still exiting: page index must not move
            let _ = nav.tick(now + Duration::from_millis(50));
            assert_eq!(nav.current_page(), before);

            now += COMMIT + SETTLE;
            let _ = nav.tick(now);
            assert!((1..=7).contains(&nav.current_page()));
            assert!(nav.state().is_idle());
        }
    }
}
