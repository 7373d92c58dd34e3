/// Level session lifecycle: `NotStarted → Active → Ended(Won | Lost)`.
///
/// The session owns the level clock and the combo tracker. It never looks at
/// entities itself; the step passes in how many dogs remain.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Won,
    Lost,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionState {
    NotStarted,
    Active,
    Ended(Outcome),
}

/// Combo counter for catches drained in quick succession.
#[derive(Clone, Copy, Debug)]
pub struct Combo {
    pub counter: u32,
    last: Option<f64>,
    window: f64,
    max_tier: u32,
}

impl Combo {
    pub fn new(window_secs: f64, max_tier: u32) -> Self {
        Combo { counter: 0, last: None, window: window_secs, max_tier }
    }

    /// Register one drained catch at `now` and return its tier.
    /// Within the window the counter climbs (capped at `max_tier`);
    /// otherwise, including the first catch of a session, it resets to 0.
    pub fn register(&mut self, now: f64) -> u32 {
        let chained = self.last.is_some_and(|last| now - last < self.window);
        self.counter = if chained { (self.counter + 1).min(self.max_tier) } else { 0 };
        self.last = Some(now);
        self.counter
    }

    pub fn tier(&self) -> u32 {
        self.counter
    }

    /// Visual scale for a catch at `tier`.
    pub fn catch_scale(tier: u32) -> f32 {
        1.5 + 0.25 * tier as f32
    }
}

#[derive(Clone, Debug)]
pub struct LevelSession {
    pub state: SessionState,
    pub time_limit: f64,
    start: Option<f64>,
    pub elapsed: f64,
    pub combo: Combo,
    warned: bool,
}

impl LevelSession {
    pub fn new(time_limit: f64, combo: Combo) -> Self {
        LevelSession {
            state: SessionState::NotStarted,
            time_limit,
            start: None,
            elapsed: 0.0,
            combo,
            warned: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SessionState::Ended(_))
    }

    /// First touch. Only valid while NotStarted; returns whether it started.
    pub fn start(&mut self, now: f64) -> bool {
        if self.state != SessionState::NotStarted {
            return false;
        }
        self.state = SessionState::Active;
        self.start = Some(now);
        self.elapsed = 0.0;
        log::info!("level started, limit {:.0}s", self.time_limit);
        true
    }

    /// Per-frame check. Timeout is tested before the empty roster, so a
    /// level that runs out of time on the frame its last dog leaves is lost.
    /// Returns the outcome on the tick the session ends.
    pub fn tick(&mut self, now: f64, dogs_remaining: usize) -> Option<Outcome> {
        if self.state != SessionState::Active {
            return None;
        }
        self.elapsed = now - self.start.unwrap_or(now);
        let outcome = if self.elapsed >= self.time_limit {
            Outcome::Lost
        } else if dogs_remaining == 0 {
            Outcome::Won
        } else {
            return None;
        };
        self.state = SessionState::Ended(outcome);
        log::info!("level ended: {:?} after {:.2}s", outcome, self.elapsed);
        Some(outcome)
    }

    pub fn remaining(&self) -> f64 {
        (self.time_limit - self.elapsed).max(0.0)
    }

    /// True exactly once, the first active tick with less than `threshold`
    /// seconds left.
    pub fn take_low_time_warning(&mut self, threshold: f64) -> bool {
        if self.warned || !self.is_active() || self.remaining() >= threshold {
            return false;
        }
        self.warned = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(limit: f64) -> LevelSession {
        LevelSession::new(limit, Combo::new(0.5, 11))
    }

    #[test]
    fn paused_until_first_touch() {
        let mut s = session(30.0);
        assert_eq!(s.tick(100.0, 0), None);
        assert_eq!(s.state, SessionState::NotStarted);
        assert!(s.start(5.0));
        assert!(!s.start(6.0));
        assert_eq!(s.tick(7.0, 3), None);
        assert_eq!(s.elapsed, 2.0);
    }

    #[test]
    fn empty_roster_wins() {
        let mut s = session(30.0);
        s.start(0.0);
        assert_eq!(s.tick(1.0, 0), Some(Outcome::Won));
        assert_eq!(s.state, SessionState::Ended(Outcome::Won));
        // terminal
        assert_eq!(s.tick(2.0, 0), None);
        assert!(!s.start(3.0));
    }

    #[test]
    fn timeout_beats_empty_roster() {
        let mut s = session(10.0);
        s.start(0.0);
        assert_eq!(s.tick(10.0, 0), Some(Outcome::Lost));
    }

    #[test]
    fn combo_chains_and_resets() {
        let mut c = Combo::new(0.5, 11);
        assert_eq!(c.register(1.0), 0);
        assert_eq!(c.register(1.2), 1);
        assert_eq!(c.register(1.6), 2);
        assert_eq!(c.register(2.2), 0);
        assert_eq!(c.register(2.3), 1);
    }

    #[test]
    fn combo_caps_at_max_tier() {
        let mut c = Combo::new(0.5, 11);
        let mut last = 0;
        for i in 0..20 {
            let tier = c.register(i as f64 * 0.1);
            assert!(tier >= last.min(11));
            last = tier;
        }
        assert_eq!(c.tier(), 11);
        assert_eq!(Combo::catch_scale(2), 2.0);
    }

    #[test]
    fn low_time_warning_fires_once() {
        let mut s = session(30.0);
        s.start(0.0);
        s.tick(15.0, 1);
        assert!(!s.take_low_time_warning(10.0));
        s.tick(21.0, 1);
        assert!(s.take_low_time_warning(10.0));
        s.tick(22.0, 1);
        assert!(!s.take_low_time_warning(10.0));
    }
}
