// Debounce and praise policy
//
// Distraction alerts are never suppressed. Praise needs a quiet period since
// the last distraction and since the last praise, a late enough local hour
// and a coin flip.

use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Messages used for positive reinforcement
pub const PRAISE_MESSAGES: &[&str] = &[
    "Great job staying focused! Keep it up!",
    "You're doing amazing work. Stay on track!",
    "Impressive focus! Keep pushing forward!",
    "You're a productivity master! Keep going!",
    "Your dedication is paying off. Well done!",
];

/// When praise may fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PraisePolicy {
    /// Quiet period required since the last distraction and the last praise
    pub interval: Duration,
    /// Probability per eligible verdict
    pub chance: f64,
    /// Local hour from which praise may fire
    pub after_hour: u32,
}

impl Default for PraisePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1800),
            chance: 0.125,
            after_hour: 20,
        }
    }
}

/// What a verdict should trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Alert,
    Praise,
    Nothing,
}

/// Process-lifetime reaction timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    pub last_distraction_time: NaiveDateTime,
    pub last_praise_time: Option<NaiveDateTime>,
}

impl DebounceState {
    /// The quiet period starts at process start
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            last_distraction_time: now,
            last_praise_time: None,
        }
    }

    /// Time conditions for praise, without the coin flip
    pub fn praise_eligible(&self, now: NaiveDateTime, policy: &PraisePolicy) -> bool {
        let quiet_secs = policy.interval.as_secs().min(i64::MAX as u64 / 1000) as i64;
        let quiet = chrono::Duration::seconds(quiet_secs);

        let since_distraction = now - self.last_distraction_time;
        if since_distraction <= quiet {
            return false;
        }

        if let Some(last_praise) = self.last_praise_time {
            if now - last_praise <= quiet {
                return false;
            }
        }

        now.hour() >= policy.after_hour
    }

    /// Update timing for one verdict and decide the reaction
    pub fn on_verdict<R: Rng + ?Sized>(
        &mut self,
        is_distracted: bool,
        now: NaiveDateTime,
        policy: &PraisePolicy,
        rng: &mut R,
    ) -> Reaction {
        if is_distracted {
            self.last_distraction_time = now;
            return Reaction::Alert;
        }

        if !self.praise_eligible(now, policy) {
            return Reaction::Nothing;
        }

        let chance = if policy.chance.is_finite() {
            policy.chance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if rng.gen_bool(chance) {
            self.last_praise_time = Some(now);
            Reaction::Praise
        } else {
            Reaction::Nothing
        }
    }
}

/// Pick one praise message
pub fn pick_praise<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PRAISE_MESSAGES
        .choose(rng)
        .copied()
        .unwrap_or(PRAISE_MESSAGES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn always() -> PraisePolicy {
        PraisePolicy {
            chance: 1.0,
            after_hour: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_distraction_always_alerts() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = DebounceState::new(at(9, 0));

        for minute in 0..5 {
            let reaction = state.on_verdict(true, at(10, minute), &always(), &mut rng);
            assert_eq!(reaction, Reaction::Alert);
            assert_eq!(state.last_distraction_time, at(10, minute));
        }
    }

    #[test]
    fn test_no_praise_within_interval_of_distraction() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = always();
        let mut state = DebounceState::new(at(0, 0));
        state.on_verdict(true, at(12, 0), &policy, &mut rng);

        // exactly T after the distraction is still too early
        for minute in [1, 10, 29, 30] {
            assert_eq!(
                state.on_verdict(false, at(12, minute), &policy, &mut rng),
                Reaction::Nothing,
                "praise fired {} minutes after a distraction",
                minute
            );
        }
        assert_eq!(
            state.on_verdict(false, at(12, 31), &policy, &mut rng),
            Reaction::Praise
        );
        assert_eq!(state.last_praise_time, Some(at(12, 31)));
    }

    #[test]
    fn test_praise_is_spaced_by_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        let policy = always();
        let mut state = DebounceState::new(at(0, 0));

        assert_eq!(state.on_verdict(false, at(13, 0), &policy, &mut rng), Reaction::Praise);
        assert_eq!(state.on_verdict(false, at(13, 20), &policy, &mut rng), Reaction::Nothing);
        assert_eq!(state.on_verdict(false, at(13, 31), &policy, &mut rng), Reaction::Praise);
    }

    #[test]
    fn test_praise_waits_for_hour() {
        let mut rng = StdRng::seed_from_u64(5);
        let policy = PraisePolicy {
            chance: 1.0,
            after_hour: 20,
            ..Default::default()
        };
        let mut state = DebounceState::new(at(0, 0));

        assert_eq!(state.on_verdict(false, at(19, 59), &policy, &mut rng), Reaction::Nothing);
        assert_eq!(state.on_verdict(false, at(20, 0), &policy, &mut rng), Reaction::Praise);
    }

    #[test]
    fn test_zero_chance_never_praises() {
        let mut rng = StdRng::seed_from_u64(11);
        let policy = PraisePolicy {
            chance: 0.0,
            after_hour: 0,
            ..Default::default()
        };
        let mut state = DebounceState::new(at(0, 0));
        for hour in 1..24 {
            assert_eq!(state.on_verdict(false, at(hour, 0), &policy, &mut rng), Reaction::Nothing);
        }
        assert_eq!(state.last_praise_time, None);
    }

    #[test]
    fn test_pick_praise_is_from_list() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            assert!(PRAISE_MESSAGES.contains(&pick_praise(&mut rng)));
        }
    }
}
