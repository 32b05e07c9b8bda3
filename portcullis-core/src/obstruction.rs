//! Obstruction sensor debouncing
//!
//! The safety beam pulses its line while the path is clear and holds it
//! high when blocked. It also sleeps with the line low when the door is
//! idle. The firmware counts falling edges and calls
//! [`ObstructionSampler::sample`] every [`SAMPLE_INTERVAL_MS`].

use portcullis_hal::InputPin;

/// Sampling period
pub const SAMPLE_INTERVAL_MS: u64 = 50;
/// More pulses than this in one period means the beam is clear
pub const CLEAR_PULSE_THRESHOLD: u32 = 3;
/// Line held high this long after the last sleep means blocked
pub const OBSTRUCTED_HOLD_MS: u64 = 700;

#[derive(Debug, Clone, Copy, Default)]
pub struct ObstructionSampler {
    obstructed: bool,
    last_asleep_ms: u64,
}

impl ObstructionSampler {
    pub const fn new() -> Self {
        Self {
            obstructed: false,
            last_asleep_ms: 0,
        }
    }

    pub fn obstructed(&self) -> bool {
        self.obstructed
    }

    /// Evaluate one period; returns the new state on a transition
    pub fn sample<P: InputPin>(&mut self, pulses: u32, pin: &P, now_ms: u64) -> Option<bool> {
        if pulses > CLEAR_PULSE_THRESHOLD {
            return self.transition(false);
        }
        if pulses == 0 {
            if pin.is_low() {
                self.last_asleep_ms = now_ms;
            } else if now_ms.saturating_sub(self.last_asleep_ms) > OBSTRUCTED_HOLD_MS {
                return self.transition(true);
            }
        }
        None
    }

    fn transition(&mut self, obstructed: bool) -> Option<bool> {
        if self.obstructed == obstructed {
            return None;
        }
        self.obstructed = obstructed;
        Some(obstructed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Level(bool);

    impl InputPin for Level {
        fn is_high(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_held_high_becomes_obstructed() {
        let mut sampler = ObstructionSampler::new();
        assert_eq!(sampler.sample(0, &Level(false), 1000), None);
        assert_eq!(sampler.sample(0, &Level(true), 1500), None);
        assert_eq!(sampler.sample(0, &Level(true), 1700), None);
        assert_eq!(sampler.sample(0, &Level(true), 1750), Some(true));
        assert_eq!(sampler.sample(0, &Level(true), 1800), None);
        assert!(sampler.obstructed());
    }

    #[test]
    fn test_pulses_clear() {
        let mut sampler = ObstructionSampler::new();
        sampler.sample(0, &Level(true), 1000);
        assert!(sampler.obstructed());
        assert_eq!(sampler.sample(4, &Level(true), 1050), Some(false));
        assert_eq!(sampler.sample(9, &Level(true), 1100), None);
    }

    #[test]
    fn test_sleeping_sensor_is_not_obstructed() {
        let mut sampler = ObstructionSampler::new();
        for t in 0..40u64 {
            assert_eq!(sampler.sample(0, &Level(false), t * SAMPLE_INTERVAL_MS), None);
        }
        assert!(!sampler.obstructed());
    }

    #[test]
    fn test_partial_counts_keep_state() {
        let mut sampler = ObstructionSampler::new();
        sampler.sample(0, &Level(true), 1000);
        for pulses in 1..=CLEAR_PULSE_THRESHOLD {
            assert_eq!(sampler.sample(pulses, &Level(false), 1050), None);
        }
        assert!(sampler.obstructed());
    }
}
