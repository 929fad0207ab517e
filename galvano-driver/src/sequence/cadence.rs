//! Constructors for the autonomous trigger cadences the two measurement
//! modes run on.

use crate::{
    afe::TriggerCadence,
    common::{Freq, units::wakeup_ticks},
    firmware::TriggerId,
};

/// Timing of one pulsed point, in ms. The guard intervals pull the sample
/// instant away from the preceding DAC edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseCadenceTiming {
    pub pre_pulse_wait_ms: f32,
    pub pulse_width_ms: f32,
    pub hold_after_pulse_ms: f32,
    pub guard_base_ms: f32,
    pub guard_pulse_ms: f32,
}

impl PulseCadenceTiming {
    /// Delay between a level change and its sample, shared by the baseline
    /// and pulse slots. Bounded by the shorter of the two guarded intervals
    /// and never below 0.5 ms.
    pub fn sample_delay_ms(&self) -> f32 {
        let base = self.pre_pulse_wait_ms - self.guard_base_ms;
        let pulse = self.pulse_width_ms - self.guard_pulse_ms;
        base.min(pulse).max(0.5)
    }
}

impl TriggerCadence {
    /// The four-slot pulsed cycle: baseline level, sample, pulse level,
    /// sample. The sample trigger runs twice per cycle with one shared delay.
    pub fn pulsed(
        baseline: TriggerId,
        pulse: TriggerId,
        sample: TriggerId,
        timing: &PulseCadenceTiming,
        clk: Freq<f32>,
    ) -> Self {
        let mut cadence = Self {
            order: vec![baseline, sample, pulse, sample],
            sleep_ticks: [1; 4],
            wake_ticks: [1; 4],
        };
        cadence.slot(sample, 1, wakeup_ticks(timing.sample_delay_ms(), clk));
        // pulse level goes on immediately after the baseline sample
        cadence.slot(pulse, 1, 1);
        let hold_ms = if timing.hold_after_pulse_ms <= 0.0 {
            0.5
        } else {
            timing.hold_after_pulse_ms
        };
        cadence.slot(baseline, 1, wakeup_ticks(hold_ms, clk));
        cadence
    }

    /// A single trigger repeating at the given output data rate.
    pub fn periodic(trigger: TriggerId, odr: Freq<f32>, clk: Freq<f32>) -> Self {
        let mut cadence = Self {
            order: vec![trigger],
            sleep_ticks: [1; 4],
            wake_ticks: [1; 4],
        };
        let period = (clk.hz() / odr.hz()) as u32;
        cadence.slot(trigger, 4, period.saturating_sub(4).max(1));
        cadence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Hz, kHz};

    fn timing() -> PulseCadenceTiming {
        PulseCadenceTiming {
            pre_pulse_wait_ms: 50.0,
            pulse_width_ms: 50.0,
            hold_after_pulse_ms: 1.0,
            guard_base_ms: 2.0,
            guard_pulse_ms: 2.0,
        }
    }

    #[test]
    fn shared_sample_delay_takes_the_tighter_guard() {
        let mut t = timing();
        assert_eq!(48.0, t.sample_delay_ms());
        t.guard_pulse_ms = 30.0;
        assert_eq!(20.0, t.sample_delay_ms());
        t.guard_pulse_ms = 50.0;
        assert_eq!(0.5, t.sample_delay_ms());
    }

    #[test]
    fn pulsed_cycle_visits_the_sample_trigger_twice() {
        let c = TriggerCadence::pulsed(
            TriggerId::T0,
            TriggerId::T1,
            TriggerId::T2,
            &timing(),
            32.0 * kHz,
        );
        assert_eq!(
            vec![TriggerId::T0, TriggerId::T2, TriggerId::T1, TriggerId::T2],
            c.order
        );
        // 48 ms at 32 kHz, register holds ticks - 1
        assert_eq!(1535, c.wake_ticks[TriggerId::T2.index()]);
        assert_eq!(1, c.wake_ticks[TriggerId::T1.index()]);
        assert_eq!(31, c.wake_ticks[TriggerId::T0.index()]);
        assert_eq!([1; 4], c.sleep_ticks);
    }

    #[test]
    fn zero_hold_falls_back_to_half_a_millisecond() {
        let t = PulseCadenceTiming {
            hold_after_pulse_ms: 0.0,
            ..timing()
        };
        let c = TriggerCadence::pulsed(
            TriggerId::T0,
            TriggerId::T1,
            TriggerId::T2,
            &t,
            32.0 * kHz,
        );
        assert_eq!(15, c.wake_ticks[TriggerId::T0.index()]);
    }

    #[test]
    fn periodic_slot_accounts_for_its_sleep_ticks() {
        let c = TriggerCadence::periodic(TriggerId::T0, 20.0 * Hz, 32.0 * kHz);
        assert_eq!(vec![TriggerId::T0], c.order);
        assert_eq!(4, c.sleep_ticks[0]);
        assert_eq!(1596, c.wake_ticks[0]);
    }
}
