//! Raw sample codes to differential currents.

use itertools::Itertools;

use crate::common::{CalibrationValue, units::adc_code_to_mv};

/// Collapses the interleaved `[base, pulse, base, pulse, ..]` sample stream
/// into one differential current per point, in µA. A trailing unpaired
/// sample produces no output.
pub fn differential_currents<'a>(
    samples: &'a [u32],
    calibration: &CalibrationValue,
    pga_gain: f32,
    vref_mv: f32,
) -> impl Iterator<Item = f32> + 'a {
    let rtia = calibration.magnitude;
    samples
        .iter()
        .map(move |&code| adc_code_to_mv(code, pga_gain, vref_mv) / rtia * 1e3)
        .tuples()
        .map(|(base, pulse)| pulse - base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // vref = 32768 mV makes the ADC transfer the identity on code offsets
    const VREF: f32 = 32768.0;

    fn codes(mv: &[i32]) -> Vec<u32> {
        mv.iter().map(|&v| (32768 + v) as u32).collect()
    }

    #[test]
    fn pairs_collapse_to_pulse_minus_base() {
        let cal = CalibrationValue::fixed(1_000.0);
        let out: Vec<f32> =
            differential_currents(&codes(&[10, 15, 20, 30]), &cal, 1.0, VREF).collect();
        assert_eq!(2, out.len());
        assert_relative_eq!(5.0, out[0], max_relative = 1e-5);
        assert_relative_eq!(10.0, out[1], max_relative = 1e-5);
    }

    #[test]
    fn fewer_than_two_samples_produce_nothing() {
        let cal = CalibrationValue::fixed(1_000.0);
        assert_eq!(
            0,
            differential_currents(&[], &cal, 1.0, VREF).count()
        );
        assert_eq!(
            0,
            differential_currents(&codes(&[42]), &cal, 1.0, VREF).count()
        );
    }

    #[test]
    fn transimpedance_and_gain_scale_the_result() {
        let cal = CalibrationValue::fixed(2_000.0);
        let halved: Vec<f32> =
            differential_currents(&codes(&[10, 15]), &cal, 1.0, VREF).collect();
        assert_relative_eq!(2.5, halved[0], max_relative = 1e-5);

        let gained: Vec<f32> =
            differential_currents(&codes(&[10, 15]), &cal, 2.0, VREF).collect();
        assert_relative_eq!(1.25, gained[0], max_relative = 1e-5);
    }

    #[test]
    fn codes_are_masked_to_sixteen_bits() {
        let cal = CalibrationValue::fixed(1_000.0);
        let tagged: Vec<u32> = codes(&[10, 15])
            .into_iter()
            .map(|c| c | 0xa5a5_0000)
            .collect();
        let out: Vec<f32> = differential_currents(&tagged, &cal, 1.0, VREF).collect();
        assert_relative_eq!(5.0, out[0], max_relative = 1e-5);
    }
}
