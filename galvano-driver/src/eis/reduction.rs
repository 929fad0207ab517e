//! Ratiometric impedance reduction of raw DFT words.

use num_complex::Complex32;

/// One reduced impedance point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarImpedance {
    /// \[Ω\]
    pub magnitude: f32,
    /// \[rad\]
    pub phase: f32,
}

/// DFT words are 18-bit two's complement in a 32-bit word; bit 17 is the
/// sign. Upper bits are tag bits and must be ignored.
pub fn sign_extend_18(word: u32) -> i32 {
    let word = word & 0x3ffff;
    if word & (1 << 17) != 0 {
        (word | 0xfffc_0000) as i32
    } else {
        word as i32
    }
}

/// Reduces the `[sensor_re, sensor_im, load_re, load_im, ref_re, ref_im]`
/// word stream to one impedance per six words. The hardware stores the DFT
/// imaginary parts negated; that is undone here. An incomplete trailing
/// group produces no output.
///
/// `z = (1/dft_sensor_load − 1/dft_load) × dft_ref × rcal`, ratiometric
/// against the calibration resistor so the TIA gain cancels.
pub fn impedance_points<'a>(
    words: &'a [u32],
    rcal_ohms: f32,
) -> impl Iterator<Item = PolarImpedance> + 'a {
    words.chunks_exact(6).map(move |group| {
        let dft = |re: u32, im: u32| {
            Complex32::new(sign_extend_18(re) as f32, -(sign_extend_18(im) as f32))
        };
        let sensor_load = dft(group[0], group[1]);
        let load = dft(group[2], group[3]);
        let reference = dft(group[4], group[5]);
        let z = (sensor_load.inv() - load.inv()) * reference;
        PolarImpedance {
            magnitude: z.norm() * rcal_ohms,
            phase: z.arg(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn encode(v: i32) -> u32 {
        (v as u32) & 0x3ffff
    }

    #[test]
    fn sign_extension_covers_the_full_18_bit_range() {
        assert_eq!(0, sign_extend_18(0));
        assert_eq!(131_071, sign_extend_18(0x1ffff));
        assert_eq!(-131_072, sign_extend_18(0x20000));
        assert_eq!(-1, sign_extend_18(0x3ffff));
        // tag bits above bit 17 are ignored
        assert_eq!(5, sign_extend_18(0xfffc_0005));
        assert_eq!(-1, sign_extend_18(encode(-1)));
    }

    #[test]
    fn known_resistances_round_trip_through_the_ratio() {
        // dft ∝ scale / path resistance, all real
        let rz = 2_000.0f32;
        let rload = 100.0f32;
        let rcal = 10_000.0f32;
        let scale = 1.0e7f32;
        let words = [
            encode((scale / (rz + rload)).round() as i32),
            0,
            encode((scale / rload).round() as i32),
            0,
            encode((scale / rcal).round() as i32),
            0,
        ];
        let points: Vec<PolarImpedance> = impedance_points(&words, rcal).collect();
        assert_eq!(1, points.len());
        assert_relative_eq!(rz, points[0].magnitude, max_relative = 1e-2);
        assert_relative_eq!(0.0, points[0].phase, epsilon = 1e-3);
    }

    #[test]
    fn hardware_conjugate_is_undone() {
        // purely capacitive sensor: dft current leads, hardware stores -im
        let words = [
            encode(0),
            encode(-1000), // hardware-negated +1000
            encode(100_000),
            0,
            encode(1000),
            0,
        ];
        let points: Vec<PolarImpedance> = impedance_points(&words, 10_000.0).collect();
        // 1/(0+1000i) has phase -pi/2; the small load correction barely moves it
        assert!(points[0].phase < -1.5 && points[0].phase > -1.65);
    }

    #[test]
    fn incomplete_groups_produce_nothing() {
        assert_eq!(0, impedance_points(&[], 10_000.0).count());
        assert_eq!(0, impedance_points(&[1, 2, 3, 4, 5], 10_000.0).count());
        assert_eq!(1, impedance_points(&[1; 11], 10_000.0).count());
    }
}
