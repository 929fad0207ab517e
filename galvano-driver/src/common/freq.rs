/// \[Hz\]
pub struct Hz;

/// \[kHz\]
#[allow(non_camel_case_types)]
pub struct kHz;

/// \[MHz\]
pub struct MHz;

/// Frequency
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Freq<T: Copy> {
    pub(crate) freq: T,
}

impl<T: Copy> core::fmt::Debug for Freq<T>
where
    T: core::fmt::Display,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} Hz", self.freq)
    }
}

impl<T: Copy> Freq<T> {
    /// Returns the frequency in Hz.
    #[inline]
    pub const fn hz(&self) -> T {
        self.freq
    }
}

impl core::ops::Mul<Hz> for f32 {
    type Output = Freq<f32>;

    fn mul(self, _: Hz) -> Self::Output {
        Self::Output { freq: self }
    }
}

impl core::ops::Mul<kHz> for f32 {
    type Output = Freq<f32>;

    fn mul(self, _: kHz) -> Self::Output {
        Self::Output { freq: self * 1e3 }
    }
}

impl core::ops::Mul<MHz> for f32 {
    type Output = Freq<f32>;

    fn mul(self, _: MHz) -> Self::Output {
        Self::Output { freq: self * 1e6 }
    }
}

impl core::ops::Mul<Hz> for u32 {
    type Output = Freq<u32>;

    fn mul(self, _: Hz) -> Self::Output {
        Self::Output { freq: self }
    }
}

impl core::ops::Mul<kHz> for u32 {
    type Output = Freq<u32>;

    fn mul(self, _: kHz) -> Self::Output {
        Self::Output { freq: self * 1000 }
    }
}

impl<T> core::ops::Add<Freq<T>> for Freq<T>
where
    T: core::ops::Add<Output = T> + Copy,
{
    type Output = Freq<T>;

    fn add(self, rhs: Freq<T>) -> Self::Output {
        Freq {
            freq: self.freq + rhs.freq,
        }
    }
}

impl<T> core::ops::Sub<Freq<T>> for Freq<T>
where
    T: core::ops::Sub<Output = T> + Copy,
{
    type Output = Freq<T>;

    fn sub(self, rhs: Freq<T>) -> Self::Output {
        Freq {
            freq: self.freq - rhs.freq,
        }
    }
}

impl<T, U> core::ops::Mul<U> for Freq<T>
where
    T: core::ops::Mul<U, Output = T> + Copy,
{
    type Output = Freq<T>;

    fn mul(self, rhs: U) -> Self::Output {
        Freq {
            freq: self.freq * rhs,
        }
    }
}

impl<T, U> core::ops::Div<U> for Freq<T>
where
    T: core::ops::Div<U, Output = T> + Copy,
{
    type Output = Freq<T>;

    fn div(self, rhs: U) -> Self::Output {
        Freq {
            freq: self.freq / rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_markers_scale_to_hertz() {
        assert_eq!(32_000.0, (32.0 * kHz).hz());
        assert_eq!(16_000_000.0, (16.0 * MHz).hz());
        assert_eq!(20.0, (20.0 * Hz).hz());
        assert_eq!(32_000, (32 * kHz).hz());
    }

    #[test]
    fn arithmetic_stays_in_the_unit() {
        // a clock ratio and its derived waits keep their dimension
        let sys = 16.0 * MHz;
        assert_eq!(4.0 * MHz, sys / 4.0);
        assert_eq!(sys, 8.0 * MHz + 8.0 * MHz);
        assert_eq!(31.0 * kHz, 32.0 * kHz - 1.0 * kHz);
        assert_eq!(40.0 * Hz, 20.0 * Hz * 2.0);
        assert!(32.0 * kHz < sys);
    }

    #[test]
    fn debug_prints_plain_hertz() {
        assert_eq!("1596 Hz", format!("{:?}", 1596.0 * Hz));
        assert_eq!("32000 Hz", format!("{:?}", 32 * kHz));
    }
}
