//! Parameter records for the opaque register-level subsystems.
//!
//! The core never touches these registers itself; it hands one of these
//! records to the front-end driver, either for immediate application or for
//! translation into the register writes of a program block.

use crate::common::Freq;

/// Reference/bias buffer enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceConfig {
    pub hp_bandgap: bool,
    pub hp_1v1_buffer: bool,
    pub hp_1v8_buffer: bool,
    pub lp_bandgap: bool,
    pub lp_ref_buffer: bool,
}

impl ReferenceConfig {
    /// Everything on; the usual measurement state.
    pub const fn enabled() -> Self {
        Self {
            hp_bandgap: true,
            hp_1v1_buffer: true,
            hp_1v8_buffer: true,
            lp_bandgap: true,
            lp_ref_buffer: true,
        }
    }

    /// Everything off; used on the shutdown path.
    pub const fn disabled() -> Self {
        Self {
            hp_bandgap: false,
            hp_1v1_buffer: false,
            hp_1v8_buffer: false,
            lp_bandgap: false,
            lp_ref_buffer: false,
        }
    }
}

/// Transimpedance feedback resistor selection of the low-power TIA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtiaSel {
    /// External resistor; on-chip string disconnected.
    Open,
    R200,
    R1k,
    R4k,
    R20k,
    R100k,
}

impl RtiaSel {
    /// Nominal resistance of the on-chip selection, if one is connected.
    pub const fn ohms(self) -> Option<f32> {
        match self {
            Self::Open => None,
            Self::R200 => Some(200.0),
            Self::R1k => Some(1_000.0),
            Self::R4k => Some(4_000.0),
            Self::R20k => Some(20_000.0),
            Self::R100k => Some(100_000.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpAmpPower {
    Normal,
    Boost3,
}

/// Low-power amplifier/TIA leg of the measurement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpAmpConfig {
    pub power: LpAmpPower,
    pub pa_power: bool,
    pub tia_power: bool,
    pub rf: LpFilterResistor,
    pub rload: LpLoadResistor,
    pub rtia: RtiaSel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpFilterResistor {
    Short,
    R20k,
    R1M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpLoadResistor {
    Short,
    R100,
}

/// Static DAC state loaded while the low-power loop is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpDacConfig {
    pub vzero_code: u8,
    pub vbias_code: u16,
    pub power: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpLoopConfig {
    pub amp: LpAmpConfig,
    pub dac: LpDacConfig,
}

/// Excitation buffer attenuation ahead of the high-speed DAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcitationGain {
    X2,
    X0P25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsDacGain {
    X1,
    X0P2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsRtiaSel {
    Open,
    R200,
    R1k,
    R5k,
}

/// High-speed TIA leg used by the impedance path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsTiaConfig {
    pub rtia: HsRtiaSel,
    /// Compensation capacitor code.
    pub ctia: u8,
}

/// Sinusoidal excitation source settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformConfig {
    pub frequency: Freq<f32>,
    /// Peak-to-peak excitation amplitude at the pin. \[mV\]
    pub amplitude_pp_mv: f32,
    pub offset_mv: f32,
    pub gain_cal: bool,
    pub offset_cal: bool,
}

/// High-speed excitation/measurement loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsLoopConfig {
    pub excitation_gain: ExcitationGain,
    pub dac_gain: HsDacGain,
    pub dac_update_rate: u8,
    pub tia: HsTiaConfig,
    pub switches: SwitchMatrixConfig,
    pub waveform: WaveformConfig,
}

/// Pins the analog switch matrix can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPort {
    Open,
    Ce0,
    Se0,
    Se0Load,
    Ain1,
    Rcal0,
    Rcal1,
}

/// Excitation (d/p), sense (n/t) switch selections, plus whether the TIA
/// input is tied into the t leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchMatrixConfig {
    pub d: SwitchPort,
    pub p: SwitchPort,
    pub n: SwitchPort,
    pub t: SwitchPort,
    pub t_to_tia: bool,
}

impl SwitchMatrixConfig {
    pub const fn open() -> Self {
        Self {
            d: SwitchPort::Open,
            p: SwitchPort::Open,
            n: SwitchPort::Open,
            t: SwitchPort::Open,
            t_to_tia: false,
        }
    }
}

/// ADC programmable-gain amplifier setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgaGain {
    X1,
    X1P5,
    X2,
    X4,
    X9,
}

impl PgaGain {
    pub const fn gain(self) -> f32 {
        match self {
            Self::X1 => 1.0,
            Self::X1P5 => 1.5,
            Self::X2 => 2.0,
            Self::X4 => 4.0,
            Self::X9 => 9.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sinc3Osr {
    Osr2,
    Osr4,
    Osr5,
}

impl Sinc3Osr {
    pub const fn osr(self) -> u32 {
        match self {
            Self::Osr2 => 2,
            Self::Osr4 => 4,
            Self::Osr5 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sinc2Osr {
    Osr22,
    Osr178,
    Osr1067,
}

impl Sinc2Osr {
    pub const fn osr(self) -> u32 {
        match self {
            Self::Osr22 => 22,
            Self::Osr178 => 178,
            Self::Osr1067 => 1067,
        }
    }
}

/// ADC input multiplexer endpoints the two modes use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcMux {
    LpTiaP,
    LpTiaN,
    HsTiaP,
    HsTiaN,
}

/// Which filter stage feeds the data queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Sinc3,
    Sinc2,
    Dft,
}

/// Hardware DFT window length, as the exponent selector the engine takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DftPoints {
    P2048,
    P16384,
}

impl DftPoints {
    pub const fn points(self) -> u32 {
        match self {
            Self::P2048 => 2048,
            Self::P16384 => 16384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DftConfig {
    pub points: DftPoints,
    pub source: SampleSource,
    pub hanning: bool,
}

/// ADC front end and digital filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DspConfig {
    pub mux_p: AdcMux,
    pub mux_n: AdcMux,
    pub pga: PgaGain,
    pub sinc3_osr: Sinc3Osr,
    pub sinc2_osr: Sinc2Osr,
    pub notch_bypass: bool,
    pub dft: Option<DftConfig>,
}

/// Hardware sample queue routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoConfig {
    pub source: SampleSource,
    pub threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    LowPower,
    HighPower,
}

/// Inputs to the front-end driver's transimpedance calibration routine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtiaCalibration {
    pub rtia: RtiaSel,
    pub rcal_ohms: f32,
    pub frequency: Freq<f32>,
    pub sinc3_osr: Sinc3Osr,
    pub sinc2_osr: Sinc2Osr,
}

/// One register-level subsystem configuration, addressed as a unit through
/// the narrow driver interface.
#[derive(Debug, Clone, PartialEq)]
pub enum SubsystemConfig {
    Reference(ReferenceConfig),
    LowPowerLoop(LpLoopConfig),
    /// Amplifier leg alone; the impedance program reconfigures it mid-block.
    LowPowerAmp(LpAmpConfig),
    HighSpeedLoop(HsLoopConfig),
    SwitchMatrix(SwitchMatrixConfig),
    Dsp(DspConfig),
    Fifo(FifoConfig),
    Power(PowerMode),
}
