use anyhow::Result;
use approx::assert_relative_eq;
use galvano_driver::{
    afe::SwitchMatrixConfig,
    common::kHz,
    control::Control,
    eis::{EisApp, EisConfig, PolarImpedance},
};
use galvano_firmware_emulator::EngineEmulator;
use num_complex::Complex32;

fn collect_points(
    app: &mut EisApp<EngineEmulator>,
) -> Result<(Vec<PolarImpedance>, Vec<f32>)> {
    let mut points = Vec::new();
    let mut freqs = Vec::new();
    for _ in 0..1_000 {
        app.afe_mut().run_cycle();
        if app.afe().flags().is_empty() {
            continue;
        }
        let mut out = [PolarImpedance {
            magnitude: 0.0,
            phase: 0.0,
        }; 4];
        let summary = app.on_interrupt(&mut out)?;
        for point in &out[..summary.produced] {
            points.push(*point);
            freqs.push(app.current_frequency().hz());
        }
        if summary.finished {
            return Ok((points, freqs));
        }
    }
    panic!("sweep never finished");
}

#[test]
fn sweep_recovers_the_sensor_impedance() -> Result<()> {
    let config = EisConfig::default().with_point_limit(Some(3));
    let mut app = EisApp::with_config(EngineEmulator::new(512), config);
    app.afe_mut().model.sensor = Complex32::new(1500.0, -800.0);

    app.init()?;
    app.control(Control::Start)?;
    let (points, freqs) = collect_points(&mut app)?;

    // ratiometric reduction cancels the load and the TIA path
    assert_eq!(3, points.len());
    for point in &points {
        assert_relative_eq!(1700.0, point.magnitude, max_relative = 1e-2);
        assert_relative_eq!((-800.0f32).atan2(1500.0), point.phase, epsilon = 2e-2);
    }

    // data frequencies trail the generator by one point
    assert_eq!(vec![1000.0, 1990.0, 2980.0], freqs);
    let pushed: Vec<f32> = app
        .afe()
        .waveform_history()
        .iter()
        .map(|f| f.hz())
        .collect();
    assert_eq!(vec![1000.0, 1990.0, 2980.0], pushed);

    // measurement program parks the matrix open between points
    assert_eq!(SwitchMatrixConfig::open(), app.afe().route());
    assert!(!app.afe().is_trigger_enabled());
    Ok(())
}

#[test]
fn fixed_frequency_run_never_touches_the_generator() -> Result<()> {
    let config = EisConfig::default()
        .with_fixed_frequency(10.0 * kHz)
        .with_point_limit(Some(2));
    let mut app = EisApp::with_config(EngineEmulator::new(512), config);
    app.afe_mut().model.sensor = Complex32::new(500.0, 0.0);

    app.init()?;
    app.control(Control::Start)?;
    let (points, freqs) = collect_points(&mut app)?;

    assert_eq!(2, points.len());
    for point in &points {
        assert_relative_eq!(500.0, point.magnitude, max_relative = 1e-2);
        assert_relative_eq!(0.0, point.phase, epsilon = 2e-2);
    }
    assert_eq!(vec![10_000.0, 10_000.0], freqs);
    // only the init-time programming, no sweep updates
    assert_eq!(1, app.afe().waveform_history().len());
    Ok(())
}
