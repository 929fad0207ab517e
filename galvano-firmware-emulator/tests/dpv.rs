use anyhow::Result;
use approx::assert_relative_eq;
use galvano_driver::{
    afe::InterruptFlags,
    control::Control,
    dpv::{DpvApp, DpvConfig},
};
use galvano_firmware_emulator::EngineEmulator;
use itertools::Itertools;

/// Drives the engine cycle by cycle and services every interrupt, collecting
/// the reduced differential currents until the run reports completion.
fn run_to_completion(app: &mut DpvApp<EngineEmulator>) -> Result<Vec<f32>> {
    let mut results = Vec::new();
    for _ in 0..10_000 {
        app.afe_mut().run_cycle();
        if app.afe().flags().is_empty() {
            continue;
        }
        let mut out = [0.0f32; 8];
        let summary = app.on_interrupt(&mut out)?;
        results.extend_from_slice(&out[..summary.produced]);
        if summary.finished {
            return Ok(results);
        }
    }
    panic!("run never finished");
}

#[test]
fn staircase_currents_match_the_cell() -> Result<()> {
    let config = DpvConfig::default()
        .with_ramp(0.0, 100.0, 20.0)
        .with_pulse(50.0, true, 50.0);
    let mut app = DpvApp::with_config(EngineEmulator::new(512), config);
    app.afe_mut().model.cell_resistance_ohms = 10_000.0;

    app.init()?;
    app.control(Control::Start)?;
    let results = run_to_completion(&mut app)?;

    // 6 staircase points, each the pulse/baseline current difference:
    // 50 mV across 10 kΩ is 5 µA
    assert_eq!(6, results.len());
    for &current in &results {
        assert_relative_eq!(5.0, current, max_relative = 3e-2);
    }

    // two DAC words per point, pulse below its baseline, baseline codes
    // descending as the ramp ascends
    let words = app.afe().dac_history();
    assert_eq!(12, words.len());
    for (base, pulse) in words.iter().tuples() {
        assert!(pulse.vbias() < base.vbias());
    }
    let baselines: Vec<u16> = words.iter().step_by(2).map(|w| w.vbias()).collect();
    assert!(baselines.windows(2).all(|w| w[1] < w[0]));

    assert!(app.afe().is_halted());
    assert!(!app.afe().is_trigger_enabled());
    Ok(())
}

#[test]
fn ping_pong_refills_survive_a_small_memory() -> Result<()> {
    // 64 words leave room for 5 groups per region, forcing several
    // block-consumed refills over the 24 emitted groups
    let config = DpvConfig::default()
        .with_ramp(0.0, 110.0, 10.0)
        .with_pulse(50.0, true, 50.0)
        .with_memory(0, 64);
    let mut app = DpvApp::with_config(EngineEmulator::new(64), config);

    app.init()?;
    app.control(Control::Start)?;
    let results = run_to_completion(&mut app)?;

    assert_eq!(12, results.len());
    assert_eq!(24, app.afe().dac_history().len());
    for &current in &results {
        assert_relative_eq!(5.0, current, max_relative = 3e-2);
    }
    Ok(())
}

#[test]
fn synchronous_stop_lands_on_a_threshold_boundary() -> Result<()> {
    let mut app = DpvApp::with_config(EngineEmulator::new(512), DpvConfig::default());
    app.init()?;
    app.control(Control::Start)?;

    for _ in 0..100 {
        app.afe_mut().run_cycle();
        if app
            .afe()
            .flags()
            .contains(InterruptFlags::FIFO_THRESHOLD)
        {
            break;
        }
    }
    app.control(Control::StopSynchronous)?;

    let mut out = [0.0f32; 8];
    let summary = app.on_interrupt(&mut out)?;
    assert!(summary.finished);
    assert!(summary.produced > 0);
    assert!(!app.afe().is_trigger_enabled());
    assert!(!app.afe_mut().run_cycle());
    Ok(())
}
