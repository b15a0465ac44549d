//! Orient, filter and segment one simulated left-shank recording
//!
//! Walks through the engine stages without the session orchestrator:
//! calibration, rotation, zero-phase filtering and trial segmentation.

use gait_core::{GaitResult, SensorRole, Side, TimeWindow};
use gait_processing::{derive_rotation, AcquisitionProfile, ProcessingChain, SignalFilterStage, TrialSegmenter};
use gait_simulation::{ImuSimulator, SessionConfig};

fn main() -> GaitResult<()> {
    println!("=== Gait orientation basic usage ===\n");

    let mut simulator = ImuSimulator::new(SessionConfig {
        seed: Some(2024),
        ..SessionConfig::default()
    })?;
    let session = simulator.generate_session()?;
    let role = SensorRole::Shank(Side::Left);
    let Some(sensor) = session.sensors.iter().find(|s| s.role == role) else {
        println!("no {} recorded", role);
        return Ok(());
    };
    let raw = &sensor.stream;
    println!("1. Loaded {} samples from {}", raw.len(), role);

    // Calibration windows, kept clear of the pose transitions
    let inset = |w: &TimeWindow| TimeWindow::new(w.start + 300.0, w.end - 300.0);
    let timestamps = raw.timestamps();
    let horizontal = inset(&session.script.calibration.horizontal)?.snapped(&timestamps)?;
    let vertical = inset(&session.script.calibration.vertical)?.snapped(&timestamps)?;

    let outcome = derive_rotation(&raw.slice(&horizontal)?, &raw.slice(&vertical)?)?;
    println!("2. Rotation from horizontal {} and vertical {}:", horizontal, vertical);
    println!("{}", outcome.rotation);
    println!(
        "   rest magnitudes {:.3} / {:.3} m/s^2",
        outcome.horizontal_norm, outcome.vertical_norm
    );

    let profile = AcquisitionProfile::default();
    let stage = SignalFilterStage::new(&profile)?;
    let outputs = ProcessingChain::new()
        .then(outcome.rotation)
        .then(stage.for_class(role.sensor_class()))
        .run(raw)?;
    let filtered = &outputs[outputs.len() - 1];
    println!("3. Oriented and filtered {} stages", outputs.len());

    let segmenter = TrialSegmenter::from_profile(&profile);
    let segments = segmenter.segment_reference(filtered, &session.script.trials)?;
    println!("4. Segmented with a {} ms offset:", segmenter.offset());
    for (n, window, stream) in segments.iter() {
        println!("   trial {} {} ({} samples)", n, window, stream.len());
    }

    println!("\n=== Done ===");
    Ok(())
}
