//! gait-orient: orient, filter and segment a session of wearable IMU recordings

mod layout;
mod plot;
mod reviewer;
mod simulate;
mod store;
mod table_io;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gait_core::SensorRole;
use gait_processing::{AcquisitionProfile, PipelineOrchestrator, SessionReport};
use gait_simulation::{ImuSimulator, SessionConfig};
use layout::{SessionLayout, TrialNaming};
use plot::TracePlotter;
use reviewer::{ConsoleReviewer, LineSource, RustylineSource, ScriptedLines};
use std::path::{Path, PathBuf};
use store::FileStore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gait-orient")]
#[command(about = "Orient, filter and segment wearable IMU gait recordings")]
struct Cli {
    /// Debug logging; overrides RUST_LOG
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Process(ProcessArgs),
    Simulate(SimulateArgs),
    #[command(about = "Print the default acquisition profile as JSON")]
    Profile,
}

fn role_parser(s: &str) -> Result<SensorRole, String> {
    s.parse().map_err(|e: gait_core::GaitError| e.to_string())
}

#[derive(clap::Args)]
#[command(about = "Process one session directory of raw recordings")]
struct ProcessArgs {
    session_dir: PathBuf,

    /// Acquisition profile JSON; defaults to the 51.2 Hz profile
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Role whose trial windows the other sensors follow
    #[arg(long, default_value = "COM", value_parser = role_parser)]
    reference: SensorRole,

    /// Device axis map, if not `<session>/DEV_axes.csv`
    #[arg(long)]
    axis_map: Option<PathBuf>,

    /// Directory of trial-boundary files whose names give the trial prefix
    #[arg(long)]
    trial_metadata: Option<PathBuf>,

    /// `_`-separated field of the metadata names holding the trial number
    #[arg(long, default_value_t = 2)]
    trial_field: usize,

    /// Read reviewer answers from a file instead of the terminal
    #[arg(long)]
    answers: Option<PathBuf>,
}

#[derive(clap::Args)]
#[command(about = "Write a synthetic session for trying the pipeline")]
struct SimulateArgs {
    out_dir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Session length in seconds
    #[arg(long, default_value_t = 100.0)]
    duration: f64,

    /// Leave out the assistive-device sensor
    #[arg(long)]
    no_device: bool,

    /// Mount the shanks aligned with the body frame
    #[arg(long)]
    aligned: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_profile(path: Option<&Path>) -> Result<AcquisitionProfile> {
    match path {
        Some(path) => AcquisitionProfile::load(path)
            .with_context(|| format!("loading profile {}", path.display())),
        None => Ok(AcquisitionProfile::default()),
    }
}

fn session_layout(args: &ProcessArgs) -> Result<SessionLayout> {
    if !args.session_dir.is_dir() {
        bail!("session directory {} does not exist", args.session_dir.display());
    }

    let mut layout = SessionLayout::new(&args.session_dir);
    if let Some(path) = &args.axis_map {
        layout = layout.with_axis_map(path);
    }
    if let Some(dir) = &args.trial_metadata {
        let naming = TrialNaming::from_dir(dir, args.trial_field)
            .with_context(|| format!("reading trial metadata in {}", dir.display()))?;
        info!(prefix = ?naming.prefix, trials = naming.trials.len(), "trial metadata");
        match naming.prefix {
            Some(prefix) => layout = layout.with_trial_prefix(prefix),
            None => warn!(dir = %dir.display(), "no trial prefix found, using plain trial names"),
        }
    }
    Ok(layout)
}

/// Run every role of a session against the files in `layout`
fn run_session<L: LineSource>(
    profile: AcquisitionProfile,
    layout: SessionLayout,
    reference: SensorRole,
    lines: L,
) -> Result<SessionReport> {
    layout
        .create_output_dirs()
        .context("creating output directories")?;

    let label = layout.label();
    let mut orchestrator = PipelineOrchestrator::new(
        profile,
        label.clone(),
        ConsoleReviewer::new(lines),
        TracePlotter::new(),
        FileStore::new(layout),
    )
    .context("invalid acquisition profile")?
    .with_reference(reference);

    let result = orchestrator.run().map_err(|failure| {
        print_report(&failure.report);
        failure
    });
    let report = result.with_context(|| format!("processing session '{}'", label))?;
    debug!(
        plots = orchestrator.plotter().plots(),
        comparisons = orchestrator.plotter().comparisons(),
        "review plots shown"
    );
    Ok(report)
}

fn print_report(report: &SessionReport) {
    println!("run {}  reference {}", report.run_id, report.reference);
    match &report.trials {
        Some(trials) => {
            for (n, window) in trials.iter() {
                println!("  trial {} {}", n, window);
            }
        }
        None => println!("  no trial windows"),
    }
    for role in &report.roles {
        let gravity = match role.gravity_plausible {
            Some(true) => "gravity ok",
            Some(false) => "gravity off",
            None => "",
        };
        println!("  {:<24} {:?} {}", role.role.to_string(), role.state, gravity);
    }
}

fn process_session(args: ProcessArgs) -> Result<()> {
    let profile = load_profile(args.profile.as_deref())?;
    let layout = session_layout(&args)?;

    let report = match &args.answers {
        Some(path) => {
            let lines = ScriptedLines::from_file(path)
                .with_context(|| format!("reading answers {}", path.display()))?;
            run_session(profile, layout, args.reference, lines)?
        }
        None => {
            let lines = RustylineSource::new().context("opening terminal")?;
            run_session(profile, layout, args.reference, lines)?
        }
    };

    print_report(&report);
    Ok(())
}

fn simulate_session(args: SimulateArgs) -> Result<()> {
    let config = SessionConfig {
        seed: args.seed,
        duration_s: args.duration,
        include_device: !args.no_device,
        random_mounting: !args.aligned,
        ..SessionConfig::default()
    };
    let session = ImuSimulator::new(config)
        .context("invalid simulation settings")?
        .generate_session()?;

    for path in simulate::write_session(&session, &args.out_dir)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => process_session(args),
        Commands::Simulate(args) => simulate_session(args),
        Commands::Profile => {
            println!("{}", AcquisitionProfile::default().to_json()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gait_core::Side;
    use gait_processing::PipelineState;
    use gait_simulation::{header_for, SimulatedSession};
    use std::fs;
    use uuid::Uuid;

    fn simulated_dir(seed: u64, include_device: bool) -> (PathBuf, SimulatedSession) {
        let dir = std::env::temp_dir().join(format!("gait-e2e-{}", Uuid::new_v4()));
        let config = SessionConfig {
            seed: Some(seed),
            duration_s: 50.0,
            include_device,
            ..SessionConfig::default()
        };
        let session = ImuSimulator::new(config).unwrap().generate_session().unwrap();
        simulate::write_session(&session, &dir).unwrap();
        (dir, session)
    }

    fn answers(dir: &Path) -> ScriptedLines {
        ScriptedLines::from_file(&dir.join(simulate::ANSWERS_FILE)).unwrap()
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "gait-orient",
            "process",
            "/data/031_S1",
            "--reference",
            "la",
            "--trial-field",
            "3",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process(args) => {
                assert_eq!(args.reference, SensorRole::Shank(Side::Left));
                assert_eq!(args.trial_field, 3);
                assert!(args.answers.is_none());
            }
            _ => panic!("expected process"),
        }

        assert!(Cli::try_parse_from(["gait-orient", "process", "/d", "--reference", "hip"]).is_err());
    }

    #[test]
    fn test_session_end_to_end() {
        let (dir, session) = simulated_dir(11, true);
        let report = run_session(
            AcquisitionProfile::default(),
            SessionLayout::new(&dir),
            SensorRole::Pelvis,
            answers(&dir),
        )
        .unwrap();

        for role in SensorRole::ALL {
            assert_eq!(report.role(role).unwrap().state, PipelineState::Persisted);
            let stem = role.file_stem();
            for file in [
                format!("Oriented/{}.csv", stem),
                format!("Oriented_Filtered/{}.csv", stem),
                format!("Trials/{}_T1.csv", stem),
                format!("Trials/{}_T2.csv", stem),
                format!("Trials/{}_trial_notes.txt", stem),
            ] {
                assert!(dir.join(&file).is_file(), "missing {}", file);
            }
        }

        let notes = fs::read_to_string(dir.join("Orientation_Parameters/LA_notes.txt")).unwrap();
        assert!(notes.starts_with("Horizontal ["));
        assert_eq!(notes.lines().count(), 2);
        assert!(dir.join("Orientation_Parameters/RA_config_orient_vertical.csv").is_file());

        let trial = table_io::read_stream(&dir.join("Trials/COM_T1.csv")).unwrap();
        assert_eq!(trial.header(), header_for(SensorRole::Pelvis).as_slice());
        let first = session.script.trials.first;
        assert!((trial.first_timestamp().unwrap() - first.start).abs() < 60.0);
        assert!((trial.last_timestamp().unwrap() - first.end).abs() < 60.0);
    }

    #[test]
    fn test_rerun_rewrites_identical_files() {
        let (dir, _) = simulated_dir(12, false);
        let run = || {
            run_session(
                AcquisitionProfile::default(),
                SessionLayout::new(&dir),
                SensorRole::Pelvis,
                answers(&dir),
            )
            .unwrap()
        };

        let first = run();
        let before = fs::read_to_string(dir.join("Trials/RA_T2.csv")).unwrap();
        let second = run();
        let after = fs::read_to_string(dir.join("Trials/RA_T2.csv")).unwrap();

        assert_eq!(before, after);
        assert_eq!(first.trials, second.trials);
        assert_eq!(
            second.role(SensorRole::AssistiveDevice).unwrap().state,
            PipelineState::Skipped
        );
    }

    #[test]
    fn test_trial_prefix_from_metadata() {
        let (dir, _) = simulated_dir(13, false);
        let metadata = dir.join("metadata");
        fs::create_dir_all(&metadata).unwrap();
        fs::write(metadata.join("031_S1_1TUG.txt"), "").unwrap();
        fs::write(metadata.join("031_S1_2TUG.txt"), "").unwrap();

        let args = ProcessArgs {
            session_dir: dir.clone(),
            profile: None,
            reference: SensorRole::Pelvis,
            axis_map: None,
            trial_metadata: Some(metadata),
            trial_field: 2,
            answers: None,
        };
        let layout = session_layout(&args).unwrap();
        run_session(AcquisitionProfile::default(), layout, SensorRole::Pelvis, answers(&dir)).unwrap();

        assert!(dir.join("Trials/031_S1_LA_T1.csv").is_file());
        assert!(dir.join("Trials/031_S1_COM_T2.csv").is_file());
    }

    #[test]
    fn test_exhausted_answers_name_the_role() {
        let (dir, _) = simulated_dir(14, false);
        let err = run_session(
            AcquisitionProfile::default(),
            SessionLayout::new(&dir),
            SensorRole::Pelvis,
            ScriptedLines::from_text(""),
        )
        .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Left shank (LA)"), "{}", message);
    }

    #[test]
    fn test_bad_axis_map_still_writes_other_trials() {
        let (dir, _) = simulated_dir(15, true);
        fs::write(dir.join("DEV_axes.csv"), "X,Z,-1\nZ,X,1\n").unwrap();

        let err = run_session(
            AcquisitionProfile::default(),
            SessionLayout::new(&dir),
            SensorRole::Pelvis,
            answers(&dir),
        )
        .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("1 of 4 sensor pipelines failed"), "{}", message);
        assert!(message.contains("DEV"), "{}", message);

        for stem in ["COM", "LA", "RA"] {
            assert!(dir.join(format!("Trials/{}_T1.csv", stem)).is_file(), "{}", stem);
            assert!(dir.join(format!("Trials/{}_T2.csv", stem)).is_file(), "{}", stem);
        }
        assert!(!dir.join("Oriented/DEV.csv").exists());
    }

    #[test]
    fn test_missing_session_dir() {
        let args = ProcessArgs {
            session_dir: PathBuf::from("/no/such/session"),
            profile: None,
            reference: SensorRole::Pelvis,
            axis_map: None,
            trial_metadata: None,
            trial_field: 2,
            answers: None,
        };
        assert!(session_layout(&args).is_err());
    }
}
