use crate::output::{print_json, print_table};
use clap::Args;
use intake_core::{Alliance, Config};
use intake_runtime::{
    Clock, Collaborators, IntakeSystem, ScriptedHueSensor, ScriptedInput, SimActuator,
    SimActuatorConfig, SystemReport, TokioClock, TracingSink,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Length of the simulated driver-control period
    #[arg(long, default_value_t = 2000)]
    pub duration_ms: u64,

    /// Jam the intake this many milliseconds into the run
    #[arg(long)]
    pub jam_at_ms: Option<u64>,

    /// Keep the jam for this long even through reversals (default: the
    /// first reversal clears it)
    #[arg(long, requires = "jam_at_ms")]
    pub jam_for_ms: Option<u64>,

    /// An opposing-alliance object reaches the sensor at this offset
    /// (repeatable)
    #[arg(long = "opposing-at-ms")]
    pub opposing_at_ms: Vec<u64>,

    /// Alliance for this match (overrides the config)
    #[arg(long)]
    pub alliance: Option<Alliance>,
}

pub fn run(config: Config, args: SimulateArgs, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(simulate(config, &args))?;

    if json {
        return print_json(&report);
    }
    print_summary(&report);
    Ok(())
}

async fn simulate(config: Config, args: &SimulateArgs) -> anyhow::Result<SystemReport> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let duration = Duration::from_millis(args.duration_ms);

    let motor = SimActuator::new(Arc::clone(&clock), SimActuatorConfig::default());
    if let Some(at) = args.jam_at_ms {
        motor.schedule_jam(
            Duration::from_millis(at),
            args.jam_for_ms.map(Duration::from_millis),
        );
    }

    let alliance = args.alliance.unwrap_or(config.alliance);
    let opposing_hue = match alliance.opponent() {
        Alliance::Red => config.colors.red.center(),
        Alliance::Blue => config.colors.blue.center(),
    };
    // Long enough that at least one sort poll sees the object.
    let dwell = config.sort.poll_interval() * 2;
    let sensor = args
        .opposing_at_ms
        .iter()
        .fold(ScriptedHueSensor::new(Arc::clone(&clock)), |s, &at| {
            s.with_object(Duration::from_millis(at), dwell, opposing_hue)
        });

    let input = ScriptedInput::new(Arc::clone(&clock)).hold(
        config.operator.intake_button,
        Duration::ZERO,
        duration,
    );

    let mut system = IntakeSystem::new(
        &config,
        Arc::clone(&clock),
        Collaborators {
            actuator: Box::new(motor),
            sensor: Box::new(sensor),
            input: Box::new(input),
            sink: Arc::new(TracingSink),
        },
    );
    if let Some(alliance) = args.alliance {
        system.alliance().set(alliance)?;
    }

    info!(
        duration_ms = args.duration_ms,
        alliance = %system.alliance().get(),
        "simulation started"
    );
    let report = system.run_for(duration).await;
    info!(elapsed_ms = report.elapsed_ms, "simulation finished");
    Ok(report)
}

fn print_summary(report: &SystemReport) {
    let holder = report
        .arbiter
        .holder
        .map_or_else(|| "-".to_string(), |a| a.to_string());
    let rows = vec![
        ("alliance", report.alliance.to_string()),
        ("elapsed_ms", report.elapsed_ms.to_string()),
        ("stall recoveries", report.monitor.recoveries.to_string()),
        ("ejects started", report.sort.ejects_started.to_string()),
        ("ejects completed", report.sort.ejects_completed.to_string()),
        ("ejects abandoned", report.sort.ejects_abandoned.to_string()),
        ("commands applied", report.arbiter.applied.to_string()),
        ("commands rejected", report.arbiter.rejected.to_string()),
        (
            "final velocity",
            format!("{:.2}", report.arbiter.commanded_velocity),
        ),
        ("holder", holder),
    ];
    print_table(
        &["METRIC", "VALUE"],
        rows.into_iter()
            .map(|(k, v)| vec![k.to_string(), v])
            .collect(),
    );
}
