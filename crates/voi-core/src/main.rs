//! voi-core: value-of-information calculator for A/B experiments.
//!
//! Prints one pretty JSON document on stdout per command; logs go to stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};
use voi_config::{
    list_presets, load_engine_config, validate_engine_config, LoadedConfig,
    PresetName, ValidationError, CONFIG_SCHEMA_VERSION,
};
use voi_core::decision::{compute_cost_of_delay, CodInputs, DecisionError, EvpiInputs, EvsiInputs, NetValueInputs};
use voi_core::dispatch::{ComputeDispatcher, ComputeOutcome, ComputeRequest, Dispatch, DispatchError};
use voi_core::distribution::PriorDistribution;
use voi_core::exit_codes::ExitCode;
use voi_core::inputs::{AnalysisError, AnalysisInputs};
use voi_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};

/// Upper bound used when no --timeout is given.
const NO_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 3600);

/// Experiment value-of-information engine
#[derive(Parser)]
#[command(name = "voi-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Engine config file (JSON or TOML)
    #[arg(long, global = true, env = "VOI_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Accuracy preset applied on top of the config (fast, standard, precise)
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Override Monte Carlo sample count
    #[arg(long, global = true)]
    samples: Option<usize>,

    /// Seed for reproducible Monte Carlo runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Cancel the computation after this many seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Expected value of perfect information
    Evpi(EvpiArgs),
    /// Expected value of sample information for a two-arm test
    Evsi(EvsiArgs),
    /// Cost of delaying a Ship default while testing
    Cod(CodArgs),
    /// Net value of testing, delay costs included
    NetValue(NetValueArgs),
    /// Full analysis from a JSON input document
    Analyze(AnalyzeArgs),
    /// Engine configuration
    Config(ConfigArgs),
    /// Print version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PriorShape {
    Normal,
    StudentT,
    Uniform,
}

#[derive(Args, Debug)]
struct PriorArgs {
    /// Prior shape
    #[arg(long, value_enum, default_value = "normal")]
    shape: PriorShape,
    /// Prior mean / location (decimal lift)
    #[arg(long, allow_negative_numbers = true)]
    mu: Option<f64>,
    /// Prior standard deviation / scale
    #[arg(long)]
    sigma: Option<f64>,
    /// Student-t degrees of freedom
    #[arg(long)]
    df: Option<f64>,
    /// Uniform lower edge
    #[arg(long, allow_negative_numbers = true)]
    low: Option<f64>,
    /// Uniform upper edge
    #[arg(long, allow_negative_numbers = true)]
    high: Option<f64>,
}

impl PriorArgs {
    fn to_prior(&self) -> Result<PriorDistribution, String> {
        let need = |value: Option<f64>, name: &str| {
            value.ok_or_else(|| format!("--{} is required for a {:?} prior", name, self.shape))
        };
        Ok(match self.shape {
            PriorShape::Normal => PriorDistribution::Normal {
                mu: need(self.mu, "mu")?,
                sigma: need(self.sigma, "sigma")?,
            },
            PriorShape::StudentT => PriorDistribution::StudentT {
                mu: need(self.mu, "mu")?,
                sigma: need(self.sigma, "sigma")?,
                df: need(self.df, "df")?,
            },
            PriorShape::Uniform => PriorDistribution::Uniform {
                low: need(self.low, "low")?,
                high: need(self.high, "high")?,
            },
        })
    }
}

#[derive(Args, Debug)]
struct EvpiArgs {
    /// Dollars per unit of lift per year
    #[arg(long)]
    k: f64,
    /// Shipping threshold (decimal lift)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    threshold: f64,
    #[command(flatten)]
    prior: PriorArgs,
}

#[derive(Args, Debug)]
struct EvsiArgs {
    #[command(flatten)]
    evpi: EvpiArgs,
    /// Baseline conversion rate
    #[arg(long)]
    baseline_rate: f64,
    /// Control arm sample size
    #[arg(long)]
    n_control: u64,
    /// Variant arm sample size
    #[arg(long)]
    n_variant: u64,
}

impl EvsiArgs {
    fn to_inputs(&self) -> Result<EvsiInputs, String> {
        Ok(EvsiInputs {
            k: self.evpi.k,
            baseline_conversion_rate: self.baseline_rate,
            threshold: self.evpi.threshold,
            prior: self.evpi.prior.to_prior()?,
            n_control: self.n_control,
            n_variant: self.n_variant,
        })
    }
}

#[derive(Args, Debug)]
struct TimingArgs {
    /// Test duration in days
    #[arg(long, default_value_t = 0.0)]
    test_days: f64,
    /// Share of traffic in the variant arm
    #[arg(long, default_value_t = 0.5)]
    variant_fraction: f64,
    /// Days between test end and acting on the result
    #[arg(long, default_value_t = 0.0)]
    latency_days: f64,
}

#[derive(Args, Debug)]
struct CodArgs {
    #[arg(long)]
    k: f64,
    /// Post-truncation prior mean lift
    #[arg(long, allow_negative_numbers = true)]
    mu: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    threshold: f64,
    #[command(flatten)]
    timing: TimingArgs,
}

#[derive(Args, Debug)]
struct NetValueArgs {
    #[command(flatten)]
    evsi: EvsiArgs,
    #[command(flatten)]
    timing: TimingArgs,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input document path, or - for stdin
    #[arg(long, short)]
    input: String,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective engine config and where it came from
    Show,
    /// Validate a config file (defaults to the resolved one)
    Validate { path: Option<PathBuf> },
    /// List accuracy presets
    Presets,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => cli.global.log_level,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(level, cli.global.log_format));

    let ctx = LogContext::new(generate_run_id());
    let span = ctx.span(Stage::Init);
    let _guard = span.enter();
    info!(event = event_names::RUN_STARTED, "voi-core started");

    let exit_code = match &cli.command {
        Commands::Evpi(args) => run_evpi(&cli.global, args),
        Commands::Evsi(args) => run_evsi(&cli.global, args),
        Commands::Cod(args) => run_cod(args),
        Commands::NetValue(args) => run_net_value(&cli.global, args),
        Commands::Analyze(args) => run_analyze(&cli.global, args),
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Version => print_version(),
    };

    info!(event = event_names::RUN_FINISHED, exit_code = exit_code.as_i32(), "voi-core finished");
    std::process::exit(exit_code.as_i32());
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::Clean
        }
        Err(e) => fail(ExitCode::InternalError, &format!("failed to serialize output: {}", e)),
    }
}

fn fail(code: ExitCode, message: &str) -> ExitCode {
    error!(event = event_names::INTERNAL_ERROR, code = code.code_name(), "{}", message);
    let payload = serde_json::json!({
        "status": "error",
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "error": {
            "code": code.as_i32(),
            "name": code.code_name(),
            "message": message,
        }
    });
    eprintln!("{}", payload);
    code
}

fn config_failure(err: &ValidationError) -> ExitCode {
    let code = match err {
        ValidationError::IoError(_) => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    };
    error!(event = event_names::CONFIG_ERROR, error_code = err.code(), "{}", err);
    fail(code, &err.to_string())
}

fn load_config(global: &GlobalOpts) -> Result<LoadedConfig, ExitCode> {
    let mut loaded = load_engine_config(global.config.as_deref()).map_err(|e| config_failure(&e))?;
    if loaded.path.is_none() {
        info!(event = event_names::CONFIG_DEFAULT_USED, "using built-in engine config");
    } else {
        info!(
            event = event_names::CONFIG_LOADED,
            source = %loaded.source,
            path = ?loaded.path,
            "engine config loaded"
        );
    }

    if let Some(name) = &global.preset {
        let Some(preset) = PresetName::parse(name) else {
            return Err(fail(ExitCode::ArgsError, &format!("unknown preset: {}", name)));
        };
        loaded.config.apply_preset(preset);
    }
    if let Some(samples) = global.samples {
        loaded.config.monte_carlo.num_samples = samples;
    }
    if let Some(seed) = global.seed {
        loaded.config.monte_carlo.seed = Some(seed);
    }
    validate_engine_config(&loaded.config).map_err(|e| config_failure(&e))?;
    Ok(loaded)
}

fn timeout(global: &GlobalOpts) -> Result<Duration, ExitCode> {
    match global.timeout {
        None => Ok(NO_TIMEOUT),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| fail(ExitCode::ArgsError, &format!("invalid --timeout: {}", secs))),
    }
}

fn dispatch_failure(err: &DispatchError) -> ExitCode {
    let code = match err {
        DispatchError::Timeout(_) => ExitCode::TimeoutError,
        DispatchError::Decision(e) | DispatchError::Analysis(AnalysisError::Decision(e)) => {
            match e {
                DecisionError::InvalidInput { .. } | DecisionError::Prior(_) => ExitCode::ArgsError,
                DecisionError::Cancelled => ExitCode::InternalError,
            }
        }
        DispatchError::Analysis(AnalysisError::Input(_)) => ExitCode::ArgsError,
        DispatchError::Spawn(_)
        | DispatchError::Disconnected
        | DispatchError::WorkerPanicked
        | DispatchError::NothingPending => ExitCode::InternalError,
    };
    fail(code, &err.to_string())
}

/// Run one request through the dispatcher, waiting at most `--timeout`.
fn compute(global: &GlobalOpts, request: ComputeRequest) -> Result<ComputeOutcome, ExitCode> {
    let loaded = load_config(global)?;
    let wait = timeout(global)?;
    let mut dispatcher = ComputeDispatcher::new(loaded.config);
    let outcome = match dispatcher.submit(request) {
        Ok(Dispatch::Ready(result)) => result,
        Ok(Dispatch::Pending(_)) => dispatcher.wait_latest(wait),
        Err(e) => Err(e),
    };
    outcome.map_err(|e| dispatch_failure(&e))
}

fn finish(result: Result<ComputeOutcome, ExitCode>) -> ExitCode {
    match result {
        Ok(outcome) => emit(&outcome),
        Err(code) => code,
    }
}

fn run_evpi(global: &GlobalOpts, args: &EvpiArgs) -> ExitCode {
    let prior = match args.prior.to_prior() {
        Ok(p) => p,
        Err(msg) => return fail(ExitCode::ArgsError, &msg),
    };
    finish(compute(
        global,
        ComputeRequest::Evpi(EvpiInputs {
            k: args.k,
            prior,
            threshold: args.threshold,
        }),
    ))
}

fn run_evsi(global: &GlobalOpts, args: &EvsiArgs) -> ExitCode {
    match args.to_inputs() {
        Ok(inputs) => finish(compute(global, ComputeRequest::Evsi(inputs))),
        Err(msg) => fail(ExitCode::ArgsError, &msg),
    }
}

fn run_cod(args: &CodArgs) -> ExitCode {
    let inputs = CodInputs {
        k: args.k,
        mu: args.mu,
        threshold: args.threshold,
        test_duration_days: args.timing.test_days,
        variant_fraction: args.timing.variant_fraction,
        decision_latency_days: args.timing.latency_days,
    };
    match compute_cost_of_delay(&inputs) {
        Ok(result) => emit(&result),
        Err(e) => fail(ExitCode::ArgsError, &e.to_string()),
    }
}

fn run_net_value(global: &GlobalOpts, args: &NetValueArgs) -> ExitCode {
    let evsi = match args.evsi.to_inputs() {
        Ok(inputs) => inputs,
        Err(msg) => return fail(ExitCode::ArgsError, &msg),
    };
    let inputs = NetValueInputs {
        k: evsi.k,
        baseline_conversion_rate: evsi.baseline_conversion_rate,
        threshold: evsi.threshold,
        prior: evsi.prior,
        n_control: evsi.n_control,
        n_variant: evsi.n_variant,
        test_duration_days: args.timing.test_days,
        variant_fraction: args.timing.variant_fraction,
        decision_latency_days: args.timing.latency_days,
    };
    finish(compute(global, ComputeRequest::NetValue(inputs)))
}

fn read_input(source: &str) -> std::io::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(Path::new(source))
    }
}

fn run_analyze(global: &GlobalOpts, args: &AnalyzeArgs) -> ExitCode {
    let text = match read_input(&args.input) {
        Ok(text) => text,
        Err(e) => return fail(ExitCode::IoError, &format!("failed to read {}: {}", args.input, e)),
    };
    let inputs: AnalysisInputs = match serde_json::from_str(&text) {
        Ok(inputs) => inputs,
        Err(e) => return fail(ExitCode::ArgsError, &format!("invalid analysis input: {}", e)),
    };
    finish(compute(global, ComputeRequest::Analysis(Box::new(inputs))))
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => match load_config(global) {
            Ok(loaded) => emit(&config_view(&loaded)),
            Err(code) => code,
        },
        ConfigCommands::Validate { path } => {
            let target = path.as_deref().or(global.config.as_deref());
            match load_engine_config(target) {
                Ok(loaded) => emit(&serde_json::json!({
                    "status": "valid",
                    "source": loaded.source.to_string(),
                    "path": loaded.path.as_ref().map(|p| p.display().to_string()),
                    "schema_version": loaded.config.schema_version,
                })),
                Err(e) => config_failure(&e),
            }
        }
        ConfigCommands::Presets => emit(&list_presets()),
    }
}

fn config_view(loaded: &LoadedConfig) -> serde_json::Value {
    serde_json::json!({
        "source": loaded.source.to_string(),
        "path": loaded.path.as_ref().map(|p| p.display().to_string()),
        "config": &loaded.config,
    })
}

fn print_version() -> ExitCode {
    emit(&serde_json::json!({
        "voi_core_version": env!("CARGO_PKG_VERSION"),
        "config_schema_version": CONFIG_SCHEMA_VERSION,
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    }))
}
