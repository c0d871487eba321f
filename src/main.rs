use std::fs::read_to_string;
use std::path::PathBuf;

use capflp::generator::{Generator, GeneratorConfig};
use capflp::{CostPolicy, Problem, solver};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "capflp")]
#[command(
    about = "Capacitated facility location with partial demand fulfillment",
    long_about = None
)]
struct Cli {
    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance file and print the report as YAML
    Solve {
        /// The instance file
        file: PathBuf,
        /// Solver backend
        #[arg(long)]
        solver: Option<String>,
        /// Wall-clock limit in seconds, overriding the instance file
        #[arg(long)]
        time_limit: Option<f64>,
    },
    /// Generate a random instance and print it as YAML
    Generate {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Generator settings file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Cost policy, overriding the settings file
        #[arg(long)]
        cost: Option<CostPolicy>,
    },
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Solve {
            file,
            solver: backend,
            time_limit,
        } => {
            let buf = read_to_string(file)?;
            let mut problem: Problem = serde_yaml::from_str(&buf)?;
            if time_limit.is_some() {
                problem.solver.time_limit = time_limit;
            }

            let solver = match backend {
                Some(name) => solver::backend(&name).ok_or_else(|| {
                    format!(
                        "unknown solver '{name}', available: {}",
                        solver::backends().join(", ")
                    )
                })?,
                None => solver::default_backend()?,
            };
            let report = problem.solve_with(solver.as_ref())?;

            println!("{}", serde_yaml::to_string(&report)?);
        }
        Commands::Generate { seed, config, cost } => {
            let mut settings: GeneratorConfig = match config {
                Some(path) => serde_yaml::from_str(&read_to_string(path)?)?,
                None => GeneratorConfig::default(),
            };
            if let Some(cost) = cost {
                settings.cost = cost;
            }
            let problem = Generator::new(settings, seed)?.generate()?;

            println!("{}", serde_yaml::to_string(&problem)?);
        }
    }
    Ok(())
}
