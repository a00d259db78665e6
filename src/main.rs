use clap::Parser;
use furrow_flow::config::ModelConfig;
use furrow_flow::error::Result;
use furrow_flow::input::read_probes_file;
use furrow_flow::output::{self, Recorder};
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Unsteady furrow flow with solute transport and infiltration
#[derive(Parser, Debug)]
#[command(name = "furrow_flow", version)]
struct Cli {
    /// Model description: TOML (.toml) or whitespace tokens
    model_file: PathBuf,

    /// Final station, state and bed level of every node
    variables_file: PathBuf,

    /// Momentum balance terms of every interface
    flows_file: Option<PathBuf>,

    /// Time and advance front after every step
    advance_file: Option<PathBuf>,

    /// Probe stations to sample
    #[arg(requires = "probes_output_file")]
    probes_file: Option<PathBuf>,

    /// Depth and concentration at the probes every output interval
    #[arg(requires = "probes_file")]
    probes_output_file: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<()> {
    let config = ModelConfig::from_file(&cli.model_file)?;
    let mut model = config.build()?;

    let mut recorder = Recorder::default();
    if let Some(path) = &cli.advance_file {
        recorder.advance = Some(Box::new(output::create(path)?));
    }
    if let (Some(stations), Some(path)) = (&cli.probes_file, &cli.probes_output_file) {
        model.probes = read_probes_file(stations)?;
        recorder.probes = Some(Box::new(output::create(path)?));
    }

    let summary = model.run(&mut recorder)?;
    recorder.flush()?;
    info!(
        "{} steps, water balance error {:e} m³",
        summary.steps,
        summary.water_balance_error()
    );

    let mut variables = output::create(&cli.variables_file)?;
    output::write_variables(&model.mesh, &mut variables)?;
    variables.flush()?;
    if let Some(path) = &cli.flows_file {
        let mut flows = output::create(path)?;
        output::write_flows(&model.mesh, &mut flows)?;
        flows.flush()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("furrow_flow: {err}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn outputs_are_optional() {
        let cli = Cli::try_parse_from(["furrow_flow", "model.toml", "variables.out"]).unwrap();
        assert_eq!(cli.model_file, PathBuf::from("model.toml"));
        assert!(cli.flows_file.is_none());
        assert!(cli.probes_file.is_none());

        let args = ["furrow_flow", "m", "v", "f", "a", "stations", "probes.out"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.advance_file, Some(PathBuf::from("a")));
        assert_eq!(cli.probes_output_file, Some(PathBuf::from("probes.out")));
    }

    #[test]
    fn stations_need_an_output_file() {
        let args = ["furrow_flow", "m", "v", "f", "a", "stations"];
        assert!(Cli::try_parse_from(args).is_err());
        assert!(Cli::try_parse_from(["furrow_flow", "m"]).is_err());
    }
}
