//! The command line interface for the reporting tool.
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{OUTPUT_DIRECTORY_ROOT, create_output_directory, get_output_dir, write_report};
use crate::report::{check_registry, load_scenario, run_report};
use crate::settings::Settings;
use crate::tables::default_registry;
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the reporting tool.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files.
    ///
    /// With several scenarios, each scenario's output is written to a subfolder.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Report one or more scenarios, one after another.
    Run {
        /// Paths to the scenario directories.
        #[arg(required = true)]
        scenario_dirs: Vec<PathBuf>,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a scenario and its report configuration.
    Validate {
        /// The path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                scenario_dirs,
                opts,
            } => handle_run_command(&scenario_dirs, &opts, None),
            Self::Validate { scenario_dir } => handle_validate_command(&scenario_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ message-report --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Work out the output folder for each scenario
fn get_output_dirs(scenario_dirs: &[PathBuf], output_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let (Some(output_dir), [_]) = (output_dir, scenario_dirs) {
        return Ok(vec![output_dir.to_path_buf()]);
    }

    let output_root = output_dir.unwrap_or(Path::new(OUTPUT_DIRECTORY_ROOT));
    let output_dirs: Vec<PathBuf> = scenario_dirs
        .iter()
        .map(|dir| get_output_dir(dir, output_root))
        .try_collect()?;
    ensure!(
        output_dirs.iter().all_unique(),
        "Scenario directories must have different names"
    );

    Ok(output_dirs)
}

/// Handle the `run` command.
pub fn handle_run_command(
    scenario_dirs: &[PathBuf],
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    let output_dirs = get_output_dirs(scenario_dirs, opts.output_dir.as_deref())?;
    let allow_overwrite = opts.overwrite || settings.overwrite;
    let mut overwritten = Vec::new();
    for output_dir in &output_dirs {
        if create_output_directory(output_dir, allow_overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_dir.display()
            )
        })? {
            overwritten.push(output_dir);
        }
    }

    // Log files go with the output of a single scenario, or in the output root for several
    let log_dir = match (output_dirs.as_slice(), opts.output_dir.as_deref()) {
        ([output_dir], _) => output_dir.clone(),
        (_, Some(output_dir)) => output_dir.to_path_buf(),
        _ => PathBuf::from(OUTPUT_DIRECTORY_ROOT),
    };
    fs::create_dir_all(&log_dir)?;
    log::init(Some(settings.log_level.as_str()), Some(&log_dir))
        .context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    for output_dir in overwritten {
        warn!("Output folder will be overwritten: {}", output_dir.display());
    }

    let registry = default_registry()?;
    for (scenario_dir, output_dir) in scenario_dirs.iter().zip(&output_dirs) {
        info!("Reporting scenario in {}", scenario_dir.display());
        info!("Output folder: {}", output_dir.display());

        // Each scenario gets a fresh context, discarded once the scenario is written
        let (store, ctx) = load_scenario(scenario_dir)
            .with_context(|| format!("Failed to load scenario {}.", scenario_dir.display()))?;
        let output = run_report(ctx, &store, &registry)
            .with_context(|| format!("Failed to report scenario {}.", scenario_dir.display()))?;
        write_report(output_dir, &output.table, &output.warnings)?;
        write_metadata(
            output_dir,
            scenario_dir,
            &output.model,
            &output.scenario,
            output.warnings.len(),
        )?;
        info!(
            "Wrote {} rows for {}/{}",
            output.table.len(),
            output.model,
            output.scenario
        );
    }
    info!("Reporting complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_dir: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(settings.log_level.as_str()), None).context("Failed to initialise logging.")?;

    // Load/validate the scenario
    let (_, ctx) = load_scenario(scenario_dir).context("Failed to validate scenario.")?;
    check_registry(&ctx, &default_registry()?).context("Failed to validate scenario.")?;
    info!("Scenario validation successful!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use tempfile::tempdir;

    #[test]
    fn test_get_output_dirs() {
        let dir = tempdir().unwrap();
        let scenario_dirs: Vec<PathBuf> = ["baseline", "ssp2"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::create_dir(&path).unwrap();
                path
            })
            .collect();

        // A single scenario is written straight into the output folder
        assert_eq!(
            get_output_dirs(&scenario_dirs[..1], Some(Path::new("out"))).unwrap(),
            [PathBuf::from("out")]
        );

        assert_eq!(
            get_output_dirs(&scenario_dirs, Some(Path::new("out"))).unwrap(),
            [PathBuf::from("out/baseline"), PathBuf::from("out/ssp2")]
        );
        assert_eq!(
            get_output_dirs(&scenario_dirs, None).unwrap(),
            [
                Path::new(OUTPUT_DIRECTORY_ROOT).join("baseline"),
                Path::new(OUTPUT_DIRECTORY_ROOT).join("ssp2")
            ]
        );
    }

    #[test]
    fn test_get_output_dirs_same_name() {
        let dir = tempdir().unwrap();
        let scenario_dir = dir.path().join("baseline");
        fs::create_dir(&scenario_dir).unwrap();
        assert_error!(
            get_output_dirs(&[scenario_dir.clone(), scenario_dir], None),
            "Scenario directories must have different names"
        );
    }
}
