mod error_presentation;

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Args, Parser, Subcommand};

use error_presentation::{CliError, CliResult, render_runtime_error};

#[derive(Parser)]
#[command(
    name = "pgripple",
    version,
    about = "Generate PostgreSQL triggers that keep derived tables in sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate incremental aggregate maintenance DDL
    CreateAgg(GenerateArgs),
    /// Generate join/denormalization maintenance DDL
    CreateJoin(GenerateArgs),
    /// Generate key propagation DDL
    CreateKey(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Configuration document (JSON or YAML); `-` reads standard input
    #[arg(long, default_value = "-")]
    schema: String,
    /// Destination for the generated SQL; `-` writes standard output
    #[arg(long, default_value = "-")]
    output: String,
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(&cli) {
        eprintln!("{}", render_runtime_error(error));
        process::exit(1);
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let (args, generate): (_, fn(&str) -> pgripple_core::Result<String>) = match &cli.command {
        Command::CreateAgg(args) => (args, pgripple_core::create_agg),
        Command::CreateJoin(args) => (args, pgripple_core::create_join),
        Command::CreateKey(args) => (args, pgripple_core::create_key),
    };

    let input = read_schema(&args.schema)?;
    // Generation completes in memory before the sink is touched, so a
    // failure never truncates an existing output file.
    let script = generate(&input)?;
    write_output(&args.output, &script)
}

fn read_schema(path: &str) -> CliResult<String> {
    if path == "-" {
        return io::read_to_string(io::stdin()).map_err(CliError::ReadStdin);
    }

    fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: PathBuf::from(path),
        source,
    })
}

fn write_output(path: &str, script: &str) -> CliResult<()> {
    if path == "-" {
        return io::stdout()
            .write_all(script.as_bytes())
            .map_err(CliError::WriteStdout);
    }

    let destination = Path::new(path);
    replace_file(destination, script).map_err(|source| CliError::WriteFile {
        path: destination.to_path_buf(),
        source,
    })
}

/// Write through a sibling temporary file and rename into place, so the
/// destination is never left truncated.
fn replace_file(destination: &Path, script: &str) -> io::Result<()> {
    let directory = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(directory)?;
    file.write_all(script.as_bytes())?;
    file.persist(destination).map_err(|error| error.error)?;
    Ok(())
}
