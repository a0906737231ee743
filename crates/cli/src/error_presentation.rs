use std::{io, path::PathBuf};

use anyhow::Context;
use miette::Report;

const GENERATE_CONTEXT: &str = "while generating SQL";
const FILE_READ_CONTEXT: &str = "while reading configuration file";
const STDIN_READ_CONTEXT: &str = "while reading configuration from stdin";
const FILE_WRITE_CONTEXT: &str = "while writing generated SQL file";
const STDOUT_WRITE_CONTEXT: &str = "while writing generated SQL to stdout";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    ReadFile { path: PathBuf, source: io::Error },
    ReadStdin(io::Error),
    WriteFile { path: PathBuf, source: io::Error },
    WriteStdout(io::Error),
    Core(pgripple_core::Error),
}

impl From<pgripple_core::Error> for CliError {
    fn from(value: pgripple_core::Error) -> Self {
        Self::Core(value)
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::ReadFile { path, source } => {
            let context = format!("{FILE_READ_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[io] {report}")
        }
        CliError::ReadStdin(source) => {
            let report = report_with_context(source, STDIN_READ_CONTEXT);
            format!("[io] {report}")
        }
        CliError::WriteFile { path, source } => {
            let context = format!("{FILE_WRITE_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[io] {report}")
        }
        CliError::WriteStdout(source) => {
            let report = report_with_context(source, STDOUT_WRITE_CONTEXT);
            format!("[io] {report}")
        }
        CliError::Core(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, GENERATE_CONTEXT);
            format!("[{category}] {report}")
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let context = context.into();
    let anyhow_error = std::result::Result::<(), E>::Err(source)
        .context(context)
        .expect_err("context wrapping must produce an error");
    miette::miette!("{anyhow_error:#}")
}

fn core_category(error: &pgripple_core::Error) -> &'static str {
    match error {
        pgripple_core::Error::Parse(_) => "parse",
        pgripple_core::Error::Config(_) => "config",
        pgripple_core::Error::Generate(_) => "generate",
    }
}
