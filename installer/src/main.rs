//! ffpkg CLI entrypoint.
//!
//! Parses arguments, loads configuration, wires the real HTTP, GnuPG, and
//! tar implementations into the command pipeline, and maps the outcome to
//! an exit status.

use clap::Parser;
use ffpkg::cli::{Cli, Command};
use ffpkg::config::Config;
use ffpkg::dirs::{BaseDirs, SystemBaseDirs, resolve_cache_dir};
use ffpkg::error::{InstallerError, Result};
use ffpkg::install::TarXzExtractor;
use ffpkg::output::write_stderr_line;
use ffpkg::pipeline::{PipelineContext, run_fetch, run_install, run_status, run_verify};
use ffpkg::release::source::HttpReleaseSource;
use ffpkg::verification::GpgVerifier;
use log::debug;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Route `log` records to stderr, honouring `RUST_LOG` over `-v`/`-q`.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ffpkg={}", cli.log_level())));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
    {
        debug!("keeping existing log subscriber: {e}");
    }
}

fn run(
    cli: &Cli,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let context = PipelineContext {
        config: &config,
        quiet: cli.quiet,
    };

    match &cli.command {
        Command::Fetch => {
            let cache_dir = cache_dir_for(&config, dirs)?;
            let source = HttpReleaseSource::new(&config.network);
            run_fetch(&context, &cache_dir, &source, &verifier_for(&config), stderr)?;
        }
        Command::Verify(args) => {
            run_verify(
                &context,
                args.tarball.as_std_path(),
                args.sig.as_std_path(),
                &verifier_for(&config),
                stdout,
                stderr,
            )?;
        }
        Command::Install(args) => {
            run_install(&context, args.cache.as_std_path(), &TarXzExtractor, stderr)?;
        }
        Command::Status(args) => run_status(&context, args.json, stdout)?,
    }
    Ok(())
}

fn cache_dir_for(config: &Config, dirs: &dyn BaseDirs) -> Result<PathBuf> {
    resolve_cache_dir(config, dirs).ok_or(InstallerError::NoCacheDir)
}

fn verifier_for(config: &Config) -> GpgVerifier {
    GpgVerifier::system(&config.verifier.program, config.verifier.timeout())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
