use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use pif_core::progress::progress_enabled;
use pif_core::{Config, InstallObserver, InstallRequest, NoopObserver};

mod cli;
mod output;
mod style;

use cli::PifCli;
use output::{HumanObserver, OutputOptions};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PifCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
    };
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));
    let request = InstallRequest {
        package: cli.package.clone(),
        project_dir: cli.project_dir.clone(),
        python: cli.python.clone(),
        dry_run: cli.dry_run,
    };

    let outcome = if opts.human() {
        output::print_banner(&style, &request.package);
        let progress = progress_enabled(Config::from_env().progress());
        let observer = HumanObserver::new(&style, progress);
        run(&request, &observer)
    } else {
        run(&request, &NoopObserver)
    };
    let code = output::emit_output(opts, &style, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn run(request: &InstallRequest, observer: &dyn InstallObserver) -> pif_core::ExecutionOutcome {
    output::core_call(|| pif_core::install_package(request, observer))
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("pif={level},pif_cli={level},pif_core={level},pif_python={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
