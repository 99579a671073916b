use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const PIF_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nArguments:\n{positionals}\n\nOptions:\n{options}\n";

pub const PIF_BEFORE_HELP: &str = concat!(
    "pif ",
    env!("CARGO_PKG_VERSION"),
    " – Fallback installer for Python packages\n\n",
    "\x1b[1;36mMethods, tried in order\x1b[0m\n",
    "  1  pip install -e .           editable install (60s timeout)\n",
    "  2  pip install .              standard install (60s timeout)\n",
    "  3  python setup.py develop    legacy develop install (30s timeout)\n",
    "  4  PYTHONPATH                 put the project directory on the search path\n\n",
    "A method counts only when the package imports afterwards.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "pif",
    author,
    version,
    before_help = PIF_BEFORE_HELP,
    help_template = PIF_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct PifCli {
    #[arg(
        value_name = "PACKAGE",
        help = "Importable module name to install and verify (e.g. wikiextractor)"
    )]
    pub package: String,
    #[arg(
        long,
        value_name = "DIR",
        help = "Project directory containing setup.py/pyproject.toml (defaults to the current directory)"
    )]
    pub project_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        env = "PIF_RUNTIME_PYTHON",
        help = "Interpreter used for the import check"
    )]
    pub python: Option<String>,
    #[arg(long, help = "Show the container verdict and planned methods without running them")]
    pub dry_run: bool,
    #[arg(short, long, help = "Suppress human output (errors still print to stderr)")]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit a {status,message,details} JSON envelope")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}
