//! Purpose: `svar` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, prints results on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.

use std::io::Write;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use svar::cbor;
use svar::core::buffer::Buffer;
use svar::core::error::{Error, ErrorKind, to_exit_code};
use svar::json as svar_json;
use svar::plugin::Module;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(err.to_string().trim_end().to_string()));
            }
        },
    };

    match cli.command {
        Command::Doc { plugin, key } => run_doc(&plugin, key.as_deref()),
        Command::Call {
            plugin,
            function,
            args,
        } => run_call(&plugin, &function, &args),
        Command::Convert {
            file,
            to,
            pretty,
            output,
        } => run_convert(&file, to, pretty, output.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "svar", &mut std::io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

#[derive(Parser)]
#[command(
    name = "svar",
    version,
    about = "Inspect and call svar plugin modules, convert value files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the documentation of a module, or of one member.
    Doc {
        /// Module to load: a builtin name or a shared-library path.
        #[arg(long)]
        plugin: String,
        /// Member to show; the whole module when omitted.
        #[arg(long)]
        key: Option<String>,
    },
    /// Call a module function with JSON-literal arguments.
    Call {
        /// Module to load: a builtin name or a shared-library path.
        plugin: String,
        /// Function name inside the module.
        function: String,
        /// Arguments, each a JSON literal (bare words count as strings).
        args: Vec<String>,
    },
    /// Load a JSON or CBOR file and re-emit it.
    Convert {
        /// Input file; format picked by extension (.json, .cfg, .cbor).
        file: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        to: OutputFormat,
        /// Pretty-print JSON output.
        #[arg(long)]
        pretty: bool,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Cbor,
}

fn run_doc(plugin: &str, key: Option<&str>) -> Result<RunOutcome, Error> {
    let module = Module::load(plugin)?;
    print!("{}", module.doc(key)?);
    Ok(RunOutcome::ok())
}

fn run_call(plugin: &str, function: &str, args: &[String]) -> Result<RunOutcome, Error> {
    let module = Module::load(plugin)?;
    let args = args
        .iter()
        .map(|raw| {
            svar_json::parse_str(raw)
                .unwrap_or_else(|_| svar::core::value::Value::Str(raw.clone()))
        })
        .collect::<Vec<_>>();
    let result = module.call(function, &args)?;
    println!("{}", svar_json::dump(&result)?);
    Ok(RunOutcome::ok())
}

fn run_convert(
    file: &std::path::Path,
    to: OutputFormat,
    pretty: bool,
    output: Option<&std::path::Path>,
) -> Result<RunOutcome, Error> {
    let value = svar_json::load_file(file)?;
    match to {
        OutputFormat::Json => {
            let text = if pretty {
                svar_json::dump_pretty(&value)?
            } else {
                svar_json::dump(&value)?
            };
            match output {
                Some(path) => {
                    std::fs::write(path, text + "\n").map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write output")
                            .with_path(path)
                            .with_source(err)
                    })?;
                }
                None => println!("{text}"),
            }
        }
        OutputFormat::Cbor => {
            let bytes = cbor::encode(&value)?;
            match output {
                Some(path) => Buffer::new(bytes).save(path)?,
                None => {
                    std::io::stdout().write_all(&bytes).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write output")
                            .with_source(err)
                    })?;
                }
            }
        }
    }
    Ok(RunOutcome::ok())
}

fn emit_error(err: &Error) {
    let mut body = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message().unwrap_or(""),
        }
    });
    if let Some(path) = err.path() {
        body["error"]["path"] = json!(path.display().to_string());
    }
    if let Some(symbol) = err.symbol() {
        body["error"]["symbol"] = json!(symbol);
    }
    if let Some(hint) = err.hint() {
        body["error"]["hint"] = json!(hint);
    }
    eprintln!("{body}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
