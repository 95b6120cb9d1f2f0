use clap::{Parser as ClapParser, Subcommand};
use mace_lang::cli::{self, CheckOptions, CliError, EvalOptions};
use mace_lang::{to_json, to_json_pretty};
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "mace")]
#[command(about = "Mace - An embeddable expression language")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute an expression
    Eval {
        /// The expression to evaluate
        expression: String,

        /// JSON root object (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Variable binding, `name=value` (value parsed as JSON when possible)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Reject undeclared inputs and ill-typed assignments
        #[arg(long)]
        strict: bool,

        /// Do not fold literal runs at compile time
        #[arg(long)]
        no_fold: bool,

        /// Exact decimal arithmetic for integral division
        #[arg(long)]
        decimal: bool,

        /// Emit line labels
        #[arg(long)]
        debug_symbols: bool,
    },

    /// Compile an expression and report its type and inputs
    Check {
        /// The expression to check
        expression: String,

        #[arg(long)]
        strict: bool,

        #[arg(long)]
        decimal: bool,
    },
}

/// Enable with `RUST_LOG=mace_lang=debug` or `RUST_LOG=mace_lang=trace`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            expression,
            input,
            vars,
            pretty,
            strict,
            no_fold,
            decimal,
            debug_symbols,
        } => read_input(input).and_then(|input| {
            let options = EvalOptions {
                expression,
                input,
                variables: vars,
                strict,
                no_fold,
                decimal,
                debug_symbols,
            };
            run_eval(&options, pretty)
        }),
        Commands::Check {
            expression,
            strict,
            decimal,
        } => cli::execute_check(&CheckOptions {
            expression,
            strict,
            decimal,
        })
        .map(|report| print!("{}", report)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_input(input: Option<String>) -> Result<Option<String>, CliError> {
    match input {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok((!buffer.trim().is_empty()).then_some(buffer))
        }
        None => Ok(None),
    }
}

fn run_eval(options: &EvalOptions, pretty: bool) -> Result<(), CliError> {
    let value = cli::execute_eval(options)?;
    let json = if pretty {
        to_json_pretty(&value)
    } else {
        to_json(&value)
    };
    println!("{}", json);
    Ok(())
}
