use anyhow::Context;
use rlang::error::Diagnostic;
use std::{fs, path::PathBuf, process};
use structopt::StructOpt;

/// The sub-command to execute.
#[derive(Debug, StructOpt)]
enum Command {
    /// Compile source code to a WASM module.
    #[structopt(name = "build")]
    Build {
        /// Path to the `.rl` source file.
        #[structopt(parse(from_os_str))]
        source_path: PathBuf,
        /// Path to write the compiled WASM module to.
        #[structopt(long = "out", short = "o", parse(from_os_str))]
        out_path: PathBuf,
        /// Print diagnostics as a JSON array instead of human-readable text.
        #[structopt(long = "emit-json-errors")]
        emit_json_errors: bool,
    },

    /// Parse and analyze source code without emitting WASM.
    #[structopt(name = "check")]
    Check {
        /// Path to the `.rl` source file.
        #[structopt(parse(from_os_str))]
        source_path: PathBuf,
        /// Print diagnostics as a JSON array instead of human-readable text.
        #[structopt(long = "emit-json-errors")]
        emit_json_errors: bool,
    },
}

/// rlangc: command-line front end for the rlang compiler.
#[derive(Debug, StructOpt)]
#[structopt(name = "rlangc")]
struct Opt {
    #[structopt(subcommand)]
    cmd: Command,
}

fn read_file(path: &PathBuf) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file {:?}", path))
}

fn print_errors(errors: &[Diagnostic], as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(errors)?);
    } else {
        for error in errors {
            eprintln!("{}", error);
        }
    }
    Ok(())
}

fn run(opt: Opt) -> anyhow::Result<bool> {
    match opt.cmd {
        Command::Build { source_path, out_path, emit_json_errors } => {
            let source = read_file(&source_path)?;
            let result = rlang::compile(&source);
            if !result.success {
                print_errors(&result.errors, emit_json_errors)?;
                return Ok(false);
            }
            let wasm = result.wasm.expect("successful compile always carries a wasm module");
            fs::write(&out_path, wasm)
                .with_context(|| format!("failed to write output file {:?}", out_path))?;
            if !result.errors.is_empty() {
                print_errors(&result.errors, emit_json_errors)?;
            }
            Ok(true)
        }

        Command::Check { source_path, emit_json_errors } => {
            let source = read_file(&source_path)?;
            let result = rlang::check(&source);
            if !result.errors.is_empty() {
                print_errors(&result.errors, emit_json_errors)?;
            }
            Ok(result.success)
        }
    }
}

fn main() {
    let exit_code = match run(Opt::from_args()) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };
    process::exit(exit_code);
}
