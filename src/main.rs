use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::debug;
use snafu::ResultExt;

use rchigo::error::{ReadSourceSnafu, WriteOutputSnafu};
use rchigo::{CompileResult, generate_assembly};

/// Compile a Go-flavoured C subset to x86-64 assembly.
#[derive(Debug, Parser)]
#[command(name = "rchigo", version, about)]
struct Args {
  /// Source file to compile, or `-` to read standard input.
  input: PathBuf,

  /// Write the assembly here instead of standard output.
  #[arg(short, long)]
  output: Option<PathBuf>,
}

fn read_source(path: &Path) -> CompileResult<String> {
  let mut text = String::new();
  if path.as_os_str() == "-" {
    io::stdin()
      .read_to_string(&mut text)
      .context(ReadSourceSnafu { path })?;
  } else {
    text = fs::read_to_string(path).context(ReadSourceSnafu { path })?;
  }

  // Diagnostics expect every line, including the last, to end in a newline.
  if !text.ends_with('\n') {
    text.push('\n');
  }
  Ok(text)
}

fn run(args: &Args) -> CompileResult<()> {
  let source = read_source(&args.input)?;
  let filename = args.input.display().to_string();
  debug!("compiling {filename} ({} bytes)", source.len());

  let asm = generate_assembly(&filename, &source)?;
  match &args.output {
    Some(path) => fs::write(path, asm).context(WriteOutputSnafu { path })?,
    None => print!("{asm}"),
  }
  Ok(())
}

fn main() {
  env_logger::init();
  let args = Args::parse();

  if let Err(err) = run(&args) {
    eprintln!("{err}");
    process::exit(1);
  }
}
