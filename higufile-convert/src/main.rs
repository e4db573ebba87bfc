use std::{ffi::OsString, fs::{self, File}, io::BufReader, path::PathBuf, process::ExitCode};
use anyhow::Context;
use clap::Parser;
use higufile::Config;
use log::error;

mod logger;

/// Converts Switch and PS3 Higurashi pic, bup, txa and msk files to PNG, or rebuilds pic and
/// txa files from edited PNGs.
///
/// The single-dash spellings -debug-images, -bup-parts and -replace are accepted as well.
#[derive(Parser)]
#[command(version)]
struct Args {
	/// Container to read (.pic, .bup, .txa or .msk)
	input: PathBuf,
	/// PNG to write; portraits and atlases write several files named after it. With --replace,
	/// the rebuilt container.
	output: PathBuf,
	/// Write every decoded chunk, plain and masked, into this directory
	#[arg(long, value_name = "DIR")]
	debug_images: Option<PathBuf>,
	/// Write portraits as separately combinable parts plus a JSON manifest
	#[arg(long)]
	bup_parts: bool,
	/// Re-encode the input from this PNG (pictures) or directory of tile PNGs (atlases)
	#[arg(long, value_name = "PATH")]
	replace: Option<PathBuf>,
	/// Log chunk headers and progress
	#[arg(short, long)]
	verbose: bool
}

fn run(args: Args) -> anyhow::Result<()> {
	if let Some(dir) = &args.debug_images {
		fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
	}
	let config = Config {
		debug_images: args.debug_images,
		bup_parts: args.bup_parts,
		..Config::default()
	}.with_file_name(args.input.to_string_lossy());
	let input = BufReader::new(File::open(&args.input).with_context(|| format!("failed to open file {}", args.input.display()))?);
	let Some(replacement) = &args.replace else {
		return higufile::convert(input, &args.output, &config).with_context(|| format!("{} failed", args.input.display()));
	};
	let mut rebuilt = Vec::new();
	higufile::replace(input, replacement, &mut rebuilt, &config).with_context(|| format!("{} failed", args.input.display()))?;
	fs::write(&args.output, rebuilt).with_context(|| format!("failed to write {}", args.output.display()))
}

/// Maps the single-dash long flags older batch scripts use onto their `--` forms.
fn normalize_flag(arg: OsString) -> OsString {
	match arg.to_str() {
		Some(flag @ ("-debug-images" | "-bup-parts" | "-replace")) => format!("-{flag}").into(),
		Some(flag) if flag.starts_with("-debug-images=") || flag.starts_with("-replace=") => format!("-{flag}").into(),
		_ => arg
	}
}

fn parse_args(args: impl IntoIterator<Item = OsString>) -> Result<Args, clap::Error> {
	Args::try_parse_from(args.into_iter().map(normalize_flag))
}

fn main() -> ExitCode {
	let args = match parse_args(std::env::args_os()) {
		Ok(args) => args,
		Err(e) if e.use_stderr() => {
			let _ = e.print();
			return ExitCode::FAILURE;
		}
		Err(e) => e.exit()
	};
	logger::init(args.verbose);
	match run(args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}
