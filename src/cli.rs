use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use phasestretch::io::wav::WavFileManager;
use phasestretch::io::{AudioFileManager, LogProgress};
use phasestretch::stretch::params::{DEFAULT_MAX_OUTPUT_BLOCK, MAX_RATIO, MIN_RATIO};
use phasestretch::{FileTimeStretcher, StretchError};

#[derive(Parser, Debug)]
#[command(
    name = "phasestretch",
    version,
    about = "Change the duration of a WAV file without changing its pitch"
)]
struct Args {
    /// Input WAV file (integer PCM or 32-bit float)
    input: PathBuf,

    /// Output WAV file (written as 32-bit float)
    output: PathBuf,

    /// Output duration / input duration (>1.0 = slower)
    #[arg(short, long)]
    ratio: f64,

    /// Stretch transients like everything else instead of keeping them sharp
    #[arg(long)]
    no_sharpen: bool,

    /// Output frames rendered per block
    #[arg(short, long, default_value_t = DEFAULT_MAX_OUTPUT_BLOCK)]
    block_size: usize,

    /// Log parameter and progress details (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), StretchError> {
    if !(MIN_RATIO..=MAX_RATIO).contains(&args.ratio) {
        return Err(StretchError::InvalidRatio(format!(
            "{} (must be between {} and {})",
            args.ratio, MIN_RATIO, MAX_RATIO
        )));
    }

    let out_dir = args
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut files = WavFileManager::new(out_dir);
    let source = files.register(&args.input);
    let mut progress = LogProgress::new();

    let stretched = FileTimeStretcher::new(&mut files)
        .with_progress(&mut progress)
        .with_sharpening(!args.no_sharpen)
        .with_output_block(args.block_size)
        .stretch_file(source, args.ratio)?;

    let Some(derived) = files.path(stretched).map(Path::to_path_buf) else {
        return Err(StretchError::Destination(format!(
            "stretched file {} is not registered",
            stretched
        )));
    };
    if let Err(e) = std::fs::rename(&derived, &args.output) {
        if let Err(cleanup) = files.discard(stretched) {
            log::warn!("could not remove {}: {}", derived.display(), cleanup);
        }
        return Err(StretchError::Destination(format!(
            "{}: {}",
            args.output.display(),
            e
        )));
    }

    log::info!(
        "wrote {} (ratio {:.4})",
        args.output.display(),
        args.ratio
    );
    Ok(())
}
