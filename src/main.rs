use clap::{Parser, Subcommand, ValueEnum};
use pinch::config::{self, PinchConfig};
use pinch::params::{ChromaSubsampling, DctMethod};
use pinch::report::Reporter;
use pinch::{Compressor, format, output};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pinch")]
#[command(about = "Make image files smaller without changing their format")]
#[command(long_about = "\
Make image files smaller without changing their format

The format is read from the file content, never from the extension:

  JPEG  optional lossy re-encode, then a lossless entropy-coding pass
        (optionally carrying EXIF/ICC/XMP/comment markers over)
  PNG   optional downscale, then Zopfli-based structural optimization
  TIFF  decode and re-encode with the configured compression

Settings come from an optional TOML file (--config); flags override it.
Run 'pinch gen-config' to print a documented pinch.toml.

Exit status is 0 on success and 1 otherwise; 'pinch sniff' also exits 1
for content it cannot compress.")]
#[command(version)]
struct Cli {
    /// Print every reported code to stderr and enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress INPUT into OUTPUT (may be the same path for JPEG and PNG)
    Compress(CompressArgs),
    /// Print the detected format of a file; fails when it is not supported
    Sniff {
        input: PathBuf,
    },
    /// Print a stock pinch.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct CompressArgs {
    input: PathBuf,
    output: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JPEG quality 1-100; 0 only optimizes losslessly
    #[arg(long, short)]
    quality: Option<u32>,

    /// Carry APPn and COM markers from the original JPEG
    #[arg(long)]
    keep_metadata: bool,

    /// DCT implementation for the JPEG re-encode
    #[arg(long, value_enum)]
    dct: Option<DctArg>,

    /// Chroma subsampling for the JPEG re-encode
    #[arg(long, value_enum)]
    subsampling: Option<SubsamplingArg>,

    /// Write baseline instead of progressive JPEG scans
    #[arg(long)]
    baseline: bool,

    /// JPEG downscale during re-encode, (0, 1]
    #[arg(long)]
    jpeg_scale: Option<f64>,

    /// PNG resize factor, (0, 1]
    #[arg(long)]
    scale: Option<f64>,

    /// Zopfli iterations for PNG files below 200 000 bytes
    #[arg(long)]
    iterations: Option<u8>,

    /// Zopfli iterations for larger PNG files
    #[arg(long)]
    iterations_large: Option<u8>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DctArg {
    Fast,
    Slow,
    Float,
}

impl From<DctArg> for DctMethod {
    fn from(arg: DctArg) -> Self {
        match arg {
            DctArg::Fast => DctMethod::Fast,
            DctArg::Slow => DctMethod::Slow,
            DctArg::Float => DctMethod::Float,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SubsamplingArg {
    Auto,
    #[value(name = "444")]
    Cs444,
    #[value(name = "422")]
    Cs422,
    #[value(name = "420")]
    Cs420,
    #[value(name = "411")]
    Cs411,
}

impl From<SubsamplingArg> for ChromaSubsampling {
    fn from(arg: SubsamplingArg) -> Self {
        match arg {
            SubsamplingArg::Auto => ChromaSubsampling::Auto,
            SubsamplingArg::Cs444 => ChromaSubsampling::Cs444,
            SubsamplingArg::Cs422 => ChromaSubsampling::Cs422,
            SubsamplingArg::Cs420 => ChromaSubsampling::Cs420,
            SubsamplingArg::Cs411 => ChromaSubsampling::Cs411,
        }
    }
}

impl CompressArgs {
    /// Apply command-line overrides on top of the file config.
    fn apply(&self, config: &mut PinchConfig) {
        if let Some(quality) = self.quality {
            config.jpeg.quality = quality;
        }
        if self.keep_metadata {
            config.jpeg.metadata_copy = true;
        }
        if let Some(dct) = self.dct {
            config.jpeg.dct_method = dct.into();
        }
        if let Some(subsampling) = self.subsampling {
            config.jpeg.chroma_subsampling = subsampling.into();
        }
        if self.baseline {
            config.jpeg.progressive = false;
        }
        if let Some(scale) = self.jpeg_scale {
            config.jpeg.scale_factor = scale;
        }
        if let Some(scale) = self.scale {
            config.png.scale_factor = scale;
        }
        if let Some(iterations) = self.iterations {
            config.png.iterations = iterations;
        }
        if let Some(iterations) = self.iterations_large {
            config.png.iterations_large = iterations;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pinch=debug" } else { "pinch=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Compress(args) => {
            let mut config = match &args.config {
                Some(path) => config::load_config(path)?,
                None => PinchConfig::default(),
            };
            args.apply(&mut config);
            let verbose = cli.verbose || config.report.verbose;

            let before = std::fs::metadata(&args.input).map(|m| m.len()).ok();
            let mut compressor = Compressor::new(verbose);
            let outcome = compressor.compress(&args.input, &args.output, &config.parameters());

            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let sizes = before.zip(std::fs::metadata(&args.output).ok()).map(
                    |(before, meta)| output::SizeReport {
                        before,
                        after: meta.len(),
                    },
                );
                output::print_compress_output(&args.input, &args.output, &outcome, sizes);
            }

            if outcome.success {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("pinch: failed with code {}", outcome.last_error_code);
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Sniff { input } => {
            let mut reporter = Reporter::new(cli.verbose);
            let mut file = File::open(&input)?;
            let kind = format::detect(Some(&mut file), &mut reporter);
            output::print_sniff_output(&input, kind);
            if kind.is_supported() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}
