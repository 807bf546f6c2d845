//! rasterdec CLI - decode JPEG, JPEG 2000 and JBIG2 images.
//!
//! Detects the input format from its magic bytes and writes raw pixels or
//! a netpbm file (PGM/PPM/PBM).

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use rasterdec::{jbig2, jpeg, jpeg2000, DecodedImage};

/// Decoders for baseline JPEG, JPEG 2000 and JBIG2
#[derive(Parser)]
#[command(name = "rasterdec")]
#[command(version)]
#[command(about = "Decode JPEG, JPEG 2000 and JBIG2 images", long_about = None)]
#[command(after_help = "EXAMPLES:
    rasterdec decode -i image.jpg -o image.ppm -f pnm
    rasterdec decode -i image.jp2 -o pixels.raw
    rasterdec decode -i page.jb2 -o page.pbm -f pnm
    rasterdec info -i image.j2k

SUPPORTED FORMATS:
    JPEG (.jpg), JPEG 2000 (.jp2/.j2k/.j2c), JBIG2 (.jb2)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an image to raw pixels or a netpbm file
    #[command(visible_alias = "d")]
    Decode {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },

    /// Print image dimensions and format information
    #[command(visible_alias = "i")]
    Info {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Raw interleaved samples
    Raw,
    /// PGM for grayscale, PPM for colour, PBM for bi-level
    Pnm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Jpeg,
    Jpeg2000,
    Jbig2,
}

fn sniff(data: &[u8]) -> Option<InputKind> {
    if data.len() < 8 {
        return None;
    }
    if data[0] == 0xFF && data[1] == 0xD8 {
        return Some(InputKind::Jpeg);
    }
    if data[0] == 0xFF && data[1] == 0x4F {
        return Some(InputKind::Jpeg2000);
    }
    if data.starts_with(b"\x00\x00\x00\x0CjP  ") {
        return Some(InputKind::Jpeg2000);
    }
    if data.starts_with(&jbig2::segment::FILE_ID) {
        return Some(InputKind::Jbig2);
    }
    None
}

enum Decoded {
    Image(DecodedImage),
    Page(jbig2::bitmap::Bitmap),
}

fn decode_input(data: &[u8]) -> Result<Decoded, rasterdec::Error> {
    match sniff(data) {
        Some(InputKind::Jpeg) => jpeg::decode(data).map(Decoded::Image),
        Some(InputKind::Jpeg2000) => jpeg2000::decode(data).map(Decoded::Image),
        Some(InputKind::Jbig2) => jbig2::decode(data).map(Decoded::Page),
        None => Err(rasterdec::Error::BadMagic { offset: 0, reason: "unrecognized input format" }),
    }
}

fn write_pnm(image: &DecodedImage) -> Vec<u8> {
    let max = (1u32 << image.bit_depth.min(16)) - 1;
    let magic = if image.channels == 3 { "P6" } else { "P5" };
    let mut out = format!("{magic}\n{} {}\n{max}\n", image.width, image.height).into_bytes();
    out.extend_from_slice(&image.pixels);
    out
}

fn write_pbm(page: &jbig2::bitmap::Bitmap) -> Vec<u8> {
    // PBM packs rows MSB-first, exactly like the page bitmap.
    let mut out = format!("P4\n{} {}\n", page.width, page.height).into_bytes();
    out.extend_from_slice(&page.data);
    out
}

fn run() -> Result<(), String> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Decode { input, output, format } => {
            let data = fs::read(&input).map_err(|e| format!("{}: {e}", input.display()))?;
            let decoded = decode_input(&data).map_err(|e| e.to_string())?;
            let bytes = match (&decoded, format) {
                (Decoded::Image(image), OutputFormat::Pnm) => write_pnm(image),
                (Decoded::Image(image), OutputFormat::Raw) => image.pixels.clone(),
                (Decoded::Page(page), OutputFormat::Pnm) => write_pbm(page),
                (Decoded::Page(page), OutputFormat::Raw) => page.data.clone(),
            };
            fs::write(&output, bytes).map_err(|e| format!("{}: {e}", output.display()))?;
            Ok(())
        }
        Commands::Info { input } => {
            let data = fs::read(&input).map_err(|e| format!("{}: {e}", input.display()))?;
            match decode_input(&data).map_err(|e| e.to_string())? {
                Decoded::Image(image) => {
                    println!(
                        "{}x{}, {} channel(s), {} bits per sample",
                        image.width, image.height, image.channels, image.bit_depth
                    );
                }
                Decoded::Page(page) => {
                    println!("{}x{}, bi-level", page.width, page.height);
                }
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
