use mocuncompress::{decompress, parse_sync_word};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};
use tracing::{debug, Level};

use anyhow::{bail, Context, Result};
use clap::Parser;
use libmoc::{huffman::DecodeTable, DecodeOptions};

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

/// Decompresses Mars Orbiter Camera SDP files
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// The SDP file; asked for when missing
    input: Option<PathBuf>,

    /// The output file name; asked for when missing.
    /// png, tif, pgm and bmp extensions are encoded, anything else gets the raw raster
    output: Option<PathBuf>,

    /// Zero-fill fragments with a bad checksum
    #[arg(long)]
    pad_cs: bool,

    /// Do not verify fragment checksums
    #[arg(long)]
    no_checksum: bool,

    /// Do not expect sync words in predictive data
    #[arg(long, conflicts_with = "sync")]
    no_sync: bool,

    /// Sync word in hex
    #[arg(long, value_parser = parse_sync_word)]
    sync: Option<u16>,

    /// Huffman decode table file to use instead of the built-in tables
    #[arg(long)]
    decode_table: Option<PathBuf>,

    /// Decode each predictive fragment separately
    #[arg(long)]
    per_fragment: bool,

    /// The label file name (default: output name with .lbl appended)
    #[arg(long)]
    label: Option<PathBuf>,
}

fn prompt(question: &str) -> Result<PathBuf> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim();
    if answer.is_empty() {
        bail!("no file name given");
    }
    Ok(PathBuf::from(answer))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_file(true)
        .with_line_number(true)
        .init();

    let input = match cli.input {
        Some(i) => i,
        None => prompt("Input file: ")?,
    };
    let output = match cli.output {
        Some(o) => o,
        None => prompt("Output file: ")?,
    };

    let decode_table = cli
        .decode_table
        .as_deref()
        .map(|path| {
            DecodeTable::from_file(path)
                .with_context(|| format!("load decode table {}", path.display()))
        })
        .transpose()?;
    let mut options = DecodeOptions::builder()
        .verify_checksum(!cli.no_checksum)
        .pad_cs(cli.pad_cs)
        .sync(!cli.no_sync)
        .per_fragment(cli.per_fragment)
        .maybe_decode_table(decode_table)
        .build();
    if let Some(word) = cli.sync {
        options.sync_word = word;
    }
    debug!("decoding {} with {options:?}", input.display());

    let code = decompress(&input, &output, cli.label.as_deref(), &options)?;
    Ok(ExitCode::from(code))
}
