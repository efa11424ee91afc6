// Copyright (c) 2023 Yan Ka, Chiu.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions, and the following disclaimer,
//    without modification, immediately at the beginning of the file.
// 2. The name of the author may not be used to endorse or promote products
//    derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE AUTHOR AND CONTRIBUTORS ``AS IS'' AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
// ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
// OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
// HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
// OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF
// SUCH DAMAGE.

use clap::{Parser, Subcommand};
use ocitar::digest::{hex, DigestReader};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(short, parse(from_occurrences))]
    verbosity: usize,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[clap(short_flag = 'c')]
    Create(CreateArgs),
    #[clap(short_flag = 't')]
    List(ListArgs),
    #[clap(short_flag = 'x')]
    Extract(ExtractArgs),
}

#[derive(Clone, Debug)]
enum CompressionType {
    Auto,
    None,
    Gzip,
}

impl std::str::FromStr for CompressionType {
    type Err = std::io::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            _ => Err(std::io::Error::new(std::io::ErrorKind::Other, "unknown value")),
        }
    }
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    #[clap(short = 'f', long)]
    file: String,
    #[clap(short = 'C', long)]
    base_dir: Option<PathBuf>,
    #[clap(long, multiple_occurrences = true)]
    remove: Vec<String>,
    #[clap(multiple = true)]
    paths: Vec<String>,
    #[clap(long, default_value = "auto")]
    compression: CompressionType,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    #[clap(short)]
    file: String,
    #[clap(long, default_value = "auto")]
    compression: CompressionType,
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    #[clap(long, default_value = "auto")]
    compression: CompressionType,
    #[clap(long = "print-input-digest", action)]
    print_input_digest: bool,
    #[clap(short = 'C')]
    chdir: Option<PathBuf>,
    #[clap(short)]
    file: String,
}

fn prepare_compressed_stream_reader(
    mut input: Box<dyn Read>,
    hint: CompressionType,
) -> Result<Box<dyn Read>, std::io::Error> {
    match hint {
        CompressionType::Auto => {
            let mut check_magic = [0u8; 4];
            input.read_exact(&mut check_magic)?;
            if check_magic[0..2] == GZIP_MAGIC {
                Ok(Box::new(flate2::read::GzDecoder::new(PrebufferedSource::new(
                    &check_magic,
                    input,
                ))))
            } else {
                let _ = ZSTD_MAGIC;
                Ok(Box::new(PrebufferedSource::new(&check_magic, input)))
            }
        }
        CompressionType::None => Ok(input),
        CompressionType::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(input))),
    }
}

struct PrebufferedSource<R: Read> {
    buffer: Vec<u8>,
    source: R,
}

impl<R: Read> PrebufferedSource<R> {
    fn new(buffer: &[u8], source: R) -> PrebufferedSource<R> {
        PrebufferedSource {
            buffer: buffer.to_vec(),
            source,
        }
    }
}

impl<R: Read> Read for PrebufferedSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let from_buf = self.buffer.len().min(buf.len());
        if !self.buffer.is_empty() {
            buf[..from_buf].copy_from_slice(&self.buffer[..from_buf]);
            self.buffer = self.buffer[from_buf..].to_vec();
        }
        let cnt = self.source.read(&mut buf[from_buf..])?;
        Ok(cnt + from_buf)
    }
}

fn do_list(args: ListArgs) -> Result<(), std::io::Error> {
    let mut input: Box<dyn Read> = match args.file.as_str() {
        "-" => Box::new(std::io::stdin()),
        path => Box::new(File::open(path)?),
    };
    input = prepare_compressed_stream_reader(input, args.compression)?;

    let summary = ocitar::archive::list_tar(input).map_err(to_io_error)?;
    for whiteout in &summary.whiteouts {
        println!("-\t{whiteout}");
    }
    for file in &summary.files {
        println!("+\t{file}");
    }
    Ok(())
}

fn do_create(args: CreateArgs) -> Result<(), std::io::Error> {
    let mut output: Box<dyn Write> = match args.file.as_str() {
        "-" => Box::new(std::io::stdout()),
        path => Box::new(File::create(path)?),
    };
    if matches!(args.compression, CompressionType::Gzip) {
        output = Box::new(flate2::write::GzEncoder::new(output, flate2::Compression::default()));
    }

    let base_dir = args.base_dir.unwrap_or_else(|| PathBuf::from("."));
    ocitar::archive::create_tar(&base_dir, &args.paths, &args.remove, output).map_err(to_io_error)
}

fn do_extract(args: ExtractArgs) -> Result<(), std::io::Error> {
    let input: Box<dyn Read> = match args.file.as_str() {
        "-" => Box::new(std::io::stdin()),
        path => Box::new(File::open(path)?),
    };
    let mut digest_reader = DigestReader::new(input);

    if let Some(dir) = &args.chdir {
        std::fs::create_dir_all(dir)?;
        std::env::set_current_dir(dir)?;
    }

    let mut buf = Vec::new();
    digest_reader.read_to_end(&mut buf)?;
    let digest = digest_reader.consume();

    let decompressed = prepare_compressed_stream_reader(Box::new(buf.as_slice()), args.compression)?;
    ocitar::archive::extract_layer_to_disk(decompressed, &std::env::current_dir()?).map_err(to_io_error)?;

    if args.print_input_digest {
        println!("sha256:{}", hex(digest));
    }
    Ok(())
}

fn to_io_error(e: ocitar::OcitarError) -> std::io::Error {
    match e {
        ocitar::OcitarError::Io(io) => io,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}

fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();

    stderrlog::new()
        .module(module_path!())
        .verbosity(args.verbosity)
        .init()
        .unwrap();

    log::debug!("main args: {args:?}");

    match args.command {
        Commands::Create(c) => do_create(c)?,
        Commands::List(c) => do_list(c)?,
        Commands::Extract(c) => do_extract(c)?,
    };
    Ok(())
}
