//! xlsx-stream CLI - streaming XLSX to CSV conversion
//!
//! A command-line tool for converting large XLSX workbooks to CSV from
//! local files, HTTP(S) URLs, or S3 objects, without loading the
//! workbook into memory.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use xlsx_stream::{Error, XlsxReader};

/// Stream XLSX workbooks to CSV from any source
#[derive(Parser)]
#[command(
    name = "xlsx-stream",
    version,
    about = "Stream XLSX workbooks to CSV",
    long_about = "xlsx-stream - memory-bounded XLSX to CSV conversion.\n\n\
                  Sources:\n\
                  - Local files:  /path/to/file.xlsx\n\
                  - S3 objects:   s3://bucket/key\n\
                  - HTTP/HTTPS:   https://example.com/file.xlsx"
)]
struct Cli {
    /// Data source: s3://bucket/key, https://url, or /path/to/file.xlsx
    source: String,

    /// Write CSV to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worksheet to stream (default: first sheet)
    #[arg(long)]
    sheet_name: Option<String>,

    /// Upper bound for the raw read buffer, in bytes
    #[arg(long, default_value_t = 16_777_216)]
    chunk_size: usize,

    /// Raise log verbosity
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "warn" },
    ))
    .init();

    match run(&cli) {
        Ok(rows) => {
            if let Some(path) = &cli.output {
                eprintln!("{} {rows} rows written to {}", "done:".green().bold(), path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            if cli.verbose {
                eprintln!("{e:?}");
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: &Cli) -> Result<u64, Error> {
    let mut reader = XlsxReader::from_uri(&cli.source)?.with_chunk_size(cli.chunk_size);
    if let Some(name) = &cli.sheet_name {
        reader = reader.with_sheet_name(name.as_str());
    }

    match &cli.output {
        Some(path) => {
            let file = File::create(path).map_err(Error::SinkIo)?;
            reader.to_csv(BufWriter::new(file))
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let rows = reader.to_csv(&mut lock)?;
            lock.flush().map_err(Error::SinkIo)?;
            Ok(rows)
        }
    }
}

/// Map error kinds onto the documented exit codes.
fn exit_code(err: &Error) -> u8 {
    match err {
        Error::UnsupportedSource(_) => 2,
        Error::NotFound(_) | Error::SheetNotFound(_) | Error::HttpStatus(404) => 3,
        Error::Auth(_) | Error::PermissionDenied(_) | Error::HttpStatus(401 | 403) => 4,
        Error::UnexpectedEof(_)
        | Error::CrcMismatch(_)
        | Error::UnsupportedMethod { .. }
        | Error::EncryptedEntry(_)
        | Error::SplitArchive
        | Error::MissingWorkbookPart
        | Error::MissingRelationshipsPart
        | Error::MalformedXml(_)
        | Error::SharedStringIndex(_)
        | Error::BadCellAddress(_) => 5,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
