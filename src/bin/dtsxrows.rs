//! dtsxrows CLI - flatten DTSX packages into SQL scripts, SQLite or JSON

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use dtsxrows::export::json;
use dtsxrows::export::script::ScriptProcessor;
use dtsxrows::export::sqlite::SqliteProcessor;
use dtsxrows::export::{ExportedPackage, PackageProcessor};
use dtsxrows::ExportError;

#[derive(Parser)]
#[command(
    name = "dtsxrows",
    version,
    about = "Flatten SSIS package XML (DTSX) into a relational row model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Emit a SQL INSERT script for a package, or for every package under a folder
    Script {
        /// A .dtsx file or a folder tree containing them
        input: PathBuf,
        /// Folder the script file is written into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Load a package, or every package under a folder, into a SQLite database
    Sqlite {
        /// A .dtsx file or a folder tree containing them
        input: PathBuf,
        /// SQLite database file (created if missing)
        #[arg(long)]
        db: PathBuf,
    },
    /// Flatten one package to JSON rows
    Json {
        /// A .dtsx file
        input: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Script { input, out } => {
            let mut processor = ScriptProcessor::new().with_progress(print_progress);
            let count = dispatch(&mut processor, &input, &out)?;
            println!("{} package(s) exported", count);
        }
        Command::Sqlite { input, db } => {
            let mut processor = SqliteProcessor::new().with_progress(print_progress);
            let count = dispatch(&mut processor, &input, &db)?;
            println!("{} package(s) loaded", count);
        }
        Command::Json { input, out } => {
            let doc = dtsxrows::flatten_file(&input, 0)?;
            match out {
                Some(path) => json::write_rows(File::create(path)?, &doc.rows)?,
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    json::write_rows(&mut lock, &doc.rows)?;
                    writeln!(lock)?;
                }
            }
        }
    }
    Ok(())
}

fn dispatch<P: PackageProcessor>(
    processor: &mut P,
    input: &Path,
    destination: &Path,
) -> Result<u32, ExportError> {
    if input.is_dir() {
        processor.export_tree(input, destination)
    } else {
        processor.export(input, destination)
    }
}

fn print_progress(exported: &ExportedPackage) {
    println!("[{}] {}", exported.ordinal, exported.source.display());
}
