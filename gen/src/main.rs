use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crextables::{
    Fxy, TableType,
    pattern::TableScanner,
    prelude::{CompiledTableB, CompiledTableD},
    wmo::{TableLoader, WMOBTableLoader, WMODTableLoader},
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crex-tables")]
#[command(about = "CREX/BUFR descriptor table conversion tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    B,
    D,
}

impl From<Kind> for TableType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::B => TableType::B,
            Kind::D => TableType::D,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindFilter {
    B,
    D,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and compile every recognised table
    Scan {
        /// Directory containing WMO / local CSV tables
        #[arg(short, long)]
        input: PathBuf,

        /// Tables directory; `master/` and `local/` are created inside it
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value = "all")]
        table_type: KindFilter,
    },
    /// Compile a single CSV table
    Convert {
        #[arg(short, long)]
        input: PathBuf,

        /// Output path (extension is replaced)
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum)]
        table_type: Kind,
    },
    /// Print a compiled table
    Print {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum)]
        table_type: Kind,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Look up one descriptor in a compiled table
    Lookup {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum)]
        table_type: Kind,

        /// Descriptor code, six digits (FXXYYY)
        #[arg(short, long)]
        code: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            output,
            table_type,
        } => scan_and_convert(&input, &output, table_type),
        Commands::Convert {
            input,
            output,
            table_type,
        } => {
            convert(&input, &output, table_type.into())?;
            println!("Converted {} -> {}", input.display(), output.display());
            Ok(())
        }
        Commands::Print {
            input,
            table_type,
            limit,
        } => print_table(&input, table_type.into(), limit),
        Commands::Lookup {
            input,
            table_type,
            code,
        } => lookup(&input, table_type.into(), &code),
    }
}

fn convert(input: &Path, output: &Path, kind: TableType) -> Result<()> {
    match kind {
        TableType::B => {
            let loader = TableLoader::<WMOBTableLoader>::default();
            CompiledTableB::build_from_csv(loader, input, output)?;
        }
        TableType::D => {
            let loader = TableLoader::<WMODTableLoader>::default();
            CompiledTableD::build_from_csv(loader, input, output)?;
        }
    }
    Ok(())
}

fn scan_and_convert(input_dir: &Path, output_dir: &Path, filter: KindFilter) -> Result<()> {
    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    let scanner = TableScanner::new();
    for pattern in scanner.patterns() {
        tracing::debug!(pattern = pattern.description(), "registered pattern");
    }

    let kind_filter = match filter {
        KindFilter::B => Some(TableType::B),
        KindFilter::D => Some(TableType::D),
        KindFilter::All => None,
    };

    let files = scanner
        .scan_directory(input_dir, kind_filter)
        .context("Failed to scan directory")?;
    println!("Found {} table files in {}", files.len(), input_dir.display());

    let mut converted = 0;
    let mut failed = 0;
    for (path, metadata) in files {
        let output_name = metadata.output_name();
        match convert(&path, &output_dir.join(&output_name), metadata.kind) {
            Ok(()) => {
                println!("  {} -> {}", metadata.filename, output_name);
                converted += 1;
            }
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "conversion failed");
                failed += 1;
            }
        }
    }

    println!("Converted: {converted}, failed: {failed}");
    if failed > 0 {
        anyhow::bail!("{failed} tables failed to convert");
    }
    Ok(())
}

fn print_limited<T: std::fmt::Display>(entries: &[T], limit: Option<usize>) {
    let shown = limit.map_or(entries.len(), |max| entries.len().min(max));
    for entry in &entries[..shown] {
        println!("{entry}");
    }
    if shown < entries.len() {
        println!("\n... ({} more entries omitted)", entries.len() - shown);
    }
}

fn print_table(input: &Path, kind: TableType, limit: Option<usize>) -> Result<()> {
    match kind {
        TableType::B => {
            let table = CompiledTableB::load_from_disk(input)?;
            let mut entries = table.get_all_entries();
            entries.sort_by_key(|e| e.fxy.to_native());
            println!("Table B ({} entries)", entries.len());
            println!(
                "{:<6} | {:<40} | {:<15} | {:>5} | {:>10} | {:>5} | {:>5}",
                "FXY", "Element Name", "Unit", "Scale", "Ref Val", "Bits", "Chars"
            );
            println!("{}", "-".repeat(110));
            print_limited(&entries, limit);
        }
        TableType::D => {
            let table = CompiledTableD::load_from_disk(input)?;
            let mut entries = table.get_all_entries();
            entries.sort_by_key(|e| e.fxy.to_native());
            println!("Table D ({} entries)", entries.len());
            println!("{:<6} | {:<50} | Expansion", "FXY", "Title");
            println!("{}", "-".repeat(110));
            print_limited(&entries, limit);
        }
    }
    Ok(())
}

fn lookup(input: &Path, kind: TableType, code: &str) -> Result<()> {
    let fxy = Fxy::from_str(code)?;
    let found = match kind {
        TableType::B => CompiledTableB::load_from_disk(input)?
            .lookup(fxy)
            .map(|e| e.to_string()),
        TableType::D => CompiledTableD::load_from_disk(input)?
            .lookup(fxy)
            .map(|e| e.to_string()),
    };
    match found {
        Some(row) => println!("{row}"),
        None => anyhow::bail!("{fxy} not found in {}", input.display()),
    }
    Ok(())
}
