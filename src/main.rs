use clap::{Parser, Subcommand};
use pfs::{Archive, PackOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pfs", about = "Inspect and edit PFS packed-file archives")]
struct Cli {
    /// Log archive activity (repeat for more detail); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents
    List {
        input: PathBuf,
    },
    /// Extract files (all of them if no names are given)
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        names: Vec<String>,
    },
    /// Pack files into a new archive
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// zlib level 0-9
        #[arg(short, long, default_value = "9")]
        level: u32,
        /// Raw bytes per compressed chunk
        #[arg(long, default_value = "8192")]
        chunk_size: usize,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Insert or replace files in an existing archive
    Add {
        archive: PathBuf,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Remove files from an archive
    Remove {
        archive: PathBuf,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Copy compressed files between archives without recompressing
    Copy {
        src: PathBuf,
        dst: PathBuf,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let ar = Archive::open(&input)?;
            println!("Archive: {}", input.display());
            println!("{:<40} {:>12} {:>12}  CRC", "Name", "Size", "Compressed");
            for info in ar.iter() {
                println!("{:<40} {:>12} {:>12}  {:08x}",
                    info.name, info.size, info.compressed_size, info.crc);
            }
            println!("{} file(s)", ar.len());
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, names } => {
            let ar = Archive::open(&input)?;
            let names: Vec<String> = if names.is_empty() {
                ar.iter().map(|f| f.name.to_owned()).collect()
            } else {
                names
            };
            std::fs::create_dir_all(&output_dir)?;
            for name in &names {
                let data = ar.read_file(name)?;
                let dest = output_dir.join(entry_file_name(name)?);
                std::fs::write(&dest, &data)?;
                println!("  extracted  {}", dest.display());
            }
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, level, chunk_size, input } => {
            let mut ar = Archive::with_options(PackOptions { chunk_size, level });
            insert_paths(&mut ar, &input)?;
            ar.write_to_path(&output)?;
            println!("Created: {}", output.display());
        }

        // ── Add ──────────────────────────────────────────────────────────────
        Commands::Add { archive, input } => {
            let mut ar = Archive::open(&archive)?;
            insert_paths(&mut ar, &input)?;
            ar.write_to_path(&archive)?;
        }

        // ── Remove ───────────────────────────────────────────────────────────
        Commands::Remove { archive, names } => {
            let mut ar = Archive::open(&archive)?;
            for name in &names {
                ar.remove(name)?;
                println!("  removed  {name}");
            }
            ar.write_to_path(&archive)?;
        }

        // ── Copy ─────────────────────────────────────────────────────────────
        Commands::Copy { src, dst, names } => {
            let source = Archive::open(&src)?;
            let mut target = if dst.exists() { Archive::open(&dst)? } else { Archive::new() };
            for name in &names {
                target.duplicate_borrowed(&source, name)?;
                println!("  copied  {name}");
            }
            target.write_to_path(&dst)?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "pfs=debug",
        _ => "pfs=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn insert_paths(ar: &mut Archive<'_>, paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for path in paths {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .ok_or_else(|| format!("{} has no file name", path.display()))?
            .to_string_lossy();
        ar.insert(&name, &data)?;
        println!("  packed  {}", path.display());
    }
    Ok(())
}

/// Archive names are flat; refuse anything that would escape `output_dir`.
fn entry_file_name(name: &str) -> Result<&Path, Box<dyn std::error::Error>> {
    let path = Path::new(name);
    match path.file_name() {
        Some(f) if f == path.as_os_str() => Ok(path),
        _ => Err(format!("refusing to extract unsafe name {name:?}").into()),
    }
}
