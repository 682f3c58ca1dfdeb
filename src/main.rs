use clap::{Parser, Subcommand};
use cbfs::fmap::{Fmap, DEFAULT_REGION};
use cbfs::{render, Image, ScanOptions, TypeRegistry};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cbfs", about = "Inspect the CBFS region of a coreboot flash image")]
struct Cli {
    /// Enable debug prints
    #[arg(short, long, global = true)]
    debug: bool,
    /// FMAP area holding the CBFS
    #[arg(short, long, global = true, default_value = DEFAULT_REGION)]
    region: String,
    /// Flash image to read
    image: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of the CBFS region
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the FMAP areas of the image
    Regions,
    /// Write the body of one record to a file
    Extract {
        /// Record name, e.g. fallback/payload
        name: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    // A duplicate registration is a build bug; refuse to run with it.
    let registry = TypeRegistry::builtin()?;

    let options = ScanOptions { region_name: cli.region };

    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { json } => {
            let img = Image::open(&cli.image, &options, &registry)?;
            if json {
                println!("{}", render::to_json(&img)?);
            } else {
                println!("FMAP REGION: {}", img.region().name);
                print!("{img}");
            }
        }

        // ── Regions ──────────────────────────────────────────────────────────
        Commands::Regions => {
            let data = std::fs::read(&cli.image)?;
            let (at, fmap) = Fmap::find(&data)?;
            println!("FMAP {} at {:#x}, base {:#x}, size {:#x}", fmap.name, at, fmap.base, fmap.size);
            println!("{:<32} {:>10} {:>10} {:>6}", "Name", "Offset", "Size", "Flags");
            for a in &fmap.areas {
                println!("{:<32} {:>#10x} {:>#10x} {:>#6x}", a.name, a.offset, a.size, a.flags);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { name, output } => {
            let img = Image::open(&cli.image, &options, &registry)?;
            let record = img
                .find(&name)
                .ok_or_else(|| format!("no record named {name}"))?;
            let mut out = BufWriter::new(std::fs::File::create(&output)?);
            record.write(&mut out)?;
            out.flush()?;
            println!("{} ({} bytes) -> {}", name, record.data().len(), output.display());
        }
    }

    Ok(())
}
