//! SortKV CLI
//!
//! Command-line interface operating directly on a local SortKV database.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sortkv::{BytewiseComparator, Comparator, Config, Engine, ReverseDateComparator};
use tracing_subscriber::{fmt, EnvFilter};

/// SortKV CLI
#[derive(Parser, Debug)]
#[command(name = "sortkv-cli")]
#[command(about = "CLI for the SortKV key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./sortkv_data")]
    data_dir: String,

    /// Key order; must match the one the database was created with
    #[arg(short, long, value_enum, default_value_t = Order::Bytewise)]
    comparator: Order,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Order {
    /// Lexicographic byte order
    Bytewise,
    /// Newest date-prefixed key first
    ReverseDate,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print keys in comparator order
    Scan {
        /// Only keys starting with this prefix
        #[arg(long, conflicts_with_all = ["lower", "upper"])]
        prefix: Option<String>,

        /// Inclusive lower bound
        #[arg(long)]
        lower: Option<String>,

        /// Exclusive upper bound
        #[arg(long)]
        upper: Option<String>,

        /// Walk from the last key backwards
        #[arg(short, long)]
        reverse: bool,
    },

    /// Ingest externally built SSTables
    Ingest {
        /// SSTable files sorted by the selected comparator
        files: Vec<PathBuf>,
    },

    /// List SSTables, newest first
    Tables,

    /// Walk through puts, scans, seeks and bounds on the database
    Demo,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sortkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.comparator {
        Order::Bytewise => run(&args, BytewiseComparator),
        Order::ReverseDate => run(&args, ReverseDateComparator),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run<C: Comparator>(args: &Args, comparator: C) -> sortkv::Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .build();

    let engine = Engine::open(config, comparator)?;

    match &args.command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", engine.comparator().format_value(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan {
            prefix,
            lower,
            upper,
            reverse,
        } => {
            let mut iter = match prefix {
                Some(prefix) => engine.prefix_iter(prefix.as_bytes()),
                None => {
                    let mut options = sortkv::IterOptions::new();
                    if let Some(lower) = lower {
                        options = options.lower_bound(lower.as_bytes());
                    }
                    if let Some(upper) = upper {
                        options = options.upper_bound(upper.as_bytes());
                    }
                    engine.new_iter(options)
                }
            };

            let mut more = if *reverse {
                iter.seek_last()?
            } else {
                iter.seek_first()?
            };
            while more {
                print_entry(engine.comparator(), iter.key()?, iter.value()?);
                more = if *reverse { iter.prev()? } else { iter.next()? };
            }
        }
        Commands::Ingest { files } => {
            for table in engine.ingest(files.as_slice())? {
                println!("ingested {} ({} entries)", table.path.display(), table.entry_count);
            }
        }
        Commands::Tables => print_tables(&engine),
        Commands::Demo => demo(&engine)?,
    }

    engine.close()
}

fn print_entry<C: Comparator>(comparator: &C, key: &[u8], value: &[u8]) {
    println!(
        "{} - {}",
        comparator.format_key(key),
        comparator.format_value(value)
    );
}

fn print_tables<C: Comparator>(engine: &Engine<C>) {
    let comparator = engine.comparator();
    println!("------------------------------");
    for table in engine.tables() {
        println!("{}", table.path.display());
        println!("  comparator: {}", table.comparator);
        println!("  entries:    {}", table.entry_count);
        println!("  blocks:     {}", table.block_count);
        println!(
            "  keys:       {} .. {}",
            comparator.format_key(&table.min_key),
            comparator.format_key(&table.max_key)
        );
        println!("  size:       {} bytes", table.file_size);
    }
    println!("------------------------------");
}

fn demo<C: Comparator>(engine: &Engine<C>) -> sortkv::Result<()> {
    let comparator = engine.comparator();

    engine.put(b"hello", b"world")?;
    if let Some(value) = engine.get(b"hello")? {
        println!("\nGET hello -> {}\n", comparator.format_value(&value));
    }

    for key in ["hello", "world", "hello world"] {
        engine.put(key.as_bytes(), key.as_bytes())?;
    }

    println!("All k/v pairs");
    let mut iter = engine.new_iter(sortkv::IterOptions::new());
    for entry in iter.entries() {
        let (key, value) = entry?;
        print_entry(comparator, &key, &value);
    }
    iter.close();

    println!("\nKeys with prefix \"hello\"");
    let mut iter = engine.prefix_iter(b"hello");
    let mut more = iter.seek_first()?;
    while more {
        println!("{}", comparator.format_key(iter.key()?));
        more = iter.next()?;
    }
    iter.close();

    for key in ["james", "cameron", "james cameron"] {
        engine.put(key.as_bytes(), key.as_bytes())?;
    }

    println!();
    let mut iter = engine.new_iter(sortkv::IterOptions::new());
    for target in ["jam", "hello w", "w"] {
        if iter.seek_ge(target.as_bytes())? {
            println!("SeekGE({}) -> {}", target, comparator.format_key(iter.key()?));
        }
    }
    if iter.seek_lt(b"z")? {
        println!("SeekLT(z) -> {}", comparator.format_key(iter.key()?));
    }
    iter.close();

    for key in ["a", "b", "c", "d", "e", "f"] {
        engine.put(key.as_bytes(), key.as_bytes())?;
    }

    println!("\nKeys within [a, f) from c");
    let mut iter = engine.new_iter(sortkv::IterOptions::new());
    iter.set_bounds(Some(b"a".as_slice()), Some(b"f".as_slice()));
    let mut more = iter.seek_ge(b"c")?;
    while more {
        println!("{}", comparator.format_key(iter.key()?));
        more = iter.next()?;
    }
    iter.close();

    engine.flush()?;
    println!();
    print_tables(engine);
    Ok(())
}
