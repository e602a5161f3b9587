//! rrctl: CLI tool for rebuilding and querying RackRadar lists.

use clap::{Parser, Subcommand};
use rackradar::export::export_list;
use rackradar::list::resolve_order;
use rackradar::store::{ListId, SqlAddress};
use rackradar::{
    rebuild_after_import, rebuild_coverage, CidrBlock, Config, Family, FetchMode,
    ListRebuilder, ListStore, SqliteStore,
};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rrctl")]
#[command(version)]
#[command(about = "Build and query registry netblock lists", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "rackradar.yaml", global = true)]
    config: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its schema
    Init,

    /// Rebuild every configured list
    Rebuild {
        /// Also rebuild the registry-wide coverage union first
        #[arg(long)]
        coverage: bool,

        /// Read each membership result fully before building its union
        #[arg(long)]
        buffered: bool,
    },

    /// Show the order lists are built in
    Order,

    /// Write a list union as one CIDR per line
    Export {
        /// List name
        list: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Find the most specific netblock containing an address
    Lookup {
        /// IPv4 or IPv6 address
        address: IpAddr,

        /// Check membership in this list's union instead
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Print the registry-wide coverage union
    Coverage {
        /// Recompute the union before printing it
        #[arg(long)]
        rebuild: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Init => init(&cli),
        Commands::Rebuild { coverage, buffered } => rebuild(&cli, *coverage, *buffered),
        Commands::Order => order(&cli),
        Commands::Export { list, output } => export(&cli, list, output.as_ref()),
        Commands::Lookup { address, list } => lookup(&cli, *address, list.as_deref()),
        Commands::Coverage { rebuild } => coverage(&cli, *rebuild),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load(cli: &Cli) -> Result<(Config, SqliteStore), Box<dyn std::error::Error>> {
    let config = Config::load(&cli.config)?;
    let store = SqliteStore::open(&config.database.path)?;
    Ok((config, store))
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init(cli: &Cli) -> CliResult {
    let (config, store) = load(cli)?;
    let registrars = store.registrars()?;
    if cli.json {
        return print_json(&registrars);
    }
    println!("Database ready at {:?}", config.database.path);
    for r in &registrars {
        println!("  {} serial {} (last import {})", r.name, r.serial, r.last_import);
    }
    Ok(())
}

fn rebuild(cli: &Cli, with_coverage: bool, buffered: bool) -> CliResult {
    let (config, store) = load(cli)?;
    let mut mode = config.rebuild.fetch_mode();
    if buffered {
        mode = FetchMode::Buffered;
    }

    let (coverage, report) = if with_coverage {
        let refresh = rebuild_after_import(&store, &config.lists, mode);
        (refresh.coverage, refresh.lists)
    } else {
        let report = ListRebuilder::new(&store, &config.lists)
            .fetch_mode(mode)
            .rebuild_all();
        (None, report)
    };

    if cli.json {
        print_json(&serde_json::json!({ "coverage": coverage, "lists": report }))?;
    } else {
        for r in &report.lists {
            println!("{:<24} {:?}", r.name, r.outcome);
        }
        println!(
            "{} committed, {} rolled back, {} skipped",
            report.committed(),
            report.rolled_back(),
            report.skipped()
        );
    }

    if report.rolled_back() > 0 {
        return Err(format!("{} lists failed to rebuild", report.rolled_back()).into());
    }
    Ok(())
}

fn order(cli: &Cli) -> CliResult {
    let config = Config::load(&cli.config)?;
    let resolution = resolve_order(&config.lists);
    if cli.json {
        return print_json(&serde_json::json!({
            "order": resolution.names(),
            "unresolved": resolution.unresolved,
        }));
    }
    for (i, name) in resolution.names().iter().enumerate() {
        let marker = if resolution.unresolved.contains(name) {
            " (unresolved)"
        } else {
            ""
        };
        println!("{:>3}. {}{}", i + 1, name, marker);
    }
    Ok(())
}

fn export(cli: &Cli, list: &str, output: Option<&PathBuf>) -> CliResult {
    let (_, store) = load(cli)?;
    let lines = match output {
        Some(path) => {
            let mut out = BufWriter::new(fs::File::create(path)?);
            let lines = export_list(&store, list, &mut out)?;
            eprintln!("Wrote {} blocks to {:?}", lines, path);
            lines
        }
        None => export_list(&store, list, &mut io::stdout().lock())?,
    };
    log::debug!("exported {} lines", lines);
    Ok(())
}

fn lookup(cli: &Cli, address: IpAddr, list: Option<&str>) -> CliResult {
    let (_, store) = load(cli)?;

    if let Some(name) = list {
        let id = store
            .list_by_name(name)?
            .ok_or_else(|| rackradar::Error::UnknownList(name.to_string()))?;
        let hit = match Family::of(address) {
            Family::V4 => contained::<u32>(&store, id, address)?,
            Family::V6 => contained::<u128>(&store, id, address)?,
        };
        if cli.json {
            return print_json(&serde_json::json!({
                "list": name,
                "family": Family::of(address),
                "block": hit,
            }));
        }
        match hit {
            Some(block) => println!("{} is in {} via {}", address, name, block),
            None => println!("{} is not in {}", address, name),
        }
        return Ok(());
    }

    let hit = match address {
        IpAddr::V4(v4) => store.lookup(u32::from(v4))?,
        IpAddr::V6(v6) => store.lookup(u128::from(v6))?,
    };
    if cli.json {
        return print_json(&hit);
    }
    match hit {
        Some(nb) => {
            println!("{}-{} /{} ({})", nb.start, nb.end, nb.prefix_len, nb.registrar);
            println!("  netname: {}", nb.netname);
            println!("  descr:   {}", nb.descr);
            if let Some(handle) = &nb.org_handle {
                println!("  org:     {} {}", handle, nb.org_name.as_deref().unwrap_or(""));
            }
        }
        None => println!("{} is not covered by any netblock", address),
    }
    Ok(())
}

fn contained<A: SqlAddress>(
    store: &SqliteStore,
    list: ListId,
    address: IpAddr,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let Some(addr) = A::from_ip(address) else {
        return Ok(None);
    };
    Ok(store
        .list_union_lookup(list, addr)?
        .map(|block: CidrBlock<A>| block.to_string()))
}

fn coverage(cli: &Cli, rebuild: bool) -> CliResult {
    let (_, store) = load(cli)?;
    if rebuild {
        let stats = rebuild_coverage(&store)?;
        if !cli.json {
            eprintln!(
                "Coverage: {} v4 blocks, {} v6 blocks",
                stats.v4.blocks, stats.v6.blocks
            );
        }
    }

    let v4 = store.coverage::<u32>()?;
    let v6 = store.coverage::<u128>()?;
    if cli.json {
        let blocks: Vec<String> = v4
            .iter()
            .map(ToString::to_string)
            .chain(v6.iter().map(ToString::to_string))
            .collect();
        return print_json(&blocks);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for block in &v4 {
        writeln!(out, "{}", block)?;
    }
    for block in &v6 {
        writeln!(out, "{}", block)?;
    }
    Ok(())
}
