use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use karm_sync::config::{parse_checkin_date, require_storage, Config, GlobalParameters};
use karm_sync::error::Result;
use karm_sync::prompt::StdinPrompter;
use karm_sync::registry::Registry;
use karm_sync::remote::BasecampClient;
use karm_sync::sync::{FetchOptions, SyncReport, Synchronizer};
use karm_sync::utils::print_registry;

#[derive(Parser)]
#[command(name = "karm-sync")]
#[command(about = "Synchronise a KTimeTracker (KArm) storage file with a Basecamp account")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Basecamp account URL, e.g. https://mycompany.basecamphq.com
    #[arg(short = 'U', long, env = "KARM_URL", global = true)]
    url: Option<String>,

    /// Basecamp user name
    #[arg(short, long, env = "KARM_USER", global = true)]
    user: Option<String>,

    /// Basecamp password
    #[arg(short, long, env = "KARM_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// KTimeTracker storage file
    #[arg(short, long, env = "KARM_STORAGE", global = true)]
    storage: Option<PathBuf>,

    /// Print what is being done
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new storage file from the Basecamp projects. The previous content of the file is lost
    Checkout {
        /// Only fetch projects that have task lists
        #[arg(short, long)]
        active_projects: bool,

        /// Compute the total time of task items from their Basecamp time entries
        #[arg(short = 't', long)]
        fetch_time: bool,
    },
    /// Merge the Basecamp changes into an existing storage file
    Update {
        /// Only fetch projects that have task lists
        #[arg(short, long)]
        active_projects: bool,

        /// Update the total time of task items from their Basecamp time entries
        #[arg(short = 't', long)]
        update_time: bool,
    },
    /// Log the session time of the storage file as Basecamp time entries, and remove what is done
    Checkin {
        /// Date of the time entries (year-mm-dd, e.g. 2009-02-14). Defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the tasks of the storage file
    Show {
        /// Print them as JSON
        #[arg(long)]
        json: bool,
    },
}

impl From<GlobalArgs> for GlobalParameters {
    fn from(args: GlobalArgs) -> Self {
        GlobalParameters {
            url: args.url,
            user: args.user,
            password: args.password,
            storage: args.storage,
            debug: args.debug,
        }
    }
}

fn fetch_options(active_projects: bool, remote_time: bool) -> FetchOptions {
    let mut options = FetchOptions::empty();
    options.set(FetchOptions::ACTIVE_PROJECTS, active_projects);
    options.set(FetchOptions::REMOTE_TIME, remote_time);
    options
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_level = if cli.global.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(err) = run(cli).await {
        log::error!("{}", err);
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let params = GlobalParameters::from(cli.global);

    match cli.command {
        Commands::Show { json } => {
            let registry = Registry::from_file(&require_storage(&params)?)?;
            if json {
                let roots: Vec<_> = registry.roots().collect();
                println!("{}", serde_json::to_string_pretty(&roots)?);
            } else {
                print_registry(&registry, &mut std::io::stdout())?;
            }
            Ok(())
        },
        Commands::Checkout { active_projects, fetch_time } => {
            let config = Config::from_parameters(params)?;
            let sync = Synchronizer::new(BasecampClient::new(config.account));
            let report = sync.checkout_to_file(&config.storage, fetch_options(active_projects, fetch_time)).await?;
            print_report("Checkout", &report);
            Ok(())
        },
        Commands::Update { active_projects, update_time } => {
            let config = Config::from_parameters(params)?;
            let sync = Synchronizer::new(BasecampClient::new(config.account));
            let report = sync.update_file(&config.storage, fetch_options(active_projects, update_time)).await?;
            print_report("Update", &report);
            Ok(())
        },
        Commands::Checkin { date } => {
            let date = date.as_deref().map(parse_checkin_date).transpose()?;
            let config = Config::from_parameters(params)?;
            let mut sync = Synchronizer::new(BasecampClient::new(config.account));
            let report = sync.checkin_file(&config.storage, date, &mut StdinPrompter).await?;
            print_report("Checkin", &report);
            Ok(())
        },
    }
}

fn print_report(operation: &str, report: &SyncReport) {
    if report.changed {
        println!("{} done: {}", operation, report);
    } else {
        println!("{} done, nothing has changed", operation);
    }
    for id in &report.stale {
        println!("  [{}] does not exist in Basecamp anymore", id);
    }
}
