use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use dashboard::{
    cache::LocalCache,
    client::CaseApiClient,
    detail::{ConfirmOutcome, ContactTable, SortField, confirm, render_detail},
    render::render_list,
    state::{DEFAULT_POLL_INTERVAL, Dashboard},
};
use schema::CaseId;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Terminal dashboard for the case API.
#[derive(Debug, Parser)]
#[command(name = "dashboard", version)]
struct Cli {
    /// Case API base URL.
    #[arg(long, env = "DASHBOARD_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Cache file holding the last known case list.
    #[arg(long, env = "DASHBOARD_CACHE")]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the case list once and print it.
    List {
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Print the list, then keep polling for confirmation links until Ctrl+C.
    Watch {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
        interval_secs: u64,
    },
    /// Show one case with its contact table.
    Show {
        id: CaseId,
        /// Contact search text.
        #[arg(long, default_value = "")]
        search: String,
        /// Sort clicks applied in order; repeating a field flips its direction.
        #[arg(long = "sort", value_enum)]
        sort: Vec<SortField>,
        /// Contact positions to mark as selected.
        #[arg(long = "select")]
        select: Vec<usize>,
    },
    /// POST the confirmation for one case to its assigned link.
    Confirm { id: CaseId },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let client = CaseApiClient::new(&cli.base_url).map_err(|err| err.to_string())?;
    let cache = LocalCache::new(cli.cache.unwrap_or_else(LocalCache::default_path));
    let mut dashboard = Dashboard::new(client, cache);

    match cli.command {
        Command::List { query } => {
            dashboard.mount().await;
            dashboard.state_mut().set_query(query);
            println!("{}", render_list(dashboard.state(), DEFAULT_POLL_INTERVAL));
        }
        Command::Watch {
            query,
            interval_secs,
        } => {
            let interval = Duration::from_secs(interval_secs.max(1));
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });
            let mut dashboard = dashboard.with_shutdown(shutdown_rx);
            dashboard.mount().await;
            dashboard.state_mut().set_query(query);
            println!("{}", render_list(dashboard.state(), interval));
            dashboard
                .watch(interval, |state| println!("{}", render_list(state, interval)))
                .await;
        }
        Command::Show {
            id,
            search,
            sort,
            select,
        } => {
            dashboard.mount().await;
            let record = dashboard
                .state()
                .find(id)
                .ok_or_else(|| format!("case {id} not found"))?;
            let mut table = ContactTable::default();
            table.set_search(search);
            for field in sort {
                table.toggle_sort(field);
            }
            for index in select {
                table.toggle_selected(index);
            }
            println!("{}", render_detail(record, &table));
        }
        Command::Confirm { id } => {
            dashboard.mount().await;
            let record = dashboard
                .state()
                .find(id)
                .ok_or_else(|| format!("case {id} not found"))?;
            match confirm(dashboard.client(), record).await {
                ConfirmOutcome::Sent => println!("case {id} confirmed"),
                ConfirmOutcome::NoUrl => println!("case {id} has no confirmation link yet"),
                ConfirmOutcome::Failed(reason) => {
                    return Err(format!("confirming case {id} failed: {reason}"));
                }
            }
        }
    }
    Ok(())
}
