use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "advstate",
    about = "advstate: inspect durable state records and resolve scoped keys",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every record in a durable store
    List {
        /// Path to the durable store file
        #[arg(short, long)]
        db: String,
    },
    /// Print the JSON record stored at a scoped key
    Get {
        #[arg(short, long)]
        db: String,
        /// Scoped key, e.g. advState:x1:name
        key: String,
    },
    /// Store a JSON value at a scoped key
    Set {
        #[arg(short, long)]
        db: String,
        key: String,
        /// JSON text; must parse as a JSON value
        value: String,
    },
    /// Remove the record at a scoped key
    Rm {
        #[arg(short, long)]
        db: String,
        key: String,
    },
    /// Show the scoped key a binding would use at a location.
    ///
    /// If both --query-param and --path-pattern are given, the query
    /// parameter wins.
    Key {
        /// Location to resolve against (absolute URL or /path?query)
        #[arg(short, long, default_value = "/")]
        url: String,
        #[arg(short, long, default_value = "advState")]
        prefix: String,
        #[arg(long)]
        query_param: Option<String>,
        #[arg(long)]
        path_pattern: Option<String>,
        key: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("advstate=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { db } => commands::records::list(&db),
        Commands::Get { db, key } => commands::records::get(&db, &key),
        Commands::Set { db, key, value } => commands::records::set(&db, &key, &value),
        Commands::Rm { db, key } => commands::records::remove(&db, &key),
        Commands::Key {
            url,
            prefix,
            query_param,
            path_pattern,
            key,
        } => commands::key::resolve(&url, &prefix, query_param, path_pattern, &key),
    }
}
