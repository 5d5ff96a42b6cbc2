use clap::{Parser, Subcommand};

/// Lakehouse Relay: REST relay for a data-lakehouse platform
#[derive(Parser)]
#[command(name = "lakehouse-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind (defaults to PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Authenticate once and print the token lifetime
    Login,

    /// Run one SQL statement and print the results
    Query {
        #[arg(long)]
        sql: String,
        #[arg(long, default_value = "iceberg_data")]
        catalog: String,
        #[arg(long, default_value = "default")]
        schema: String,
        /// csv or json
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Show the platform status of a submitted query
    QueryStatus {
        query_id: String,
    },

    /// Ask the platform to cancel a query
    CancelQuery {
        query_id: String,
    },
}
