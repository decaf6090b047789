#![allow(dead_code)]

use clap::{Parser, Subcommand};
use postgres::{Client, NoTls};

mod context;
mod utils;

#[derive(Parser)]
#[clap(version = "0.1", about = "Administrative tasks for the crowd server database")]
struct Opts {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Create the tables if they do not exist yet.
    Init,
    /// Delete an event together with its chat messages.
    DeleteEvent { event_id: i32 },
    /// Delete a user together with the chat messages they wrote.
    DeleteUser { user_id: i32 },
}

fn connect() -> Result<Client, anyhow::Error> {
    let config = context::DatabaseConfig::from_env()?;
    Ok(postgres::Config::from(config.postgres).connect(NoTls)?)
}

fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    let opts: Opts = Opts::parse();
    let mut client = connect()?;

    match opts.subcmd {
        SubCommand::Init => {
            println!("initializing database");
            client.batch_execute(include_str!("../schema.sql"))?;
        }
        SubCommand::DeleteEvent { event_id } => {
            let deleted = client.execute(include_str!("events/sql/delete.sql"), &[&event_id])?;
            if deleted == 0 {
                anyhow::bail!("The event {} does not exist", event_id);
            }
            println!("deleted event {}", event_id);
        }
        SubCommand::DeleteUser { user_id } => {
            let deleted = client.execute(include_str!("users/sql/delete.sql"), &[&user_id])?;
            if deleted == 0 {
                anyhow::bail!("The user {} does not exist", user_id);
            }
            println!("deleted user {}", user_id);
        }
    }
    Ok(())
}
