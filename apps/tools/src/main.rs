use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/personnel.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account, or reset the password of an existing one.
    CreateUser { username: String, password: String },
    ListUsers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username, password } => {
            let username = username.trim();
            if username.is_empty() {
                bail!("username must not be empty");
            }
            let user_id = storage.create_user(username, &password).await?;
            println!("stored user_id={} username={username}", user_id.0);
        }
        Command::ListUsers => {
            for username in storage.list_usernames().await? {
                println!("{username}");
            }
        }
    }

    Ok(())
}
