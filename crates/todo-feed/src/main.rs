//! todo-feed - personal todos and a shared feed, kept live from Supabase.

mod app;
mod commands;
mod render;

use std::path::PathBuf;

use app::AppState;
use app_config::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};

/// todo-feed command-line interface.
#[derive(Parser)]
#[command(name = "todo-feed")]
#[command(about = "Personal todos and a shared feed backed by Supabase")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides `log_level`
    /// from config.json and TODO_FEED_LOG_LEVEL
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, session and logs. Defaults to ~/.todo-feed
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with the configured OAuth provider
    Login {
        /// URL the provider redirected back to; completes the sign-in
        #[arg(long)]
        redirect_url: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show who is signed in
    Status,
    /// Exchange the refresh token for a new session
    Refresh,
    /// Your todos
    Todos {
        #[command(subcommand)]
        command: TodosCommand,
    },
    /// The shared feed
    Feed {
        #[command(subcommand)]
        command: FeedCommand,
    },
}

#[derive(Subcommand)]
enum TodosCommand {
    /// List todos, oldest first
    List,
    /// Add a todo
    Add { text: String },
    /// Mark a todo as done
    Toggle {
        id: String,
        /// Mark as not done instead
        #[arg(long)]
        undone: bool,
    },
    /// Delete a todo
    Delete { id: String },
    /// Show todos and follow changes until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum FeedCommand {
    /// List posts, oldest first
    List,
    /// Publish a post
    Post { text: String },
    /// Show the feed and follow new posts until Ctrl-C
    Watch,
}

/// The `--log-level` flag wins over the configured level.
fn effective_log_level<'a>(cli: &'a Cli, config: &'a Config) -> &'a str {
    cli.log_level.as_deref().unwrap_or(&config.log_level)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    // Load configuration first so it can choose the log level
    let config = Config::load(&paths)?;

    // Initialize logging
    init_logging(effective_log_level(&cli, &config), &paths);
    let state = AppState::build(config, paths)?;

    match cli.command {
        Commands::Login { redirect_url } => commands::auth::login(&state, redirect_url).await?,
        Commands::Logout => commands::auth::logout(&state).await,
        Commands::Status => commands::auth::status(&state),
        Commands::Refresh => commands::auth::refresh(&state).await?,
        Commands::Todos { command } => match command {
            TodosCommand::List => commands::todos::list(&state).await?,
            TodosCommand::Add { text } => commands::todos::add(&state, &text).await?,
            TodosCommand::Toggle { id, undone } => {
                commands::todos::toggle(&state, &id, !undone).await?
            }
            TodosCommand::Delete { id } => commands::todos::delete(&state, &id).await?,
            TodosCommand::Watch => commands::todos::watch(&state).await?,
        },
        Commands::Feed { command } => match command {
            FeedCommand::List => commands::feed::list(&state).await?,
            FeedCommand::Post { text } => commands::feed::post(&state, &text).await?,
            FeedCommand::Watch => commands::feed::watch(&state).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggle_undone() {
        let cli = Cli::try_parse_from(["todo-feed", "todos", "toggle", "5", "--undone"]).unwrap();
        match cli.command {
            Commands::Todos {
                command: TodosCommand::Toggle { id, undone },
            } => {
                assert_eq!(id, "5");
                assert!(undone);
            }
            _ => panic!("unexpected command"),
        }
        assert_eq!(cli.log_level, None);
    }

    #[test]
    fn test_parse_login_with_redirect_and_global_flags() {
        let cli = Cli::try_parse_from([
            "todo-feed",
            "login",
            "--redirect-url",
            "http://localhost:3000/#access_token=a",
            "--base-dir",
            "/tmp/tf",
            "-l",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/tf")));
        assert!(matches!(
            cli.command,
            Commands::Login { redirect_url: Some(_) }
        ));
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let mut config = Config::default();
        config.log_level = "warn".to_string();

        let cli = Cli::try_parse_from(["todo-feed", "status"]).unwrap();
        assert_eq!(effective_log_level(&cli, &config), "warn");

        let cli = Cli::try_parse_from(["todo-feed", "status", "--log-level", "trace"]).unwrap();
        assert_eq!(effective_log_level(&cli, &config), "trace");
    }

    #[test]
    fn test_feed_post_requires_text() {
        assert!(Cli::try_parse_from(["todo-feed", "feed", "post"]).is_err());
    }
}
