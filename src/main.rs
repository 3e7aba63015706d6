//! Dormboard CLI - Entry Point
//!
//! Commands:
//! - login: authenticate and persist the session
//! - register: create an account and persist the session
//! - status: show the restored session and permission set
//! - logout: clear the persisted session

use dormboard::{Config, Credentials, FileStorage, Registration, SessionStore};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!("Dormboard client v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: dormboard <COMMAND> [ARGS]");
    println!();
    println!("Commands:");
    println!("  login <username> <password>       Authenticate and persist the session");
    println!("  register <first> <last> <username> <password>");
    println!("                                    Create an account");
    println!("  status                            Show the restored session");
    println!("  logout                            Clear the persisted session");
    println!();
    println!("Environment variables:");
    println!("  DORMBOARD_API_URL            API base URL (default: http://localhost:8080)");
    println!("  DORMBOARD_STORAGE_PATH       Session file path");
    println!("  DORMBOARD_HTTP_TIMEOUT_SECS  Request timeout (default: 30)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    if matches!(command, None | Some("--help") | Some("-h")) {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let storage = FileStorage::open(config.storage_path.clone())?;
    let session = Arc::new(SessionStore::new(config, Box::new(storage)));

    // Restore before anything touches the session
    session.check_auth();

    match command {
        Some("login") => {
            let username = arg_or_env(&args, 1, "DORMBOARD_USERNAME")?;
            let password = arg_or_env(&args, 2, "DORMBOARD_PASSWORD")?;
            let profile = session
                .login(&Credentials { username, password })
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            info!("Logged in as user {}", profile.id);
            println!("Logged in as {} {}", profile.first_name, profile.last_name);
        }
        Some("register") => {
            if args.len() < 5 {
                anyhow::bail!("Usage: dormboard register <first> <last> <username> <password>");
            }
            let registration = Registration {
                first_name: args[1].clone(),
                last_name: args[2].clone(),
                username: args[3].clone(),
                password: args[4].clone(),
                ..Registration::default()
            };
            let profile = session
                .register(&registration)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Registered as {} {}", profile.first_name, profile.last_name);
        }
        Some("status") => {
            if session.is_authenticated() {
                println!("Authenticated");
                if let Some(user) = session.current_user() {
                    println!("User: {} ({} {})", user.username, user.first_name, user.last_name);
                }
                let permissions = session.permission_names();
                if permissions.is_empty() {
                    println!("No permissions granted");
                } else {
                    println!("Permissions: {}", permissions.join(", "));
                }
            } else {
                println!("Not authenticated");
            }
        }
        Some("logout") => {
            session.logout();
            println!("Logged out");
        }
        Some(other) => {
            anyhow::bail!("Unknown command: {} (try --help)", other);
        }
        None => unreachable!(),
    }

    Ok(())
}

fn arg_or_env(args: &[String], index: usize, var: &str) -> anyhow::Result<String> {
    args.get(index)
        .cloned()
        .or_else(|| std::env::var(var).ok())
        .ok_or_else(|| anyhow::anyhow!("Missing argument (or set {})", var))
}
