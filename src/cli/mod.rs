mod serve;
mod tokens;
mod vault;

use anyhow::Result;
use console::style;

use crate::core::config::AppConfig;
use crate::core::terminal::{self, GuideSection, print_error, print_success};
use crate::core::store::Store;
use crate::core::lifecycle::ReconcileSweep;
use crate::platform::{NativePlatform, Platform};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the API server and reconcile sweep")
        .text("--api-host <host>  --api-port <port> override config.toml")
        .print();

    GuideSection::new("Administration")
        .command("token issue", "Sign a session token for a user")
        .blank()
        .command("vault set", "Store an encrypted secret (llm_api_key, google_client_secret)")
        .command("vault list", "List stored secret names")
        .command("vault rm", "Remove a stored secret")
        .command("reconcile", "Clear active failures that were already resolved")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style("maintops").green()
    );
}

/// Value following `flag`, searching from `start`.
pub(crate) fn flag_value(args: &[String], start: usize, flag: &str) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(api_port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

async fn load_config() -> Result<AppConfig> {
    let data_dir = NativePlatform::data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;
    NativePlatform::restrict_dir_permissions(&data_dir);
    AppConfig::load(&data_dir).await
}

async fn run_reconcile() -> Result<()> {
    let config = load_config().await?;
    let store = Store::open(config.database_path()).await?;
    let removed = ReconcileSweep::run_once(&store).await?;
    print_success(&format!(
        "Reconcile finished: {} stale active failure(s) removed.",
        removed
    ));
    Ok(())
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("");

    match cmd {
        "serve" => serve::run_serve(&args).await,
        "token" => tokens::run_token_command(&args).await,
        "vault" => vault::run_vault_command(&args).await,
        "reconcile" => run_reconcile().await,
        "" | "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'.", other));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn api_flags_override_defaults() {
        let argv = args(&["maintops", "serve", "--api-port", "9000", "--api-host", "0.0.0.0"]);
        let (host, port) = parse_api_server_flags(&argv, 2, "127.0.0.1".into(), 17890);
        assert_eq!(host, "0.0.0.0");
        assert_eq!(port, 9000);
    }

    #[test]
    fn bad_port_keeps_previous_value() {
        let argv = args(&["maintops", "serve", "--api-port", "nope"]);
        let (_, port) = parse_api_server_flags(&argv, 2, "127.0.0.1".into(), 18000);
        assert_eq!(port, 18000);
    }

    #[test]
    fn flag_value_finds_trailing_flags() {
        let argv = args(&["maintops", "token", "issue", "--email", "a@b.c"]);
        assert_eq!(flag_value(&argv, 3, "--email").as_deref(), Some("a@b.c"));
        assert_eq!(flag_value(&argv, 3, "--user-id"), None);
        let argv = args(&["maintops", "token", "issue", "--email"]);
        assert_eq!(flag_value(&argv, 3, "--email"), None);
    }
}
