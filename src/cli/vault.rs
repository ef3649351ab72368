use anyhow::Result;
use console::style;

use super::load_config;
use crate::core::store::Store;
use crate::core::terminal::{print_error, print_info, print_success};
use crate::core::vault::SecretsVault;

pub async fn run_vault_command(args: &[String]) -> Result<()> {
    let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");
    let config = load_config().await?;
    let store = Store::open(config.database_path()).await?;
    let vault = SecretsVault::new(store.get_db())?;
    vault.initialize().await?;

    match sub_cmd {
        "set" => match (args.get(3), args.get(4)) {
            (Some(key), Some(value)) => {
                vault.set_secret(key, value).await?;
                print_success(&format!("Stored secret '{}'.", key));
            }
            _ => println!("{}", style("Usage: maintops vault set <key> <value>").bold()),
        },
        "list" | "ls" => {
            let keys = vault.list_keys().await?;
            if keys.is_empty() {
                print_info("Vault is empty.");
            }
            for key in keys {
                println!("  {}", key);
            }
        }
        "rm" | "remove" => match args.get(3) {
            Some(key) => {
                vault.remove_secret(key).await?;
                print_success(&format!("Removed secret '{}'.", key));
            }
            None => println!("{}", style("Usage: maintops vault rm <key>").bold()),
        },
        _ => print_error("Unknown vault command. Expected: set, list, rm"),
    }
    Ok(())
}
