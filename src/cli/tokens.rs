use anyhow::Result;
use console::style;

use super::{flag_value, load_config};
use crate::core::session::SessionKeys;
use crate::core::store::Store;
use crate::core::terminal::{print_error, print_success};

/// `maintops token issue --email <email> [--user-id <id>] [--name <name>]`
///
/// Without `--user-id` the user is looked up by email and created when
/// missing, the same way a first Google sign-in would.
pub async fn run_token_command(args: &[String]) -> Result<()> {
    let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");
    if sub_cmd != "issue" {
        println!(
            "{}",
            style("Usage: maintops token issue --email <email> [--user-id <id>] [--name <name>]")
                .bold()
        );
        return Ok(());
    }

    let Some(email) = flag_value(args, 3, "--email").filter(|e| !e.trim().is_empty()) else {
        print_error("--email is required.");
        return Ok(());
    };

    let config = load_config().await?;
    let Some(secret) = config.jwt_secret.clone() else {
        print_error("jwt_secret is not configured; a token signed now would not verify on the server.");
        return Ok(());
    };
    let keys = SessionKeys::new(secret, config.jwt_expiry_hours)?;

    let user_id = match flag_value(args, 3, "--user-id") {
        Some(id) => id,
        None => {
            let store = Store::open(config.database_path()).await?;
            match store.find_user_by_email(&email).await? {
                Some(user) => user.id,
                None => {
                    let name = flag_value(args, 3, "--name").unwrap_or_else(|| email.clone());
                    store.upsert_user(&email, &name, "").await?.id
                }
            }
        }
    };

    let token = keys.issue(&email, &user_id)?;
    // Bare token on stdout so scripts can capture it.
    println!("{}", token);
    print_success(&format!(
        "Session token issued for {} (user {}), valid {}h.",
        email, user_id, config.jwt_expiry_hours
    ));
    Ok(())
}
