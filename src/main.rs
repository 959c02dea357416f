use anyhow::Context;
use cbpro::{build_client, ClientConfig};

/// Lists the profile's accounts with their active holds.
///
/// Reads `COINBASE_PRO_API_KEY`, `COINBASE_PRO_API_SECRET` and
/// `COINBASE_PRO_API_PASSPHRASE`; set `COINBASE_PRO_SANDBOX=true` to use the
/// sandbox.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_env("COINBASE_PRO").context("loading configuration")?;
    let client = build_client(config)?;

    println!("Fetching accounts...");
    let accounts = client.list_accounts().await?;
    println!("Found {} accounts", accounts.len());

    for account in accounts.iter().filter(|account| !account.hold.is_zero()) {
        println!(
            "{} ({}): balance {}, available {}, on hold {}",
            account.currency, account.id, account.balance, account.available, account.hold
        );
        match client.get_account_holds(&account.id).await {
            Ok(holds) => {
                for hold in holds {
                    println!("  {:?} hold of {} for {}", hold.hold_type, hold.amount, hold.reference);
                }
            }
            Err(e) if e.is_retryable() => {
                println!("  holds unavailable right now: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
