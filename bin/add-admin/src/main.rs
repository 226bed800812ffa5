//! `storefront-add-admin <ACCOUNT_ID>`
//!
//! Requires `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`. Exits 0 when the
//! account is (or already was) an admin, 1 otherwise.

use std::process::ExitCode;
use storefront_add_admin::{
    ProvisionError, ProvisionOutcome, ProvisionSettings, USAGE, exit_code, load_service_config,
    parse_account_arg, provision_admin,
};
use storefront_baas::BaasClient;
use storefront_core::{AccountId, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let account_id = match parse_account_arg(std::env::args().nth(1)) {
        Ok(account_id) => account_id,
        Err(e) => {
            tracing::error!(error = %e, "invalid arguments");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&account_id).await;
    match &result {
        Ok(outcome) => println!("{}", outcome.message(&account_id)),
        Err(e) => tracing::error!(account_id = %account_id, error = %e, "failed to add admin"),
    }
    exit_code(&result)
}

async fn run(
    account_id: &AccountId,
) -> Result<ProvisionOutcome, ProvisionError> {
    let config = load_service_config()?;
    let settings = ProvisionSettings::from_env()?;
    let client = BaasClient::service_role(&config).map_err(|e| ProvisionError::Configuration {
        details: e.to_string(),
    })?;
    tracing::info!(url = config.url(), table = %settings.admins_table, "connected");

    provision_admin(&client, &client, &settings.admins_table, account_id).await
}
