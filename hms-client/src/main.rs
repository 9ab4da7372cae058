//! HMS client entry point.
//!
//! Loads configuration, restores the session, optionally signs in from
//! `HMS_EMAIL`/`HMS_PASSWORD`, then prints dashboard stats and the first page
//! of patients as JSON.

use hms_client::api::{dashboard, patients};
use hms_client::telemetry;
use hms_client::{ClientConfig, ClientError, Credentials, GetPatientsQuery, HmsClient};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    telemetry::init_logging(&config.logging);

    let client = HmsClient::from_config(&config)?;
    match client.restore() {
        Ok(Some(user)) => tracing::info!(user = %user.email, "resuming session"),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable identity snapshot"),
    }

    if let (Ok(email), Ok(password)) = (std::env::var("HMS_EMAIL"), std::env::var("HMS_PASSWORD")) {
        let user = client.login(&Credentials { email, password }).await?;
        tracing::info!(user = %user.email, role = %user.role, "signed in");
    }

    let stats = client.fetch(dashboard::get_dashboard_stats()).await?;
    let page = client
        .fetch(patients::get_patients(&GetPatientsQuery::default()))
        .await?;

    let output = json!({
        "dashboard": stats.as_ref(),
        "patients": page.as_ref(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    let cache = client.store().stats();
    tracing::debug!(
        entries = cache.entry_count,
        hit_rate = cache.hit_rate(),
        "cache statistics"
    );
    Ok(())
}
