//! # Domain Sample
//!
//! A small backoffice built on the domain framework.
//!
//! - **[model]**: Stored models ([`User`](domain_sample::model::User), `Address`, `Order`).
//! - **[store]**: The generic in-memory `Table` holding them.
//! - **[operations]**: Generic commands (find, add, update, remove, search, query, transition).
//! - **[backoffice] / [partner]**: The two namespaces and their command factories.
//! - **[lifecycle]**: The [`Backoffice`] system wiring registry, tables and serializers.
//!
//! The demo below creates a user with an address, places orders through the partner
//! namespace, then shows how the same user looks from each domain.

use domain_framework::tracing::setup_tracing;
use domain_framework::{OperationResult, Params};
use domain_sample::backoffice;
use domain_sample::lifecycle::Backoffice;
use domain_sample::partner;
use domain_sample::settings::Settings;
use serde_json::json;
use tracing::{error, info};

fn id_of(result: &OperationResult) -> Result<i64, String> {
    result
        .value()
        .and_then(|payload| payload.as_view())
        .and_then(|view| view.get("id"))
        .and_then(|id| id.as_i64())
        .ok_or_else(|| "operation returned no id".to_string())
}

fn params(value: serde_json::Value) -> Result<Params, String> {
    Params::try_from(value).map_err(|e| e.to_string())
}

fn main() -> Result<(), String> {
    setup_tracing();

    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let system = Backoffice::with_settings(&settings).map_err(|e| e.to_string())?;
    info!("Starting backoffice demo");

    let address = system
        .operation(
            backoffice::add_address(&system),
            Some("main"),
            params(json!({ "street": "1 Main St", "city": "Springfield" }))?,
        )
        .perform();
    let address_id = id_of(&address)?;

    let user = system
        .operation(
            backoffice::add_user(&system),
            Some("main"),
            params(json!({
                "name": "Alice",
                "email": "alice@example.com",
                "address_id": address_id,
            }))?,
        )
        .perform();
    let user_id = id_of(&user)?;
    info!(user_id, "User created");

    for total in [1200, 4500] {
        let order = system
            .operation(
                partner::add_order(&system),
                Some("partner"),
                params(json!({ "user_id": user_id, "total": total }))?,
            )
            .perform();
        if let Some(e) = order.error() {
            error!(error = %e, "Order intake failed");
        }
    }

    for domain in ["main", "partner"] {
        let found = system
            .operation(
                partner::find_user(&system),
                Some(domain),
                Params::new().with("id", user_id),
            )
            .perform();
        let rendered = serde_json::to_string_pretty(&found).map_err(|e| e.to_string())?;
        info!(domain, "User as seen from {domain}:\n{rendered}");
    }

    let blocked = system
        .operation(
            backoffice::find_user(&system),
            Some("partner"),
            Params::new().with("id", user_id),
        )
        .perform();
    if let Some(e) = blocked.error() {
        info!(kind = %e.kind(), "Partner call to backoffice refused: {e}");
    }

    let search = system
        .operation(
            backoffice::search_users(&system),
            Some("main"),
            params(json!({ "page": 1, "per": 10, "order": "name" }))?,
        )
        .perform();
    let rendered = serde_json::to_string(&search).map_err(|e| e.to_string())?;
    info!("Search result: {rendered}");

    info!("Backoffice demo completed");
    Ok(())
}
