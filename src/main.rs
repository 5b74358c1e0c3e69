//! Servell demo server.
//!
//! Serves an `Accounts` class at the default endpoint `/api/rpc`.

use servell::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

/// In-memory balances shared by the demo methods.
fn balances() -> &'static Mutex<HashMap<String, i64>> {
    static BALANCES: OnceLock<Mutex<HashMap<String, i64>>> = OnceLock::new();
    BALANCES.get_or_init(|| Mutex::new(HashMap::from([("u1".to_string(), 42)])))
}

fn read_balance(id: &str) -> Result<i64, Failure> {
    let balances = balances()
        .lock()
        .map_err(|_| Failure::new("balance store poisoned"))?;
    balances
        .get(id)
        .copied()
        .ok_or_else(|| Failure::new("not found"))
}

async fn get_balance(invocation: Invocation) -> Result<Value, Failure> {
    let id: String = invocation.arg_as(0)?;
    Ok(json!(read_balance(&id)?))
}

async fn describe(invocation: Invocation) -> Result<Value, Failure> {
    let id: String = invocation.arg_as(0)?;
    Ok(json!(format!("{} holds {}", id, read_balance(&id)?)))
}

#[derive(serde::Deserialize)]
struct Deposit {
    id: String,
    amt: i64,
}

#[rpc_method(name = "deposit", verb = "POST", body = "json", cache = "no-store")]
async fn deposit(invocation: Invocation) -> Result<Value, Failure> {
    let request: Deposit = invocation.arg_as(0)?;
    if request.amt <= 0 {
        return Err(Failure::named("RangeError", "amount must be positive"));
    }

    let mut balances = balances()
        .lock()
        .map_err(|_| Failure::new("balance store poisoned"))?;
    let balance = balances.entry(request.id).or_insert(0);
    *balance += request.amt;
    Ok(json!(*balance))
}

fn currency(_invocation: Invocation) -> Result<Value, Failure> {
    Ok(json!("EUR"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting servell demo server...");

    let config = ServerConfig::new().host("0.0.0.0").port(8080);
    let registry = FunctionRegistry::global();

    let accounts = ClassDef::new("Accounts")
        .constant("CURRENCY", "EUR")
        .method("getBalance", get_balance)
        .method("describe", describe)
        .param("describe", MethodMeta::new().content("text"))
        .declare::<DepositMethod>()
        .sync_method("currency", currency);

    // Augment before serving: the registry must be complete before traffic.
    Augmenter::new(registry.clone())
        .augment(accounts, &AugmentOptions::server())
        .await?;

    tracing::info!(
        "Try: curl -H 'X-Servell-Function: Accounts.getBalance' -H 'X-Servell-Args: [\"u1\"]' http://localhost:8080/api/rpc"
    );
    tracing::info!(
        "Try: curl -X POST -H 'X-Servell-Function: Accounts.deposit' -H 'X-Servell-Args: body' -d '[{{\"id\":\"u1\",\"amt\":5}}]' http://localhost:8080/api/rpc"
    );
    tracing::info!("Registry: curl http://localhost:8080/_functions");

    RpcServer::new(config, registry).run().await
}
