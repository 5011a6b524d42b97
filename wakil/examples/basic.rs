//! Basic example of the Wakil container.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use wakil::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

#[derive(Injectable)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

upcast!(ConsoleLogger => dyn Logger);

struct Config {
    database_url: String,
    debug: bool,
}

#[derive(Injectable)]
struct Database {
    config: Arc<Config>,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.config.database_url)
    }
}

/// One per request; rolled back unless committed.
#[derive(Injectable)]
#[injectable(disposable)]
struct Transaction {
    db: Arc<Database>,
    #[inject(default)]
    committed: Mutex<bool>,
}

impl Disposable for Transaction {
    fn enter(&self) {
        self.db.logger.log("BEGIN");
    }

    fn exit(&self, outcome: &Outcome<'_>) {
        let committed = self.committed.lock().map(|flag| *flag).unwrap_or(false);
        match outcome {
            Outcome::Failed(err) => {
                warn!(error = %err, "Request failed, rolling back");
                self.db.logger.log("ROLLBACK");
            }
            Outcome::Completed if committed => self.db.logger.log("COMMIT"),
            Outcome::Completed => self.db.logger.log("ROLLBACK"),
        }
    }
}

#[derive(Injectable)]
struct UserService {
    tx: Arc<Transaction>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.tx.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("wakil_container=debug,basic=info")
        .init();

    let builder = Provider::builder()
        .instance(Arc::new(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        }))
        .singleton_as::<dyn Logger, ConsoleLogger>()
        .singleton::<Database>()
        .scoped::<Transaction>()
        .transient::<UserService>()
        .thread_safe();

    builder.validate()?;
    info!("Dependency graph validated");
    let root = builder.build()?;

    println!("Container built: {root:?}");

    let config = root.require::<Config>()?;
    println!("Config: database_url={}, debug={}", config.database_url, config.debug);

    // === One scope per request ===
    root.with_scope(|scope| {
        info!(depth = scope.depth(), "Handling request");
        let service = scope.require::<UserService>()?;
        println!("{}", service.get_user(42));

        // Same scope: the transaction is reused
        let again = scope.require::<UserService>()?;
        println!("{}", again.get_user(7));

        if let Ok(mut committed) = again.tx.committed.lock() {
            *committed = true;
        }
        Ok::<_, WakilError>(())
    })?;

    root.close();
    info!("Container closed");
    Ok(())
}
