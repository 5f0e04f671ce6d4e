//! Interactive chat client for the Kaiwa message server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kaiwa-client -- --sender-id alice --token <bearer> --room lobby
//! ```

use clap::Parser;

use kaiwa_client::repl::ClientArgs;
use kaiwa_shared::setup_logger;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = ClientArgs::parse();

    // Run the client
    if let Err(e) = kaiwa_client::run_client(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
