//! Places Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = places_backend::run().await {
        tracing::error!("Server stopped: {}", e);
        eprintln!("FATAL: {}", e);
        std::process::exit(1);
    }
}
