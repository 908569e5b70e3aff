//! CMS Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = cms_backend::run().await {
        eprintln!("cms-backend failed to start: {e}");
        std::process::exit(1);
    }
}
