//! tellr Server Binary
//!
//! Standalone entry point - delegates to lib.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = tellr_core::load_config(&cwd, None)?;
    tellr_server::run_server(config, false).await
}
