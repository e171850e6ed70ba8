#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = placement_portal::run().await {
        eprintln!("placement-portal fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
