#[tokio::main]
async fn main() -> anyhow::Result<()> {
    devprobe::cli::run_cli().await
}
