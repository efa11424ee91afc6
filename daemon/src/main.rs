use clap::Parser;
use kviewd::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    kviewd::run(args).await
}
