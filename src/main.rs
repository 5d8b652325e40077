use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = quentis_link::args::parse();
    quentis_link::cli::main(args).await
}
