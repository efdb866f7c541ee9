use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    codedocs_cli::main_entry().await
}
