use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    solwatch_node::run().await?;
    Ok(())
}
