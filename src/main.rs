#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cartesian_coach_lib::run().await
}
