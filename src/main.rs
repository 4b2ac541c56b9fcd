#[tokio::main]
async fn main() {
    eventbot::app::run().await;
}
