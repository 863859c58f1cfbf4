#[tokio::main]
async fn main() {
    reviews_service::start_server().await;
}
