#[tokio::main]
async fn main() {
    profile::start_server().await;
}
