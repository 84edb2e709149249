#[tokio::main]
async fn main() {
    if let Err(e) = gradapi_lib::run().await {
        tracing::error!("{e}");
        eprintln!("gradapi: {e}");
        std::process::exit(1);
    }
}
