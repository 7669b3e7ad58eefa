mod bootstrap;
mod database;
mod host;
mod http;
mod render;
mod session;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
