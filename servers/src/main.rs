#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use ruse_servers::{
    FixtureServer, MARKER_PRIMARY, MARKER_SECONDARY, bait_handler, server_redirect_handler,
    switch_handler,
};
use ruse_shared::io::local_tcp_listener;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let primary = FixtureServer::new();
    primary.register_handler("/bait", bait_handler());
    primary.register_handler("/bait2", bait_handler());
    primary.register_handler("/switch", switch_handler(MARKER_PRIMARY));
    primary.register_handler(
        "/frog",
        server_redirect_handler("/bait".to_string()),
    );

    let secondary = FixtureServer::new();
    secondary.register_handler("/switch", switch_handler(MARKER_SECONDARY));

    let (_, primary_handle) = primary.start(local_tcp_listener(Some(8000)).await?).await?;
    let (_, secondary_handle) = secondary.start(local_tcp_listener(Some(8001)).await?).await?;

    println!("PRIMARY   →   http://localhost:8000");
    println!("SECONDARY →   http://localhost:8001");

    let _ = tokio::join!(primary_handle, secondary_handle);
    Ok(())
}
