use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub async fn local_tcp_listener(port: Option<u16>) -> Result<TcpListener, io::Error> {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(0)))).await
}
