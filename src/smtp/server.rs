//! The TCP acceptor loop.
//!
//! Binds the configured address, then spawns one task per accepted
//! connection, each driving its own `SmtpSession`.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, trace};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::handler::MessageHandler;
use crate::smtp::session::SmtpSession;

/// Listens for SMTP connections and spawns a session task per client.
pub struct Server {
    config: Arc<Config>,
    handler: Arc<dyn MessageHandler>,
}

impl Server {
    pub fn new(config: Arc<Config>, handler: Arc<dyn MessageHandler>) -> Self {
        Server { config, handler }
    }

    /// Binds the listener and accepts connections until the process is
    /// told to shut down by the caller (see `lib::run`'s signal handling).
    ///
    /// Accept errors are logged and don't stop the loop; a failed bind is
    /// the only fatal error this returns.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("SMTP server listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("new connection from {}", peer);
                    let config = Arc::clone(&self.config);
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, config, handler, peer.to_string()).await {
                            error!("error handling connection from {}: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {:?}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    config: Arc<Config>,
    handler: Arc<dyn MessageHandler>,
    peer: String,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let reader = BufReader::new(read_half);
    trace!("starting session for {}", peer);
    let session = SmtpSession::new(reader, write_half, config, handler, peer.clone());
    session.run().await?;
    info!("closing connection from {}", peer);
    Ok(())
}
