//! Orchestrates application startup and the server lifecycle.
//!
//! This library crate loads configuration, builds the default
//! `MessageHandler`, and runs the SMTP server until the process receives a
//! shutdown signal.

pub mod config;
pub mod error;
pub mod handler;
pub mod smtp;

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

use handler::ConsoleHandler;
use smtp::server::Server;

/// Runs the SMTP engine to completion.
///
/// Loads configuration from the environment, then runs the acceptor loop
/// until a `Ctrl-C` (or, on Unix, `SIGTERM`) is received. Returns an `Err`
/// if configuration loading fails or the server task itself fails.
pub async fn run() -> Result<()> {
    info!(
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let config = Arc::new(config);
    let handler = Arc::new(ConsoleHandler);
    let server = Server::new(Arc::clone(&config), handler);

    let server_handle = tokio::spawn(async move { server.run().await });

    tokio::select! {
        res = server_handle => {
            match res {
                Ok(Ok(())) => Err(anyhow::anyhow!("SMTP server exited cleanly, which is unexpected")),
                Ok(Err(e)) => {
                    error!("SMTP server returned error: {}", e);
                    Err(e)
                }
                Err(join_error) => {
                    error!("SMTP server task failed: {}", join_error);
                    Err(anyhow::anyhow!("SMTP server task failed: {}", join_error))
                }
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
