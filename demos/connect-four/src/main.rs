//! Connect Four server.
//!
//! Listens on `HOST:PORT` (default `0.0.0.0:8001`) and serves games until
//! Ctrl-C or SIGTERM. Log verbosity follows `RUST_LOG` (default `info`).

use dropline::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(addr = %config.bind_addr(), "starting connect four server");

    let server = DroplineServerBuilder::new()
        .config(config)
        .build::<Connect4>()
        .await?;

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where signals exist.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl-C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> String {
        let server = DroplineServerBuilder::new()
            .bind("127.0.0.1:0")
            .build::<Connect4>()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn ws(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws
    }

    async fn send(ws: &mut Ws, value: Value) {
        ws.send(Message::Text(value.to_string().into())).await.unwrap();
    }

    async fn next(ws: &mut Ws) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .unwrap()
            .unwrap();
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    }

    /// Plays a game the way a browser would: raw JSON on both sides.
    #[tokio::test]
    async fn test_full_game_over_raw_json() {
        let addr = start().await;

        let mut red = ws(&addr).await;
        send(&mut red, json!({"type": "init"})).await;
        let init = next(&mut red).await;
        assert_eq!(init["type"], "init");
        let join = init["join"].as_str().unwrap().to_string();
        let watch = init["watch"].as_str().unwrap().to_string();

        let mut yellow = ws(&addr).await;
        send(&mut yellow, json!({"type": "init", "join": join})).await;

        // Red stacks column 3, yellow stacks column 4.
        for turn in 0..7 {
            let (mover, column) = if turn % 2 == 0 {
                (&mut red, 3)
            } else {
                (&mut yellow, 4)
            };
            send(mover, json!({"type": "play", "column": column})).await;

            let expected = json!({
                "type": "play",
                "player": turn % 2 + 1,
                "column": column,
                "row": turn / 2,
            });
            assert_eq!(next(&mut red).await, expected);
            assert_eq!(next(&mut yellow).await, expected);
        }

        let win = json!({"type": "win", "winner": 1});
        assert_eq!(next(&mut red).await, win);
        assert_eq!(next(&mut yellow).await, win);

        let mut viewer = ws(&addr).await;
        send(&mut viewer, json!({"type": "init", "watch": watch})).await;
        for turn in 0..7 {
            assert_eq!(next(&mut viewer).await["row"], turn / 2);
        }
    }

    #[tokio::test]
    async fn test_unknown_game_reports_error() {
        let addr = start().await;
        let mut client = ws(&addr).await;

        send(&mut client, json!({"type": "init", "join": "nope"})).await;

        assert_eq!(
            next(&mut client).await,
            json!({"type": "error", "message": "Game not found"})
        );
    }
}
