use crate::Connector;
use client::Upstream;
use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Serve newline-delimited JSON-RPC requests until `reader` is exhausted.
///
/// Every request line gets exactly one response line, in order.
pub async fn serve<U, R, W>(connector: &Connector<U>, reader: R, mut writer: W) -> eyre::Result<()>
where
    U: Upstream + Clone + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut served = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => connector.handle(request).await,
            Err(e) => {
                debug!(error = %e, "Unparseable request");
                JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError {
                        code: PARSE_ERROR,
                        message: format!("parse error: {e}"),
                        data: None,
                    },
                )
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        served += 1;
    }

    info!(served, "Input closed");
    Ok(())
}
