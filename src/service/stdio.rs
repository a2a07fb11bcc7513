//! Line-delimited JSON transport over a reader/writer pair.
//!
//! Each input line is one request; each answer is one output line. Change
//! notices are interleaved on the same output as `{"notice": ...}` lines.

use super::owner::CacheHandle;
use crate::error::ApiError;
use crate::types::ChangeNotice;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct NoticeLine<'a> {
    notice: &'a ChangeNotice,
}

/// Write `value` as one line. A value that cannot be serialized is logged
/// and skipped; only I/O failures end the transport.
async fn write_line<W, T>(writer: &mut W, value: &T) -> Result<(), ApiError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = match serde_json::to_vec(value) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Dropping line that cannot be serialized");
            return Ok(());
        }
    };
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

async fn next_notice(
    notices: &mut Option<broadcast::Receiver<ChangeNotice>>,
) -> Result<ChangeNotice, RecvError> {
    match notices {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Serve requests from `reader` until end of input.
pub async fn serve_lines<R, W>(
    handle: &CacheHandle,
    mut notices: Option<broadcast::Receiver<ChangeNotice>>,
    reader: R,
    mut writer: W,
) -> Result<(), ApiError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    info!("Awaiting requests");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    let response = handle.dispatch_raw(&line).await;
                    debug!(cmd = %response.cmd, error = response.is_error(), "Answer");
                    write_line(&mut writer, &response).await?;
                }
                None => {
                    info!("Input closed");
                    return Ok(());
                }
            },
            notice = next_notice(&mut notices) => match notice {
                Ok(notice) => write_line(&mut writer, &NoticeLine { notice: &notice }).await?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notice stream lagged, notices dropped");
                }
                Err(RecvError::Closed) => notices = None,
            },
        }
    }
}
