//! Helpers shared by the unit tests: scripted stand-ins for yt-dlp/ffmpeg and a tiny
//! HTTP server that serves canned replies.

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::process::ToolCommand;

/// Behaves like yt-dlp: prints `Song.webm` for `--get-filename`, otherwise writes
/// `Song.mp3` next to the `-o` template.
pub const FAKE_DOWNLOADER: &str = r#"
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
for a in "$@"; do
  if [ "$a" = "--get-filename" ]; then echo "Song.webm"; exit 0; fi
done
dir=$(dirname "$out")
echo "[download] Destination: $dir/Song.webm"
echo "WARNING: falling back to generic extractor" >&2
printf 'ID3-fake-mp3' > "$dir/Song.mp3"
"#;

/// Behaves like ffmpeg: writes a small file at the last argument
pub const FAKE_FFMPEG: &str = r#"
for a in "$@"; do out="$a"; done
echo "Stream mapping: Stream #0:1 -> #0:0 (aac (native) -> mp3 (libmp3lame))" >&2
printf 'ID3-transcoded' > "$out"
"#;

/// Run `script` through `sh -c`; generated arguments arrive as `$1..`
pub fn shell_tool(script: &str) -> ToolCommand {
    ToolCommand::with_args(
        "sh",
        vec!["-c".to_string(), script.to_string(), "tool".to_string()],
    )
}

/// Configuration with a bucket and working directories under `root`
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.bucket = "songs".to_string();
    config.storage.key_prefix = None;
    config.app.work_dir = Some(root.to_path_buf());
    config
}

/// One canned HTTP response
pub struct HttpReply {
    status: u16,
    body: Vec<u8>,
    sent: usize,
}

impl HttpReply {
    pub fn ok(body: Vec<u8>) -> Self {
        let sent = body.len();
        Self { status: 200, body, sent }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            sent: 0,
        }
    }

    /// Announce the full body but close the connection after `sent` bytes
    pub fn truncated(body: Vec<u8>, sent: usize) -> Self {
        Self {
            status: 200,
            body,
            sent,
        }
    }
}

pub async fn serve_once(reply: HttpReply) -> String {
    serve_sequence(vec![reply]).await
}

/// Serve one reply per connection, in order; returns the URL to request
pub async fn serve_sequence(replies: Vec<HttpReply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let reason = if reply.status == 200 { "OK" } else { "Error" };
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reason,
                reply.body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&reply.body[..reply.sent]).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}/stream", addr)
}
