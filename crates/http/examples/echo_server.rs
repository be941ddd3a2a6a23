//! Echoes every request body back to the client.
//!
//! ```text
//! cargo run --example echo_server
//! curl -v -H 'Expect: 100-continue' --data 'hello' http://127.0.0.1:8080/echo
//! ```

use futures::{SinkExt, StreamExt};
use http::StatusCode;
use micro_http_codec::codec::{Aggregated, AggregatorConfig, HttpObjectAggregator, HttpServerCodec};
use micro_http_codec::protocol::{CodecError, FullMessage, util};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const MAX_CONTENT_LENGTH: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = TcpListener::bind("127.0.0.1:8080").await?;

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        tokio::spawn(async move {
            if let Err(e) = serve(tcp_stream).await {
                error!(cause = %e, %remote_addr, "connection process error");
            }
        });
    }
}

async fn serve(tcp_stream: TcpStream) -> Result<(), CodecError> {
    let mut framed = Framed::new(tcp_stream, HttpServerCodec::default());
    let mut aggregator = HttpObjectAggregator::new(AggregatorConfig::new(MAX_CONTENT_LENGTH));

    while let Some(event) = framed.next().await {
        match aggregator.aggregate(event?)? {
            Some(Aggregated::Reply(reply)) => {
                let (close, reset) = (reply.is_close(), reply.is_reset_decoder());
                framed.send(reply.into_response()).await?;
                if close {
                    return Ok(());
                }
                if reset {
                    framed.codec_mut().reset_decoder();
                }
            }

            Some(Aggregated::Message(request)) => {
                if let Some(cause) = request.decoder_result().cause() {
                    warn!(%cause, "bad request");
                    let mut response = FullMessage::response(StatusCode::BAD_REQUEST, cause.to_string());
                    util::set_keep_alive(response.head_mut(), false);
                    framed.send(response).await?;
                    return Ok(());
                }

                info!(start_line = %request.head().start_line(), content_size = request.content().len(), "echo");
                let keep_alive = util::is_keep_alive(request.head());
                let mut response = FullMessage::response(StatusCode::OK, request.content().clone());
                if let Some(content_type) = request.headers().get("content-type") {
                    response.headers_mut().add("Content-Type", content_type);
                }
                util::set_keep_alive(response.head_mut(), keep_alive);
                framed.send(response).await?;

                if !keep_alive {
                    return Ok(());
                }
            }

            None => {}
        }
    }
    Ok(())
}
