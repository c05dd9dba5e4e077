//! The HTTP boundary: a small hyper server exposing the Telegram webhook
//! endpoint and a health check.

use crate::api::Update;
use crate::{Bot, Result};
use anyhow::Context;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Binds the port and serves requests until the process is stopped.
pub async fn serve(bot: Bot, port: u16) -> Result<()> {
    let bot = Arc::new(bot);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Unable to bind port {port}"))?;
    info!("Listening on port {port}");
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("Failed to accept a connection")?;
        let io = TokioIo::new(stream);
        let bot = bot.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let bot = bot.clone();
                async move { Ok::<_, hyper::Error>(handle(bot, request).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Connection error: {err}");
            }
        });
    }
}

/// Routes one request. Failures never escape as a protocol error; they become
/// a 500 with the body the webhook caller expects.
async fn handle<B>(bot: Arc<Bot>, request: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let result = match (request.method(), request.uri().path()) {
        (&Method::GET, "/health") => health(&bot).await,
        (&Method::POST, "/set_webhook") => webhook(bot, request).await,
        _ => Ok(plain(StatusCode::NOT_FOUND, "Not Found")),
    };
    result.unwrap_or_else(|err| {
        error!("Request failed: {err:#}");
        plain(StatusCode::INTERNAL_SERVER_ERROR, "Error Occurred")
    })
}

/// Reports the bot's identity as seen by the messaging backend, proving the
/// whole chain from HTTP to Telegram credentials is alive.
async fn health(bot: &Bot) -> Result<Response<Full<Bytes>>> {
    let me = bot.messenger().get_me().await?;
    let body = serde_json::json!({ "message": me, "status": 200 });
    let mut response = plain(StatusCode::OK, &body.to_string());
    response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

/// Accepts one Telegram update. The update is handled on a spawned task so
/// that Telegram gets its acknowledgement immediately.
async fn webhook<B>(bot: Arc<Bot>, request: Request<B>) -> Result<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    // Webhook callers get the fixed body with a 200 even when refused.
    if !json {
        return Ok(plain(StatusCode::OK, "Error Occurred"));
    }
    let body = request
        .into_body()
        .collect()
        .await
        .context("Failed to read the webhook request body")?
        .to_bytes();
    let update: Update =
        serde_json::from_slice(&body).context("Failed to parse the webhook update")?;
    tokio::spawn(async move {
        if let Err(err) = bot.dispatch(update).await {
            error!("Failed to handle update: {err:#}");
        }
    });
    Ok(plain(StatusCode::OK, "Executing"))
}

fn plain(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Mode;
    use crate::Config;
    use std::time::Duration;

    async fn test_bot() -> Arc<Bot> {
        let config = Config::for_tests(vec![42], true);
        Arc::new(Bot::new(config, Mode::Test).await.unwrap())
    }

    fn webhook_request(content_type: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri("/set_webhook")
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_the_bot_identity() {
        let bot = test_bot().await;
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle(bot, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"]["username"], "ledgerbot_test");
    }

    #[tokio::test]
    async fn webhook_acknowledges_a_valid_update() {
        let bot = test_bot().await;
        let update = r#"{
            "update_id": 1,
            "message": {
                "message_id": 2,
                "chat": { "id": 42 },
                "from": { "id": 42 },
                "text": "/start"
            }
        }"#;
        let response = handle(bot, webhook_request("application/json", update)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Executing");
        // Let the spawned dispatch settle before the runtime shuts down.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn webhook_refuses_non_json_content_with_the_fixed_body() {
        let bot = test_bot().await;
        let response = handle(bot, webhook_request("text/plain", "{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Error Occurred");
    }

    #[tokio::test]
    async fn webhook_rejects_a_malformed_update() {
        let bot = test_bot().await;
        let response = handle(bot, webhook_request("application/json", "not json")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Error Occurred");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let bot = test_bot().await;
        let request = Request::builder()
            .method(Method::GET)
            .uri("/nope")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle(bot, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
