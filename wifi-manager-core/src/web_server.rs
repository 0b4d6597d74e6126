use crate::manager::{ReconfigureOutcome, WifiManager};
use crate::ota::OtaSession;
use crate::traits::UiAssetProvider;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Web 服务器状态
pub struct AppState {
    pub manager: Arc<WifiManager>,
    pub frontend: Arc<dyn UiAssetProvider>,
}

pub type WebServerState = State<Arc<AppState>>;

/// Builds the configuration server's routes.
pub fn router(manager: Arc<WifiManager>, frontend: Arc<dyn UiAssetProvider>) -> Router {
    let app_state = Arc::new(AppState { manager, frontend });

    Router::new()
        .route("/", get(serve_index))
        .route("/wificonfig", get(serve_wifi_config))
        .route("/update", get(serve_update_page))
        .route("/getnetinfo", get(api_net_info))
        .route("/getssids", get(api_ssids))
        .route("/connect", post(api_connect))
        // 固件镜像远大于默认的 2MB 请求体限制
        .route(
            "/upload",
            post(api_upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/generate_204", get(handle_captive_portal))
        .fallback(get(serve_static_asset))
        .with_state(app_state)
}

/// Serves `app` until the listener fails.
pub async fn serve(listener: TcpListener, app: Router) -> crate::Result<()> {
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// --- Route Handlers ---

async fn serve_index(State(state): WebServerState) -> Response {
    serve_page(&state, "index.html").await
}

async fn serve_wifi_config(State(state): WebServerState) -> Response {
    serve_page(&state, "wificonfig.html").await
}

async fn serve_update_page(State(state): WebServerState) -> Response {
    serve_page(&state, "update.html").await
}

/// Fallback for everything the routes above do not match (CSS, icons).
async fn serve_static_asset(State(state): WebServerState, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    serve_page(&state, path).await
}

async fn serve_page(state: &AppState, path: &str) -> Response {
    match state.frontend.get_asset(path).await {
        Ok((data, mime)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime)
            .body(Body::from(data))
            .unwrap_or_else(|_| {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
            }),
        Err(e) => {
            tracing::warn!("Failed to get asset: {} (Error: {})", path, e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

/// Current connection state as JSON.
async fn api_net_info(State(state): WebServerState) -> impl IntoResponse {
    Json(state.manager.net_info().await)
}

/// Scans and returns the SSIDs found.
async fn api_ssids(State(state): WebServerState) -> impl IntoResponse {
    tracing::debug!("Handling /getssids");
    Json(state.manager.scan().await)
}

/// Takes the `ssid` and `password` arguments and tries them.
///
/// When the device is already online the answer is `201 UNSURE` before the
/// switch, since joining the new network drops this very connection.
async fn api_connect(State(state): WebServerState, request: Request) -> Response {
    let Some((ssid, password)) = request_args(request).await.and_then(credentials_from_form)
    else {
        return (StatusCode::BAD_REQUEST, "ERROR").into_response();
    };
    tracing::debug!(%ssid, "Handling /connect");

    match state.manager.reconfigure(ssid, password).await {
        ReconfigureOutcome::Connected => (StatusCode::OK, "OK").into_response(),
        ReconfigureOutcome::Failed => (StatusCode::BAD_REQUEST, "ERROR").into_response(),
        ReconfigureOutcome::Pending => (StatusCode::CREATED, "UNSURE").into_response(),
    }
}

/// Query string arguments followed by the body's fields. The body may be
/// `multipart/form-data` or urlencoded under any (or no) content type.
/// `None` when either part cannot be decoded.
async fn request_args(request: Request) -> Option<Vec<(String, String)>> {
    let mut args = match request.uri().query() {
        Some(_) => Query::<Vec<(String, String)>>::try_from_uri(request.uri()).ok()?.0,
        None => Vec::new(),
    };

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &()).await.ok()?;
        while let Some(field) = multipart.next_field().await.ok()? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            args.push((name, field.text().await.ok()?));
        }
    } else {
        let (mut parts, body) = request.into_parts();
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let Form(fields) =
            Form::<Vec<(String, String)>>::from_request(Request::from_parts(parts, body), &())
                .await
                .ok()?;
        args.extend(fields);
    }
    Some(args)
}

/// Exactly two arguments; by name when both names are present, otherwise
/// in submission order.
fn credentials_from_form(args: Vec<(String, String)>) -> Option<(String, String)> {
    if args.len() != 2 {
        return None;
    }
    let find = |key: &str| args.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    if let (Some(ssid), Some(password)) = (find("ssid"), find("password")) {
        return Some((ssid, password));
    }

    let mut values = args.into_iter().map(|(_, v)| v);
    Some((values.next()?, values.next()?))
}

/// Streams the first file part into the firmware updater, answers
/// `OK`/`FAIL` and reboots once an image was received.
async fn api_upload(State(state): WebServerState, mut multipart: Multipart) -> Response {
    let mut session = OtaSession::new(state.manager.updater());

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                session.abort(&e.to_string());
                break;
            }
        };
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        session.start(&filename).await;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => session.write(&chunk).await,
                Ok(None) => {
                    session.finish().await;
                    break;
                }
                Err(e) => {
                    session.abort(&e.to_string());
                    break;
                }
            }
        }
        break;
    }

    let body = if session.succeeded().await { "OK" } else { "FAIL" };
    if session.started() {
        state.manager.schedule_restart();
    } else {
        tracing::warn!("Upload request carried no file");
    }

    (
        StatusCode::OK,
        [(header::CONNECTION, "close")],
        body,
    )
        .into_response()
}

/// 处理捕获门户检测请求（Captive Portal Detection）
///
/// Phones request a well-known URL after joining the AP; answering it quietly
/// keeps the logs clean.
async fn handle_captive_portal() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, "")
}
