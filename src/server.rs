use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use lazy_static::lazy_static;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tera::{Context, Tera};

use crate::error::WorkflowError;
use crate::process::CommandRunner;
use crate::session::SessionId;
use crate::workflow::{ConnectRequest, Workflow};

pub const SESSION_COOKIE: &str = "wifi_switcher_session";

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_template("index.html", include_str!("../templates/index.html")) {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

pub struct ServerConfig {
    pub port: u16,
    pub session_ttl: Duration,
}

/// One-shot message shown on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub category: &'static str,
    pub message: String,
}

impl Flash {
    fn success(message: String) -> Self {
        Flash {
            category: "success",
            message,
        }
    }

    /// Picks a category per failing stage so the operator can tell them apart.
    fn from_error(err: &WorkflowError) -> Self {
        let category = match err {
            WorkflowError::Validation(_) => "invalid",
            WorkflowError::Scan(_) => "scan-error",
            WorkflowError::CredentialSave(_) | WorkflowError::RoleConfigSave(_) => "storage-error",
            WorkflowError::Launch(_) => "connect-error",
        };
        Flash {
            category,
            message: err.to_string(),
        }
    }
}

pub struct AppState<R> {
    workflow: Arc<Workflow<R>>,
    flashes: Mutex<HashMap<SessionId, (Vec<Flash>, Instant)>>,
}

impl<R: CommandRunner> AppState<R> {
    pub fn new(workflow: Arc<Workflow<R>>) -> Self {
        Self {
            workflow,
            flashes: Mutex::new(HashMap::new()),
        }
    }

    fn push_flash(&self, session: &SessionId, flash: Flash) {
        let mut flashes = self.flashes.lock().unwrap_or_else(|e| e.into_inner());
        let entry = flashes
            .entry(session.clone())
            .or_insert_with(|| (Vec::new(), Instant::now()));
        entry.0.push(flash);
        entry.1 = Instant::now();
    }

    fn take_flashes(&self, session: &SessionId) -> Vec<Flash> {
        self.flashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session)
            .map(|(flashes, _)| flashes)
            .unwrap_or_default()
    }

    fn evict_expired(&self, ttl: Duration) {
        self.workflow.evict_expired(ttl);
        self.flashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, (_, stored)| stored.elapsed() <= ttl);
    }
}

#[derive(Debug, Deserialize)]
struct ScanForm {
    #[serde(default)]
    interface: String,
}

#[derive(Deserialize)]
struct ConnectForm {
    #[serde(default)]
    interface: String,
    #[serde(default)]
    ssid: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    uplink: String,
    #[serde(default)]
    hotspot: String,
}

pub fn router<R: CommandRunner>(state: Arc<AppState<R>>) -> Router {
    Router::new()
        .route("/", get(index_handler::<R>))
        .route("/scan", post(scan_handler::<R>))
        .route("/connect", post(connect_handler::<R>))
        .route("/reset", post(reset_handler::<R>))
        .with_state(state)
}

pub async fn run_server<R: CommandRunner>(
    workflow: Arc<Workflow<R>>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(workflow));

    let evictor = Arc::clone(&state);
    let ttl = config.session_ttl;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            evictor.evict_expired(ttl);
        }
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server at http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler<R: CommandRunner>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
) -> Response {
    let (session, is_new) = session_or_new(&headers);
    let context = page_context(&state, &session);

    let response = match TEMPLATES.render("index.html", &context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    };
    with_session_cookie(response, &session, is_new)
}

async fn scan_handler<R: CommandRunner>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    Form(form): Form<ScanForm>,
) -> Response {
    let (session, is_new) = session_or_new(&headers);

    // Detached so a browser disconnect does not abort the privileged process
    let workflow = Arc::clone(&state.workflow);
    let task_session = session.clone();
    let outcome =
        tokio::spawn(async move { workflow.scan(&task_session, &form.interface).await }).await;

    let flash = match outcome {
        Ok(Ok(scan)) => Flash::success(format!(
            "Found {} network(s) on {}",
            scan.networks.len(),
            scan.interface
        )),
        Ok(Err(e)) => Flash::from_error(&e),
        Err(e) => internal_error("scan", e),
    };
    state.push_flash(&session, flash);

    with_session_cookie(Redirect::to("/").into_response(), &session, is_new)
}

async fn connect_handler<R: CommandRunner>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    Form(form): Form<ConnectForm>,
) -> Response {
    let (session, is_new) = session_or_new(&headers);
    let request = ConnectRequest {
        interface: form.interface,
        ssid: form.ssid,
        secret: form.password,
        uplink: form.uplink,
        hotspot: form.hotspot,
    };

    let workflow = Arc::clone(&state.workflow);
    let task_session = session.clone();
    let outcome =
        tokio::spawn(async move { workflow.connect(&task_session, &request).await }).await;

    let flash = match outcome {
        Ok(Ok(attempt)) => Flash::success(format!(
            "Connected to '{}': uplink {}, hotspot {}",
            attempt.ssid, attempt.roles.uplink_interface, attempt.roles.hotspot_interface
        )),
        Ok(Err(e)) => Flash::from_error(&e),
        Err(e) => internal_error("connect", e),
    };
    state.push_flash(&session, flash);

    with_session_cookie(Redirect::to("/").into_response(), &session, is_new)
}

async fn reset_handler<R: CommandRunner>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
) -> Response {
    let (session, is_new) = session_or_new(&headers);
    state.workflow.reset(&session);
    with_session_cookie(Redirect::to("/").into_response(), &session, is_new)
}

fn internal_error(stage: &str, err: tokio::task::JoinError) -> Flash {
    error!("{} task failed: {}", stage, err);
    Flash {
        category: "error",
        message: format!("Internal error during {}", stage),
    }
}

fn page_context<R: CommandRunner>(state: &AppState<R>, session: &SessionId) -> Context {
    let workflow = &state.workflow;
    let scan = workflow.last_scan(session);
    let roles = workflow.saved_roles();

    let mut context = Context::new();
    context.insert("flashes", &state.take_flashes(session));
    context.insert("state", &workflow.state(session).to_string());
    context.insert("interfaces", &workflow.interfaces());
    context.insert("devices", &workflow.devices());
    context.insert("scan_interface", &scan.as_ref().map(|s| s.interface.clone()));
    context.insert(
        "networks",
        &scan.as_ref().map(|s| s.networks.clone()).unwrap_or_default(),
    );
    context.insert("uplink", &roles.as_ref().map(|r| r.uplink_interface.clone()));
    context.insert("hotspot", &roles.as_ref().map(|r| r.hotspot_interface.clone()));
    context
}

fn session_from(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value))
}

/// The request's session, or a new one when the cookie is missing or invalid.
fn session_or_new(headers: &HeaderMap) -> (SessionId, bool) {
    match session_from(headers) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    }
}

fn with_session_cookie(mut response: Response, session: &SessionId, is_new: bool) -> Response {
    if is_new {
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Strict");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Invalid session cookie: {}", e),
        }
    }
    response
}
