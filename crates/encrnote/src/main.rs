//! encrnote — a single-file encrypted note pad served on localhost.
//!
//! The editor page posts the password to `/load`, which decrypts the input
//! file and hands the text back as JSON. `/save` re-encrypts the posted
//! document with the password remembered from the last successful load,
//! keeping the previous file contents as a `.bak` sibling.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const INDEX_HTML: &str = include_str!("../assets/index.html");
const ENCR_CSS: &str = include_str!("../assets/encr.css");

#[derive(Parser, Debug)]
#[command(name = "encrnote", version, about = "Encrypted note pad over a spritz envelope")]
struct Cli {
    /// Serve pages on this localhost port
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Encrypted note file to load and save
    #[arg(long)]
    input: PathBuf,
}

struct App {
    input: PathBuf,
    /// Password of the loaded file; set only after a successful load.
    password: Mutex<Option<String>>,
}

#[derive(Serialize)]
struct ApiResponse {
    ok: bool,
    text: String,
    error_detail: String,
}

impl ApiResponse {
    fn ok(text: String) -> Json<ApiResponse> {
        Json(ApiResponse {
            ok: true,
            text,
            error_detail: String::new(),
        })
    }

    fn err(detail: impl ToString) -> Json<ApiResponse> {
        Json(ApiResponse {
            ok: false,
            text: String::new(),
            error_detail: detail.to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let app = Arc::new(App {
        input: cli.input,
        password: Mutex::new(None),
    });

    let router = Router::new()
        .route("/", get(index_page))
        .route("/encr.css", get(stylesheet))
        .route("/load", post(load_note))
        .route("/save", post(save_note))
        .with_state(app);

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "encrnote: serving editor");

    axum::serve(listener, router).await.context("server")?;
    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], ENCR_CSS)
}

/// Decrypt the input file with the posted password.
async fn load_note(State(app): State<Arc<App>>, password: String) -> Json<ApiResponse> {
    info!("load");
    // Forget any previous password; it is re-remembered only on success.
    *app.password.lock().await = None;

    let path = app.input.clone();
    let pw = password.clone();
    let loaded = tokio::task::spawn_blocking(move || decrypt_file(&path, &pw)).await;

    match loaded {
        Ok(Ok(text)) => {
            *app.password.lock().await = Some(password);
            ApiResponse::ok(text)
        }
        Ok(Err(e)) => {
            error!("load failed: {e:#}");
            ApiResponse::err(format!("{e:#}"))
        }
        Err(e) => {
            error!("load task panicked: {e}");
            ApiResponse::err("internal error")
        }
    }
}

/// Re-encrypt the posted document with the remembered password.
async fn save_note(State(app): State<Arc<App>>, document: String) -> Json<ApiResponse> {
    info!("save");
    let Some(password) = app.password.lock().await.clone() else {
        return ApiResponse::err("file not properly loaded");
    };

    let path = app.input.clone();
    let saved = tokio::task::spawn_blocking(move || encrypt_file(&path, &password, &document)).await;

    match saved {
        Ok(Ok(())) => ApiResponse::ok(String::new()),
        Ok(Err(e)) => {
            error!("save failed: {e:#}");
            ApiResponse::err(format!("{e:#}"))
        }
        Err(e) => {
            error!("save task panicked: {e}");
            ApiResponse::err("internal error")
        }
    }
}

fn decrypt_file(path: &Path, password: &str) -> Result<String> {
    let src = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let (mut reader, _stored_name) =
        spritz_core::wrap_reader(BufReader::new(src), password).context("decrypt")?;

    let mut document = Vec::new();
    reader.read_to_end(&mut document).context("read payload")?;
    Ok(String::from_utf8_lossy(&document).into_owned())
}

fn encrypt_file(path: &Path, password: &str, document: &str) -> Result<()> {
    // Keep the previous version around as a .bak sibling.
    let mut backup = OsString::from(path.as_os_str());
    backup.push(".bak");
    fs::rename(path, &backup).with_context(|| format!("back up {}", path.display()))?;

    let sink = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = spritz_core::wrap_writer(sink, password, "").context("encrypt")?;
    writer.write_all(document.as_bytes()).context("write payload")?;
    writer.flush().context("flush")?;
    Ok(())
}
