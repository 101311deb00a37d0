//! HTTP transport (feature `http`).
//!
//! Talks to the store's REST endpoints with a blocking `reqwest` client:
//! `GET /health` on connect, `POST /signin` for root credentials, and
//! `POST /sql` with the selected namespace/database sent as headers. HTTP is
//! stateless, so `use_ns`/`use_db` only record the scope for later requests.

use super::{Connection, Driver, RootCredentials, StatementResult, StatementStatus, StoreResponse};
use crate::error::{BridgeError, BridgeResult};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

const NS_HEADER: &str = "surreal-ns";
const DB_HEADER: &str = "surreal-db";

/// Map a client URI onto the HTTP base URL: `ws`→`http`, `wss`→`https`, and a
/// trailing `/rpc` (the WebSocket endpoint) is dropped.
pub fn http_base_url(uri: &str) -> BridgeResult<String> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
        BridgeError::InvalidConfig(format!("endpoint URI '{uri}' has no scheme"))
    })?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(BridgeError::InvalidConfig(format!(
                "unsupported scheme '{other}' for HTTP transport"
            )));
        }
    };

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix("/rpc").unwrap_or(rest).trim_end_matches('/');
    if rest.is_empty() {
        return Err(BridgeError::InvalidConfig(format!("endpoint URI '{uri}' has no host")));
    }
    Ok(format!("{scheme}://{rest}"))
}

/// Blocking HTTP driver.
#[derive(Clone)]
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    pub fn new() -> BridgeResult<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Driver for HttpDriver {
    type Conn = HttpConnection;

    fn connect(&self, uri: &str) -> BridgeResult<HttpConnection> {
        let base = http_base_url(uri)?;
        let response = self
            .client
            .get(format!("{base}/health"))
            .send()
            .map_err(|err| BridgeError::Connect {
                uri: uri.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(BridgeError::Connect {
                uri: uri.to_string(),
                message: format!("health check returned {}", response.status()),
            });
        }

        debug!(base = %base, "http connection ready");
        Ok(HttpConnection {
            client: self.client.clone(),
            base,
            auth: None,
            namespace: None,
            database: None,
            closed: false,
        })
    }
}

enum HttpAuth {
    Bearer(String),
    Basic(RootCredentials),
}

#[derive(Deserialize)]
struct SigninResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct WireStatement {
    status: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    result: JsonValue,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    information: Option<String>,
}

/// One HTTP "connection": base URL, auth and selected scope.
pub struct HttpConnection {
    client: Client,
    base: String,
    auth: Option<HttpAuth>,
    namespace: Option<String>,
    database: Option<String>,
    closed: bool,
}

impl HttpConnection {
    fn ensure_open(&self) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::Protocol(format!("connection to {} is closed", self.base)));
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(HttpAuth::Bearer(token)) => request.bearer_auth(token),
            Some(HttpAuth::Basic(creds)) => request.basic_auth(&creds.user, Some(&creds.pass)),
            None => request,
        }
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<WireError>(body) {
        Ok(WireError {
            information: Some(info),
            ..
        }) => info,
        Ok(WireError {
            details: Some(details),
            ..
        }) => details,
        _ => body.to_string(),
    }
}

fn into_statement(wire: WireStatement) -> StatementResult {
    let status = if wire.status.eq_ignore_ascii_case("OK") {
        StatementStatus::Ok
    } else {
        let message = match &wire.result {
            JsonValue::String(message) => message.clone(),
            other => other.to_string(),
        };
        StatementStatus::Err(message)
    };
    StatementResult {
        status,
        time: wire.time,
        result: wire.result.into(),
    }
}

impl Connection for HttpConnection {
    fn signin(&mut self, credentials: &RootCredentials) -> BridgeResult<()> {
        self.ensure_open()?;
        let response = self
            .client
            .post(format!("{}/signin", self.base))
            .header(ACCEPT, "application/json")
            .json(credentials)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(BridgeError::Auth {
                account: credentials.user.clone(),
                message: error_message(&body),
            });
        }

        // 토큰이 없는 서버 버전은 요청마다 basic auth 를 보낸다
        self.auth = match serde_json::from_str::<SigninResponse>(&body) {
            Ok(SigninResponse { token: Some(token) }) => Some(HttpAuth::Bearer(token)),
            _ => Some(HttpAuth::Basic(credentials.clone())),
        };
        Ok(())
    }

    fn use_ns(&mut self, namespace: &str) -> BridgeResult<()> {
        self.ensure_open()?;
        self.namespace = Some(namespace.to_string());
        Ok(())
    }

    fn use_db(&mut self, database: &str) -> BridgeResult<()> {
        self.ensure_open()?;
        self.database = Some(database.to_string());
        Ok(())
    }

    fn query(&mut self, sql: &str) -> BridgeResult<StoreResponse> {
        self.ensure_open()?;
        let mut request = self
            .client
            .post(format!("{}/sql", self.base))
            .header(ACCEPT, "application/json")
            .body(sql.to_string());
        if let Some(namespace) = &self.namespace {
            request = request.header(NS_HEADER, namespace);
        }
        if let Some(database) = &self.database {
            request = request.header(DB_HEADER, database);
        }

        let response = self.authorize(request).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "sql endpoint rejected request");
            return Err(BridgeError::Query {
                message: error_message(&body),
                sql: sql.to_string(),
            });
        }

        let statements: Vec<WireStatement> = serde_json::from_str(&body)
            .map_err(|err| BridgeError::Protocol(format!("unexpected /sql response: {err}")))?;
        Ok(StoreResponse::new(
            sql,
            statements.into_iter().map(into_statement).collect(),
        ))
    }

    fn close(&mut self) -> BridgeResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.auth = None;
        Ok(())
    }
}
