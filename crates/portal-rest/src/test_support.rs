//! In-process portal stub for executor and pagination tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;
use tokio::net::TcpListener;

/// One request as seen by the stub.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

pub(crate) struct Stub {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Stub {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests whose path equals `path`.
    pub fn hits_on(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

/// Start a stub answering each request with `respond(index, request)`, where
/// `index` counts every request the stub has received so far.
pub(crate) async fn start_stub<F>(respond: F) -> Stub
where
    F: Fn(usize, &Recorded) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = requests.clone();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        let app = axum::Router::new().fallback(move |request: Request<Body>| {
            let sink = sink.clone();
            let respond = respond.clone();
            async move {
                let method = request.method().to_string();
                let path = request.uri().path().to_string();
                let query = reqwest::Url::parse(&format!("http://stub{}", request.uri()))
                    .unwrap()
                    .query_pairs()
                    .into_owned()
                    .collect::<HashMap<_, _>>();
                let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
                    .await
                    .unwrap();
                let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                let recorded = Recorded {
                    method,
                    path,
                    query,
                    body,
                };

                let (status, reply) = {
                    let mut log = sink.lock().unwrap();
                    let reply = respond(log.len(), &recorded);
                    log.push(recorded);
                    reply
                };
                (
                    StatusCode::from_u16(status).unwrap(),
                    [(CONTENT_TYPE, "application/json")],
                    reply,
                )
            }
        });
        axum::serve(listener, app).await.unwrap();
    });

    Stub { url, requests }
}

/// Reply helper: status plus a JSON value rendered as the body.
pub(crate) fn reply(status: u16, body: Value) -> (u16, String) {
    (status, body.to_string())
}
