//! Mock venue HTTP server for integration tests.
//!
//! Serves:
//! - `GET /markets`: the configured directory listing
//! - `GET /book?token_id=..`: the configured book for that token, 404 otherwise
//! - `POST /order`: the next scripted reply (a fill by default), recording the body
//!
//! Orders and the reply script are kept for the life of the venue, so it is
//! only meant for short sessions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Default)]
struct VenueState {
    markets: Value,
    books: HashMap<String, Value>,
    replies: VecDeque<(StatusCode, Value)>,
    orders: Vec<Value>,
    book_requests: u32,
}

type SharedState = Arc<Mutex<VenueState>>;

/// A mock venue for testing.
pub struct MockVenue {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: SharedState,
}

impl MockVenue {
    /// Start a new mock venue on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: SharedState = Arc::new(Mutex::new(VenueState {
            markets: json!([]),
            ..VenueState::default()
        }));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let app = create_router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                })
                .await;
        });

        Self {
            addr,
            shutdown_tx,
            state,
        }
    }

    /// Base URL, usable as directory, CLOB and relay root.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn order_url(&self) -> String {
        format!("{}/order", self.url())
    }

    pub fn set_markets(&self, markets: Value) {
        self.state.lock().markets = markets;
    }

    pub fn set_book(&self, token: &str, book: Value) {
        self.state.lock().books.insert(token.to_string(), book);
    }

    /// Queue the reply for the next order.
    pub fn push_order_reply(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).unwrap();
        self.state.lock().replies.push_back((status, body));
    }

    /// Order bodies received, in order.
    pub fn orders(&self) -> Vec<Value> {
        self.state.lock().orders.clone()
    }

    pub fn book_requests(&self) -> u32 {
        self.state.lock().book_requests
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/markets", get(get_markets))
        .route("/book", get(get_book))
        .route("/order", post(post_order))
        .with_state(state)
}

async fn get_markets(State(state): State<SharedState>) -> Json<Value> {
    Json(state.lock().markets.clone())
}

async fn get_book(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock();
    state.book_requests += 1;

    let book = params
        .get("token_id")
        .and_then(|token| state.books.get(token))
        .cloned();
    match book {
        Some(book) => Json(book).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No orderbook exists for the requested token id" })),
        )
            .into_response(),
    }
}

async fn post_order(State(state): State<SharedState>, Json(order): Json<Value>) -> Response {
    let mut state = state.lock();
    state.orders.push(order);
    let n = state.orders.len();

    let (status, body) = state.replies.pop_front().unwrap_or_else(|| {
        (
            StatusCode::OK,
            json!({
                "success": true,
                "errorMsg": "",
                "orderID": format!("0xmock{n}"),
                "status": "matched"
            }),
        )
    });
    (status, Json(body)).into_response()
}
