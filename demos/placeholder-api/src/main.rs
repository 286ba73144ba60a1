//! Exercises both sending modes against <https://jsonplaceholder.typicode.com>.
//!
//! Run with `RUST_LOG=debug` to see the token and decoding diagnostics.

use std::collections::HashMap;
use std::time::Duration;

use courier::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BASE_URL: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Todo {
    id: u64,
    user_id: u64,
    title: String,
    completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTodo<'a> {
    user_id: u64,
    title: &'a str,
    completed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    context_bound().await?;
    standalone().await
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

async fn context_bound() -> Result<()> {
    let headers = HashMap::from([("Content-Type".to_string(), "application/json".to_string())]);
    let dispatcher = Dispatcher::new(BASE_URL, headers, 10);
    dispatcher.set_access_token("demo-token").await;

    let mut todo = Todo::default();
    dispatcher.get("/todos/1", &mut todo).await?;
    info!(id = todo.id, user = todo.user_id, done = todo.completed, "fetched {:?}", todo.title);

    let draft = NewTodo {
        user_id: 1,
        title: "try courier",
        completed: false,
    };
    let mut created = Todo::default();
    dispatcher.post("/todos", &draft, &mut created).await?;
    info!(id = created.id, "created {:?}", created.title);

    let mut missing = Todo::default();
    if let Err(err) = dispatcher.get("/todos/0", &mut missing).await {
        warn!(status = err.status_code(), code = ?err.code(), "expected failure: {err}");
    }

    Ok(())
}

async fn standalone() -> Result<()> {
    let mut builder = RequestBuilder::new();
    builder
        .set_base_url(format!("{BASE_URL}/todos"))
        .set_header("Accept", "application/json")
        .set_query([("userId", "2"), ("completed", "true")])
        .set_timeout(Duration::from_secs(5));

    let response = courier::send(&builder).await?;
    let todos: Vec<Todo> = response.json()?;
    info!(status = %response.status_text(), count = todos.len(), "listed completed todos of user 2");

    Ok(())
}
