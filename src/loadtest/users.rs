use std::ops::RangeInclusive;
use std::time::Duration;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::debug;

use super::client::{ApiClient, Reply};
use super::{LoadTestError, API_PREFIX};

const PASSWORD: &str = "testpassword123";
const FALLBACK_LOGIN: &str = "loadtest_user";
const GENRES: [&str; 3] = ["Fiction", "Non-Fiction", "Science Fiction"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserClass {
    /// Registers, seeds a small library, then browses and edits it.
    Collector,
    /// Exercises registration and login only.
    Authenticator,
    /// Polls the public endpoints.
    HealthChecker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ListBooks,
    ListAuthors,
    FilterBooks,
    GetBook,
    GetAuthor,
    CreateBook,
    CreateAuthor,
    UpdateBook,
    DeleteBook,
    Me,
    Register,
    Login,
    InvalidLogin,
    Health,
    Root,
    OpenApi,
}

impl UserClass {
    pub const ROTATION: [UserClass; 3] = [
        UserClass::Collector,
        UserClass::Authenticator,
        UserClass::HealthChecker,
    ];

    /// Seconds to wait between tasks.
    pub fn wait_secs(self) -> RangeInclusive<f64> {
        match self {
            UserClass::Collector => 1.0..=3.0,
            UserClass::Authenticator => 2.0..=5.0,
            UserClass::HealthChecker => 10.0..=30.0,
        }
    }

    pub fn tasks(self) -> &'static [(Task, u32)] {
        match self {
            UserClass::Collector => &[
                (Task::ListBooks, 3),
                (Task::ListAuthors, 2),
                (Task::FilterBooks, 1),
                (Task::GetBook, 1),
                (Task::GetAuthor, 1),
                (Task::CreateBook, 1),
                (Task::CreateAuthor, 1),
                (Task::UpdateBook, 1),
                (Task::DeleteBook, 1),
                (Task::Me, 1),
            ],
            UserClass::Authenticator => &[
                (Task::Register, 1),
                (Task::Login, 2),
                (Task::InvalidLogin, 1),
            ],
            UserClass::HealthChecker => &[(Task::Health, 1), (Task::Root, 1), (Task::OpenApi, 1)],
        }
    }
}

fn api(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn id_of(reply: &Reply, pointer: &str) -> Option<i64> {
    reply.field(pointer).and_then(Value::as_i64)
}

/// One simulated client with its own session and the ids it created.
pub struct VirtualUser {
    class: UserClass,
    client: ApiClient,
    rng: StdRng,
    token: Option<String>,
    username: String,
    author_ids: Vec<i64>,
    book_ids: Vec<i64>,
    weights: WeightedIndex<u32>,
}

impl VirtualUser {
    pub fn new(class: UserClass, client: ApiClient) -> Result<Self, LoadTestError> {
        Self::with_rng(class, client, StdRng::from_entropy())
    }

    pub fn with_rng(
        class: UserClass,
        client: ApiClient,
        rng: StdRng,
    ) -> Result<Self, LoadTestError> {
        let weights = WeightedIndex::new(class.tasks().iter().map(|(_, w)| *w))
            .map_err(|e| LoadTestError::InvalidParameters(format!("task weights: {e}")))?;
        Ok(Self {
            class,
            client,
            rng,
            token: None,
            username: FALLBACK_LOGIN.to_string(),
            author_ids: Vec::new(),
            book_ids: Vec::new(),
            weights,
        })
    }

    pub fn class(&self) -> UserClass {
        self.class
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn author_ids(&self) -> &[i64] {
        &self.author_ids
    }

    pub fn book_ids(&self) -> &[i64] {
        &self.book_ids
    }

    async fn register(&mut self) -> Reply {
        let suffix = unique_suffix();
        let username = format!("loadtest_{suffix}");
        let body = json!({
            "username": username,
            "email": format!("loadtest_{suffix}@example.com"),
            "password": PASSWORD,
        });
        let reply = self
            .client
            .post_json("POST /auth/register", &api("/auth/register"), &body, None)
            .await;
        if reply.is_success() {
            self.username = username;
        }
        reply
    }

    async fn login(&self, username: &str, password: &str, name: &str) -> Reply {
        self.client
            .post_form(
                name,
                &api("/auth/login"),
                &[("username", username), ("password", password)],
            )
            .await
    }

    /// Session setup run once after spawning.
    pub async fn on_start(&mut self) {
        if self.class != UserClass::Collector {
            return;
        }

        let reply = self.register().await;
        self.token = match reply.field("/access_token").and_then(Value::as_str) {
            Some(token) => Some(token.to_string()),
            None => {
                let login = self.username.clone();
                self.login(&login, PASSWORD, "POST /auth/login")
                    .await
                    .field("/access_token")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }
        };

        if self.token.is_some() && reply.is_success() {
            self.seed_library().await;
        }
    }

    async fn seed_library(&mut self) {
        let token = self.token.clone();
        for i in 0..5 {
            let body = json!({
                "name": format!("Load Test Author {i}"),
                "biography": format!("Biography for load test author {i}"),
            });
            let reply = self
                .client
                .post_json("POST /authors/", &api("/authors/"), &body, token.as_deref())
                .await;
            if let Some(id) = id_of(&reply, "/id") {
                self.author_ids.push(id);
            }
        }

        if self.author_ids.is_empty() {
            return;
        }
        for i in 0..10 {
            let author_id = self.author_ids[self.rng.gen_range(0..self.author_ids.len())];
            let body = json!({
                "title": format!("Load Test Book {i}"),
                "description": format!("Description for load test book {i}"),
                "genre": format!("Genre {}", i % 3),
                "publication_year": 2020 + (i % 5),
                "author_id": author_id,
            });
            let reply = self
                .client
                .post_json("POST /books/", &api("/books/"), &body, token.as_deref())
                .await;
            if let Some(id) = id_of(&reply, "/id") {
                self.book_ids.push(id);
            }
        }
    }

    /// A known id when there is one, otherwise a random probe in `1..=max`.
    fn pick_id(&mut self, known: &[i64], max: i64) -> i64 {
        known
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_else(|| self.rng.gen_range(1..=max))
    }

    pub fn pick_task(&mut self) -> Task {
        self.class.tasks()[self.weights.sample(&mut self.rng)].0
    }

    pub async fn run_task(&mut self, task: Task) {
        let token = self.token.clone();
        let token = token.as_deref();
        let needs_session = matches!(
            task,
            Task::ListBooks
                | Task::ListAuthors
                | Task::FilterBooks
                | Task::GetBook
                | Task::GetAuthor
                | Task::CreateBook
                | Task::CreateAuthor
                | Task::UpdateBook
                | Task::DeleteBook
                | Task::Me
        );
        if needs_session && token.is_none() {
            return;
        }

        match task {
            Task::ListBooks => {
                self.client.get("GET /books/", &api("/books/"), token).await;
            }
            Task::ListAuthors => {
                self.client.get("GET /authors/", &api("/authors/"), token).await;
            }
            Task::FilterBooks => {
                let genre = format!("Genre {}", self.rng.gen_range(0..3));
                self.client
                    .get_query("GET /books/?genre", &api("/books/"), &[("genre", genre)], token)
                    .await;
            }
            Task::GetBook => {
                let known = self.book_ids.clone();
                let id = self.pick_id(&known, 100);
                self.client
                    .get("GET /books/[id]", &api(&format!("/books/{id}")), token)
                    .await;
            }
            Task::GetAuthor => {
                let known = self.author_ids.clone();
                let id = self.pick_id(&known, 50);
                self.client
                    .get("GET /authors/[id]", &api(&format!("/authors/{id}")), token)
                    .await;
            }
            Task::CreateBook => {
                let known = self.author_ids.clone();
                let author_id = self.pick_id(&known, 10);
                let body = json!({
                    "title": format!("New Book {}", self.rng.gen_range(1000..10000)),
                    "description": format!("Description for new book {}", self.rng.gen_range(1000..10000)),
                    "genre": GENRES.choose(&mut self.rng).copied().unwrap_or("Fiction"),
                    "publication_year": self.rng.gen_range(2010..=2024),
                    "author_id": author_id,
                });
                let reply = self
                    .client
                    .post_json("POST /books/", &api("/books/"), &body, token)
                    .await;
                if let Some(id) = id_of(&reply, "/id") {
                    self.book_ids.push(id);
                }
            }
            Task::CreateAuthor => {
                let body = json!({
                    "name": format!("New Author {}", self.rng.gen_range(1000..10000)),
                    "biography": format!("Biography for new author {}", self.rng.gen_range(1000..10000)),
                });
                let reply = self
                    .client
                    .post_json("POST /authors/", &api("/authors/"), &body, token)
                    .await;
                if let Some(id) = id_of(&reply, "/id") {
                    self.author_ids.push(id);
                }
            }
            Task::UpdateBook => {
                let known = self.book_ids.clone();
                let id = self.pick_id(&known, 50);
                let body = json!({
                    "title": format!("Updated Book {}", self.rng.gen_range(1000..10000)),
                    "description": format!("Updated description {}", self.rng.gen_range(1000..10000)),
                });
                self.client
                    .put_json("PUT /books/[id]", &api(&format!("/books/{id}")), &body, token)
                    .await;
            }
            Task::DeleteBook => {
                let known = self.book_ids.clone();
                let id = self.pick_id(&known, 50);
                let reply = self
                    .client
                    .delete("DELETE /books/[id]", &api(&format!("/books/{id}")), token)
                    .await;
                if reply.is_success() {
                    self.book_ids.retain(|b| *b != id);
                }
            }
            Task::Me => {
                self.client.get("GET /auth/me", &api("/auth/me"), token).await;
            }
            Task::Register => {
                self.register().await;
            }
            Task::Login => {
                let login = self.username.clone();
                let reply = self.login(&login, PASSWORD, "POST /auth/login").await;
                if let Some(token) = reply.field("/access_token").and_then(Value::as_str) {
                    self.token = Some(token.to_string());
                }
            }
            Task::InvalidLogin => {
                self.login("invalid_user", "wrong_password", "POST /auth/login [invalid]")
                    .await;
            }
            Task::Health => {
                self.client.get("GET /health", "/health", None).await;
            }
            Task::Root => {
                self.client.get("GET /", "/", None).await;
            }
            Task::OpenApi => {
                self.client
                    .get("GET /openapi.json", &api("/openapi.json"), None)
                    .await;
            }
        }
    }

    fn wait_time(&mut self) -> Duration {
        Duration::from_secs_f64(self.rng.gen_range(self.class.wait_secs()))
    }

    /// Runs tasks until `stop` flips to true.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        self.on_start().await;
        debug!(
            "{:?} user started (authenticated: {})",
            self.class,
            self.is_authenticated()
        );

        while !*stop.borrow() {
            let task = self.pick_task();
            tokio::select! {
                () = self.run_task(task) => {}
                _ = stop.changed() => break,
            }

            let wait = self.wait_time();
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = stop.changed() => break,
            }
        }
    }
}
