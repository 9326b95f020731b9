use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::{json, Value};

use crate::intake::domain::{Application, ApplicationId, Submission};
use crate::intake::repository::{ApplicationRepository, RepositoryError};
use crate::intake::{intake_router, IntakeService};

pub(super) fn submission() -> Submission {
    serde_json::from_value(valid_payload()).expect("valid submission")
}

pub(super) fn valid_payload() -> Value {
    json!({
        "name": "Ann Lee",
        "email": "ann@x.com",
        "gender": "female",
        "age": 30,
        "current_occupation": "engineer",
    })
}

pub(super) fn invalid_payload() -> Value {
    json!({
        "name": "A",
        "email": "bad",
        "gender": "",
        "age": 200,
        "current_occupation": "",
    })
}

pub(super) const ALL_MESSAGES: &str = "Name is required. Valid email required. \
Gender is required. Age must be 16–100. Current occupation required.";

pub(super) fn build_service() -> (IntakeService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = IntakeService::new(repository.clone());
    (service, repository)
}

pub(super) fn intake_router_with_service<R>(service: IntakeService<R>) -> axum::Router
where
    R: ApplicationRepository + 'static,
{
    intake_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<Vec<Application>>>,
}

impl MemoryRepository {
    pub(super) fn records(&self) -> Vec<Application> {
        self.records.lock().expect("repository mutex poisoned").clone()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRepository {
    async fn insert(&self, application: &Application) -> Result<ApplicationId, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.push(application.clone());
        Ok(ApplicationId(guard.len() as i32))
    }
}

pub(super) struct UnavailableRepository;

#[async_trait]
impl ApplicationRepository for UnavailableRepository {
    async fn insert(&self, _application: &Application) -> Result<ApplicationId, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "connection refused (os error 111)".to_string(),
        ))
    }
}

pub(super) fn post_json(body: &Value) -> Request<Body> {
    Request::post("/api/apply")
        .header(header::CONTENT_TYPE, "application/json")
        .extension(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 51000))))
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
