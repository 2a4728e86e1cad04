#![allow(dead_code)]

use api_lib::{config::Config, create_router, web::state::AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use learning_module_core::memory::InMemoryModuleStore;
use learning_module_core::testing::{ScriptedExtractor, ScriptedGenerator};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// What the default scripted extractor reads out of every PDF.
pub const PDF_TEXT: &str = "Photosynthesis turns light, water and carbon dioxide into glucose.";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub generator: Arc<ScriptedGenerator>,
    pub extractor: Arc<ScriptedExtractor>,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(ScriptedGenerator::new())
}

pub fn create_test_app_with(generator: ScriptedGenerator) -> TestApp {
    create_test_app_from(generator, ScriptedExtractor::returning(PDF_TEXT))
}

pub fn create_test_app_from(generator: ScriptedGenerator, extractor: ScriptedExtractor) -> TestApp {
    let generator = Arc::new(generator);
    let extractor = Arc::new(extractor);
    let state = Arc::new(AppState::new(
        Arc::new(InMemoryModuleStore::new()),
        generator.clone(),
        extractor.clone(),
        Arc::new(Config::default()),
    ));
    TestApp {
        router: create_router(state.clone()),
        state,
        generator,
        extractor,
    }
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("non-JSON body with status {}: {}", status, String::from_utf8_lossy(&body))
            })
        };
        (status, json)
    }

    pub async fn create_module(&self, title: &str, content: &str) -> Value {
        let (status, body) = self
            .request(
                "POST",
                "/api/modules",
                Some(json!({ "title": title, "description": "", "originalContent": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body {}", body);
        body
    }

    /// Polls the module until it reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        for _ in 0..200 {
            let (_, body) = self.request("GET", &format!("/api/modules/{}", id), None).await;
            if body["status"] == status {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("module {} never reached status {}", id, status);
    }
}
