//! Session and route guard API tests

use std::sync::Arc;

use actix_web::{App, test};
use assert_json_diff::assert_json_include;
use serde_json::json;

use crate::portal::Portal;
use crate::service;
use crate::service::tests::{FakeAuthService, GraphQLResp, api_request};

#[actix_web::test]
async fn anonymous_session() {
    let portal = Portal::test(Arc::new(FakeAuthService));
    let service_config = service::configure(false, portal).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let query = r#"{
        session {
            current { state authenticated role user loading error notice }
            landing
        }
    }"#;
    let resp: GraphQLResp =
        test::call_and_read_body_json(&app, api_request(query, json!({})).to_request()).await;

    assert_eq!(resp.errors, None);
    assert_json_include!(
        actual: resp.data,
        expected: json!({
            "session": {
                "current": {
                    "state": "ANONYMOUS",
                    "authenticated": false,
                    "role": null,
                    "user": null,
                    "loading": false,
                    "error": null,
                    "notice": null,
                },
                "landing": "/login",
            }
        })
    );
}

#[actix_web::test]
async fn anonymous_is_sent_to_login() {
    let portal = Portal::test(Arc::new(FakeAuthService));
    let service_config = service::configure(false, portal).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let query = r#"query($roles: [String!]!) {
        session {
            protected: authorize(allowedRoles: $roles) { action target }
            any: authorize(allowedRoles: []) { action target }
            public: authorizePublic { action target }
        }
    }"#;
    let resp: GraphQLResp = test::call_and_read_body_json(
        &app,
        api_request(query, json!({ "roles": ["admin", "student"] })).to_request(),
    )
    .await;

    assert_eq!(resp.errors, None);
    assert_eq!(
        resp.data::<String>("session.protected.action").unwrap(),
        "REDIRECT"
    );
    assert_eq!(
        resp.data::<String>("session.protected.target").unwrap(),
        "/login"
    );
    assert_eq!(resp.data::<String>("session.any.target").unwrap(), "/login");
    assert_eq!(resp.data::<String>("session.public.action").unwrap(), "RENDER");
    assert_eq!(
        resp.data::<Option<String>>("session.public.target").unwrap(),
        None
    );
}

#[actix_web::test]
async fn graphiql_disabled() {
    let portal = Portal::test(Arc::new(FakeAuthService));
    let service_config = service::configure(false, portal).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/pg").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn graphiql_enabled() {
    let portal = Portal::test(Arc::new(FakeAuthService));
    let service_config = service::configure(true, portal).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/pg").to_request()).await;
    assert!(resp.status().is_success());
}
