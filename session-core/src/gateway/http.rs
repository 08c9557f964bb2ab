//! HTTP client of the authentication service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{AuthService, Credentials, LoginResponse, RemoteError};
use crate::model::{ProfileUpdate, Role, User};

/// Authentication service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Service base URL, eg. `https://portal.example.com/api`
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "AuthConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AuthConfig {
    fn default_timeout_secs() -> u64 {
        10
    }
}

/// Error payload of the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    user: User,
}

/// `AuthService` speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthService {
    client: Client,
    base_url: String,
}

impl HttpAuthService {
    pub fn new(config: &AuthConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Sends the request, turning non-success answers into `Rejected`
async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|err| RemoteError::Transport(err.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message);
    debug!(%status, ?message, "Request rejected");

    Err(RemoteError::Rejected {
        status: Some(status.as_u16()),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    response
        .json()
        .await
        .map_err(|err| RemoteError::Transport(format!("malformed response: {err}")))
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError> {
        let response = send(self.client.post(self.url("/auth/login")).json(credentials)).await?;
        decode(response).await
    }

    async fn request_password_reset(&self, email: &str, role: &Role) -> Result<(), RemoteError> {
        let body = json!({ "email": email, "role": role });
        send(self.client.post(self.url("/auth/forgot-password")).json(&body)).await?;
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), RemoteError> {
        let body = json!({ "token": token, "password": new_password });
        send(self.client.post(self.url("/auth/reset-password")).json(&body)).await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        token: &str,
        fields: &ProfileUpdate,
    ) -> Result<User, RemoteError> {
        let request = self
            .client
            .patch(self.url("/users/profile"))
            .bearer_auth(token)
            .json(fields);

        let UserBody { user } = decode(send(request).await?).await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use warp::Filter;
    use warp::http::StatusCode;

    use crate::model::UserId;

    /// Starts an in-process fake of the authentication service, returning its base URL
    fn fake_service() -> String {
        let login = warp::post()
            .and(warp::path!("auth" / "login"))
            .and(warp::body::json())
            .map(|body: Value| {
                if body["email"] == "a@x.com" && body["password"] == "secret1" {
                    let reply = json!({
                        "user": { "id": 1, "role": "student", "name": "Ada" },
                        "token": "T1",
                    });
                    warp::reply::with_status(warp::reply::json(&reply), StatusCode::OK)
                } else {
                    let reply = json!({ "message": "Invalid credentials" });
                    warp::reply::with_status(warp::reply::json(&reply), StatusCode::UNAUTHORIZED)
                }
            });

        let forgot = warp::post()
            .and(warp::path!("auth" / "forgot-password"))
            .and(warp::body::json())
            .map(|body: Value| {
                let status = if body["role"] == "teacher" {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::NOT_FOUND
                };
                warp::reply::with_status(warp::reply(), status)
            });

        let reset = warp::post()
            .and(warp::path!("auth" / "reset-password"))
            .and(warp::body::json())
            .map(|body: Value| {
                let status = if body["token"] == "R1" && body["password"] == "secret2" {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                warp::reply::with_status(warp::reply(), status)
            });

        let profile = warp::patch()
            .and(warp::path!("users" / "profile"))
            .and(warp::header::<String>("authorization"))
            .and(warp::body::json())
            .map(|auth: String, fields: Value| {
                if auth != "Bearer T1" {
                    let reply = json!({ "message": "Unauthorized" });
                    return warp::reply::with_status(
                        warp::reply::json(&reply),
                        StatusCode::UNAUTHORIZED,
                    );
                }

                let mut user = json!({ "id": 1, "role": "student" });
                if let (Some(user), Some(fields)) = (user.as_object_mut(), fields.as_object()) {
                    user.extend(fields.clone());
                }
                let reply = json!({ "user": user });
                warp::reply::with_status(warp::reply::json(&reply), StatusCode::OK)
            });

        let routes = login.or(forgot).or(reset).or(profile);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        format!("http://{addr}/")
    }

    fn service(base_url: String) -> HttpAuthService {
        HttpAuthService::new(&AuthConfig {
            base_url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn login() {
        let service = service(fake_service());

        let response = service
            .login(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(response.token, "T1");
        assert_eq!(response.user.id, UserId::Number(1));
        assert_eq!(response.user.role, Role::Student);
        assert_eq!(response.user.name.as_deref(), Some("Ada"));

        let err = service
            .login(&Credentials::new("a@x.com", "wrong"))
            .await
            .unwrap_err();
        match err {
            RemoteError::Rejected { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message.as_deref(), Some("Invalid credentials"));
            }
            err => panic!("Unexpected error: {err:?}"),
        }
    }

    #[tokio::test]
    async fn password_reset() {
        let service = service(fake_service());

        service
            .request_password_reset("a@x.com", &Role::Teacher)
            .await
            .unwrap();
        let err = service
            .request_password_reset("a@x.com", &Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Rejected {
                status: Some(404),
                message: None
            }
        ));

        service.reset_password("R1", "secret2").await.unwrap();
        let _ = service.reset_password("R2", "secret2").await.unwrap_err();
    }

    #[tokio::test]
    async fn update_profile() {
        let service = service(fake_service());
        let fields = ProfileUpdate::default().with("name", "Grace");

        let user = service.update_profile("T1", &fields).await.unwrap();
        assert_eq!(user.name.as_deref(), Some("Grace"));
        assert_eq!(user.role, Role::Student);

        let err = service.update_profile("T2", &fields).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Rejected {
                status: Some(401),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unreachable_service() {
        let service = service("http://127.0.0.1:1".to_owned());
        let err = service
            .login(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
