use async_trait::async_trait;
use serde::Deserialize;
use sl_core::{ELY_AUTH_URL, ELY_CLIENT_TOKEN};

use super::{AuthCollaborator, AuthError, Credentials, Session};

/// Username/password login against Ely.by's Yggdrasil-style
/// `authenticate` endpoint.
pub struct ElyByPasswordAuth {
    client: reqwest::Client,
    url: String,
}

impl Default for ElyByPasswordAuth {
    fn default() -> Self {
        Self {
            client: sl_core::CLIENT.clone(),
            url: ELY_AUTH_URL.to_owned(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    selected_profile: SelectedProfile,
}

#[derive(Deserialize)]
struct SelectedProfile {
    id: String,
    name: String,
}

#[async_trait]
impl AuthCollaborator for ElyByPasswordAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let Credentials::Password { username, password } = credentials else {
            return Err(AuthError::Unsupported("device code"));
        };
        let payload = serde_json::json!({
            "username": username,
            "password": password,
            "clientToken": ELY_CLIENT_TOKEN,
            "requestUser": true,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|n| AuthError::Request(n.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|n| AuthError::Request(n.to_string()))?;
        parse_response(status, &text)
    }
}

fn parse_response(status: u16, text: &str) -> Result<Session, AuthError> {
    if status != 200 {
        return Err(AuthError::Rejected(text.to_owned()));
    }
    let data: AuthResponse =
        serde_json::from_str(text).map_err(|n| AuthError::Rejected(n.to_string()))?;
    Ok(Session {
        username: data.selected_profile.name,
        uuid: data.selected_profile.id,
        token: data.access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_response_becomes_a_session() {
        let session = parse_response(
            200,
            r#"{"accessToken":"abc","clientToken":"16Launcher",
                "selectedProfile":{"id":"ffc8fdc95824509e8a57c99b940fb996","name":"ErickSkrauch"}}"#,
        )
        .unwrap();
        assert_eq!(session.username, "ErickSkrauch");
        assert_eq!(session.uuid, "ffc8fdc95824509e8a57c99b940fb996");
        assert_eq!(session.token, "abc");
    }

    #[tokio::test]
    async fn device_codes_are_not_ely_logins() {
        let auth = ElyByPasswordAuth {
            client: reqwest::Client::new(),
            url: "http://127.0.0.1:9/unreachable".to_owned(),
        };
        let error = auth
            .authenticate(&Credentials::DeviceCode {
                device_code: "abc".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::Unsupported(_)));
        assert_eq!(error.kind(), sl_core::ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn non_200_keeps_raw_text() {
        let text = r#"{"error":"ForbiddenOperationException","errorMessage":"Invalid credentials. Invalid nickname or password."}"#;
        let Err(AuthError::Rejected(message)) = parse_response(401, text) else {
            panic!("expected a rejection");
        };
        assert_eq!(message, text);
    }
}
