//! Identity Service Wire Client
//!
//! Thin JSON client for the identity service endpoints. Calls here go
//! straight to the transport, never through the request pipeline: the
//! pipeline depends on this client for renewal, and a 401 from a login
//! attempt is an invalid-credentials rejection, not a renewal trigger.

use crate::error::{PipelineError, Result, SessionError};
use crate::types::{CredentialPair, NewAccount, User};
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueResponse {
    access_credential: String,
    renewal_credential: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewRequest<'a> {
    renewal_credential: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewResponse {
    access_credential: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    access_credential: &'a str,
}

/// Error body shape the identity service uses for rejections.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Wire client for the identity service.
pub struct IdentityClient {
    http: Arc<dyn HttpClient>,
    base_url: Url,
}

impl IdentityClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Absolute URL for a service path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Exchange an identifier/secret for a fresh credential pair.
    ///
    /// A rejection (unauthorized or bad request) is
    /// [`SessionError::InvalidCredentials`]; it must not disturb an existing
    /// valid session, so the caller leaves the credential store untouched.
    #[instrument(skip(self, secret))]
    pub async fn issue_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<CredentialPair> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint("/auth/credentials"))
            .json(&IssueRequest { identifier, secret })
            .map_err(PipelineError::Transport)?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(PipelineError::Transport)?;

        if response.is_unauthorized() || response.status == 400 {
            let reason = error_message(&response);
            warn!(status = response.status, "Credential issue rejected");
            return Err(SessionError::InvalidCredentials(reason));
        }

        if !response.is_success() {
            return Err(upstream(&response).into());
        }

        let issued: IssueResponse = response.json().map_err(PipelineError::Transport)?;

        debug!("Credential pair issued");
        Ok(CredentialPair {
            access: issued.access_credential,
            renewal: issued.renewal_credential,
        })
    }

    /// Obtain a fresh access credential using the renewal credential.
    ///
    /// Any rejection means the renewal credential is no longer good; the
    /// caller clears the store and forces logout.
    #[instrument(skip_all)]
    pub async fn renew(&self, renewal_credential: &str) -> std::result::Result<String, PipelineError> {
        let request =
            HttpRequest::new(HttpMethod::Post, self.endpoint("/auth/credentials/refresh"))
                .json(&RenewRequest { renewal_credential })?;

        let response = self.http.execute(request).await?;

        if response.is_unauthorized() || response.status == 400 {
            warn!(status = response.status, "Renewal credential rejected");
            return Err(PipelineError::Unauthenticated);
        }

        if !response.is_success() {
            return Err(upstream(&response));
        }

        let renewed: RenewResponse = response.json()?;

        debug!("Access credential renewed");
        Ok(renewed.access_credential)
    }

    /// Validate a stored access credential at startup.
    #[instrument(skip_all)]
    pub async fn verify(&self, access_credential: &str) -> std::result::Result<(), PipelineError> {
        let request =
            HttpRequest::new(HttpMethod::Post, self.endpoint("/auth/credentials/verify"))
                .json(&VerifyRequest { access_credential })?;

        let response = self.http.execute(request).await?;

        if response.is_success() {
            return Ok(());
        }

        if response.is_unauthorized() {
            return Err(PipelineError::Unauthenticated);
        }

        Err(upstream(&response))
    }

    /// Fetch the current user profile with an explicit bearer credential.
    #[instrument(skip_all)]
    pub async fn me(&self, access_credential: &str) -> std::result::Result<User, PipelineError> {
        let request = HttpRequest::new(HttpMethod::Get, self.endpoint("/users/me"))
            .bearer_token(access_credential);

        let response = self.http.execute(request).await?;

        if response.is_unauthorized() {
            return Err(PipelineError::Unauthenticated);
        }

        if !response.is_success() {
            return Err(upstream(&response));
        }

        Ok(response.json()?)
    }

    /// Best-effort server-side session invalidation.
    ///
    /// Failure never blocks a local logout; it is logged and swallowed.
    #[instrument(skip_all)]
    pub async fn logout_notify(&self, access_credential: Option<&str>) {
        let mut request = HttpRequest::new(HttpMethod::Post, self.endpoint("/auth/logout"));
        if let Some(credential) = access_credential {
            request = request.bearer_token(credential);
        }

        match self.http.execute(request).await {
            Ok(response) if response.is_success() => {
                debug!("Server-side logout acknowledged");
            }
            Ok(response) => {
                debug!(status = response.status, "Server-side logout ignored failure");
            }
            Err(e) => {
                debug!(error = %e, "Server-side logout notification failed");
            }
        }
    }

    /// Create a new account. Does not authenticate and does not touch the
    /// session state or the credential store.
    #[instrument(skip(self, account), fields(handle = %account.handle))]
    pub async fn register(&self, account: &NewAccount) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint("/users"))
            .json(account)
            .map_err(PipelineError::Transport)?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(PipelineError::Transport)?;

        if response.is_success() {
            debug!("Account registered");
            return Ok(());
        }

        if response.is_client_error() {
            let reason = error_message(&response);
            warn!(status = response.status, "Registration rejected");
            return Err(SessionError::Rejected(reason));
        }

        Err(upstream(&response).into())
    }
}

/// Best human-readable message out of a failure response.
fn error_message(response: &HttpResponse) -> String {
    if let Ok(body) = response.json::<ErrorBody>() {
        return body.message;
    }
    match response.text() {
        Ok(text) if !text.trim().is_empty() => text,
        _ => format!("request failed with status {}", response.status),
    }
}

fn upstream(response: &HttpResponse) -> PipelineError {
    PipelineError::Upstream {
        status: response.status,
        message: error_message(response),
    }
}
