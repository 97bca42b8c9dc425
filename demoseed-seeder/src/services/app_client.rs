//! Application form client
//!
//! The target application only takes data through its HTML forms, behind a
//! cookie session. One client is built per run: `login` authenticates once
//! and the cookie jar carries the session through every submission until
//! the run context drops it.

use crate::utils::retry::retry_fixed;
use demoseed_common::config::Settings;
use demoseed_common::{Error, RemoteError, Result};
use reqwest::multipart;
use std::time::Duration;
use tracing::info;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Submission retry bounds: transient failures get 3 attempts, 2 s apart.
const SUBMIT_ATTEMPTS: u32 = 3;
const SUBMIT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Raw outcome of one form submission
#[derive(Debug, Clone)]
pub struct SubmissionResponse {
    pub status: u16,
    /// URL after redirects; identifier extraction probes its query string
    pub final_url: String,
    pub body: String,
}

impl SubmissionResponse {
    /// The application signals acceptance with 200 or a redirect.
    pub fn accepted(&self) -> bool {
        self.status == 200 || self.status == 302
    }
}

/// Cookie-authenticated session against the target application
pub struct AppClient {
    http: reqwest::Client,
    base_url: Url,
    login_endpoint: String,
    admin_email: String,
    admin_password: String,
    site_name: String,
}

impl AppClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let base_url = Url::parse(&settings.app_base_url)
            .map_err(|e| Error::Config(format!("invalid app_base_url: {e}")))?;

        Ok(AppClient {
            http,
            base_url,
            login_endpoint: settings.login_endpoint.clone(),
            admin_email: settings.admin_email.clone(),
            admin_password: settings.admin_password.clone(),
            site_name: settings.site_name.clone(),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))
    }

    /// Authenticate once with the admin credentials. Failing after the
    /// retry bound is fatal for the run.
    pub async fn login(&self) -> Result<()> {
        let url = self.endpoint_url(&self.login_endpoint)?;
        let endpoint = url.to_string();

        let mut form = vec![
            ("username".to_string(), self.admin_email.clone()),
            ("password".to_string(), self.admin_password.clone()),
        ];
        if !self.site_name.is_empty() {
            form.push(("siteName".to_string(), self.site_name.clone()));
        }

        retry_fixed("login", SUBMIT_ATTEMPTS, SUBMIT_RETRY_DELAY, || {
            let request = self.http.post(url.clone()).form(&form);
            let endpoint = endpoint.clone();
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| RemoteError::Network(e.to_string()))?;
                let status = response.status().as_u16();
                if status == 200 {
                    info!("Authentication successful");
                    Ok(())
                } else {
                    Err(Error::Remote(RemoteError::Api {
                        endpoint,
                        status,
                        message: "authentication failed".into(),
                    }))
                }
            }
        })
        .await
    }

    /// Submit a flat field mapping to an application endpoint, URL-encoded
    /// or multipart. The hidden `postback` control field is injected when
    /// the mapping lacks one.
    pub async fn submit_form(
        &self,
        endpoint: &str,
        fields: &[(String, String)],
        use_multipart: bool,
    ) -> Result<SubmissionResponse> {
        let url = self.endpoint_url(endpoint)?;

        let mut fields = fields.to_vec();
        if !fields.iter().any(|(name, _)| name == "postback") {
            fields.push(("postback".to_string(), "postback".to_string()));
        }

        retry_fixed("form submission", SUBMIT_ATTEMPTS, SUBMIT_RETRY_DELAY, || {
            let request = if use_multipart {
                let mut form = multipart::Form::new();
                for (name, value) in &fields {
                    form = form.text(name.clone(), value.clone());
                }
                self.http.post(url.clone()).multipart(form)
            } else {
                self.http.post(url.clone()).form(&fields)
            };
            async move { read_response(request).await }
        })
        .await
    }
}

async fn read_response(request: reqwest::RequestBuilder) -> Result<SubmissionResponse> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;
    Ok(SubmissionResponse {
        status,
        final_url,
        body,
    })
}
