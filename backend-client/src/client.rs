use crate::error::ClientError;
use crate::error::Result;
use async_trait::async_trait;
use perfsheriff_core::AlertsBackend;
use perfsheriff_core::AlertsPage;
use perfsheriff_core::BackendError;
use perfsheriff_core::BugId;
use perfsheriff_core::BugTracker;
use perfsheriff_core::NewBugFields;
use perfsheriff_core::ReportTemplate;
use perfsheriff_core::RequestDescriptor;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

const ALERTS_PATH: &str = "api/alerts";
const EXISTING_BUG_PATH: &str = "api/existing_bug";
const NEW_BUG_PATH: &str = "api/new_bug";
const NUDGE_PATH: &str = "api/nudge";
const REPORT_NAMES_PATH: &str = "api/report/names";

#[derive(Serialize)]
struct ExistingBugRequest<'a> {
    keys: &'a [String],
    bug_id: i64,
}

#[derive(Serialize)]
struct NewBugRequest<'a> {
    keys: &'a [String],
    #[serde(flatten)]
    fields: &'a NewBugFields,
}

#[derive(Deserialize)]
struct NewBugResponse {
    bug_id: u64,
}

#[derive(Serialize)]
struct NudgeRequest<'a> {
    key: &'a str,
    new_start_revision: i64,
    new_end_revision: i64,
}

/// Dashboard client. Every endpoint is a JSON `POST` relative to `base_url`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        // `Url::join` drops the last path segment unless it ends with '/'.
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: None,
        })
    }

    /// Send `token` as a bearer token on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn report_templates(&self) -> Result<Vec<ReportTemplate>> {
        self.post(REPORT_NAMES_PATH, &Value::Object(Default::default()))
            .await
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, "POST");
        let mut builder = self.http.post(url).json(body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ClientError::Remote(error.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl AlertsBackend for HttpBackend {
    async fn fetch_page(&self, request: &RequestDescriptor) -> std::result::Result<AlertsPage, BackendError> {
        Ok(self.post(ALERTS_PATH, request).await?)
    }
}

#[async_trait]
impl BugTracker for HttpBackend {
    async fn assign_bug(&self, keys: &[String], bug_id: BugId) -> std::result::Result<(), BackendError> {
        let wire = bug_id.to_wire().ok_or(ClientError::UnsendableBugId(bug_id))?;
        let _: Value = self
            .post(EXISTING_BUG_PATH, &ExistingBugRequest { keys, bug_id: wire })
            .await?;
        Ok(())
    }

    async fn file_new_bug(
        &self,
        keys: &[String],
        fields: &NewBugFields,
    ) -> std::result::Result<u64, BackendError> {
        let response: NewBugResponse = self.post(NEW_BUG_PATH, &NewBugRequest { keys, fields }).await?;
        Ok(response.bug_id)
    }

    async fn nudge_alert(
        &self,
        key: &str,
        new_start_revision: i64,
        new_end_revision: i64,
    ) -> std::result::Result<(), BackendError> {
        let request = NudgeRequest {
            key,
            new_start_revision,
            new_end_revision,
        };
        let _: Value = self.post(NUDGE_PATH, &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_keeps_its_path() {
        let backend = HttpBackend::new("https://perf.example.com/dashboard").unwrap();
        assert_eq!(
            backend.base_url().join(ALERTS_PATH).unwrap().as_str(),
            "https://perf.example.com/dashboard/api/alerts"
        );
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        assert!(matches!(HttpBackend::new("not a url"), Err(ClientError::Url(_))));
    }

    #[test]
    fn test_new_bug_body_flattens_fields() {
        let keys = vec!["k1".to_string()];
        let fields = NewBugFields {
            summary: "regression".to_string(),
            labels: vec!["Performance".to_string()],
            ..Default::default()
        };
        let body = serde_json::to_value(NewBugRequest {
            keys: &keys,
            fields: &fields,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "keys": ["k1"],
                "summary": "regression",
                "description": "",
                "owner": "",
                "cc": [],
                "labels": ["Performance"],
                "components": [],
            })
        );
    }
}
