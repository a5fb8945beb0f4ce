use async_trait::async_trait;
use perfsheriff_core::AlertsBackend;
use perfsheriff_core::AlertsPage;
use perfsheriff_core::AlertsQuery;
use perfsheriff_core::BackendError;
use perfsheriff_core::BugId;
use perfsheriff_core::BugTracker;
use perfsheriff_core::NewBugFields;
use perfsheriff_core::RawAlert;
use perfsheriff_core::RawDescriptor;
use perfsheriff_core::RequestDescriptor;
use std::sync::Mutex;
use std::time::Duration;

pub fn raw_alert(key: &str, suite: &str, start_revision: i64, end_revision: i64) -> RawAlert {
    RawAlert {
        key: key.to_string(),
        start_revision,
        end_revision,
        median_before_anomaly: 100.0,
        median_after_anomaly: 110.0,
        units: "ms".to_string(),
        descriptor: RawDescriptor {
            bot: "master:linux-perf".to_string(),
            measurement: "timeToFirstPaint".to_string(),
            test_suite: suite.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn with_bug(mut alert: RawAlert, bug_id: i64) -> RawAlert {
    alert.bug_id = Some(bug_id);
    alert
}

pub fn page(anomalies: Vec<RawAlert>, next_cursor: Option<&str>, count: Option<u64>) -> AlertsPage {
    AlertsPage {
        anomalies,
        next_cursor: next_cursor.map(str::to_string),
        count,
    }
}

pub fn sheriff_query(sheriffs: &[&str]) -> AlertsQuery {
    AlertsQuery {
        sheriffs: sheriffs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

type Respond = dyn Fn(&RequestDescriptor) -> Result<AlertsPage, BackendError> + Send + Sync;

/// Answers each request with `respond`, after `delay`, and records it.
pub struct ScriptedBackend {
    respond: Box<Respond>,
    delay: Duration,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedBackend {
    pub fn new(
        respond: impl Fn(&RequestDescriptor) -> Result<AlertsPage, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertsBackend for ScriptedBackend {
    async fn fetch_page(&self, request: &RequestDescriptor) -> Result<AlertsPage, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(request)
    }
}

/// Accepts every mutation and records the assignments.
#[derive(Default)]
pub struct RecordingTracker {
    pub assignments: Mutex<Vec<(Vec<String>, BugId)>>,
    pub new_bug_id: u64,
}

#[async_trait]
impl BugTracker for RecordingTracker {
    async fn assign_bug(&self, keys: &[String], bug_id: BugId) -> Result<(), BackendError> {
        self.assignments.lock().unwrap().push((keys.to_vec(), bug_id));
        Ok(())
    }

    async fn file_new_bug(&self, keys: &[String], _fields: &NewBugFields) -> Result<u64, BackendError> {
        self.assignments
            .lock()
            .unwrap()
            .push((keys.to_vec(), BugId::Creating));
        Ok(self.new_bug_id)
    }

    async fn nudge_alert(&self, _key: &str, _start: i64, _end: i64) -> Result<(), BackendError> {
        Ok(())
    }
}
