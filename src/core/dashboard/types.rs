// Core types for the OmniPing dashboard client
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One monitored target/check as stored in the engine setup
///
/// Wire names follow the engine JSON (`desc`, `test`). The engine also sends
/// stored tests as `[host, desc, test, active]` arrays, accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TestRecordWire")]
pub struct TestRecord {
    pub host: String,
    #[serde(rename = "desc")]
    pub description: String,
    /// Check identifier, always upper-case (PING, HTTP, HTTPS)
    #[serde(rename = "test")]
    pub test_kind: String,
    pub active: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestRecordWire {
    Object {
        host: String,
        desc: String,
        test: String,
        #[serde(default = "default_active")]
        active: bool,
    },
    Tuple(String, String, String, bool),
}

fn default_active() -> bool {
    true
}

impl From<TestRecordWire> for TestRecord {
    fn from(wire: TestRecordWire) -> Self {
        match wire {
            TestRecordWire::Object {
                host,
                desc,
                test,
                active,
            }
            | TestRecordWire::Tuple(host, desc, test, active) => Self {
                host,
                description: desc,
                test_kind: test.to_uppercase(),
                active,
            },
        }
    }
}

impl TestRecord {
    pub fn new(host: &str, description: &str, test_kind: &str, active: bool) -> Self {
        Self {
            host: host.to_string(),
            description: description.to_string(),
            test_kind: test_kind.to_uppercase(),
            active,
        }
    }
}

/// One report row for a live test, refreshed wholesale on every poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResult {
    pub host: String,
    pub desc: String,
    pub test: String,
    /// `Good`, `Incomplete`, `--` (not run yet) or a free-text failure
    pub status: String,
    pub last_stat: String,
    pub good: bool,
    pub rtt: String,
    pub total: u64,
    pub total_successes: u64,
    pub success_percent: String,
    pub last_good: String,
    pub last_bad: String,
    pub last_bad_status: String,
    pub pos: usize,
}

impl Default for TestResult {
    fn default() -> Self {
        Self {
            host: String::new(),
            desc: String::new(),
            test: String::new(),
            status: "--".to_string(),
            last_stat: "--".to_string(),
            good: false,
            rtt: "--".to_string(),
            total: 0,
            total_successes: 0,
            success_percent: "0.00 %".to_string(),
            last_good: "--".to_string(),
            last_bad: "--".to_string(),
            last_bad_status: "--".to_string(),
            pos: 0,
        }
    }
}

/// Visual classification of a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    /// Test has not produced a result yet
    Idle,
    Normal,
    Incomplete,
    Fail,
}

impl TestResult {
    /// Classify the row the same way the engine's web page does
    pub fn row_class(&self) -> RowClass {
        if self.status == "--" {
            RowClass::Idle
        } else if self.status == "Incomplete" && !self.last_stat.starts_with('G') {
            RowClass::Fail
        } else if self.status == "Incomplete" {
            RowClass::Incomplete
        } else if !self.good {
            RowClass::Fail
        } else {
            RowClass::Normal
        }
    }

    /// Whether the status cell should be highlighted
    pub fn flag_status(&self) -> bool {
        !self.status.starts_with('G') && !self.row_is_flagged()
    }

    /// Whether the success counters and last failure cells should be highlighted
    pub fn flag_counts(&self) -> bool {
        self.total != self.total_successes && !self.row_is_flagged()
    }

    /// Label shown in the target column
    pub fn target_label(&self) -> String {
        format!("{}: {} - ({})", self.test, self.host, self.desc)
    }

    fn row_is_flagged(&self) -> bool {
        matches!(self.row_class(), RowClass::Fail | RowClass::Incomplete)
    }
}

/// `content` is either a single paragraph or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Paragraph(String),
    Paragraphs(Vec<String>),
}

impl Content {
    pub fn paragraphs(&self) -> Vec<&str> {
        match self {
            Content::Paragraph(text) => vec![text.as_str()],
            Content::Paragraphs(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

/// `GET status` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    pub version: String,
    /// Absent when the engine state could not be determined
    pub running: Option<bool>,
    pub message: String,
    pub heading: String,
    pub colour: String,
}

/// `POST engine` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineResponse {
    pub message: String,
    pub polling: Option<bool>,
}

/// `GET report` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportResponse {
    pub message: String,
    pub running: Option<bool>,
    pub tests: Vec<TestResult>,
    /// Engine formats these as text, or sends `false` before the first poll
    pub started: Value,
    pub time: Value,
    pub count: u64,
    pub duration: Value,
    pub content: Option<Content>,
}

/// `GET config` / `POST config` response
///
/// Scalar fields other than `message`, `tests` and `content` are editable
/// settings and are kept in `fields` so new engine settings round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tests: Vec<TestRecord>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ConfigResponse {
    pub fn heading(&self) -> &str {
        self.fields
            .get("heading")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn colour(&self) -> &str {
        self.fields
            .get("colour")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Editable scalar settings rendered as text inputs
    pub fn editable_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

/// Engine commands accepted by `POST engine`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAction {
    Start,
    Stop,
    Clear,
    Reset,
    RestartCp,
}

impl EngineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineAction::Start => "start",
            EngineAction::Stop => "stop",
            EngineAction::Clear => "clear",
            EngineAction::Reset => "reset",
            EngineAction::RestartCp => "restart_cp",
        }
    }
}

/// Server reachability indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerIndicator {
    On,
    #[default]
    Off,
    /// Request pending or transport failure
    Err,
    /// Server answered with a non-2xx status
    Bad,
}

/// Engine polling indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollingIndicator {
    On,
    #[default]
    Off,
    Err,
}

impl ServerIndicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerIndicator::On => "on",
            ServerIndicator::Off => "off",
            ServerIndicator::Err => "err",
            ServerIndicator::Bad => "bad",
        }
    }
}

impl PollingIndicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollingIndicator::On => "on",
            PollingIndicator::Off => "off",
            PollingIndicator::Err => "err",
        }
    }

    pub fn from_polling(polling: Option<bool>) -> Self {
        match polling {
            Some(true) => PollingIndicator::On,
            _ => PollingIndicator::Off,
        }
    }
}

/// Engine run/stop axis derived from `PollingState::running`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unknown,
    Running,
    Stopped,
}

/// Which main view is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    None,
    Report,
    Setup,
}

/// Client-side model of engine state, timer activity and indicators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollingState {
    /// `None` while the engine state is unknown
    pub running: Option<bool>,
    pub auto_refresh_active: bool,
    pub server_indicator: ServerIndicator,
    pub polling_indicator: PollingIndicator,
    /// Blocking overlay shown while the server is unreachable or restarting
    pub curtain: bool,
    pub view: ActiveView,
}

impl PollingState {
    pub fn run_state(&self) -> RunState {
        match self.running {
            Some(true) => RunState::Running,
            Some(false) => RunState::Stopped,
            None => RunState::Unknown,
        }
    }

    /// Command issued by the start/stop control in its current state
    pub fn run_affordance(&self) -> EngineAction {
        if self.running == Some(true) {
            EngineAction::Stop
        } else {
            EngineAction::Start
        }
    }
}

/// Editable setup form as submitted by the operator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupForm {
    /// Scalar settings such as heading, colour and interval
    pub fields: BTreeMap<String, String>,
    /// Test definitions in the line format handled by the codec
    pub tests_text: String,
}

/// Setup view handed to the UI layer
#[derive(Debug, Clone, PartialEq)]
pub struct SetupView {
    pub fields: BTreeMap<String, String>,
    pub tests_text: String,
    pub content: Vec<String>,
}

/// Banner contents derived from status/config responses
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub heading: String,
    pub colour: String,
    pub text_colour: &'static str,
    pub version: Option<String>,
}

/// State changes emitted by the controller for the UI layer to render
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Message(String),
    ServerIndicator(ServerIndicator),
    PollingIndicator(PollingIndicator),
    /// Start/stop control should now offer this action
    RunControl(EngineAction),
    AutoRefresh(bool),
    Banner(Banner),
    Curtain(bool),
    Report(ReportResponse),
    Setup(SetupView),
    /// Pretty-printed stored engine configuration
    StoredConfig(String),
}

/// Request failures, normalized by the gateway
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// No response: unreachable host, refused connection, timeout
    #[error("{0}")]
    Transport(String),
    /// Non-2xx response
    #[error("{message} ({status_code})")]
    Server { status_code: u16, message: String },
    /// 2xx response whose body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl RequestError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Server { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
