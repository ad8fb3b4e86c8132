/*!
Polling control state machine for the OmniPing console.

The controller is the only writer of [`PollingState`]. Every operation issues
its request through the [`ApiGateway`], folds the outcome into the state and
emits [`DashboardEvent`]s to the injected [`DashboardView`]. Request failures
never escape an operation: they end as a message and an indicator update.

## Run state

`Unknown -> {Running, Stopped}`. `Unknown` is re-entered whenever the status
request fails or a response omits the running flag.

## Auto-refresh

At most one timer exists, held as an owned [`TimerHandle`]. Starting while a
timer is active is a no-op. Every tick spawns its own report fetch, so
cancelling stops further ticks at once while a fetch already in flight still
completes and updates the report. The ticking task only holds a weak
reference to the controller, and the handle aborts the task on drop.

Overlapping requests are not sequenced: whichever response completes last
determines the state.
*/

use crate::core::dashboard::api_gateway::{ApiGateway, Endpoint, TransportObserver};
use crate::core::dashboard::debug_logger::DebugLogger;
use crate::core::dashboard::test_config_codec::{self, DecodeOutcome};
use crate::core::dashboard::types::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Timer abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait TimerTrait: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production timer backed by the tokio clock
#[derive(Default)]
pub struct TokioTimer;

#[async_trait::async_trait]
impl TimerTrait for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Render callback for controller events
pub trait DashboardView: Send + Sync {
    fn render(&self, event: DashboardEvent);
}

impl<F> DashboardView for F
where
    F: Fn(DashboardEvent) + Send + Sync,
{
    fn render(&self, event: DashboardEvent) {
        self(event)
    }
}

/// Owned handle to the auto-refresh task, aborts the task when dropped
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fixed delays used by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Auto-refresh period
    pub refresh_interval: Duration,
    /// Wait between clearing counters and fetching a fresh report
    pub clear_settle_delay: Duration,
    /// Wait before re-initializing after an engine process restart
    pub restart_retry_delay: Duration,
}

impl ControllerSettings {
    /// Time covered by `ticks` refresh intervals, saturating on overflow
    pub fn refresh_window(&self, ticks: u32) -> Duration {
        self.refresh_interval.saturating_mul(ticks)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(3000),
            clear_settle_delay: Duration::from_millis(1000),
            restart_retry_delay: Duration::from_millis(3000),
        }
    }
}

#[derive(Serialize)]
struct EngineCommand {
    action: EngineAction,
}

/// Polling state plus the view it is rendered to
///
/// Shared with the gateway as its transport observer.
struct StateStore {
    state: Mutex<PollingState>,
    view: Arc<dyn DashboardView>,
    logger: DebugLogger,
}

impl StateStore {
    fn lock(&self) -> MutexGuard<'_, PollingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: DashboardEvent) {
        self.view.render(event);
    }

    fn message(&self, message: impl Into<String>) {
        self.emit(DashboardEvent::Message(message.into()));
    }

    fn set_server_indicator(&self, indicator: ServerIndicator) {
        let changed = {
            let mut state = self.lock();
            let changed = state.server_indicator != indicator;
            state.server_indicator = indicator;
            changed
        };
        if changed {
            self.logger.indicator_change("server", indicator.as_str());
        }
        self.emit(DashboardEvent::ServerIndicator(indicator));
    }

    fn set_polling_indicator(&self, indicator: PollingIndicator) {
        let changed = {
            let mut state = self.lock();
            let changed = state.polling_indicator != indicator;
            state.polling_indicator = indicator;
            changed
        };
        if changed {
            self.logger.indicator_change("polling", indicator.as_str());
        }
        self.emit(DashboardEvent::PollingIndicator(indicator));
    }

    fn set_running(&self, running: Option<bool>) {
        let affordance = {
            let mut state = self.lock();
            state.running = running;
            state.run_affordance()
        };
        self.emit(DashboardEvent::RunControl(affordance));
    }

    /// Fold an engine polling flag into run state and polling indicator
    fn update_polling_status(&self, polling: Option<bool>) {
        self.set_running(polling);
        match polling {
            Some(_) => self.set_polling_indicator(PollingIndicator::from_polling(polling)),
            None => self.set_polling_indicator(PollingIndicator::Err),
        }
    }

    fn set_curtain(&self, shown: bool) {
        self.lock().curtain = shown;
        self.emit(DashboardEvent::Curtain(shown));
    }

    fn set_view(&self, view: ActiveView) {
        self.lock().view = view;
    }

    fn set_auto_refresh(&self, active: bool) {
        self.lock().auto_refresh_active = active;
        self.emit(DashboardEvent::AutoRefresh(active));
    }
}

impl TransportObserver for StateStore {
    fn transport_status(&self, indicator: ServerIndicator) {
        self.set_server_indicator(indicator);
    }
}

struct Inner {
    gateway: ApiGateway,
    timer: Arc<dyn TimerTrait>,
    store: Arc<StateStore>,
    timer_handle: Mutex<Option<TimerHandle>>,
    settings: ControllerSettings,
}

/// Client-side controller for engine run state, auto-refresh and indicators
///
/// Cheap to clone; clones drive the same state.
#[derive(Clone)]
pub struct PollingController {
    inner: Arc<Inner>,
}

impl PollingController {
    /// Create a controller that owns `gateway` and renders to `view`
    ///
    /// The gateway's transport observer is replaced by the controller's
    /// indicator state.
    pub fn new(gateway: ApiGateway, view: Arc<dyn DashboardView>) -> Self {
        Self::with_parts(
            gateway,
            view,
            Arc::new(TokioTimer),
            ControllerSettings::default(),
        )
    }

    pub fn with_parts(
        mut gateway: ApiGateway,
        view: Arc<dyn DashboardView>,
        timer: Arc<dyn TimerTrait>,
        settings: ControllerSettings,
    ) -> Self {
        let store = Arc::new(StateStore {
            state: Mutex::new(PollingState::default()),
            view,
            logger: DebugLogger::new(),
        });
        gateway.set_observer(store.clone());

        Self {
            inner: Arc::new(Inner {
                gateway,
                timer,
                store,
                timer_handle: Mutex::new(None),
                settings,
            }),
        }
    }

    /// Snapshot of the current polling state
    pub fn state(&self) -> PollingState {
        self.inner.store.lock().clone()
    }

    pub fn run_state(&self) -> RunState {
        self.state().run_state()
    }

    pub fn is_auto_refresh_active(&self) -> bool {
        self.timer_slot().is_some()
    }

    pub fn settings(&self) -> ControllerSettings {
        self.inner.settings
    }

    /// Page-load bootstrap: query engine status and open the matching view
    pub async fn initialize(&self) {
        let store = &self.inner.store;
        store.message("checking Server...");

        match self
            .inner
            .gateway
            .get::<StatusResponse>(Endpoint::Status)
            .await
        {
            Ok(status) => {
                store.set_curtain(false);
                store.emit(DashboardEvent::Banner(Banner::new(
                    &status.heading,
                    &status.colour,
                    Some(status.version.clone()),
                )));
                store.set_running(status.running);
                store.message(status.message.clone());

                match status.running {
                    Some(true) => {
                        store.set_polling_indicator(PollingIndicator::On);
                        self.fetch_report().await;
                    }
                    Some(false) => {
                        store.set_polling_indicator(PollingIndicator::Off);
                        self.fetch_test_config().await;
                    }
                    None => store.set_polling_indicator(PollingIndicator::Err),
                }
            }
            Err(err) => {
                store.set_curtain(true);
                store.message(err.to_string());
                store.set_running(None);
                store.set_polling_indicator(PollingIndicator::Err);
                store.set_server_indicator(ServerIndicator::Err);
            }
        }
    }

    /// Start or stop the engine, depending on what the control offers
    pub async fn toggle_run(&self) {
        let action = self.state().run_affordance();
        let store = &self.inner.store;

        match self.engine_command(action).await {
            Ok(response) => {
                store.message(response.message);
                store.update_polling_status(response.polling);
            }
            Err(err) => {
                store.message(err.to_string());
                store.set_server_indicator(ServerIndicator::Err);
            }
        }
    }

    /// Start periodic report fetches and fetch once immediately
    ///
    /// Returns `false` without doing anything when a timer is already active.
    pub async fn start_auto_refresh(&self) -> bool {
        if !self.start_timer() {
            return false;
        }
        self.fetch_report().await;
        true
    }

    /// Operator request to stop auto-refresh; fetches the report once
    pub async fn stop_auto_refresh(&self) {
        self.cancel_timer();
        self.fetch_report().await;
    }

    /// Reset engine counters, pausing auto-refresh around the fresh fetch
    pub async fn clear_counters(&self) {
        let store = &self.inner.store;

        match self.engine_command(EngineAction::Clear).await {
            Ok(response) => {
                store.message(response.message);
                let was_active = self.cancel_timer();
                self.inner
                    .timer
                    .sleep(self.inner.settings.clear_settle_delay)
                    .await;
                self.fetch_report().await;
                if was_active {
                    self.start_timer();
                }
            }
            Err(err) => {
                store.message(err.to_string());
                store.set_polling_indicator(PollingIndicator::Err);
            }
        }
    }

    /// Fetch and publish the current report
    pub async fn fetch_report(&self) {
        let store = &self.inner.store;

        match self
            .inner
            .gateway
            .get::<ReportResponse>(Endpoint::Report)
            .await
        {
            Ok(report) => {
                store.message(report.message.clone());
                store.update_polling_status(report.running);
                store.set_view(ActiveView::Report);
                store.emit(DashboardEvent::Report(report));
            }
            Err(err) => store.message(err.to_string()),
        }
    }

    /// Fetch the engine setup and open it for editing
    pub async fn fetch_test_config(&self) {
        match self
            .inner
            .gateway
            .get::<ConfigResponse>(Endpoint::Config)
            .await
        {
            Ok(config) => self.show_setup(config),
            Err(err) => self.inner.store.message(err.to_string()),
        }
    }

    /// Decode the edited tests, submit the setup and show what was saved
    pub async fn save_config(&self, form: &SetupForm) -> DecodeOutcome {
        let store = &self.inner.store;
        let outcome = test_config_codec::decode_with_stats(&form.tests_text);
        store
            .logger
            .codec_summary(outcome.records.len(), outcome.dropped_lines);

        let mut payload = Map::new();
        for (key, value) in &form.fields {
            payload.insert(key.clone(), Value::String(value.clone()));
        }
        let tests = outcome
            .records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "host": record.host,
                    "desc": record.description,
                    "test": record.test_kind,
                    "active": record.active,
                })
            })
            .collect();
        payload.insert("tests".to_string(), Value::Array(tests));

        store.message(format!(
            "sending new config: {} tests",
            outcome.records.len()
        ));

        match self
            .inner
            .gateway
            .post::<ConfigResponse, _>(Endpoint::SaveConfig, &payload)
            .await
        {
            Ok(config) => self.show_setup(config),
            Err(err) => {
                store.message(err.to_string());
                store.set_server_indicator(ServerIndicator::Err);
            }
        }

        outcome
    }

    /// Restart the engine's web process and re-initialize after a delay
    ///
    /// Returns the scheduled re-initialization, if the restart was accepted.
    pub async fn restart_engine_process(&self) -> Option<JoinHandle<()>> {
        let store = &self.inner.store;

        match self.engine_command(EngineAction::RestartCp).await {
            Ok(_) => {
                store.set_curtain(true);
                let controller = self.clone();
                let delay = self.inner.settings.restart_retry_delay;
                store.logger.debug(
                    "PollingController",
                    "restart_scheduled",
                    &format!("re-initializing in {}ms", delay.as_millis()),
                );
                Some(tokio::spawn(async move {
                    controller.inner.timer.sleep(delay).await;
                    controller.initialize().await;
                }))
            }
            Err(err) => {
                store.message(err.to_string());
                store.set_server_indicator(ServerIndicator::Err);
                None
            }
        }
    }

    /// Stop polling and reset engine results
    pub async fn stop_and_reset(&self) {
        let store = &self.inner.store;

        match self.engine_command(EngineAction::Reset).await {
            Ok(response) => {
                store.message(response.message);
                store.update_polling_status(response.polling);
            }
            Err(err) => {
                store.message(err.to_string());
                store.set_server_indicator(ServerIndicator::Err);
            }
        }
    }

    /// Publish the stored engine setup as pretty-printed JSON
    pub async fn view_stored_config(&self) {
        let store = &self.inner.store;
        store.message("Fetching Data ...");

        match self.inner.gateway.get::<Value>(Endpoint::Config).await {
            Ok(mut config) => {
                if let Some(object) = config.as_object_mut() {
                    object.remove("content");
                    object.remove("message");
                }
                match serde_json::to_string_pretty(&config) {
                    Ok(text) => {
                        store.message("Fetched Setup File");
                        store.emit(DashboardEvent::StoredConfig(text));
                    }
                    Err(err) => store.message(format!("Couldn't render setup file {}", err)),
                }
            }
            Err(err) => store.message(format!("Couldn't reach server {}", err)),
        }
    }

    // Private helpers

    async fn engine_command(&self, action: EngineAction) -> Result<EngineResponse, RequestError> {
        self.inner
            .gateway
            .post(Endpoint::Engine, &EngineCommand { action })
            .await
    }

    fn show_setup(&self, config: ConfigResponse) {
        let store = &self.inner.store;
        store.emit(DashboardEvent::Banner(Banner::new(
            config.heading(),
            config.colour(),
            None,
        )));
        store.message(config.message.clone());
        self.cancel_timer();
        store.set_view(ActiveView::Setup);
        store.emit(DashboardEvent::Setup(SetupView {
            fields: config.editable_fields(),
            tests_text: test_config_codec::encode(&config.tests),
            content: config
                .content
                .as_ref()
                .map(|content| content.paragraphs().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
        }));
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.inner
            .timer_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the ticking task without an immediate fetch
    fn start_timer(&self) -> bool {
        let interval = self.inner.settings.refresh_interval;
        {
            let mut slot = self.timer_slot();
            if slot.is_some() {
                return false;
            }

            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let task = tokio::spawn(async move {
                loop {
                    let timer = match weak.upgrade() {
                        Some(inner) => inner.timer.clone(),
                        None => break,
                    };
                    timer.sleep(interval).await;

                    let Some(inner) = weak.upgrade() else { break };
                    let controller = PollingController { inner };
                    tokio::spawn(async move {
                        controller.fetch_report().await;
                    });
                }
            });
            *slot = Some(TimerHandle { task });
        }

        self.inner
            .store
            .logger
            .timer_event("started", interval.as_millis() as u64);
        self.inner.store.set_auto_refresh(true);
        true
    }

    /// Cancel the ticking task; returns whether one was active
    fn cancel_timer(&self) -> bool {
        let handle = self.timer_slot().take();
        match handle {
            Some(handle) => {
                handle.cancel();
                self.inner.store.logger.timer_event(
                    "cancelled",
                    self.inner.settings.refresh_interval.as_millis() as u64,
                );
                self.inner.store.set_auto_refresh(false);
                true
            }
            None => false,
        }
    }
}
