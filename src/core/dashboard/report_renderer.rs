// Terminal rendering for dashboard events
use crate::core::dashboard::banner::parse_hex_colour;
use crate::core::dashboard::polling_controller::DashboardView;
use crate::core::dashboard::types::*;
use ansi_term::{Colour, Style};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Renders controller events as terminal text
pub struct ReportRenderer {
    color: bool,
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self { color: true }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Text for one event, `None` for events with nothing to show
    pub fn render_event(&self, event: &DashboardEvent) -> Option<String> {
        match event {
            DashboardEvent::Message(message) if message.is_empty() => None,
            DashboardEvent::Message(message) => Some(format!("» {}", message)),
            DashboardEvent::ServerIndicator(indicator) => Some(format!(
                "server {}",
                Self::server_indicator_icon(*indicator)
            )),
            DashboardEvent::PollingIndicator(indicator) => Some(format!(
                "polling {}",
                Self::polling_indicator_icon(*indicator)
            )),
            DashboardEvent::RunControl(_) | DashboardEvent::AutoRefresh(_) => None,
            DashboardEvent::Banner(banner) => Some(self.render_banner(banner)),
            DashboardEvent::Curtain(true) => Some("Server unavailable, waiting...".to_string()),
            DashboardEvent::Curtain(false) => None,
            DashboardEvent::Report(report) => Some(self.render_report(report)),
            DashboardEvent::Setup(setup) => Some(self.render_setup(setup)),
            DashboardEvent::StoredConfig(text) => Some(format!("Stored Config:\n{}", text)),
        }
    }

    /// Indicator icons: 🟢 on, ⚪ off, 🔴 err, 🟡 bad
    pub fn server_indicator_icon(indicator: ServerIndicator) -> &'static str {
        match indicator {
            ServerIndicator::On => "🟢",
            ServerIndicator::Off => "⚪",
            ServerIndicator::Err => "🔴",
            ServerIndicator::Bad => "🟡",
        }
    }

    pub fn polling_indicator_icon(indicator: PollingIndicator) -> &'static str {
        match indicator {
            PollingIndicator::On => "🟢",
            PollingIndicator::Off => "⚪",
            PollingIndicator::Err => "🔴",
        }
    }

    pub fn render_banner(&self, banner: &Banner) -> String {
        let title = match &banner.version {
            Some(version) if !version.is_empty() => {
                format!(" {} (v{}) ", banner.heading, version)
            }
            _ => format!(" {} ", banner.heading),
        };

        if !self.color {
            return title;
        }

        match (
            parse_hex_colour(&banner.colour),
            parse_hex_colour(banner.text_colour),
        ) {
            (Some((r, g, b)), Some((fr, fg, fb))) => Colour::RGB(fr, fg, fb)
                .on(Colour::RGB(r, g, b))
                .paint(title)
                .to_string(),
            _ => title,
        }
    }

    pub fn render_report(&self, report: &ReportResponse) -> String {
        let mut lines = vec!["Report".to_string()];
        lines.push(
            "Target | | Result of Test | RTT | Performance | Time of Last Failure (Reason)"
                .to_string(),
        );
        lines.extend(report.tests.iter().map(|test| self.render_row(test)));

        lines.push(format!("Total Targets : {}", report.tests.len()));
        lines.push(format!("Started : {}", display_value(&report.started)));
        lines.push(format!("Current Output : {}", display_value(&report.time)));
        lines.push(format!("Number of polls : {}", report.count));
        lines.push(format!(
            "Duration (HH:MM:SS.nn) : {}",
            display_value(&report.duration)
        ));
        lines.extend(content_lines(report.content.as_ref()));
        lines.join("\n")
    }

    pub fn render_row(&self, test: &TestResult) -> String {
        let mark = if test.good { "✔" } else { "✘" };
        let performance = format!(
            "{} / {} ({})",
            test.total_successes, test.total, test.success_percent
        );
        let last_failure = format!("{} ({})", test.last_bad, test.last_bad_status);

        let status = self.highlight(&test.status, test.flag_status());
        let performance = self.highlight(&performance, test.flag_counts());
        let last_failure = self.highlight(&last_failure, test.flag_counts());

        let row = format!(
            "{} | {} | {} | {} | {} | {}",
            test.target_label(),
            mark,
            status,
            test.rtt,
            performance,
            last_failure
        );

        if !self.color {
            return row;
        }
        match test.row_class() {
            RowClass::Fail => Colour::Red.paint(row).to_string(),
            RowClass::Incomplete => Colour::Yellow.paint(row).to_string(),
            RowClass::Idle | RowClass::Normal => row,
        }
    }

    pub fn render_setup(&self, setup: &SetupView) -> String {
        let mut lines = vec!["Set Up".to_string()];
        lines.extend(
            setup
                .fields
                .iter()
                .map(|(key, value)| format!("{} : {}", key, value)),
        );
        lines.push("Tests :".to_string());
        lines.push(setup.tests_text.clone());
        lines.extend(setup.content.iter().map(|paragraph| strip_markup(paragraph)));
        lines.join("\n")
    }

    fn highlight(&self, text: &str, flag: bool) -> String {
        if flag && self.color {
            Style::new().bold().paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// [`DashboardView`] that prints rendered events to stdout
#[derive(Default)]
pub struct TerminalView {
    renderer: ReportRenderer,
}

impl TerminalView {
    pub fn new(renderer: ReportRenderer) -> Self {
        Self { renderer }
    }
}

impl DashboardView for TerminalView {
    fn render(&self, event: DashboardEvent) {
        if let Some(text) = self.renderer.render_event(&event) {
            println!("{}", text);
        }
    }
}

/// Engine sends `false` for timestamps before the first poll
fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => "--".to_string(),
    }
}

fn content_lines(content: Option<&Content>) -> Vec<String> {
    content
        .map(|content| content.paragraphs().into_iter().map(strip_markup).collect())
        .unwrap_or_default()
}

/// Engine help text carries inline HTML
pub fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

    let without_tags = tags.replace_all(text, "");
    let plain = without_tags.replace("&nbsp;", " ");
    plain
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
