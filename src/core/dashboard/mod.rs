pub mod api_gateway;
pub mod banner;
pub mod debug_logger;
pub mod polling_controller;
pub mod report_renderer;
pub mod test_config_codec;
pub mod types;

// Re-export commonly used items
pub use api_gateway::{
    ApiGateway, ApiTransport, Endpoint, EndpointPaths, HttpVerb, TransportObserver,
    TransportResponse,
};
#[cfg(feature = "http-gateway")]
pub use api_gateway::IsahcTransport;
pub use banner::{go_light, text_colour_for};
pub use debug_logger::{get_debug_logger, DebugLogger};
pub use polling_controller::{
    ControllerSettings, DashboardView, PollingController, TimerTrait, TokioTimer,
};
pub use report_renderer::{ReportRenderer, TerminalView};
pub use test_config_codec::{decode, decode_with_stats, encode, DecodeOutcome};
pub use types::*;
