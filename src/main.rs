use omniping::cli::Cli;
use omniping::config::Config;
use omniping::core::dashboard::{
    encode, ApiGateway, ConfigResponse, Endpoint, PollingController, ReportRenderer, SetupForm,
    TerminalView, TokioTimer,
};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    // Handle configuration commands
    if cli.init {
        Config::init()?;
        return Ok(());
    }

    if cli.print {
        let config = Config::load().unwrap_or_else(|_| Config::default());
        config.print()?;
        return Ok(());
    }

    if cli.check {
        let config = Config::load()?;
        config.check()?;
        println!("✓ Configuration valid");
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if cli.no_color {
        config.color = false;
    }
    config.check()?;

    let gateway = ApiGateway::new(&config.api_base_url())?
        .with_endpoints(config.endpoints.clone())
        .with_timeout_ms(config.request_timeout_ms);

    if cli.export_tests {
        let setup: ConfigResponse = gateway.get(Endpoint::Config).await?;
        println!("{}", encode(&setup.tests));
        return Ok(());
    }

    // Fields of the current setup are resubmitted unchanged on import
    let import_fields = match &cli.import_tests {
        Some(_) => Some(
            gateway
                .get::<ConfigResponse>(Endpoint::Config)
                .await?
                .editable_fields(),
        ),
        None => None,
    };

    let view = Arc::new(TerminalView::new(
        ReportRenderer::new().with_color(config.color),
    ));
    let controller = PollingController::with_parts(
        gateway,
        view,
        Arc::new(TokioTimer),
        config.controller_settings(),
    );

    if let (Some(path), Some(fields)) = (&cli.import_tests, import_fields) {
        let form = SetupForm {
            fields,
            tests_text: std::fs::read_to_string(path)?,
        };
        let outcome = controller.save_config(&form).await;
        if outcome.dropped_lines > 0 {
            eprintln!(
                "Skipped {} line(s) that are not 'host ; description ; test'",
                outcome.dropped_lines
            );
        }
        return Ok(());
    }

    if cli.show_config {
        controller.view_stored_config().await;
        return Ok(());
    }

    if cli.restart {
        if let Some(reinit) = controller.restart_engine_process().await {
            reinit.await?;
        }
        return Ok(());
    }

    if cli.reset {
        controller.stop_and_reset().await;
        return Ok(());
    }

    if cli.clear {
        controller.clear_counters().await;
        return Ok(());
    }

    controller.initialize().await;

    let wants_toggle = (cli.start && controller.state().running != Some(true))
        || (cli.stop && controller.state().running == Some(true));
    if wants_toggle {
        controller.toggle_run().await;
    }

    if cli.watch {
        controller.start_auto_refresh().await;

        match cli.ticks {
            Some(ticks) => {
                let window = controller.settings().refresh_window(ticks);
                tokio::select! {
                    _ = tokio::time::sleep(window) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                tokio::signal::ctrl_c().await?;
            }
        }

        controller.stop_auto_refresh().await;
    }

    Ok(())
}
