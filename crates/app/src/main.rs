use clap::Parser;

use yatagarasu_app::backends::{EnergyVadBackend, ProcessDomainAsrBackend, ProcessGeneralAsrBackend};
use yatagarasu_app::config::Config;
use yatagarasu_app::{logging, runtime};
use yatagarasu_audio::Transport;
use yatagarasu_foundation::{AppStateCell, PipelineMetrics, ShutdownHandler, YatagarasuError};
use yatagarasu_stt::BackendHandle;

#[derive(Parser, Debug)]
#[command(name = "yatagarasu", author, version, about = "RTSP voice-gate daemon")]
struct Cli {
    /// Print the resolved configuration and exit without starting the pipeline.
    #[arg(long = "print-config")]
    print_config: bool,

    /// List the rtsp_transport strategies and the concrete candidates each
    /// resolves to, then exit. Does not require a loadable configuration.
    #[arg(long = "list-transports")]
    list_transports: bool,

    /// Load and validate the configuration, report the result, and exit
    /// without starting the pipeline.
    #[arg(long = "check-config")]
    check_config: bool,
}

const KNOWN_TRANSPORTS: [&str; 6] = ["auto", "tcp", "udp", "udp_multicast", "http", "https"];

fn list_transports() {
    for name in KNOWN_TRANSPORTS {
        let transport: Transport = name.parse().expect("KNOWN_TRANSPORTS are all parseable");
        let candidates: Vec<String> = transport
            .candidates()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        println!("{name} -> {}", candidates.join(", "));
    }
}

fn select_backend(cfg: &Config) -> BackendHandle {
    match cfg.stt_backend.to_ascii_lowercase().as_str() {
        "reazonspeech-k2" | "reazonspeech" | "domain" | "domain-tuned" => {
            BackendHandle::DomainTuned(Box::new(ProcessDomainAsrBackend::new(
                cfg.stt_command.clone(),
                cfg.stt_timeout_sec,
            )))
        }
        _ => BackendHandle::General(Box::new(ProcessGeneralAsrBackend::new(
            cfg.stt_command.clone(),
            cfg.stt_timeout_sec,
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.list_transports {
        list_transports();
        return Ok(());
    }

    if cli.check_config {
        match Config::load() {
            Ok(cfg) => {
                println!("config ok: {}", cfg.rtsp_url);
                return Ok(());
            }
            Err(e) => {
                eprintln!("config error: {e}");
                std::process::exit(YatagarasuError::from(e).exit_code());
            }
        }
    }

    let cfg = Config::load().map_err(YatagarasuError::from)?;
    let _log_guard = logging::init(&cfg.log_file_dir, &cfg.log_level)?;
    logging::prune_old_logs(&cfg.log_file_dir, cfg.log_retention_days);

    tracing::info!("starting yatagarasu");

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let metrics = PipelineMetrics::new();
    let shutdown = ShutdownHandler::new().install().await;
    let app_state = std::sync::Arc::new(AppStateCell::new());
    let vad_backend = EnergyVadBackend::new();
    let stt_backend = select_backend(&cfg);

    let result = runtime::run(cfg, metrics, shutdown, app_state, vad_backend, stt_backend).await;

    match result {
        Ok(()) => {
            tracing::info!("stopped normally");
            std::process::exit(0);
        }
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(error = %e, exit_code = code, "stopped with error");
            std::process::exit(code);
        }
    }
}
