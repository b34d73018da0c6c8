mod serve;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ifcmeta",
    about = "HTTP service that reads and rewrites IFC project, site and building names",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = ifcmeta_server::config::DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Allowed CORS origin(s), comma-separated (default: any origin)
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Directory where uploads are staged during a request
    #[arg(long, env = "UPLOAD_FOLDER")]
    upload_dir: Option<PathBuf>,

    /// Directory where modified files are written
    #[arg(long, env = "OUTPUT_FOLDER")]
    output_dir: Option<PathBuf>,

    /// Maximum upload size in MiB
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = ifcmeta_server::config::DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,
}

impl Cli {
    fn server_config(&self) -> ifcmeta_server::ServerConfig {
        ifcmeta_server::ServerConfig::new(
            self.upload_dir
                .clone()
                .unwrap_or_else(ifcmeta_core::paths::default_upload_dir),
            self.output_dir
                .clone()
                .unwrap_or_else(ifcmeta_core::paths::default_output_dir),
        )
        .with_cors_origin(self.cors_origin.clone())
        .with_max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024))
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let config = cli.server_config();
    let result = serve::run(&cli.host, cli.port, config);

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
