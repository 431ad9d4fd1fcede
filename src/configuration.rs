use clap::Parser;

/// Command line options for the proxy process. Immutable after startup.
#[derive(Debug, Parser)]
#[command(name = "primary-proxy", about = "Sticky single-primary reverse proxy")]
pub struct Opts {
    /// HTTP port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Namespace in which the target service is defined
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Service to proxy to
    #[arg(long)]
    pub service: String,

    /// Name of the service port to forward to
    #[arg(long = "target-port", default_value = "http")]
    pub target_port: String,

    /// Kubeconfig file to use; in-cluster configuration when not set
    #[arg(long)]
    pub kubeconfig: Option<String>,
}
