use std::sync::Arc;

use clap::Parser;
use primary_proxy::configuration::Opts;
use primary_proxy::discovery::{self, ServiceEndpoints};
use primary_proxy::metric::Metrics;
use primary_proxy::server::Server;

fn main() {
    // Enable basic logging; set RUST_LOG=info for visibility.
    env_logger::init();

    let opts = Opts::parse();

    // pingora owns the long-running runtimes; configuration loading gets a
    // short-lived one of its own.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build setup runtime");
    let config = runtime
        .block_on(discovery::platform_config(opts.kubeconfig.as_deref()))
        .expect("failed to resolve platform configuration");
    drop(runtime);

    let source = ServiceEndpoints::new(config, &opts.namespace, &opts.service);

    let mut server = Server::new(None).expect("failed to create server");
    server
        .bootstrap(
            &format!("0.0.0.0:{}", opts.port),
            &opts.service,
            &opts.target_port,
            Box::new(source),
            Arc::new(Metrics::default()),
        )
        .expect("failed to bootstrap server");

    server.run_forever();
}
