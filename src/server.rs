use std::sync::Arc;

use pingora::prelude::*;
use pingora::server::RunArgs;
use pingora::server::Server as PingoraServer;
use pingora::server::configuration::Opt;
use pingora::services::background::background_service;

use crate::discovery::MembershipSource;
use crate::endpoint::SharedEndpoint;
use crate::metric::Metrics;
use crate::proxy::PrimaryProxy;
use crate::selector::PrimarySelector;
use crate::watcher::EndpointWatcher;

pub struct Server {
    server: PingoraServer,
}

impl Server {
    pub fn new(opt: Option<Opt>) -> Result<Self> {
        let server = PingoraServer::new(opt)?;
        Ok(Server { server })
    }

    /// Wire the endpoint watcher and the forwarding proxy into the server.
    pub fn bootstrap(
        &mut self,
        listen_addr: &str,
        service: &str,
        target_port: &str,
        source: Box<dyn MembershipSource>,
        metrics: Arc<Metrics>,
    ) -> Result<()> {
        self.server.bootstrap();

        let endpoint = SharedEndpoint::new();

        let watcher = EndpointWatcher::new(
            source,
            PrimarySelector::new(service, target_port, endpoint.clone()),
        );
        let background = background_service("endpoint watcher", watcher);
        self.server.add_service(background);

        let mut proxy = http_proxy_service(
            &self.server.configuration,
            PrimaryProxy::new(endpoint, metrics),
        );
        proxy.add_tcp(listen_addr);
        self.server.add_service(proxy);

        log::info!("listening at {listen_addr}");
        Ok(())
    }

    pub fn run_forever(self) {
        self.server.run_forever();
    }

    pub fn run(self, args: RunArgs) {
        self.server.run(args);
    }
}
