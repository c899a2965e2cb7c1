#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use postbridge::{
    transport::memory::{self, MemoryConnector, MemoryPeer},
    ChannelClient, ChannelService, ClientConfig, DownstreamMessage, ServiceConfig,
};
use tokio::task::JoinHandle;

pub const SHORT: Duration = Duration::from_millis(100);

/// Запущенный сервис вместе с транспортом.
pub struct Harness {
    pub service: Arc<ChannelService>,
    pub connector: MemoryConnector,
    pub runner: JoinHandle<()>,
}

impl Harness {
    pub fn start(config: ServiceConfig) -> Self {
        let (endpoint, connector) = memory::channel();
        let service = Arc::new(ChannelService::builder().config(config).bind(endpoint));
        let runner = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });
        Self {
            service,
            connector,
            runner,
        }
    }

    pub fn default_started() -> Self {
        Self::start(ServiceConfig::default())
    }

    pub fn client(&self) -> ChannelClient {
        ChannelClient::connect(
            &self.connector,
            ClientConfig::default().with_request_timeout_ms(SHORT.as_millis() as u64),
        )
    }

    pub fn peer(&self) -> MemoryPeer {
        self.connector.connect()
    }
}

/// Следующее сообщение или `None`, если за `SHORT` ничего не пришло.
pub async fn next(peer: &mut MemoryPeer) -> Option<DownstreamMessage> {
    tokio::time::timeout(SHORT, peer.recv()).await.ok().flatten()
}
