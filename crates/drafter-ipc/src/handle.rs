use std::sync::Arc;

use drafter_core::{ClientConfig, Response};
use tokio::sync::Mutex;
use tracing::info;

use crate::DrawingClient;

/// Cloneable handle to one lazily created [`DrawingClient`].
///
/// Callers such as request handlers take turns on the client. After a
/// response reporting that the server was unreachable or timed out, the
/// client is dropped and the next call starts from a fresh instance.
#[derive(Clone)]
pub struct SharedClient {
    config: ClientConfig,
    slot: Arc<Mutex<Option<DrawingClient>>>,
}

impl SharedClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// True when a client instance is currently held.
    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn ping(&self) -> Response {
        let mut slot = self.slot.lock().await;
        let response = slot
            .get_or_insert_with(|| DrawingClient::new(self.config.clone()))
            .ping()
            .await;
        settle(&mut slot, std::slice::from_ref(&response));
        response
    }

    pub async fn line(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Response {
        let mut slot = self.slot.lock().await;
        let response = slot
            .get_or_insert_with(|| DrawingClient::new(self.config.clone()))
            .line(x1, y1, x2, y2)
            .await;
        settle(&mut slot, std::slice::from_ref(&response));
        response
    }

    /// Runs a burst; `seed` makes the coordinates reproducible.
    pub async fn random_primitive_burst(
        &self,
        count: u32,
        min_coord: f64,
        max_coord: f64,
        seed: Option<u64>,
    ) -> Vec<Response> {
        let mut slot = self.slot.lock().await;
        let client = slot.get_or_insert_with(|| DrawingClient::new(self.config.clone()));
        let results = match seed {
            Some(seed) => {
                client
                    .random_primitive_burst_seeded(count, min_coord, max_coord, seed)
                    .await
            }
            None => {
                client
                    .random_primitive_burst(count, min_coord, max_coord)
                    .await
            }
        };
        settle(&mut slot, &results);
        results
    }
}

fn settle(slot: &mut Option<DrawingClient>, responses: &[Response]) {
    if responses.iter().any(Response::is_unavailable) {
        if let Some(mut client) = slot.take() {
            client.disconnect();
            info!(addr = %client.config().address(), "dropped drawing client after transport failure");
        }
    }
}
