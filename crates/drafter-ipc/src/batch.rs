use drafter_core::{Arg, FailureKind, Response, Verb};
use rand::{Rng, SeedableRng, distributions::Uniform, rngs::StdRng};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{DrawingClient, client::line_args};

/// Lines between progress events during a burst.
const PROGRESS_INTERVAL: u32 = 100;

/// Uniform sampler for segment endpoints within a closed coordinate range.
#[derive(Debug, Clone)]
pub struct SegmentSampler {
    coords: Uniform<f64>,
}

impl SegmentSampler {
    /// Returns `None` when `[min, max]` cannot be sampled uniformly.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        let usable = min.is_finite() && max.is_finite() && min <= max && (max - min).is_finite();
        usable.then(|| Self {
            coords: Uniform::new_inclusive(min, max),
        })
    }

    /// Draws `[x1, y1, x2, y2]`, each value independent.
    pub fn segment<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 4] {
        [
            rng.sample(&self.coords),
            rng.sample(&self.coords),
            rng.sample(&self.coords),
            rng.sample(&self.coords),
        ]
    }
}

/// Owns the persistent connection for the duration of one batch.
///
/// Obtained from [`DrawingClient::open_batch`]. Dropping the session
/// without [`BatchSession::finish`] (a panic, an early return or a
/// cancelled future) still closes the connection, leaving the batch
/// uncommitted.
pub struct BatchSession<'a> {
    client: &'a mut DrawingClient,
    begin: Response,
}

impl BatchSession<'_> {
    /// Successful BEGIN_BATCH response that opened this session.
    pub fn begin(&self) -> &Response {
        &self.begin
    }

    /// Sends any command over the batch connection.
    pub async fn send(&mut self, verb: Verb, args: Vec<Arg>) -> Response {
        self.client.send(verb, args, true).await
    }

    /// Inserts a line into the batch.
    pub async fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Response {
        self.send(Verb::Line, line_args(x1, y1, x2, y2)).await
    }

    /// Sends END_BATCH while the connection is still open, then disconnects.
    pub async fn finish(mut self) -> Response {
        let response = if self.client.is_connected() {
            self.send(Verb::EndBatch, Vec::new()).await
        } else {
            Response::failure(
                None,
                FailureKind::Connection,
                "batch connection closed before END_BATCH",
            )
        };
        self.client.disconnect();
        response
    }
}

impl Drop for BatchSession<'_> {
    fn drop(&mut self) {
        if self.client.is_connected() {
            warn!("batch session abandoned, closing connection");
            self.client.disconnect();
        }
    }
}

impl DrawingClient {
    /// Connects and opens a batch, handing back a guard over the connection.
    ///
    /// On failure the error response says why the batch could not start.
    /// If BEGIN_BATCH itself was refused, END_BATCH is still sent before the
    /// connection is closed.
    pub async fn open_batch(&mut self) -> Result<BatchSession<'_>, Response> {
        if let Err(err) = self.connect().await {
            warn!(error = %err, "could not open batch connection");
            return Err(Response::failure(
                None,
                err.kind(),
                format!("failed to start batch mode: {err}"),
            ));
        }

        let begin = self.send(Verb::BeginBatch, Vec::new(), true).await;
        let session = BatchSession {
            client: self,
            begin,
        };
        if session.begin.is_ok() {
            return Ok(session);
        }

        let begin = session.begin.clone();
        let reason = format!("failed to start batch mode: {}", begin.error_or("unknown"));
        let end = session.finish().await;
        debug!(end_status = ?end.status, "batch torn down after failed start");
        Err(Response {
            error: Some(reason),
            ..begin
        })
    }

    /// Inserts `count` random lines inside one BEGIN_BATCH/END_BATCH bracket.
    ///
    /// Returns `[begin, line_1, .., line_count, end]`. When the batch cannot
    /// start the result is a single error response; the connection is closed
    /// on every path.
    pub async fn random_primitive_burst(
        &mut self,
        count: u32,
        min_coord: f64,
        max_coord: f64,
    ) -> Vec<Response> {
        let mut rng = StdRng::from_entropy();
        self.burst_with_rng(&mut rng, count, min_coord, max_coord)
            .await
    }

    /// Same as [`DrawingClient::random_primitive_burst`] with reproducible coordinates.
    pub async fn random_primitive_burst_seeded(
        &mut self,
        count: u32,
        min_coord: f64,
        max_coord: f64,
        seed: u64,
    ) -> Vec<Response> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.burst_with_rng(&mut rng, count, min_coord, max_coord)
            .await
    }

    async fn burst_with_rng<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        count: u32,
        min_coord: f64,
        max_coord: f64,
    ) -> Vec<Response> {
        let Some(sampler) = SegmentSampler::new(min_coord, max_coord) else {
            return vec![Response::failure(
                None,
                FailureKind::InvalidArgument,
                format!("invalid coordinate range [{min_coord}, {max_coord}]"),
            )];
        };

        let mut session = match self.open_batch().await {
            Ok(session) => session,
            Err(failed) => return vec![failed],
        };

        let mut results = Vec::with_capacity(count as usize + 2);
        results.push(session.begin().clone());

        for sent in 1..=count {
            let [x1, y1, x2, y2] = sampler.segment(rng);
            let response = session.line(x1, y1, x2, y2).await;
            if !response.is_ok() {
                debug!(line = sent, error = response.error_or("unknown"), "batch line rejected");
            }
            results.push(response);

            if sent % PROGRESS_INTERVAL == 0 {
                debug!(sent, count, "batch progress");
            }
        }

        results.push(session.finish().await);
        results
    }
}

/// Summary of a burst result sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Lines the caller asked for.
    pub requested: u32,
    /// LINE commands the server accepted.
    pub created: usize,
    /// Whether END_BATCH succeeded.
    pub committed: bool,
    /// END_BATCH payload, or the error that ended the batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl BatchReport {
    pub fn from_results(requested: u32, results: &[Response]) -> Self {
        let (lines, last) = match results {
            [_, lines @ .., last] => (lines, Some(last)),
            [only] => (&[][..], Some(only)),
            [] => (&[][..], None),
        };

        let committed = results.len() >= 2 && last.is_some_and(Response::is_ok);
        let detail = last.and_then(|last| {
            if last.is_ok() {
                last.result.clone()
            } else {
                last.error.clone().map(Value::String)
            }
        });

        Self {
            requested,
            created: lines.iter().filter(|line| line.is_ok()).count(),
            committed,
            detail,
        }
    }
}
