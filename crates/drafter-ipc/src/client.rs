use drafter_core::{
    Arg, ClientConfig, Command, CommandIdSequence, DEFAULT_TEXT_HEIGHT, Response, Verb,
};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tracing::{debug, trace, warn};

use crate::{
    ClientError,
    codec::encode,
    framing::{read_message, read_to_close, write_message},
};

/// Persistent stream plus bytes received past the last decoded response.
struct Connection {
    stream: TcpStream,
    pending: Vec<u8>,
}

/// TCP client for the drawing server's JSON command protocol.
///
/// One command is in flight at a time and responses are consumed in send
/// order; the `id` echoed by the server is never matched against the
/// request. Every command method reports failures through the returned
/// [`Response`] instead of an `Err`.
pub struct DrawingClient {
    config: ClientConfig,
    ids: CommandIdSequence,
    connection: Option<Connection>,
}

impl DrawingClient {
    /// Creates a client without touching the network.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ids: CommandIdSequence::new(),
            connection: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// True while a persistent connection is owned.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the persistent connection unless one is already owned.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let stream = open_stream(&self.config).await?;
        debug!(addr = %self.config.address(), "opened persistent connection");
        self.connection = Some(Connection {
            stream,
            pending: Vec::new(),
        });
        Ok(())
    }

    /// Closes the persistent connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!(
                addr = %self.config.address(),
                discarded = connection.pending.len(),
                "closed persistent connection"
            );
        }
    }

    /// Sends one command and returns its response.
    ///
    /// With `persistent` set and a connection owned, the command goes over
    /// that connection; otherwise a connection is opened for this command
    /// alone and closed before returning.
    ///
    /// A non-persistent command sent while a batch connection is owned
    /// therefore runs on a second, short-lived connection outside the batch.
    /// The owned connection is left untouched, so the batch can continue.
    /// Callers that need the command inside the batch pass `persistent`.
    pub async fn send(&mut self, verb: Verb, args: Vec<Arg>, persistent: bool) -> Response {
        let command = Command {
            id: self.ids.next_id(),
            cmd: verb,
            args,
            token: self.config.token().map(str::to_string),
        };

        let outcome = match self.connection.as_mut() {
            Some(connection) if persistent => {
                exchange_persistent(connection, &self.config, &command).await
            }
            _ => exchange_ephemeral(&self.config, &command).await,
        };

        match outcome {
            Ok(response) => {
                trace!(id = %command.id, cmd = %verb, status = ?response.status, "command answered");
                response
            }
            Err(err) => {
                warn!(id = %command.id, cmd = %verb, error = %err, "command failed");
                err.into_response(Some(command.id))
            }
        }
    }

    pub async fn ping(&mut self) -> Response {
        self.send(Verb::Ping, Vec::new(), false).await
    }

    /// Saves the drawing; `None` or an empty name saves in place.
    pub async fn save(&mut self, filename: Option<&str>) -> Response {
        let args = filename
            .filter(|name| !name.is_empty())
            .map(|name| vec![Arg::from(name)])
            .unwrap_or_default();
        self.send(Verb::Save, args, false).await
    }

    pub async fn export(&mut self, filename: &str) -> Response {
        self.send(Verb::Export, vec![Arg::from(filename)], false).await
    }

    pub async fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Response {
        self.send(Verb::Line, line_args(x1, y1, x2, y2), false).await
    }

    pub async fn circle(&mut self, x: f64, y: f64, radius: f64) -> Response {
        let args = vec![Arg::Number(x), Arg::Number(y), Arg::Number(radius)];
        self.send(Verb::Circle, args, false).await
    }

    /// Inserts a text label; see [`DEFAULT_TEXT_HEIGHT`] for the usual height.
    pub async fn text(&mut self, x: f64, y: f64, content: &str, height: f64) -> Response {
        let args = vec![
            Arg::Number(x),
            Arg::Number(y),
            Arg::from(content),
            Arg::Number(height),
        ];
        self.send(Verb::Text, args, false).await
    }

    /// Inserts a text label at the default height.
    pub async fn text_default(&mut self, x: f64, y: f64, content: &str) -> Response {
        self.text(x, y, content, DEFAULT_TEXT_HEIGHT).await
    }

    /// Connects and opens a batch on the persistent connection.
    pub async fn begin_batch(&mut self) -> Response {
        if let Err(err) = self.connect().await {
            warn!(error = %err, "could not open batch connection");
            return err.into_response(None);
        }
        self.send(Verb::BeginBatch, Vec::new(), true).await
    }

    /// Inserts a line into the open batch.
    pub async fn batch_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Response {
        self.send(Verb::Line, line_args(x1, y1, x2, y2), true).await
    }

    /// Commits the open batch and closes the persistent connection.
    pub async fn end_batch(&mut self) -> Response {
        let response = self.send(Verb::EndBatch, Vec::new(), true).await;
        self.disconnect();
        response
    }
}

pub(crate) fn line_args(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<Arg> {
    vec![
        Arg::Number(x1),
        Arg::Number(y1),
        Arg::Number(x2),
        Arg::Number(y2),
    ]
}

async fn open_stream(config: &ClientConfig) -> Result<TcpStream, ClientError> {
    let addr = config.address();

    let stream = match timeout(config.connect_timeout(), TcpStream::connect(addr.as_str())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => return Err(ClientError::connect(addr, err)),
        Err(_) => {
            return Err(ClientError::Timeout {
                op: "connect",
                after: config.connect_timeout(),
            });
        }
    };

    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn exchange_persistent(
    connection: &mut Connection,
    config: &ClientConfig,
    command: &Command,
) -> Result<Response, ClientError> {
    let payload = encode(command)?;

    timeout(
        config.connect_timeout(),
        write_message(&mut connection.stream, &payload),
    )
    .await
    .map_err(|_| ClientError::Timeout {
        op: "write",
        after: config.connect_timeout(),
    })??;

    read_message(
        &mut connection.stream,
        &mut connection.pending,
        config.read_timeout(),
    )
    .await
}

async fn exchange_ephemeral(
    config: &ClientConfig,
    command: &Command,
) -> Result<Response, ClientError> {
    let payload = encode(command)?;
    let mut stream = open_stream(config).await?;

    timeout(config.connect_timeout(), async {
        write_message(&mut stream, &payload).await?;
        stream.shutdown().await?;
        read_to_close(&mut stream).await
    })
    .await
    .map_err(|_| ClientError::Timeout {
        op: "exchange",
        after: config.connect_timeout(),
    })?
}
