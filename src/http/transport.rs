use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use bytes::Bytes;
use chrono::Utc;
use eyre::{eyre, Context};
use http::{header, Method, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinSet};

use super::Dsn;
use crate::sentry::{Delivery, Report, Tags, Transport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CLIENT_NAME: &str = concat!("sentry-tee/", env!("CARGO_PKG_VERSION"));

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Body posted to the store endpoint.
#[derive(Serialize)]
struct Event<'a> {
    #[serde(flatten)]
    report: &'a Report,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a Tags,
}

fn no_tags(tags: &&Tags) -> bool {
    tags.is_empty()
}

pub struct Builder {
    dsn: Dsn,
    timeout: Duration,
}

impl Builder {
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            ..self
        }
    }

    /// Creates the HTTP client and starts the delivery thread.
    pub fn build(self) -> eyre::Result<HttpTransport> {
        let url: Uri = self
            .dsn
            .store_url()
            .parse()
            .with_context(|| format!("Can't construct store url for {}", self.dsn))?;

        let client = https_client()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed creating transport runtime")?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let inflight = Arc::new(Inflight::default());

        let worker = Arc::new(Worker {
            client,
            url,
            dsn: self.dsn.clone(),
            timeout: self.timeout,
        });

        thread::Builder::new()
            .name("sentry-tee-transport".to_string())
            .spawn(move || runtime.block_on(worker.run(receiver)))
            .context("Failed spawning transport thread")?;

        tracing::debug!(endpoint = %self.dsn.store_url(), "sentry transport started");

        Ok(HttpTransport {
            dsn: self.dsn,
            sender,
            inflight,
        })
    }
}

fn https_client() -> eyre::Result<HttpsClient> {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::debug!("skipping native certificate: {}", err);
    }
    roots.add_parsable_certificates(native.certs);

    let tls_config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::aws_lc_rs::default_provider().into(),
    )
    .with_safe_default_protocol_versions()
    .context("Error with the TLS configuration.")?
    .with_root_certificates(roots)
    .with_no_client_auth();

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new()).build(connector))
}

/// Posts reports to the store endpoint of a Sentry compatible service.
///
/// Requests run on a dedicated thread, so `capture` never blocks and `wait` can be called from
/// any thread.
pub struct HttpTransport {
    dsn: Dsn,
    sender: mpsc::UnboundedSender<Job>,
    inflight: Arc<Inflight>,
}

impl HttpTransport {
    pub fn builder(dsn: Dsn) -> Builder {
        Builder {
            dsn,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn new(dsn: Dsn) -> eyre::Result<Self> {
        Self::builder(dsn).build()
    }

    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// Number of reports that could not be delivered since the transport was created.
    pub fn failed(&self) -> u64 {
        self.inflight.lock().total_failed
    }
}

impl Transport for HttpTransport {
    fn capture(&self, report: Report, tags: &Tags) -> Delivery {
        let ticket = Ticket::issue(self.inflight.clone());

        let body = match serde_json::to_vec(&Event {
            report: &report,
            tags,
        }) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                ticket.complete(false);
                return Delivery::ready(Err(err.into()));
            }
        };

        let (done, delivery) = Delivery::channel();
        let job = Job {
            event_id: report.event_id,
            body,
            done,
            ticket,
        };

        // The job is dropped on failure, which settles its ticket.
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            let _ = job.done.send(Err(eyre!("transport worker has stopped")));
        }

        delivery
    }

    fn wait(&self) -> eyre::Result<()> {
        let failed = self.inflight.wait_idle();

        if self.sender.is_closed() {
            eyre::bail!("transport worker has stopped");
        }
        if failed > 0 {
            eyre::bail!("{} report(s) could not be delivered", failed);
        }
        Ok(())
    }
}

struct Job {
    event_id: String,
    body: Bytes,
    done: tokio::sync::oneshot::Sender<eyre::Result<String>>,
    ticket: Ticket,
}

struct Worker {
    client: HttpsClient,
    url: Uri,
    dsn: Dsn,
    timeout: Duration,
}

impl Worker {
    async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<Job>) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                job = receiver.recv() => match job {
                    Some(job) => {
                        tasks.spawn(self.clone().deliver(job));
                    }
                    None => break,
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        tracing::debug!("sentry transport stopped");
    }

    async fn deliver(self: Arc<Self>, job: Job) {
        let Job {
            event_id,
            body,
            done,
            ticket,
        } = job;

        let result = self.send(body).await;
        match &result {
            Ok(()) => tracing::debug!(event_id = %event_id, "report delivered"),
            Err(err) => tracing::warn!(event_id = %event_id, "failed delivering report: {:#}", err),
        }

        let ok = result.is_ok();
        let _ = done.send(result.map(|_| event_id));
        ticket.complete(ok);
    }

    async fn send(&self, body: Bytes) -> eyre::Result<()> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, CLIENT_NAME)
            .header(
                "X-Sentry-Auth",
                self.dsn.auth_header(CLIENT_NAME, Utc::now().timestamp()),
            )
            .body(Full::new(body))
            .context("Failed building report request")?;

        let response: Response<Incoming> =
            tokio::time::timeout(self.timeout, self.client.request(request))
                .await
                .map_err(|_| eyre!("request timed out after {:?}", self.timeout))?
                .context("Failed sending report")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .into_body()
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .unwrap_or_default();
            eyre::bail!(
                "service rejected report with {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }

        Ok(())
    }
}

#[derive(Default)]
struct Inflight {
    state: Mutex<InflightState>,
    idle: Condvar,
}

#[derive(Default)]
struct InflightState {
    pending: usize,
    failed: usize,
    total_failed: u64,
}

impl Inflight {
    fn lock(&self) -> MutexGuard<'_, InflightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until nothing is pending and returns the failures since the previous call.
    fn wait_idle(&self) -> usize {
        let mut state = self.lock();
        while state.pending > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        std::mem::take(&mut state.failed)
    }
}

/// Accounts for one report until its delivery has settled. A ticket dropped without being
/// completed counts as a failure.
struct Ticket {
    inflight: Option<Arc<Inflight>>,
}

impl Ticket {
    fn issue(inflight: Arc<Inflight>) -> Self {
        inflight.lock().pending += 1;
        Self {
            inflight: Some(inflight),
        }
    }

    fn complete(mut self, ok: bool) {
        self.settle(ok);
    }

    fn settle(&mut self, ok: bool) {
        let Some(inflight) = self.inflight.take() else {
            return;
        };

        let mut state = inflight.lock();
        state.pending -= 1;
        if !ok {
            state.failed += 1;
            state.total_failed += 1;
        }
        if state.pending == 0 {
            inflight.idle.notify_all();
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.settle(false);
    }
}
