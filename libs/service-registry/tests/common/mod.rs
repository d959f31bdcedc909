#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use service_registry::{Connector, DialError, RegistryError};

/// Connection handed out by [`CountingConnector`]: `"<address>#<dial number>"`.
pub type FakeConn = Arc<String>;

/// Connector that counts dials and closes, optionally slowing each dial down.
#[derive(Default)]
pub struct CountingConnector {
    dials: AtomicUsize,
    closes: AtomicUsize,
    delay: Duration,
    fail: bool,
    dialed: Mutex<Vec<String>>,
}

impl CountingConnector {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn dialed_addresses(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for CountingConnector {
    type Connection = FakeConn;

    async fn connect(&self, service: &str, address: &str) -> Result<FakeConn, RegistryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(RegistryError::DialFailed {
                service: service.to_owned(),
                source: DialError::DeadlineExceeded {
                    address: address.to_owned(),
                    deadline: self.delay,
                    last_error: Some("connection refused".to_owned()),
                },
            });
        }
        self.dialed.lock().unwrap().push(address.to_owned());
        let n = self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(format!("{address}#{n}")))
    }

    fn close(&self, _conn: FakeConn) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shares one connector between a registry and the test body.
pub struct SharedConnector(pub Arc<CountingConnector>);

#[async_trait]
impl Connector for SharedConnector {
    type Connection = FakeConn;

    async fn connect(&self, service: &str, address: &str) -> Result<FakeConn, RegistryError> {
        self.0.connect(service, address).await
    }

    fn close(&self, conn: FakeConn) -> anyhow::Result<()> {
        self.0.close(conn)
    }
}

/// Run `f` under a subscriber that records WARN messages.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct WarningCapture {
        warnings: Arc<Mutex<Vec<String>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut visitor = MessageVisitor(String::new());
                event.record(&mut visitor);
                self.warnings.lock().unwrap().push(visitor.0);
            }
        }
    }

    struct MessageVisitor(String);
    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    let capture = WarningCapture::default();
    let warnings = capture.warnings.clone();
    let subscriber = tracing_subscriber::registry().with(capture);
    let out = tracing::subscriber::with_default(subscriber, f);
    let captured = warnings.lock().unwrap().clone();
    (out, captured)
}
