use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::sink::SampleSink;
use super::wait_time::WaitTime;
use crate::fetcher::{Fetcher, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("poller already running")]
    AlreadyRunning,
    #[error("poller has been stopped")]
    Stopped,
}

#[derive(Debug)]
struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Periodically fetches the current position and hands it to a sink.
///
/// The first tick runs as soon as the poller starts, the following ones
/// every `wait_time`. Stopping lets an in-flight tick finish; a stopped
/// poller cannot be started again.
pub struct Poller<T, S> {
    fetcher: Arc<Fetcher<T>>,
    sink: Arc<S>,
    wait_time: WaitTime,
    state: Arc<StdMutex<PollerState>>,
    worker: Option<WorkerHandle>,
}

impl<T, S> Poller<T, S>
where
    T: Transport + 'static,
    S: SampleSink + Send + Sync + 'static,
{
    pub fn new(fetcher: Fetcher<T>, sink: Arc<S>, wait_time: WaitTime) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink,
            wait_time,
            state: Arc::new(StdMutex::new(PollerState::Idle)),
            worker: None,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock().unwrap()
    }

    pub fn start(&mut self) -> Result<(), PollerError> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                PollerState::Idle => *state = PollerState::Running,
                PollerState::Running => return Err(PollerError::AlreadyRunning),
                PollerState::Stopping | PollerState::Stopped => return Err(PollerError::Stopped),
            }
        }

        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_poll_loop(
            self.fetcher.clone(),
            self.sink.clone(),
            self.wait_time,
            cancel.clone(),
        ));
        self.worker = Some(WorkerHandle { cancel, join });

        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            *self.state.lock().unwrap() = PollerState::Stopping;
            worker.cancel.cancel();
            if let Err(e) = worker.join.await {
                log::error!("Poll loop for {} ended abnormally: {}", self.fetcher.url(), e);
            }
        }
        *self.state.lock().unwrap() = PollerState::Stopped;
    }
}

impl<T, S> Drop for Poller<T, S> {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
    }
}

async fn run_poll_loop<T, S>(
    fetcher: Arc<Fetcher<T>>,
    sink: Arc<S>,
    wait_time: WaitTime,
    cancel: CancellationToken,
) where
    T: Transport,
    S: SampleSink + Send + Sync + 'static,
{
    log::info!(
        "Polling {} every {}s",
        fetcher.url(),
        wait_time.as_secs()
    );

    poll_once(&fetcher, &sink).await;

    let period = wait_time.as_duration();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => poll_once(&fetcher, &sink).await,
        }
    }

    log::info!("Stopped polling {}", fetcher.url());
}

async fn poll_once<T, S>(fetcher: &Fetcher<T>, sink: &Arc<S>)
where
    T: Transport,
    S: SampleSink + Send + Sync + 'static,
{
    let Some(sample) = fetcher.fetch().await else {
        return;
    };
    // Sinks may block on disk I/O.
    let sink = sink.clone();
    let stored = tokio::task::spawn_blocking(move || match sink.add_sample(&sample) {
        Ok(()) => log::debug!("Updated position: {:?}", sample),
        Err(e) => log::error!("Failed to store position at {}: {}", sample.timestamp, e),
    })
    .await;
    if let Err(e) = stored {
        log::error!("Storing a position sample failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{position_json, ScriptedTransport};
    use crate::fetcher::FetchError;
    use crate::position::PositionSample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct MemorySink {
        samples: StdMutex<Vec<PositionSample>>,
    }

    impl MemorySink {
        fn len(&self) -> usize {
            self.samples.lock().unwrap().len()
        }
    }

    impl SampleSink for MemorySink {
        type Error = std::convert::Infallible;

        fn add_sample(&self, sample: &PositionSample) -> Result<(), Self::Error> {
            self.samples.lock().unwrap().push(sample.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingSink {
        calls: AtomicUsize,
    }

    impl SampleSink for FailingSink {
        type Error = String;

        fn add_sample(&self, _sample: &PositionSample) -> Result<(), Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("disk full".into())
        }
    }

    /// Takes a while to answer, like a slow upstream.
    struct SlowTransport;

    impl Transport for SlowTransport {
        async fn get_json(&self, _url: &str) -> Result<serde_json::Value, FetchError> {
            sleep(Duration::from_secs(5)).await;
            Ok(position_json(1_699_672_660))
        }
    }

    fn ok() -> Result<serde_json::Value, FetchError> {
        Ok(position_json(1_699_672_660))
    }

    fn refused() -> Result<serde_json::Value, FetchError> {
        Err(FetchError::Transport("connection reset".into()))
    }

    fn wait(secs: i64) -> WaitTime {
        WaitTime::from_secs(secs).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_runs_immediately() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new(), ok));
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(transport.clone(), "http://iss"),
            sink.clone(),
            wait(20),
        );
        assert_eq!(poller.state(), PollerState::Idle);

        poller.start().unwrap();
        assert_eq!(poller.state(), PollerState::Running);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.len(), 1);
        assert_eq!(transport.calls(), 1);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.len(), 2);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.len(), 3);

        poller.stop().await;
        assert_eq!(poller.state(), PollerState::Stopped);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.len(), 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_store_nothing_and_keep_schedule() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new(), refused));
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(transport.clone(), "http://iss"),
            sink.clone(),
            wait(20),
        );

        poller.start().unwrap();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.calls(), 4);
        assert_eq!(sink.len(), 0);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.calls(), 8);
        assert_eq!(sink.len(), 0);
        assert_eq!(poller.state(), PollerState::Running);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_the_tick_after_a_failure() {
        let script = (0..4).map(|_| refused()).collect();
        let transport = Arc::new(ScriptedTransport::new(script, ok));
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(transport.clone(), "http://iss"),
            sink.clone(),
            wait(10),
        );

        poller.start().unwrap();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.len(), 0);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.len(), 1);
        assert_eq!(transport.calls(), 5);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sink_errors_do_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new(), ok));
        let sink = Arc::new(FailingSink::default());
        let mut poller = Poller::new(
            Fetcher::new(transport.clone(), "http://iss"),
            sink.clone(),
            wait(1),
        );

        poller.start().unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.state(), PollerState::Running);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_the_current_tick_finish() {
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(SlowTransport, "http://iss"),
            sink.clone(),
            wait(20),
        );

        poller.start().unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.len(), 0);

        poller.stop().await;
        assert_eq!(sink.len(), 1);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    /// Blocks inside `add_sample` until the test opens the gate.
    struct GatedSink {
        gate: StdMutex<std::sync::mpsc::Receiver<()>>,
        released: std::sync::atomic::AtomicBool,
    }

    impl SampleSink for GatedSink {
        type Error = std::convert::Infallible;

        fn add_sample(&self, _sample: &PositionSample) -> Result<(), Self::Error> {
            let opened = self
                .gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .is_ok();
            self.released.store(opened, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn blocking_sink_does_not_stall_the_runtime() {
        let (open, gate) = std::sync::mpsc::channel();
        let sink = Arc::new(GatedSink {
            gate: StdMutex::new(gate),
            released: Default::default(),
        });
        let mut poller = Poller::new(
            Fetcher::new(ScriptedTransport::new(Vec::new(), ok), "http://iss"),
            sink.clone(),
            wait(20),
        );

        poller.start().unwrap();
        sleep(Duration::from_millis(50)).await;
        open.send(()).unwrap();
        poller.stop().await;

        assert!(sink.released.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_transitions_are_enforced() {
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(ScriptedTransport::new(Vec::new(), ok), "http://iss"),
            sink.clone(),
            wait(20),
        );

        poller.start().unwrap();
        assert!(matches!(poller.start(), Err(PollerError::AlreadyRunning)));

        poller.stop().await;
        assert!(matches!(poller.start(), Err(PollerError::Stopped)));
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test]
    async fn stopping_an_idle_poller_is_terminal() {
        let sink = Arc::new(MemorySink::default());
        let mut poller = Poller::new(
            Fetcher::new(ScriptedTransport::new(Vec::new(), ok), "http://iss"),
            sink.clone(),
            WaitTime::default(),
        );

        poller.stop().await;
        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(poller.start().is_err());
        assert_eq!(sink.len(), 0);
    }
}
