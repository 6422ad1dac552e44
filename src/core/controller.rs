//! Conversion orchestration: input state, debounced refreshes and derived display strings.
//!
//! A [`ConversionController`] owns the current [`ConversionState`] and publishes every
//! change through a `tokio::sync::watch` channel. Amount edits are debounced, currency
//! changes refresh immediately. Each refresh ("cycle") fetches rates for the selected
//! source currency and recomputes the converted amount and rate description once the
//! fetch completes.
//!
//! Cycles are tagged with a sequence number and the source code they were issued for.
//! A completion is dropped when the source selection has moved on or when a newer
//! cycle has already been applied, so a slow response can never overwrite fresher state.

use super::convert::{self, RATE_NOT_AVAILABLE};
use super::currency::Currency;
use super::rates::{ExchangeRateSnapshot, FetchError, RateFetcher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, instrument, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const INITIAL_CONVERTED_AMOUNT: &str = "0.00";

/// Everything a presentation layer needs to render a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionState {
    /// Raw user input, parsed only when a conversion runs.
    pub amount_text: String,
    pub source: Currency,
    pub target: Currency,
    /// Rates from the last applied successful fetch.
    pub snapshot: Option<ExchangeRateSnapshot>,
    pub converted_amount: String,
    pub rate_description: String,
    /// True while the most recently issued cycle has not completed.
    pub fetching: bool,
    /// Underlying error of the last applied cycle, if it failed.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub amount_text: String,
    pub source: Currency,
    pub target: Currency,
    pub debounce: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            amount_text: "1".to_string(),
            source: Currency::from_code("SGD"),
            target: Currency::from_code("USD"),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl ConversionState {
    fn initial(settings: &ControllerSettings) -> Self {
        Self {
            amount_text: settings.amount_text.clone(),
            source: settings.source.clone(),
            target: settings.target.clone(),
            snapshot: None,
            converted_amount: INITIAL_CONVERTED_AMOUNT.to_string(),
            rate_description: RATE_NOT_AVAILABLE.to_string(),
            fetching: false,
            last_error: None,
        }
    }
}

#[derive(Debug)]
struct CycleTag {
    seq: u64,
    source: String,
}

struct Tasks {
    running: JoinSet<()>,
    debounce: Option<AbortHandle>,
}

struct Inner {
    fetcher: Arc<dyn RateFetcher>,
    debounce: Duration,
    state: watch::Sender<ConversionState>,
    issued: AtomicU64,
    applied: AtomicU64,
    tasks: Mutex<Tasks>,
}

/// Mediates between raw user input and the computed display state.
///
/// Methods that schedule work spawn Tokio tasks and must be called from within a
/// Tokio runtime. Dropping the controller aborts any pending or in-flight work.
pub struct ConversionController {
    inner: Arc<Inner>,
}

impl ConversionController {
    pub fn new(fetcher: Arc<dyn RateFetcher>, settings: ControllerSettings) -> Self {
        let (state, _) = watch::channel(ConversionState::initial(&settings));
        Self {
            inner: Arc::new(Inner {
                fetcher,
                debounce: settings.debounce,
                state,
                issued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                tasks: Mutex::new(Tasks {
                    running: JoinSet::new(),
                    debounce: None,
                }),
            }),
        }
    }

    /// Receiver holding the current state; `changed()` resolves on every later update.
    pub fn subscribe(&self) -> watch::Receiver<ConversionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ConversionState {
        self.inner.state.borrow().clone()
    }

    /// Stores the raw text and refreshes once no further edits arrive for the debounce window.
    pub fn set_amount_text(&self, text: &str) {
        self.inner
            .state
            .send_modify(|state| state.amount_text = text.to_string());
        self.inner.schedule_debounced();
    }

    pub fn set_source_currency(&self, currency: Currency) {
        debug!(from = %currency, "Source currency selected");
        self.inner.state.send_modify(|state| state.source = currency);
        self.inner.spawn_refresh();
    }

    pub fn set_target_currency(&self, currency: Currency) {
        debug!(to = %currency, "Target currency selected");
        self.inner.state.send_modify(|state| state.target = currency);
        self.inner.spawn_refresh();
    }

    pub fn swap_currencies(&self) {
        self.inner.state.send_modify(|state| {
            std::mem::swap(&mut state.source, &mut state.target);
        });
        self.inner.spawn_refresh();
    }

    /// Cancels a pending debounced refresh and runs a cycle right away.
    ///
    /// Returns once the cycle's result has been applied or discarded as stale.
    pub async fn refresh_now(&self) {
        self.inner.cancel_debounce();
        self.inner.run_cycle().await;
    }
}

impl Drop for ConversionController {
    fn drop(&mut self) {
        let mut tasks = self.inner.lock_tasks();
        if let Some(pending) = tasks.debounce.take() {
            pending.abort();
        }
        tasks.running.abort_all();
    }
}

impl Inner {
    fn lock_tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_debounce(&self) {
        if let Some(pending) = self.lock_tasks().debounce.take() {
            debug!("Cancelled pending debounced refresh");
            pending.abort();
        }
    }

    fn schedule_debounced(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let delay = self.debounce;
        let mut tasks = self.lock_tasks();
        while tasks.running.try_join_next().is_some() {}
        if let Some(pending) = tasks.debounce.take() {
            pending.abort();
        }
        let handle = tasks.running.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.spawn_cycle();
        });
        tasks.debounce = Some(handle);
    }

    fn spawn_refresh(self: &Arc<Self>) {
        self.cancel_debounce();
        self.spawn_cycle();
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let mut tasks = self.lock_tasks();
        while tasks.running.try_join_next().is_some() {}
        tasks.running.spawn(async move { inner.run_cycle().await });
    }

    fn begin_cycle(&self) -> CycleTag {
        let mut tag = CycleTag {
            seq: 0,
            source: String::new(),
        };
        self.state.send_modify(|state| {
            tag.seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            tag.source = state.source.code.clone();
            state.fetching = true;
        });
        tag
    }

    #[instrument(name = "ConversionCycle", skip(self))]
    async fn run_cycle(&self) {
        let tag = self.begin_cycle();
        debug!(seq = tag.seq, source = %tag.source, "Fetching exchange rates");
        let result = self.fetcher.fetch_rates(&tag.source).await;
        self.apply(tag, result);
    }

    fn apply(&self, tag: CycleTag, result: Result<ExchangeRateSnapshot, FetchError>) {
        self.state.send_if_modified(|state| {
            if state.source.code != tag.source {
                debug!(
                    seq = tag.seq,
                    issued_for = %tag.source,
                    current = %state.source,
                    "Discarding rates for a previous source currency"
                );
                return false;
            }
            if tag.seq < self.applied.load(Ordering::SeqCst) {
                debug!(seq = tag.seq, "Discarding rates older than the applied ones");
                return false;
            }

            self.applied.store(tag.seq, Ordering::SeqCst);
            state.fetching = tag.seq < self.issued.load(Ordering::SeqCst);

            match result {
                Ok(snapshot) => {
                    let source = state.source.code.as_str();
                    let target = state.target.code.as_str();
                    state.converted_amount =
                        convert::convert(&state.amount_text, source, target, &snapshot);
                    state.rate_description = convert::describe_rate(source, target, &snapshot);
                    debug!(
                        converted = %state.converted_amount,
                        rate = %state.rate_description,
                        "Applied exchange rates"
                    );
                    state.snapshot = Some(snapshot);
                    state.last_error = None;
                }
                Err(err) => {
                    warn!(error = %err, "Failed to fetch exchange rates");
                    state.converted_amount = FetchError::USER_MESSAGE.to_string();
                    state.last_error = Some(err.to_string());
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicBool;
    use tokio::time::sleep;

    #[derive(Default)]
    struct FakeFetcher {
        rates: Mutex<HashMap<String, HashMap<String, f64>>>,
        delays: Mutex<VecDeque<Duration>>,
        failing: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_rates(base: &str, rates: &[(&str, f64)]) -> Arc<Self> {
            let fake = Arc::new(Self::default());
            fake.set_rates(base, rates);
            fake
        }

        fn set_rates(&self, base: &str, rates: &[(&str, f64)]) {
            self.rates.lock().unwrap().insert(
                base.to_string(),
                rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
            );
        }

        fn push_delay(&self, delay: Duration) {
            self.delays.lock().unwrap().push_back(delay);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RateFetcher for FakeFetcher {
        async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateSnapshot, FetchError> {
            self.calls.lock().unwrap().push(base.to_string());
            let rates = self.rates.lock().unwrap().get(base).cloned();
            let failing = self.failing.load(Ordering::SeqCst);
            let delay = self.delays.lock().unwrap().pop_front();
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            match (failing, rates) {
                (false, Some(rates)) => Ok(ExchangeRateSnapshot::new(base, rates)),
                _ => Err(FetchError::Decode {
                    code: base.to_string(),
                    reason: "missing field `rates`".to_string(),
                }),
            }
        }
    }

    fn settings(amount: &str, source: &str, target: &str) -> ControllerSettings {
        ControllerSettings {
            amount_text: amount.to_string(),
            source: Currency::from_code(source),
            target: Currency::from_code(target),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    fn controller(fake: &Arc<FakeFetcher>, settings: ControllerSettings) -> ConversionController {
        ConversionController::new(Arc::clone(fake) as Arc<dyn RateFetcher>, settings)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let fake = Arc::new(FakeFetcher::default());
        let controller = controller(&fake, ControllerSettings::default());

        let state = controller.state();
        assert_eq!(state.amount_text, "1");
        assert_eq!(state.source.code, "SGD");
        assert_eq!(state.target.code, "USD");
        assert_eq!(state.converted_amount, "0.00");
        assert_eq!(state.rate_description, "Exchange rate: Not available");
        assert!(state.snapshot.is_none());
        assert!(!state.fetching);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_now_applies_rates() {
        let fake = FakeFetcher::with_rates("USD", &[("USD", 1.2), ("EUR", 1.5)]);
        let controller = controller(&fake, settings("200", "USD", "EUR"));

        controller.refresh_now().await;

        let state = controller.state();
        assert_eq!(state.converted_amount, "300.00");
        assert_eq!(state.rate_description, "1 USD to EUR: 1.5");
        assert_eq!(state.snapshot.as_ref().map(|s| s.base.as_str()), Some("USD"));
        assert!(!state.fetching);
        assert!(state.last_error.is_none());
        assert_eq!(fake.calls(), vec!["USD"]);
    }

    #[tokio::test]
    async fn test_missing_target_rate() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.5)]);
        let controller = controller(&fake, settings("10", "USD", "CNY"));

        controller.refresh_now().await;

        let state = controller.state();
        assert_eq!(state.converted_amount, "Invalid input");
        assert_eq!(state.rate_description, "Exchange rate: Not available");
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_description() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.5)]);
        let controller = controller(&fake, settings("100", "USD", "EUR"));
        controller.refresh_now().await;
        assert_eq!(controller.state().rate_description, "1 USD to EUR: 1.5");

        fake.failing.store(true, Ordering::SeqCst);
        controller.refresh_now().await;

        let state = controller.state();
        assert_eq!(state.converted_amount, "Failed to fetch exchange rates");
        assert_eq!(state.rate_description, "1 USD to EUR: 1.5");
        assert!(state.snapshot.is_some());
        assert!(state.last_error.as_deref().unwrap().contains("USD"));
    }

    #[tokio::test]
    async fn test_fetch_failure_from_initial_state() {
        let fake = Arc::new(FakeFetcher::default());
        let controller = controller(&fake, ControllerSettings::default());

        controller.refresh_now().await;

        let state = controller.state();
        assert_eq!(state.converted_amount, "Failed to fetch exchange rates");
        assert_eq!(state.rate_description, "Exchange rate: Not available");
        assert!(state.snapshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_trigger_single_refresh() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 2.0)]);
        let controller = controller(&fake, settings("1", "USD", "EUR"));

        controller.set_amount_text("1");
        sleep(Duration::from_millis(100)).await;
        controller.set_amount_text("12");
        sleep(Duration::from_millis(400)).await;
        controller.set_amount_text("125");
        sleep(Duration::from_millis(499)).await;
        assert!(fake.calls().is_empty());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fake.calls(), vec!["USD"]);
        assert_eq!(controller.state().converted_amount, "250.00");
        assert_eq!(controller.state().amount_text, "125");
    }

    #[tokio::test(start_paused = true)]
    async fn test_currency_change_refreshes_immediately() {
        let fake = FakeFetcher::with_rates("USD", &[("GBP", 0.8)]);
        let controller = controller(&fake, settings("10", "USD", "EUR"));

        controller.set_target_currency(Currency::from_code("GBP"));
        sleep(Duration::from_millis(1)).await;

        assert_eq!(fake.calls(), vec!["USD"]);
        let state = controller.state();
        assert_eq!(state.target.code, "GBP");
        assert_eq!(state.converted_amount, "8.00");
        assert_eq!(state.rate_description, "1 USD to GBP: 0.8");
    }

    #[tokio::test(start_paused = true)]
    async fn test_currency_change_cancels_pending_debounce() {
        let fake = FakeFetcher::with_rates("EUR", &[("USD", 1.1)]);
        let controller = controller(&fake, settings("1", "USD", "USD"));

        controller.set_amount_text("50");
        controller.set_source_currency(Currency::from_code("EUR"));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fake.calls(), vec!["EUR"]);
        assert_eq!(controller.state().converted_amount, "55.00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_cancels_pending_debounce() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.0)]);
        let controller = controller(&fake, settings("1", "USD", "EUR"));

        controller.set_amount_text("7");
        controller.refresh_now().await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fake.calls(), vec!["USD"]);
        assert_eq!(controller.state().converted_amount, "7.00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_for_previous_source_is_discarded() {
        let fake = FakeFetcher::with_rates("USD", &[("JPY", 150.0)]);
        fake.set_rates("EUR", &[("JPY", 160.0)]);
        fake.push_delay(Duration::from_millis(300));
        fake.push_delay(Duration::from_millis(10));
        let controller = controller(&fake, settings("1", "GBP", "JPY"));

        controller.set_source_currency(Currency::from_code("USD"));
        sleep(Duration::from_millis(1)).await;
        controller.set_source_currency(Currency::from_code("EUR"));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.state().rate_description, "1 EUR to JPY: 160.0");

        // The slow USD response lands now and must not overwrite EUR state.
        sleep(Duration::from_millis(500)).await;
        let state = controller.state();
        assert_eq!(fake.calls(), vec!["USD", "EUR"]);
        assert_eq!(state.source.code, "EUR");
        assert_eq!(state.snapshot.as_ref().unwrap().base, "EUR");
        assert_eq!(state.converted_amount, "160.00");
        assert_eq!(state.rate_description, "1 EUR to JPY: 160.0");
        assert!(!state.fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_response_for_same_source_is_discarded() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.0)]);
        fake.push_delay(Duration::from_millis(300));
        fake.push_delay(Duration::from_millis(10));
        let controller = controller(&fake, settings("3", "USD", "EUR"));

        controller.set_target_currency(Currency::from_code("EUR"));
        sleep(Duration::from_millis(1)).await;
        fake.set_rates("USD", &[("EUR", 2.0)]);
        controller.set_target_currency(Currency::from_code("EUR"));

        sleep(Duration::from_secs(1)).await;
        let state = controller.state();
        assert_eq!(fake.calls().len(), 2);
        assert_eq!(state.converted_amount, "6.00");
        assert_eq!(state.rate_description, "1 USD to EUR: 2.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetching_flag_tracks_in_flight_cycle() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.0)]);
        fake.push_delay(Duration::from_millis(100));
        let controller = controller(&fake, settings("1", "USD", "EUR"));

        controller.set_target_currency(Currency::from_code("EUR"));
        sleep(Duration::from_millis(1)).await;
        assert!(controller.state().fetching);

        sleep(Duration::from_millis(200)).await;
        assert!(!controller.state().fetching);
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let fake = FakeFetcher::with_rates("SGD", &[("USD", 0.75)]);
        let controller = controller(&fake, ControllerSettings::default());
        let mut rx = controller.subscribe();
        assert_eq!(rx.borrow_and_update().converted_amount, "0.00");

        controller.refresh_now().await;

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.converted_amount, "0.75");
        assert_eq!(state.rate_description, "1 SGD to USD: 0.75");
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_currencies() {
        let fake = FakeFetcher::with_rates("USD", &[("SGD", 1.35)]);
        let controller = controller(&fake, settings("2", "SGD", "USD"));

        controller.swap_currencies();
        sleep(Duration::from_millis(1)).await;

        let state = controller.state();
        assert_eq!(state.source.code, "USD");
        assert_eq!(state.target.code, "SGD");
        assert_eq!(state.converted_amount, "2.70");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_refresh() {
        let fake = FakeFetcher::with_rates("USD", &[("EUR", 1.0)]);
        let controller = controller(&fake, settings("1", "USD", "EUR"));

        controller.set_amount_text("9");
        drop(controller);
        sleep(Duration::from_secs(2)).await;

        assert!(fake.calls().is_empty());
    }
}
