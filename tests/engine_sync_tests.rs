mod common;

use common::{collecting_hooks, detail_body, list_body, CaseData, CaseScraper};
use docketeer::interceptors::{CannedResponse, MockInterceptor};
use docketeer::{
    BlockingInterceptor, Error, Hooks, Request, RequestFlow, RunStatus, Scraper, StepFn,
    SyncEngine, TransientError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const BASE: &str = "https://bugcourt.example";

fn mock_site(ids: &[&str]) -> MockInterceptor {
    let mut mock = MockInterceptor::new()
        .with_response(format!("{BASE}/cases"), CannedResponse::ok(list_body(ids)));
    for id in ids {
        mock = mock.with_response(
            format!("{BASE}/cases/{id}"),
            CannedResponse::ok(detail_body(id)),
        );
    }
    mock
}

#[test]
fn two_level_navigation_emits_each_case_once() {
    common::init_tracing();
    let ids = ["BCC-2024-001", "BCC-2024-002", "BCC-2024-003"];
    let mock = Arc::new(mock_site(&ids));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(Mutex::new(Vec::new()));

    let completions_sink = Arc::clone(&completions);
    let hooks = collecting_hooks(&seen).on_run_complete(move |name, status, error| {
        assert!(error.is_none());
        completions_sink
            .lock()
            .unwrap()
            .push((name.to_string(), status));
    });

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(Arc::clone(&mock) as Arc<dyn BlockingInterceptor>)
        .with_hooks(hooks);
    engine.run().unwrap();

    let collected: Vec<String> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
    assert_eq!(collected, ids);
    assert_eq!(
        completions.lock().unwrap().as_slice(),
        [("bug_court".to_string(), RunStatus::Completed)]
    );
    // 1 list + 3 details, all served from the mock
    assert_eq!(mock.hits(), 4);
    assert_eq!(mock.misses(), 0);
}

#[test]
fn lifecycle_hooks_fire_once_even_on_error() {
    // The list page asks for a continuation the scraper does not provide
    struct BrokenScraper;
    impl Scraper for BrokenScraper {
        type Output = CaseData;
        fn name(&self) -> &str {
            "broken"
        }
        fn entry(&self) -> Result<Request, Error> {
            Ok(Request::navigating(format!("{BASE}/cases"), "no_such_step"))
        }
        fn continuation(&self, name: &str) -> Result<StepFn<CaseData>, Error> {
            Err(Error::scraper(format!("unknown continuation: {name}")))
        }
    }

    let starts = Arc::new(AtomicUsize::new(0));
    let completes = Arc::new(AtomicUsize::new(0));
    let starts_sink = Arc::clone(&starts);
    let completes_sink = Arc::clone(&completes);

    let hooks: Hooks<CaseData> = Hooks::new()
        .on_run_start(move |_| {
            starts_sink.fetch_add(1, Ordering::SeqCst);
        })
        .on_run_complete(move |_, status, error| {
            assert_eq!(status, RunStatus::Errored);
            assert!(error.is_some());
            completes_sink.fetch_add(1, Ordering::SeqCst);
        });

    let mock = Arc::new(
        MockInterceptor::new()
            .with_response(format!("{BASE}/cases"), CannedResponse::ok(list_body(&[]))),
    );
    let engine = SyncEngine::new(BrokenScraper)
        .unwrap()
        .with_interceptor(mock)
        .with_hooks(hooks);

    assert!(engine.run().is_err());
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(completes.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_check_drops_second_enqueue_of_equal_request() {
    // The list names the same case twice; the second enqueue must be dropped
    let mock = Arc::new(
        MockInterceptor::new()
            .with_response(
                format!("{BASE}/cases"),
                CannedResponse::ok(list_body(&["BCC-2024-001", "BCC-2024-001"])),
            )
            .with_response(
                format!("{BASE}/cases/BCC-2024-001"),
                CannedResponse::ok(detail_body("BCC-2024-001")),
            ),
    );

    let seen_keys = Arc::new(Mutex::new(HashSet::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let keys_sink = Arc::clone(&seen_keys);
    let hooks = collecting_hooks(&seen)
        .duplicate_check(move |key| keys_sink.lock().unwrap().insert(key.to_string()));

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(Arc::clone(&mock) as Arc<dyn BlockingInterceptor>)
        .with_hooks(hooks);
    engine.run().unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
    // 1 list fetch + 1 detail fetch; the duplicate never reached the chain
    assert_eq!(mock.hits(), 2);
}

#[test]
fn structural_error_with_recovering_callback_processes_siblings() {
    // First detail page is malformed (no 'id'); the rest are fine
    let mock = Arc::new(
        MockInterceptor::new()
            .with_response(
                format!("{BASE}/cases"),
                CannedResponse::ok(list_body(&["bad", "BCC-2024-002", "BCC-2024-003"])),
            )
            .with_response(
                format!("{BASE}/cases/bad"),
                CannedResponse::ok(r#"{"name": "missing id"}"#),
            )
            .with_response(
                format!("{BASE}/cases/BCC-2024-002"),
                CannedResponse::ok(detail_body("BCC-2024-002")),
            )
            .with_response(
                format!("{BASE}/cases/BCC-2024-003"),
                CannedResponse::ok(detail_body("BCC-2024-003")),
            ),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_sink = Arc::clone(&errors);
    let hooks = collecting_hooks(&seen).on_structural_error(move |_| {
        errors_sink.fetch_add(1, Ordering::SeqCst);
        true
    });

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(Arc::clone(&mock) as Arc<dyn BlockingInterceptor>)
        .with_hooks(hooks);
    engine.run().unwrap();

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    let collected: Vec<String> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
    assert_eq!(collected, ["BCC-2024-002", "BCC-2024-003"]);
}

#[test]
fn structural_error_with_declining_callback_stops_the_worker() {
    let mock = Arc::new(
        MockInterceptor::new()
            .with_response(
                format!("{BASE}/cases"),
                CannedResponse::ok(list_body(&["bad", "BCC-2024-002"])),
            )
            .with_response(
                format!("{BASE}/cases/bad"),
                CannedResponse::ok(r#"{"name": "missing id"}"#),
            )
            .with_response(
                format!("{BASE}/cases/BCC-2024-002"),
                CannedResponse::ok(detail_body("BCC-2024-002")),
            ),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let hooks = collecting_hooks(&seen).on_structural_error(|_| false);

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(Arc::clone(&mock) as Arc<dyn BlockingInterceptor>)
        .with_hooks(hooks);
    // The worker stops without surfacing an error
    engine.run().unwrap();
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn structural_error_without_callback_propagates() {
    let mock = Arc::new(
        MockInterceptor::new()
            .with_response(format!("{BASE}/cases"), CannedResponse::ok(list_body(&["bad"])))
            .with_response(
                format!("{BASE}/cases/bad"),
                CannedResponse::ok(r#"{"name": "missing id"}"#),
            ),
    );

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(mock as Arc<dyn BlockingInterceptor>);
    let err = engine.run().unwrap_err();
    assert!(matches!(err, Error::Assumption(_)));
}

/// Fails a specific URL with a timeout, once.
struct TimeoutOnce {
    url: String,
    fired: AtomicUsize,
}

impl BlockingInterceptor for TimeoutOnce {
    fn modify_request(&self, request: Arc<Request>) -> Result<RequestFlow, Error> {
        if request.http.url == self.url && self.fired.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(TransientError::Timeout {
                url: self.url.clone(),
                timeout_secs: 30.0,
            }
            .into());
        }
        Ok(RequestFlow::Forward(request))
    }
}

#[test]
fn transient_error_with_recovering_callback_continues() {
    let ids = ["BCC-2024-001", "BCC-2024-002"];
    let mock = Arc::new(mock_site(&ids));
    let failing = Arc::new(TimeoutOnce {
        url: format!("{BASE}/cases/BCC-2024-001"),
        fired: AtomicUsize::new(0),
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let transients = Arc::new(AtomicUsize::new(0));
    let transients_sink = Arc::clone(&transients);
    let hooks = collecting_hooks(&seen).on_transient_error(move |error| {
        assert!(matches!(error, TransientError::Timeout { .. }));
        transients_sink.fetch_add(1, Ordering::SeqCst);
        true
    });

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(failing)
        .with_interceptor(mock as Arc<dyn BlockingInterceptor>)
        .with_hooks(hooks);
    engine.run().unwrap();

    assert_eq!(transients.load(Ordering::SeqCst), 1);
    // The failed request is consumed, not retried; its sibling still lands
    let collected: Vec<String> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
    assert_eq!(collected, ["BCC-2024-002"]);
}

#[test]
fn transient_error_without_callback_propagates() {
    let mock = Arc::new(mock_site(&["BCC-2024-001"]));
    let failing = Arc::new(TimeoutOnce {
        url: format!("{BASE}/cases/BCC-2024-001"),
        fired: AtomicUsize::new(0),
    });

    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(failing)
        .with_interceptor(mock as Arc<dyn BlockingInterceptor>);
    let err = engine.run().unwrap_err();
    assert!(matches!(err, Error::Transient(_)));
}

#[test]
fn pre_triggered_stop_signal_completes_without_fetching() {
    let mock = Arc::new(mock_site(&["BCC-2024-001"]));
    let stop = docketeer::StopSignal::new();
    stop.trigger();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = SyncEngine::new(CaseScraper::new(BASE))
        .unwrap()
        .with_interceptor(Arc::clone(&mock) as Arc<dyn BlockingInterceptor>)
        .with_hooks(collecting_hooks(&seen))
        .with_stop_signal(stop);
    engine.run().unwrap();

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(mock.hits() + mock.misses(), 0);
}
