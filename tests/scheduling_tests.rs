mod common;

use common::{collecting_hooks, detail_body, list_body, CaseData};
use docketeer::interceptors::{CannedResponse, MockInterceptor};
use docketeer::{
    BlockingInterceptor, Error, Request, Scraper, StepContext, StepFn, StepMetadata, SyncEngine,
    Yield,
};
use std::sync::{Arc, Mutex};

const BASE: &str = "https://bugcourt.example";

fn detail_step(
    ctx: StepContext,
) -> Box<dyn Iterator<Item = Result<Yield<CaseData>, Error>> + Send> {
    let item = ctx.json_content().map(|value| {
        Yield::data(CaseData {
            id: value["id"].as_str().unwrap_or_default().to_string(),
        })
    });
    Box::new(std::iter::once(item))
}

/// Yields three details: A (default priority), B (priority 1), C (default).
struct PriorityScraper;

impl Scraper for PriorityScraper {
    type Output = CaseData;

    fn name(&self) -> &str {
        "priority_court"
    }

    fn entry(&self) -> Result<Request, Error> {
        Ok(Request::navigating(format!("{BASE}/cases"), "parse_list"))
    }

    fn continuation(&self, name: &str) -> Result<StepFn<CaseData>, Error> {
        match name {
            "parse_list" => Ok(Box::new(|_ctx| {
                let yields = vec![
                    Ok(Yield::request(Request::navigating("/cases/A", "parse_detail"))),
                    Ok(Yield::request(
                        Request::navigating("/cases/B", "parse_detail").with_priority(1),
                    )),
                    Ok(Yield::request(Request::navigating("/cases/C", "parse_detail"))),
                ];
                Box::new(yields.into_iter()) as docketeer::YieldStream<CaseData>
            })),
            "parse_detail" => Ok(Box::new(detail_step)),
            other => Err(Error::scraper(format!("unknown continuation: {other}"))),
        }
    }
}

fn mock_details(ids: &[&str]) -> MockInterceptor {
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
fn lower_priority_value_pops_first_fifo_within_equal() {
    let mock = Arc::new(mock_details(&["A", "B", "C"]));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let engine = SyncEngine::new(PriorityScraper)
        .unwrap()
        .with_interceptor(mock as Arc<dyn BlockingInterceptor>)
        .with_hooks(collecting_hooks(&seen));
    engine.run().unwrap();

    let order: Vec<String> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
    // B preempts; A and C keep insertion order
    assert_eq!(order, ["B", "A", "C"]);
}

/// Requests targeting `parse_urgent` inherit its declared priority when the
/// yielded request kept the default.
struct MetadataScraper;

impl Scraper for MetadataScraper {
    type Output = CaseData;

    fn name(&self) -> &str {
        "metadata_court"
    }

    fn entry(&self) -> Result<Request, Error> {
        Ok(Request::navigating(format!("{BASE}/cases"), "parse_list"))
    }

    fn continuation(&self, name: &str) -> Result<StepFn<CaseData>, Error> {
        match name {
            "parse_list" => Ok(Box::new(|_ctx| {
                let yields = vec![
                    Ok(Yield::request(Request::navigating("/cases/slow", "parse_detail"))),
                    Ok(Yield::request(Request::navigating("/cases/urgent", "parse_urgent"))),
                ];
                Box::new(yields.into_iter()) as docketeer::YieldStream<CaseData>
            })),
            "parse_detail" | "parse_urgent" => Ok(Box::new(detail_step)),
            other => Err(Error::scraper(format!("unknown continuation: {other}"))),
        }
    }

    fn step_metadata(&self, name: &str) -> Option<StepMetadata> {
        (name == "parse_urgent").then(|| StepMetadata::with_priority(2))
    }
}

#[test]
fn default_priority_requests_inherit_target_step_priority() {
    let mock = Arc::new(mock_details(&["slow", "urgent"]));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let engine = SyncEngine::new(MetadataScraper)
        .unwrap()
        .with_interceptor(mock as Arc<dyn BlockingInterceptor>)
        .with_hooks(collecting_hooks(&seen));
    engine.run().unwrap();

    let order: Vec<String> = seen.lock().unwrap().iter().map(|c| c.id.clone()).collect();
    // "urgent" was yielded second but inherits priority 2 from its step
    assert_eq!(order, ["urgent", "slow"]);
}
