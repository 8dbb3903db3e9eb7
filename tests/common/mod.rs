//! Shared fixtures: a small court-site scraper and collection helpers.

use docketeer::{
    validate_with_serde, Error, FieldError, Hooks, Request, Scraper, StepContext, StepFn,
    Validate, Yield,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// The consumer model the fixture scraper emits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseData {
    pub id: String,
}

impl Validate for CaseData {
    const MODEL_NAME: &'static str = "CaseData";

    fn validate(raw: serde_json::Value) -> Result<Self, Vec<FieldError>> {
        validate_with_serde(raw)
    }
}

/// Two-level scraper: the case list yields one navigating request per case,
/// each detail page yields one data record.
///
/// Expected bodies:
/// - `{base}/cases` → `{"cases": ["BCC-2024-001", ...]}`
/// - `{base}/cases/<id>` → `{"id": "<id>"}` (non-200 details are skipped)
pub struct CaseScraper {
    pub base: String,
}

impl CaseScraper {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    fn parse_list(
        ctx: StepContext,
    ) -> Box<dyn Iterator<Item = Result<Yield<CaseData>, Error>> + Send> {
        let items: Vec<Result<Yield<CaseData>, Error>> = match ctx.json_content() {
            Ok(value) => match value["cases"].as_array() {
                Some(cases) => cases
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|id| {
                        Ok(Yield::request(Request::navigating(
                            format!("/cases/{id}"),
                            "parse_detail",
                        )))
                    })
                    .collect(),
                None => vec![Err(docketeer::AssumptionError::structural(
                    "case list is missing the 'cases' array",
                    ctx.response().url.clone(),
                )
                .into())],
            },
            Err(err) => vec![Err(err)],
        };
        Box::new(items.into_iter())
    }

    fn parse_detail(
        ctx: StepContext,
    ) -> Box<dyn Iterator<Item = Result<Yield<CaseData>, Error>> + Send> {
        if ctx.response().status_code != 200 {
            return Box::new(std::iter::empty());
        }
        let item = ctx.json_content().and_then(|value| {
            value["id"].as_str().map_or_else(
                || {
                    Err(docketeer::AssumptionError::structural(
                        "detail page is missing 'id'",
                        ctx.response().url.clone(),
                    )
                    .into())
                },
                |id| Ok(Yield::data(CaseData { id: id.to_string() })),
            )
        });
        Box::new(std::iter::once(item))
    }
}

impl Scraper for CaseScraper {
    type Output = CaseData;

    fn name(&self) -> &str {
        "bug_court"
    }

    fn entry(&self) -> Result<Request, Error> {
        Ok(Request::navigating(
            format!("{}/cases", self.base),
            "parse_list",
        ))
    }

    fn continuation(&self, name: &str) -> Result<StepFn<CaseData>, Error> {
        match name {
            "parse_list" => Ok(Box::new(Self::parse_list)),
            "parse_detail" => Ok(Box::new(Self::parse_detail)),
            other => Err(Error::scraper(format!("unknown continuation: {other}"))),
        }
    }
}

/// Install a test subscriber once per binary; filter with `RUST_LOG`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A hook bundle that collects every data item into the given vector.
pub fn collecting_hooks(seen: &Arc<Mutex<Vec<CaseData>>>) -> Hooks<CaseData> {
    let sink = Arc::clone(seen);
    Hooks::new().on_data(move |case| sink.lock().unwrap().push(case))
}

/// JSON body for a case list page.
pub fn list_body(ids: &[&str]) -> String {
    serde_json::json!({ "cases": ids }).to_string()
}

/// JSON body for a case detail page.
pub fn detail_body(id: &str) -> String {
    serde_json::json!({ "id": id }).to_string()
}
