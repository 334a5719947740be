//! End-to-end runs of the alarm controller.
//!
//! Every backend is a `ScriptedBackend`, so no database is needed. The
//! OverDrive Marketplace is either a stub or a wiremock server driving the
//! real scraper.

use std::io;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use warehouse_alarms::{
    alarms::{AlarmSink, MemorySink, TracingSink, CHECK_NAMES},
    backend::{mock::count_rows, ScriptedBackend},
    context::RunContext,
    controller::{AlarmController, Backends, Collaborators, FailurePolicy},
    services::{
        CheckoutCountSource, MarketplaceScraper, ScrapeError, StaticSiteCache, StubCheckoutSource,
    },
};

// ---- Helpers ----------------------------------------------------------------

struct Run {
    sierra: Arc<ScriptedBackend>,
    redshift: Arc<ScriptedBackend>,
    envisionware: Arc<ScriptedBackend>,
    sink: Arc<MemorySink>,
}

impl Run {
    fn new(redshift: ScriptedBackend) -> Self {
        Self {
            sierra: Arc::new(ScriptedBackend::new("Sierra")),
            redshift: Arc::new(redshift),
            envisionware: Arc::new(ScriptedBackend::new("Envisionware")),
            sink: Arc::new(MemorySink::new()),
        }
    }

    fn controller(
        &self,
        run_date: NaiveDate,
        checkouts: Arc<dyn CheckoutCountSource>,
    ) -> AlarmController {
        let collaborators = Collaborators {
            backends: Backends {
                sierra: self.sierra.clone(),
                redshift: self.redshift.clone(),
                envisionware: self.envisionware.clone(),
            },
            sites: Arc::new(StaticSiteCache::new(["site-a", "site-b"])),
            checkouts,
            sink: self.sink.clone(),
        };
        AlarmController::new(
            Arc::new(RunContext::from_environment(run_date, "qa", "qa")),
            collaborators,
            false,
        )
    }

    fn all_closed(&self) -> bool {
        !self.sierra.is_connected()
            && !self.redshift.is_connected()
            && !self.envisionware.is_connected()
    }
}

fn thursday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
}

fn login_failure() -> Arc<dyn CheckoutCountSource> {
    Arc::new(StubCheckoutSource::failing(ScrapeError::LoginFailed))
}

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Buffer {
    type Writer = Buffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ---- Run policies -----------------------------------------------------------

#[tokio::test]
async fn failing_checks_are_isolated() {
    // Nothing is scripted, so every check that reaches a database fails.
    let run = Run::new(ScriptedBackend::new("Redshift"));
    let controller = run.controller(thursday(), login_failure());

    let report = controller.run_all_checks().await;

    assert_eq!(report.checks_run, CHECK_NAMES.to_vec());
    assert_eq!(
        report.failed_checks(),
        vec![
            "circ_trans",
            "holds",
            "pc_reserve",
            "itype_codes",
            "location_codes",
            "stat_group_codes",
            "daily_location_visits",
            "branch_codes_map",
            "location_hours",
            "location_closures",
            "ezproxy",
        ]
    );
    assert!(report.failures[0].error.contains("no scripted response"));

    // The OverDrive check still ran after earlier failures and downgraded
    // the scrape error to an alarm.
    assert_eq!(
        run.sink.messages(),
        vec!["Failed to scrape OverDrive Marketplace: OverDrive Marketplace login failed"]
    );
    assert!(run.all_closed());
}

#[tokio::test]
async fn fail_fast_skips_everything_after_the_first_failure() {
    let run = Run::new(ScriptedBackend::new("Redshift"));
    let controller = run
        .controller(thursday(), login_failure())
        .with_policy(FailurePolicy::FailFast);

    let report = controller.run_all_checks().await;

    assert!(!report.is_success());
    assert_eq!(report.checks_run, vec!["circ_trans"]);
    assert!(run.redshift.queries().is_empty());
    assert!(run.envisionware.queries().is_empty());
    assert!(run.sink.is_empty());
    assert!(run.all_closed());
}

#[tokio::test]
async fn selected_checks_reconcile_cleanly() {
    let run = Run::new(
        ScriptedBackend::new("Redshift").with_responses([
            // location_closures: count, unknown ids
            count_rows(4),
            vec![],
            // ezproxy: count, duplicates
            count_rows(2500),
            vec![],
        ]),
    );
    let controller = run
        .controller(thursday(), login_failure())
        .select(&["ezproxy", "location_closures"])
        .unwrap();

    let report = controller.run_all_checks().await;

    assert!(report.is_success());
    assert_eq!(report.checks_run, vec!["location_closures", "ezproxy"]);
    assert!(run.sink.is_empty());
    assert_eq!(run.redshift.connect_count(), 2);
    assert!(run.redshift.queries()[0].contains("location_closures_v2_qa"));
    assert!(run.sierra.queries().is_empty());
}

// ---- OverDrive through the real scraper -------------------------------------

async fn marketplace(total: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Account/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form method="post">
                <input id="UserName" name="UserName" />
                <input id="Password" name="Password" type="password" />
            </form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Account/Login"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/Dashboard"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Insights/Reports/Checkouts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<div id="column_TotalFormatted-textInnerEl">{}</div>"#,
            total
        )))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn overdrive_total_is_reconciled_against_the_warehouse() {
    let server = marketplace("Checkouts (1,204)").await;
    let scraper = MarketplaceScraper::with_base_url(server.uri(), "user", "pass").unwrap();
    let run = Run::new(ScriptedBackend::new("Redshift").with_responses([count_rows(1200), vec![]]));
    let controller = run
        .controller(thursday(), Arc::new(scraper))
        .select(&["overdrive_checkouts"])
        .unwrap();

    let report = controller.run_all_checks().await;

    assert!(report.is_success());
    assert_eq!(
        run.sink.messages(),
        vec![
            "Number of OverDrive Marketplace records does not match number of Redshift \
             overdrive_checkouts_qa records: 1204 OverDrive Marketplace records and 1200 \
             Redshift records"
        ]
    );
}

#[tokio::test]
async fn unparseable_marketplace_total_becomes_one_alarm() {
    let server = marketplace("Checkouts").await;
    let scraper = MarketplaceScraper::with_base_url(server.uri(), "user", "pass").unwrap();
    let run = Run::new(ScriptedBackend::new("Redshift"));
    let controller = run
        .controller(thursday(), Arc::new(scraper))
        .select(&["overdrive_checkouts"])
        .unwrap();

    let report = controller.run_all_checks().await;

    assert!(report.is_success());
    assert_eq!(run.sink.len(), 1);
    assert!(run.sink.messages()[0].starts_with("Failed to scrape OverDrive Marketplace"));
    assert!(run.redshift.queries().is_empty());
}

// ---- Log output -------------------------------------------------------------

#[test]
fn tracing_sink_writes_error_lines_tagged_with_the_check() {
    let buffer = Buffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        TracingSink.emit("ezproxy", "Found only 12 ezproxy_sessions rows for all of 2023-05-31");
    });

    let output = buffer.contents();
    assert!(output.contains("ERROR"));
    assert!(output.contains("ezproxy"));
    assert!(output.contains("Found only 12 ezproxy_sessions rows for all of 2023-05-31"));
}
