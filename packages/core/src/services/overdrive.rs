//! OverDrive Marketplace checkout counts.
//!
//! Marketplace has no API for the Insights checkout report, so the count is
//! scraped: log in through the account form, load the report for a single
//! day and read the `Checkouts (1,234)` total off the page.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

pub const MARKETPLACE_URL: &str = "https://marketplace.overdrive.com";

const LOGIN_PATH: &str = "/Account/Login";
const CHECKOUTS_PATH: &str = "/Insights/Reports/Checkouts";
const TOTAL_ELEMENT_ID: &str = "column_TotalFormatted-textInnerEl";
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("OverDrive Marketplace login page elements not found")]
    LoginFormMissing,

    #[error("OverDrive Marketplace login failed")]
    LoginFailed,

    #[error("OverDrive Marketplace URL loading timed out: {url}")]
    Timeout { url: String },

    #[error("No OverDrive Marketplace total checkouts element found")]
    MissingElement,

    #[error("Unexpected OverDrive Marketplace total checkouts text: {text}")]
    UnparseableCount { text: String },

    #[error("OverDrive Marketplace request failed: {0}")]
    Transport(String),
}

/// Anything that can report the vendor-side checkout count for a day.
#[async_trait]
pub trait CheckoutCountSource: Send + Sync {
    async fn get_count(&self, date: NaiveDate) -> Result<i64, ScrapeError>;
}

pub struct MarketplaceScraper {
    base_url: String,
    username: String,
    password: String,
    http: Client,
}

impl MarketplaceScraper {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ScrapeError> {
        Self::with_base_url(MARKETPLACE_URL, username, password)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ScrapeError> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| ScrapeError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            http,
        })
    }

    async fn log_in(&self) -> Result<(), ScrapeError> {
        tracing::info!("Logging into OverDrive Marketplace");
        let login_url = format!("{}{}", self.base_url, LOGIN_PATH);

        let page = self.fetch_text(self.http.get(&login_url), &login_url).await?;
        if !page.contains("id=\"UserName\"") || !page.contains("id=\"Password\"") {
            return Err(ScrapeError::LoginFormMissing);
        }

        let form = LoginForm {
            username: &self.username,
            password: &self.password,
            verification_token: input_value(&page, "__RequestVerificationToken"),
        };

        let response = self
            .http
            .post(&login_url)
            .form(&form)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|err| request_error(err, &login_url))?;

        // A successful login redirects away from the form.
        if response.url().path().eq_ignore_ascii_case(LOGIN_PATH)
            || !response.status().is_success()
        {
            return Err(ScrapeError::LoginFailed);
        }
        Ok(())
    }

    async fn fetch_text(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<String, ScrapeError> {
        let response = request
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|err| request_error(err, url))?;

        if !response.status().is_success() {
            return Err(ScrapeError::Transport(format!(
                "Marketplace returned HTTP {}",
                response.status()
            )));
        }

        response.text().await.map_err(|err| request_error(err, url))
    }
}

#[async_trait]
impl CheckoutCountSource for MarketplaceScraper {
    async fn get_count(&self, date: NaiveDate) -> Result<i64, ScrapeError> {
        self.log_in().await?;

        tracing::info!("Getting OverDrive Marketplace record count for {}", date);
        let url = format!("{}{}", self.base_url, CHECKOUTS_PATH);
        let data = report_parameters(date);
        let page = self
            .fetch_text(self.http.get(&url).query(&[("data", data.as_str())]), &url)
            .await?;

        let text = element_text(&page, TOTAL_ELEMENT_ID).ok_or(ScrapeError::MissingElement)?;
        parse_checkout_total(&text)
    }
}

/// Marketplace login form fields.
#[derive(Serialize)]
struct LoginForm<'a> {
    #[serde(rename = "UserName")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
    #[serde(rename = "__RequestVerificationToken", skip_serializing_if = "Option::is_none")]
    verification_token: Option<String>,
}

fn request_error(err: reqwest::Error, url: &str) -> ScrapeError {
    if err.is_timeout() {
        ScrapeError::Timeout { url: url.to_string() }
    } else {
        ScrapeError::Transport(err.to_string())
    }
}

/// JSON report parameters selecting a single day of checkouts by format.
fn report_parameters(date: NaiveDate) -> String {
    serde_json::json!({
        "ReportChartBy": "Format",
        "Branch": [],
        "IsLuckyDay": null,
        "TitleIds": null,
        "Format": null,
        "Language": null,
        "Audience": null,
        "Rating": null,
        "Subject": null,
        "CirculationDateParameters": {
            "DateRangePeriodType": "specific",
            "DateUnitsValue": 30,
            "DateRangeDateUnit": "day",
            "StartDateInputValue": date.to_string(),
            "EndDateInputValue": date.to_string()
        },
        "ContentAccessLevel": null,
        "UserTypes": [],
        "LendingModel": null,
        "Website": null,
        "Creator": null,
        "PurchaseOrderId": null,
        "DrillDownKey": "null",
        "DrillDownLabel": "null",
        "Parameters": { "page": 1, "start": 0, "limit": 50, "sort": [] }
    })
    .to_string()
}

/// Inner text of the element carrying `id`, tags stripped.
///
/// Reads the markup as served. The total must be present in the HTML
/// response itself; anything filled in client-side is not seen.
fn element_text(html: &str, id: &str) -> Option<String> {
    let marker = format!("id=\"{}\"", id);
    let start = html.find(&marker)?;
    let tag_start = html[..start].rfind('<')?;
    let name = tag_name(&html[tag_start + 1..start]);
    if name.is_empty() {
        return None;
    }

    let mut rest = &html[start + html[start..].find('>')? + 1..];
    let mut depth = 1usize;
    let mut text = String::new();
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let close = open + rest[open..].find('>')?;
        let tag = &rest[open + 1..close];

        if let Some(closing) = tag.strip_prefix('/') {
            if tag_name(closing).eq_ignore_ascii_case(name) {
                depth -= 1;
                if depth == 0 {
                    return Some(text.trim().to_string());
                }
            }
        } else if tag_name(tag).eq_ignore_ascii_case(name) && !tag.ends_with('/') {
            depth += 1;
        }
        rest = &rest[close + 1..];
    }
    None
}

fn tag_name(tag: &str) -> &str {
    let tag = tag.trim_start();
    let end = tag
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(tag.len());
    &tag[..end]
}

/// `value` attribute of the input named `name`.
fn input_value(html: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{}\"", name);
    let start = html.find(&marker)?;
    let tag_end = start + html[start..].find('>')?;
    let tag_start = html[..start].rfind('<')?;
    let tag = &html[tag_start..tag_end];

    let value_start = tag.find("value=\"")? + "value=\"".len();
    let value_len = tag[value_start..].find('"')?;
    Some(tag[value_start..value_start + value_len].to_string())
}

/// Parse `"Checkouts (1,234)"` into `1234`.
pub fn parse_checkout_total(text: &str) -> Result<i64, ScrapeError> {
    let compact: String = text.chars().filter(|c| !matches!(c, ',' | '.' | ' ')).collect();
    let unparseable = || ScrapeError::UnparseableCount {
        text: text.to_string(),
    };

    let open = compact.find('(').ok_or_else(unparseable)?;
    let close = compact[open..].find(')').ok_or_else(unparseable)? + open;
    compact[open + 1..close].parse().map_err(|_| unparseable())
}

/// Scripted count source for tests.
#[derive(Debug, Default)]
pub struct StubCheckoutSource {
    result: Option<Result<i64, ScrapeError>>,
    requested: Mutex<Vec<NaiveDate>>,
}

impl StubCheckoutSource {
    pub fn count(count: i64) -> Self {
        Self {
            result: Some(Ok(count)),
            requested: Mutex::default(),
        }
    }

    pub fn failing(error: ScrapeError) -> Self {
        Self {
            result: Some(Err(error)),
            requested: Mutex::default(),
        }
    }

    pub fn requested_dates(&self) -> Vec<NaiveDate> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CheckoutCountSource for StubCheckoutSource {
    async fn get_count(&self, date: NaiveDate) -> Result<i64, ScrapeError> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(date);
        self.result
            .clone()
            .unwrap_or_else(|| Err(ScrapeError::Transport("no scripted count".into())))
    }
}
