//! Alarm run orchestration.
//!
//! Builds every check against shared backend handles and runs them one
//! after another. A failing check is logged and recorded; by default the
//! next check still runs. Backends are always closed before the run
//! returns.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::alarms::{
    Alarm, AlarmSink, BranchCodesMapAlarms, CircTransAlarms, CloudLibraryAlarms,
    DailyLocationVisitsAlarms, EzproxyAlarms, HoldsAlarms, ItypeCodesAlarms, LocationClosuresAlarms,
    LocationCodesAlarms, LocationHoursAlarms, LocationVisitsAlarms, OverDriveCheckoutsAlarms,
    PatronInfoAlarms, PcReserveAlarms, StatGroupCodesAlarms, TracingSink, CHECK_NAMES,
};
use crate::backend::{Backend, MySqlClient, PostgresClient};
use crate::config::{Config, DatabaseConfig};
use crate::context::RunContext;
use crate::services::{
    CheckoutCountSource, Decryptor, KmsDecryptor, MarketplaceScraper, PlaintextDecryptor,
    S3SiteCache, ScrapeError, SecretsError, SiteListSource,
};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to decrypt {credential}: {source}")]
    Secrets {
        credential: String,
        #[source]
        source: SecretsError,
    },

    #[error("Failed to build OverDrive Marketplace client: {0}")]
    Scraper(#[from] ScrapeError),

    #[error("Unknown check {name:?}; expected one of: {}", CHECK_NAMES.join(", "))]
    UnknownCheck { name: String },
}

/// What to do when a check returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and keep going.
    #[default]
    Isolate,
    /// Stop at the first failure.
    FailFast,
}

/// The three database handles shared by every check.
#[derive(Clone)]
pub struct Backends {
    pub sierra: Arc<dyn Backend>,
    pub redshift: Arc<dyn Backend>,
    pub envisionware: Arc<dyn Backend>,
}

impl Backends {
    fn all(&self) -> [&Arc<dyn Backend>; 3] {
        [&self.sierra, &self.redshift, &self.envisionware]
    }
}

/// Everything a check may talk to besides the run context.
#[derive(Clone)]
pub struct Collaborators {
    pub backends: Backends,
    pub sites: Arc<dyn SiteListSource>,
    pub checkouts: Arc<dyn CheckoutCountSource>,
    pub sink: Arc<dyn AlarmSink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub check: &'static str,
    pub error: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Checks that were started, in order.
    pub checks_run: Vec<&'static str>,
    pub failures: Vec<CheckFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.failures.iter().map(|failure| failure.check).collect()
    }
}

pub struct AlarmController {
    context: Arc<RunContext>,
    backends: Backends,
    checks: Vec<Box<dyn Alarm>>,
    policy: FailurePolicy,
}

impl AlarmController {
    /// Construct every check in run order.
    pub fn new(
        context: Arc<RunContext>,
        collaborators: Collaborators,
        include_legacy_circ_trans: bool,
    ) -> Self {
        let Collaborators {
            backends,
            sites,
            checkouts,
            sink,
        } = collaborators;
        let sierra = &backends.sierra;
        let redshift = &backends.redshift;
        let ctx = &context;

        let checks: Vec<Box<dyn Alarm>> = vec![
            Box::new(
                CircTransAlarms::new(ctx.clone(), sink.clone(), sierra.clone(), redshift.clone())
                    .with_legacy_era(include_legacy_circ_trans),
            ),
            Box::new(HoldsAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(PatronInfoAlarms::new(
                ctx.clone(),
                sink.clone(),
                sierra.clone(),
                redshift.clone(),
            )),
            Box::new(PcReserveAlarms::new(
                ctx.clone(),
                sink.clone(),
                backends.envisionware.clone(),
                redshift.clone(),
            )),
            Box::new(ItypeCodesAlarms::new(
                ctx.clone(),
                sink.clone(),
                sierra.clone(),
                redshift.clone(),
            )),
            Box::new(LocationCodesAlarms::new(
                ctx.clone(),
                sink.clone(),
                sierra.clone(),
                redshift.clone(),
            )),
            Box::new(StatGroupCodesAlarms::new(
                ctx.clone(),
                sink.clone(),
                sierra.clone(),
                redshift.clone(),
            )),
            Box::new(LocationVisitsAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(DailyLocationVisitsAlarms::new(
                ctx.clone(),
                sink.clone(),
                redshift.clone(),
                sites,
            )),
            Box::new(BranchCodesMapAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(LocationHoursAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(LocationClosuresAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(OverDriveCheckoutsAlarms::new(
                ctx.clone(),
                sink.clone(),
                redshift.clone(),
                checkouts,
            )),
            Box::new(CloudLibraryAlarms::new(ctx.clone(), sink.clone(), redshift.clone())),
            Box::new(EzproxyAlarms::new(ctx.clone(), sink, redshift.clone())),
        ];

        Self {
            context,
            backends,
            checks,
            policy: FailurePolicy::default(),
        }
    }

    /// Resolve credentials and build the production collaborators.
    pub async fn from_config(
        config: &Config,
        run_date: NaiveDate,
    ) -> Result<Self, ControllerError> {
        let decryptor: Box<dyn Decryptor> = if config.decrypt_credentials {
            Box::new(KmsDecryptor::from_env().await)
        } else {
            tracing::warn!("Credential decryption disabled; using configured values as-is");
            Box::new(PlaintextDecryptor)
        };
        let decryptor = decryptor.as_ref();

        let (host, user, password) =
            decrypt_database(decryptor, "REDSHIFT_DB", &config.redshift).await?;
        let db = &config.redshift;
        let redshift =
            PostgresClient::new("Redshift", &host, db.port, &db.database, &user, &password);

        let (host, user, password) =
            decrypt_database(decryptor, "SIERRA_DB", &config.sierra).await?;
        let db = &config.sierra;
        let sierra = PostgresClient::new("Sierra", &host, db.port, &db.database, &user, &password);

        let (host, user, password) =
            decrypt_database(decryptor, "ENVISIONWARE_DB", &config.envisionware).await?;
        let db = &config.envisionware;
        let envisionware =
            MySqlClient::new("Envisionware", &host, db.port, &db.database, &user, &password);

        let checkouts = MarketplaceScraper::new(
            decrypt(decryptor, "OVERDRIVE_USERNAME", &config.overdrive_username).await?,
            decrypt(decryptor, "OVERDRIVE_PASSWORD", &config.overdrive_password).await?,
        )?;
        let sites =
            S3SiteCache::from_env(&config.shoppertrak_bucket, &config.shoppertrak_resource).await;

        let context =
            RunContext::from_environment(run_date, &config.redshift.database, &config.environment);
        tracing::info!(
            run_date = %context.run_date(),
            environment = %config.environment,
            extended_checks = context.extended_checks_enabled(),
            "Alarm controller initialized"
        );

        let collaborators = Collaborators {
            backends: Backends {
                sierra: Arc::new(sierra),
                redshift: Arc::new(redshift),
                envisionware: Arc::new(envisionware),
            },
            sites: Arc::new(sites),
            checkouts: Arc::new(checkouts),
            sink: Arc::new(TracingSink),
        };

        Ok(Self::new(
            Arc::new(context),
            collaborators,
            config.include_legacy_circ_trans,
        ))
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep only the named checks. An empty selection keeps all of them.
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ControllerError> {
        if names.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !CHECK_NAMES.contains(name))
        {
            return Err(ControllerError::UnknownCheck {
                name: unknown.to_string(),
            });
        }

        self.checks
            .retain(|check| names.iter().any(|name| name.as_ref() == check.name()));
        Ok(self)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Names of the checks this controller will run, in order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    pub async fn run_all_checks(&self) -> RunReport {
        tracing::info!(
            "Running {} check(s) for {}",
            self.checks.len(),
            self.context.run_date()
        );

        let mut report = RunReport::default();
        for check in &self.checks {
            let name = check.name();
            report.checks_run.push(name);

            if let Err(err) = check.run_checks().await {
                tracing::error!(check = name, "Error running {} alarms: {}", name, err);
                report.failures.push(CheckFailure {
                    check: name,
                    error: err.to_string(),
                });

                if self.policy == FailurePolicy::FailFast {
                    tracing::warn!("Fail-fast enabled; skipping remaining checks");
                    break;
                }
            }
        }

        self.close_backends().await;
        tracing::info!(
            "Finished {} check(s), {} failed",
            report.checks_run.len(),
            report.failures.len()
        );
        report
    }

    async fn close_backends(&self) {
        for backend in self.backends.all() {
            if let Err(err) = backend.close_connection().await {
                tracing::warn!("Failed to close {} connection: {}", backend.name(), err);
            }
        }
    }
}

async fn decrypt(
    decryptor: &dyn Decryptor,
    credential: &str,
    value: &str,
) -> Result<String, ControllerError> {
    decryptor
        .decrypt(value)
        .await
        .map_err(|source| ControllerError::Secrets {
            credential: credential.to_string(),
            source,
        })
}

/// Plaintext host, user and password for the database configured under
/// `prefix`.
async fn decrypt_database(
    decryptor: &dyn Decryptor,
    prefix: &str,
    db: &DatabaseConfig,
) -> Result<(String, String, String), ControllerError> {
    Ok((
        decrypt(decryptor, &format!("{}_HOST", prefix), &db.host).await?,
        decrypt(decryptor, &format!("{}_USER", prefix), &db.user).await?,
        decrypt(decryptor, &format!("{}_PASSWORD", prefix), &db.password).await?,
    ))
}
