//! External collaborators other than the databases.

pub mod overdrive;
pub mod secrets;
pub mod site_cache;

pub use overdrive::{CheckoutCountSource, MarketplaceScraper, ScrapeError, StubCheckoutSource};
pub use secrets::{Decryptor, KmsDecryptor, PlaintextDecryptor, SecretsError};
pub use site_cache::{S3SiteCache, SiteCacheError, SiteListSource, StaticSiteCache};
