use std::env;
use std::path::Path;

use thiserror::Error;

/// Redshift listens on its own default port rather than 5432.
pub const REDSHIFT_PORT: u16 = 5439;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(String),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("Failed to load {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// Connection settings for one database.
///
/// `host`, `user` and `password` hold KMS ciphertext unless credential
/// decryption is turned off.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("port", &self.port)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub environment: String,
    pub redshift: DatabaseConfig,
    pub sierra: DatabaseConfig,
    pub envisionware: DatabaseConfig,
    pub overdrive_username: String,
    pub overdrive_password: String,
    pub shoppertrak_bucket: String,
    pub shoppertrak_resource: String,
    pub decrypt_credentials: bool,
    pub include_legacy_circ_trans: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("redshift", &self.redshift)
            .field("sierra", &self.sierra)
            .field("envisionware", &self.envisionware)
            .field("shoppertrak_bucket", &self.shoppertrak_bucket)
            .field("shoppertrak_resource", &self.shoppertrak_resource)
            .field("decrypt_credentials", &self.decrypt_credentials)
            .field("include_legacy_circ_trans", &self.include_legacy_circ_trans)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Self {
            environment: vars.required("ENVIRONMENT")?,
            redshift: DatabaseConfig {
                host: vars.required("REDSHIFT_DB_HOST")?,
                port: REDSHIFT_PORT,
                database: vars.required("REDSHIFT_DB_NAME")?,
                user: vars.required("REDSHIFT_DB_USER")?,
                password: vars.required("REDSHIFT_DB_PASSWORD")?,
            },
            sierra: vars.database("SIERRA_DB")?,
            envisionware: vars.database("ENVISIONWARE_DB")?,
            overdrive_username: vars.required("OVERDRIVE_USERNAME")?,
            overdrive_password: vars.required("OVERDRIVE_PASSWORD")?,
            shoppertrak_bucket: vars.required("SHOPPERTRAK_S3_BUCKET")?,
            shoppertrak_resource: vars.required("SHOPPERTRAK_S3_RESOURCE")?,
            decrypt_credentials: vars.flag("DECRYPT_CREDENTIALS", true)?,
            include_legacy_circ_trans: vars.flag("INCLUDE_LEGACY_CIRC_TRANS", false)?,
        })
    }
}

/// Load `config/{ENVIRONMENT}.env` (when present) and then `.env`.
///
/// Variables already set in the process win over both files, and the
/// environment file wins over `.env`.
///
/// `.env` is still loaded when the environment file is unreadable; that
/// failure is returned once logging is available to report it.
pub fn load_env_files() -> Result<(), ConfigError> {
    let loaded = match env::var("ENVIRONMENT") {
        Ok(environment) => load_env_file(Path::new(&format!("config/{}.env", environment))),
        Err(_) => Ok(()),
    };
    dotenvy::dotenv().ok();
    loaded
}

fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    dotenvy::from_path(path).map_err(|err| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name: name.to_string(),
                    expected: "true or false",
                    value,
                }),
            },
        }
    }

    fn port(&self, name: &str) -> Result<u16, ConfigError> {
        let value = self.required(name)?;
        value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            expected: "a valid port number",
            value,
        })
    }

    fn database(&self, prefix: &str) -> Result<DatabaseConfig, ConfigError> {
        Ok(DatabaseConfig {
            host: self.required(&format!("{}_HOST", prefix))?,
            port: self.port(&format!("{}_PORT", prefix))?,
            database: self.required(&format!("{}_NAME", prefix))?,
            user: self.required(&format!("{}_USER", prefix))?,
            password: self.required(&format!("{}_PASSWORD", prefix))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ENVIRONMENT", "qa"),
            ("REDSHIFT_DB_HOST", "redshift-host"),
            ("REDSHIFT_DB_NAME", "qa"),
            ("REDSHIFT_DB_USER", "redshift-user"),
            ("REDSHIFT_DB_PASSWORD", "redshift-pw"),
            ("SIERRA_DB_HOST", "sierra-host"),
            ("SIERRA_DB_PORT", "1032"),
            ("SIERRA_DB_NAME", "iii"),
            ("SIERRA_DB_USER", "sierra-user"),
            ("SIERRA_DB_PASSWORD", "sierra-pw"),
            ("ENVISIONWARE_DB_HOST", "ew-host"),
            ("ENVISIONWARE_DB_PORT", "3306"),
            ("ENVISIONWARE_DB_NAME", "lms"),
            ("ENVISIONWARE_DB_USER", "ew-user"),
            ("ENVISIONWARE_DB_PASSWORD", "ew-pw"),
            ("OVERDRIVE_USERNAME", "od-user"),
            ("OVERDRIVE_PASSWORD", "od-pw"),
            ("SHOPPERTRAK_S3_BUCKET", "bucket"),
            ("SHOPPERTRAK_S3_RESOURCE", "sites.json"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
    }

    #[test]
    fn reads_every_section() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.environment, "qa");
        assert_eq!(config.redshift.port, REDSHIFT_PORT);
        assert_eq!(config.redshift.database, "qa");
        assert_eq!(config.sierra.port, 1032);
        assert_eq!(config.envisionware.database, "lms");
        assert_eq!(config.shoppertrak_resource, "sites.json");
        assert!(config.decrypt_credentials);
        assert!(!config.include_legacy_circ_trans);
    }

    #[test]
    fn missing_variable_is_named() {
        let mut vars = base_vars();
        vars.remove("SIERRA_DB_PASSWORD");

        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("SIERRA_DB_PASSWORD".into())
        );
    }

    #[test]
    fn blank_variable_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("OVERDRIVE_USERNAME", "  ");

        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("OVERDRIVE_USERNAME".into())
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut vars = base_vars();
        vars.insert("ENVISIONWARE_DB_PORT", "mysql");

        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref name, .. } if name == "ENVISIONWARE_DB_PORT"
        ));
    }

    #[test]
    fn flags_parse_and_reject_garbage() {
        let mut vars = base_vars();
        vars.insert("DECRYPT_CREDENTIALS", "false");
        vars.insert("INCLUDE_LEGACY_CIRC_TRANS", "TRUE");
        let config = load(&vars).unwrap();
        assert!(!config.decrypt_credentials);
        assert!(config.include_legacy_circ_trans);

        vars.insert("DECRYPT_CREDENTIALS", "maybe");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config = load(&base_vars()).unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("sierra-pw"));
        assert!(!rendered.contains("sierra-host"));
        assert!(!rendered.contains("od-pw"));
        assert!(rendered.contains("iii"));
    }

    #[test]
    fn absent_env_file_is_skipped() {
        let path = env::temp_dir().join("warehouse-alarms-absent.env");

        assert_eq!(load_env_file(&path), Ok(()));
    }

    #[test]
    fn malformed_env_file_is_reported() {
        let path = env::temp_dir().join(format!("warehouse-alarms-{}.env", std::process::id()));
        std::fs::write(&path, "WAREHOUSE_ALARMS_BROKEN value without equals\n").unwrap();

        let err = load_env_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        let expected = path.display().to_string();
        assert!(matches!(
            err,
            ConfigError::EnvFile { path: ref failed, .. } if *failed == expected
        ));
        assert!(err.to_string().starts_with("Failed to load "));
    }
}
