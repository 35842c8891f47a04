//! Startup error reporting.
//!
//! # Responsibilities
//! - Map startup failures to the process exit codes of each binary
//! - Report them once, through tracing, before exiting
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order: config, credentials, broker, store

use std::process::ExitCode;

use crate::config::ConfigError;

/// Usage error or `--help`.
pub const EXIT_USAGE: u8 = 127;

/// Listener exit codes.
pub mod listener {
    pub const CONFIG_NOT_FOUND: u8 = 1;
    pub const CONFIG_INVALID: u8 = 2;
    pub const CONFIG_MISSING_KEY: u8 = 3;
    pub const CREDENTIALS: u8 = 4;
    pub const BROKER_CONNECT: u8 = 5;
    pub const STORE_CONNECT: u8 = 6;
    pub const PIPELINE_FAILED: u8 = 7;
}

/// Publisher exit codes.
pub mod publisher {
    pub const CONFIG_NOT_FOUND: u8 = 1;
    pub const CREDENTIALS: u8 = 2;
    pub const CONFIG_INVALID: u8 = 3;
    pub const DATA_FILE: u8 = 4;
    pub const BROKER_CONNECT: u8 = 5;
    pub const INPUT_READ: u8 = 6;
}

/// Exit code for a listener configuration failure.
pub fn listener_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::NotFound { .. } => listener::CONFIG_NOT_FOUND,
        ConfigError::Credentials { .. } => listener::CREDENTIALS,
        e if e.is_missing_keys() => listener::CONFIG_MISSING_KEY,
        ConfigError::Encoding { .. }
        | ConfigError::Parse(_)
        | ConfigError::Validation(_)
        | ConfigError::InvalidValue { .. } => listener::CONFIG_INVALID,
    }
}

/// Exit code for a publisher configuration failure.
pub fn publisher_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::NotFound { .. } => publisher::CONFIG_NOT_FOUND,
        ConfigError::Credentials { .. } => publisher::CREDENTIALS,
        ConfigError::Encoding { .. }
        | ConfigError::Parse(_)
        | ConfigError::Validation(_)
        | ConfigError::InvalidValue { .. } => publisher::CONFIG_INVALID,
    }
}

/// Log a fatal startup error and turn it into an exit code.
pub fn fail(code: u8, err: &dyn std::error::Error) -> ExitCode {
    tracing::error!(exit_code = code, error = %err, "Startup failed");
    ExitCode::from(code)
}

/// Handle a `clap` parse failure: print usage or help, exit 127.
pub fn usage(err: clap::Error) -> ExitCode {
    let _ = err.print();
    ExitCode::from(EXIT_USAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::ValidationError;
    use crate::config::ParseError;
    use std::path::PathBuf;

    fn not_found() -> ConfigError {
        ConfigError::NotFound {
            path: PathBuf::from("/etc/ddc/qlistener.conf"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
    }

    #[test]
    fn test_listener_codes() {
        assert_eq!(listener_exit_code(&not_found()), 1);

        let parse = ConfigError::Parse(ParseError::MissingSeparator {
            line_no: 1,
            line: "garbage".into(),
        });
        assert_eq!(listener_exit_code(&parse), 2);

        let unknown = ConfigError::Validation(vec![
            ValidationError::UnknownKey("Bogus".into()),
            ValidationError::MissingKey("AMQPQueue".into()),
        ]);
        assert_eq!(listener_exit_code(&unknown), 2);

        let missing = ConfigError::Validation(vec![ValidationError::MissingKey("AMQPQueue".into())]);
        assert_eq!(listener_exit_code(&missing), 3);

        let creds = ConfigError::Credentials {
            path: PathBuf::from("/etc/ddc/amqp.pass"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(listener_exit_code(&creds), 4);
    }

    #[test]
    fn test_codes_are_distinct_per_binary() {
        let listener_codes = [
            listener::CONFIG_NOT_FOUND,
            listener::CONFIG_INVALID,
            listener::CONFIG_MISSING_KEY,
            listener::CREDENTIALS,
            listener::BROKER_CONNECT,
            listener::STORE_CONNECT,
            listener::PIPELINE_FAILED,
            EXIT_USAGE,
        ];
        let publisher_codes = [
            publisher::CONFIG_NOT_FOUND,
            publisher::CREDENTIALS,
            publisher::CONFIG_INVALID,
            publisher::DATA_FILE,
            publisher::BROKER_CONNECT,
            publisher::INPUT_READ,
            EXIT_USAGE,
        ];
        for codes in [&listener_codes[..], &publisher_codes[..]] {
            let unique: std::collections::BTreeSet<_> = codes.iter().collect();
            assert_eq!(unique.len(), codes.len());
            assert!(!codes.contains(&0));
        }
    }

    #[test]
    fn test_publisher_codes() {
        assert_eq!(publisher_exit_code(&not_found()), 1);
        let missing = ConfigError::Validation(vec![ValidationError::MissingKey("AMQPExchange".into())]);
        assert_eq!(publisher_exit_code(&missing), 3);
        let creds = ConfigError::Credentials {
            path: PathBuf::from("/etc/ddc/amqp.pass"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(publisher_exit_code(&creds), 2);
    }
}
