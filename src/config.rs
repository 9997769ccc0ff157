//! Validation of the parameters a command is started with

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::{KarmError, Result};
use crate::resource::Resource;

/// Global parameters, as they were given on the command line (or in the environment)
#[derive(Clone, Debug, Default)]
pub struct GlobalParameters {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub storage: Option<PathBuf>,
    pub debug: bool,
}

/// Everything a sync command needs to run
#[derive(Clone, Debug)]
pub struct Config {
    pub account: Resource,
    pub storage: PathBuf,
    pub debug: bool,
}

impl Config {
    /// Check every required parameter is there. This happens before any remote call.
    pub fn from_parameters(params: GlobalParameters) -> Result<Self> {
        let mut missing = Vec::new();
        if is_blank(&params.url) { missing.push("url"); }
        if is_blank(&params.user) { missing.push("user"); }
        if is_blank(&params.password) { missing.push("password"); }
        if params.storage.as_ref().map_or(true, |p| p.as_os_str().is_empty()) { missing.push("storage"); }
        if !missing.is_empty() {
            return Err(KarmError::ArgumentValidation(format!(
                "missing required parameters: {}", missing.iter().map(|m| format!("--{}", m)).collect::<Vec<_>>().join(", ")
            )));
        }

        let account = Resource::parse(
            params.url.unwrap_or_default(),
            params.user.unwrap_or_default(),
            params.password.unwrap_or_default(),
        )?;
        Ok(Self {
            account,
            storage: params.storage.unwrap_or_default(),
            debug: params.debug,
        })
    }
}

/// The storage path alone, for commands that do not talk to the remote service
pub fn require_storage(params: &GlobalParameters) -> Result<PathBuf> {
    match &params.storage {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
        _ => Err(KarmError::ArgumentValidation("missing required parameters: --storage".to_string())),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_ref().map_or(true, |v| v.trim().is_empty())
}

/// Parse a checkin date. It must literally look like `YYYY-MM-DD`, e.g. `2009-02-14`
pub fn parse_checkin_date(value: &str) -> Result<NaiveDate> {
    let invalid = || KarmError::ArgumentValidation(format!(
        "Date format is invalid ({:?}), should be: year-mm-dd, e.g. '2009-02-14'", value
    ));

    let bytes = value.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_shaped {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> GlobalParameters {
        GlobalParameters {
            url: Some("https://acme.basecamphq.com".into()),
            user: Some("john".into()),
            password: Some("secret".into()),
            storage: Some(PathBuf::from("/tmp/karm.ics")),
            debug: false,
        }
    }

    #[test]
    fn all_global_parameters_are_required() {
        assert!(Config::from_parameters(complete()).is_ok());

        let params = GlobalParameters { password: None, storage: None, ..complete() };
        match Config::from_parameters(params) {
            Err(KarmError::ArgumentValidation(msg)) => assert_eq!(msg, "missing required parameters: --password, --storage"),
            other => panic!("unexpected result {:?}", other),
        }

        let params = GlobalParameters { user: Some("  ".into()), ..complete() };
        assert!(matches!(Config::from_parameters(params), Err(KarmError::ArgumentValidation(_))));
    }

    #[test]
    fn checkin_dates_follow_the_literal_pattern() {
        assert_eq!(parse_checkin_date("2009-02-14").unwrap(), NaiveDate::from_ymd_opt(2009, 2, 14).unwrap());
        for invalid in &["2009-2-14", "14-02-2009", "2009/02/14", "2009-02-30", "2009-02-14 ", "yesterday"] {
            assert!(matches!(parse_checkin_date(invalid), Err(KarmError::ArgumentValidation(_))), "{} should be rejected", invalid);
        }
    }
}
