//! Command-line validation.
//!
//! Every check produces a [`ValidationError`] naming the missing or
//! mis-shaped parameter, so the operator can fix the invocation and re-run.

use std::fmt::Display;
use std::path::PathBuf;

use pgsale_core::{Error, Result, Shape, ValidationError};

use crate::args::ArgMap;

pub const DEFAULT_ENV: &str = "production";
pub const DEFAULT_UID: &str = "external_id";
pub const DEFAULT_URL: &str = "http://localhost:3000";

/// Page that opens a new sales order for a client.
pub const ORDER_PATH: &str = "/management/sales_order_create";

/// A validated invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Path of the YAML database configuration
    pub dbconf: PathBuf,
    /// Environment section of the configuration
    pub env: String,
    /// Identifying column of the client
    pub uid: String,
    /// Value of the identifying column
    pub uid_value: String,
    /// The `client.*` payload
    pub client: ArgMap,
    pub debug: bool,
    /// Base URL of the web application
    pub url: String,
    /// Launch a browser once the client exists
    pub open_browser: bool,
}

impl Invocation {
    /// Decode and validate raw command-line tokens.
    pub fn parse<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_args(ArgMap::decode(tokens))
    }

    pub fn from_args(mut args: ArgMap) -> Result<Self> {
        require(&args, "dbconf", Shape::Value, "Needs 'dbconf=/path/to/database.yml' parameter")?;
        require(&args, "client", Shape::Mapping, "Needs 'client.YYY=XXX' parameters")?;

        let debug = debug_enabled(optional(&args, "debug", "Needs 'debug=N' parameter")?);
        let env = optional(&args, "env", "Needs 'env=NAME' parameter")?
            .unwrap_or(DEFAULT_ENV)
            .to_string();
        let url = optional(&args, "url", "Needs 'url=URL' parameter")?
            .unwrap_or(DEFAULT_URL)
            .to_string();
        let open_browser = optional(&args, "open", "Needs 'open=0' parameter")? != Some("0");
        let dbconf = PathBuf::from(args.scalar("dbconf").unwrap_or_default());

        let client = args.take_map("client", "Needs 'client.YYY=XXX' parameters")?;
        for field in ["code", "last_name", "company_id"] {
            require(
                &client,
                field,
                Shape::Value,
                &format!("Needs 'client.{field}=XXX' parameter"),
            )?;
        }
        require(&client, "nature", Shape::Mapping, "Needs 'client.nature.YYY=XXX' parameters")?;
        if let Some(nature) = client.map("nature") {
            require(nature, "name", Shape::Value, "Needs 'client.nature.name=XXX' parameter")?;
        }
        require(&client, "contact", Shape::Mapping, "Needs 'client.contact.YYY=XXX' parameters")?;

        let uid = optional(&args, "uid", "Needs 'uid=COLUMN' parameter")?
            .unwrap_or(DEFAULT_UID)
            .to_string();
        require(
            &client,
            &uid,
            Shape::Value,
            &format!("Needs 'client.{uid}=XXX' parameter"),
        )?;
        let uid_value = client.scalar(&uid).unwrap_or_default().to_string();

        Ok(Self {
            dbconf,
            env,
            uid,
            uid_value,
            client,
            debug,
            url,
            open_browser,
        })
    }

    /// Order page for the client with `client_id`.
    pub fn order_url(&self, client_id: impl Display) -> String {
        build_url(&self.url, client_id)
    }
}

/// `debug=N` turns debugging on when the leading integer of `N` is positive.
pub fn debug_enabled(raw: Option<&str>) -> bool {
    raw.map_or(0, leading_integer) > 0
}

/// Parse the leading integer of `text`, `0` when there is none.
fn leading_integer(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}

/// Normalize `base` and append the order page for `client_id`.
///
/// Trailing `/` and `\` are dropped and `http://` is assumed when no scheme
/// is given.
pub fn build_url(base: &str, client_id: impl Display) -> String {
    let trimmed = base.trim_end_matches(['/', '\\']);
    let mut url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    url.push_str(ORDER_PATH);
    url.push_str(&format!("?client_id={client_id}"));
    url
}

fn require(args: &ArgMap, key: &str, expected: Shape, message: &str) -> Result<()> {
    let got = args.shape(key);
    if got == expected {
        Ok(())
    } else {
        Err(validation(message, expected, got))
    }
}

/// The scalar at `key`, if present; a nested `key.sub=` form is rejected.
fn optional<'a>(args: &'a ArgMap, key: &str, message: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_scalar()
            .map(Some)
            .ok_or_else(|| validation(message, Shape::Value, Shape::Mapping)),
    }
}

fn validation(message: &str, expected: Shape, got: Shape) -> Error {
    Error::Validation(ValidationError::new(message, expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: [&str; 8] = [
        "dbconf=/etc/erp/database.yml",
        "client.code=C1",
        "client.last_name=Doe",
        "client.company_id=1",
        "client.nature.name=Individual",
        "client.contact.email=a@b.com",
        "client.external_id=E1",
        "url=erp.example.com/",
    ];

    fn with(extra: &[&str]) -> Vec<String> {
        COMPLETE
            .iter()
            .chain(extra)
            .map(|s| (*s).to_string())
            .collect()
    }

    fn without(key: &str) -> Vec<String> {
        COMPLETE
            .iter()
            .filter(|t| !t.starts_with(key))
            .map(|s| (*s).to_string())
            .collect()
    }

    fn validation_of(tokens: Vec<String>) -> ValidationError {
        match Invocation::parse(tokens) {
            Err(Error::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn complete_invocation_uses_defaults() {
        let inv = Invocation::parse(with(&[])).unwrap();
        assert_eq!(inv.dbconf, PathBuf::from("/etc/erp/database.yml"));
        assert_eq!(inv.env, "production");
        assert_eq!(inv.uid, "external_id");
        assert_eq!(inv.uid_value, "E1");
        assert!(!inv.debug);
        assert!(inv.open_browser);
        assert_eq!(inv.client.scalar("code"), Some("C1"));
    }

    #[test]
    fn explicit_options() {
        let inv = Invocation::parse(with(&[
            "env=test",
            "uid=code",
            "debug=2",
            "open=0",
        ]))
        .unwrap();
        assert_eq!(inv.env, "test");
        assert_eq!(inv.uid, "code");
        assert_eq!(inv.uid_value, "C1");
        assert!(inv.debug);
        assert!(!inv.open_browser);
    }

    #[test]
    fn each_required_parameter_is_checked() {
        let v = validation_of(without("dbconf"));
        assert_eq!(v.message, "Needs 'dbconf=/path/to/database.yml' parameter");
        assert_eq!((v.expected, v.got), (Shape::Value, Shape::Missing));

        let v = validation_of(without("client.last_name"));
        assert_eq!(v.message, "Needs 'client.last_name=XXX' parameter");

        let v = validation_of(without("client.nature"));
        assert_eq!(v.message, "Needs 'client.nature.YYY=XXX' parameters");
        assert_eq!((v.expected, v.got), (Shape::Mapping, Shape::Missing));

        let v = validation_of(without("client.contact"));
        assert_eq!(v.message, "Needs 'client.contact.YYY=XXX' parameters");

        let v = validation_of(without("client.external_id"));
        assert_eq!(v.message, "Needs 'client.external_id=XXX' parameter");
    }

    #[test]
    fn client_must_be_a_mapping() {
        let v = validation_of(vec!["dbconf=x.yml".to_string(), "client=oops".to_string()]);
        assert_eq!(v.message, "Needs 'client.YYY=XXX' parameters");
        assert_eq!((v.expected, v.got), (Shape::Mapping, Shape::Value));
    }

    #[test]
    fn nature_name_must_be_a_value() {
        let v = validation_of(with(&["client.nature.name.fr=Particulier"]));
        assert_eq!(v.message, "Needs 'client.nature.name=XXX' parameter");
        assert_eq!(v.got, Shape::Mapping);
        assert_eq!(
            v.to_string(),
            "Needs 'client.nature.name=XXX' parameter (value expected, mapping got)"
        );
    }

    #[test]
    fn custom_uid_must_be_present() {
        let v = validation_of(with(&["uid=siret"]));
        assert_eq!(v.message, "Needs 'client.siret=XXX' parameter");
    }

    #[test]
    fn options_given_as_mappings_are_rejected() {
        for (token, message) in [
            ("env.name=test", "Needs 'env=NAME' parameter"),
            ("url.host=erp.example.com", "Needs 'url=URL' parameter"),
            ("open.now=0", "Needs 'open=0' parameter"),
            ("debug.level=1", "Needs 'debug=N' parameter"),
            ("uid.column=code", "Needs 'uid=COLUMN' parameter"),
        ] {
            let v = validation_of(with(&[token]));
            assert_eq!(v.message, message, "{token}");
            assert_eq!((v.expected, v.got), (Shape::Value, Shape::Mapping), "{token}");
        }
    }

    #[test]
    fn debug_uses_leading_integer() {
        assert!(!debug_enabled(None));
        assert!(!debug_enabled(Some("")));
        assert!(!debug_enabled(Some("0")));
        assert!(!debug_enabled(Some("-1")));
        assert!(!debug_enabled(Some("yes")));
        assert!(debug_enabled(Some("1")));
        assert!(debug_enabled(Some(" 3verbose")));
    }

    #[test]
    fn url_is_normalized() {
        assert_eq!(
            build_url("http://localhost:3000", 7),
            "http://localhost:3000/management/sales_order_create?client_id=7"
        );
        assert_eq!(
            build_url("erp.example.com/\\/", 7),
            "http://erp.example.com/management/sales_order_create?client_id=7"
        );
        assert_eq!(
            build_url("https://erp.example.com/app/", 12),
            "https://erp.example.com/app/management/sales_order_create?client_id=12"
        );

        let inv = Invocation::parse(with(&[])).unwrap();
        assert_eq!(
            inv.order_url(3),
            "http://erp.example.com/management/sales_order_create?client_id=3"
        );
    }
}
