use std::fmt;

use clap::ArgMatches;

use super::{UpgradeError, UpgradeOption};
use crate::command::{Flag, Node};

pub(crate) const NAME: &str = "software";

const UPGRADE_OPTIONS: &[&str] = &["Rolling", "Non-Rolling"];

pub(super) fn command() -> Node {
    Node::new(NAME, "Software upgrade for a YugabyteDB Anywhere universe")
        .long_about("Upgrade the YugabyteDB version running on every node of a universe")
        .runs()
        .flag(Flag::text(
            "yb-db-version",
            "VERSION",
            "YugabyteDB version to upgrade to. Checked unless --skip-validations is set.",
        ))
        .flag(
            Flag::choice(
                "upgrade-option",
                UPGRADE_OPTIONS,
                "[Optional] Upgrade option.",
            )
            .default_value("Rolling"),
        )
        .flag(super::master_delay())
        .flag(super::tserver_delay())
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Args {
    pub(crate) yb_db_version: String,
    pub(crate) upgrade_option: UpgradeOption,
    pub(crate) master_delay: u32,
    pub(crate) tserver_delay: u32,
}

impl Args {
    pub(super) fn from_matches(matches: &ArgMatches) -> Self {
        let (master_delay, tserver_delay) = super::delays(matches);
        Self {
            yb_db_version: matches
                .get_one::<String>("yb-db-version")
                .cloned()
                .unwrap_or_default(),
            upgrade_option: UpgradeOption::from_matches(matches),
            master_delay,
            tserver_delay,
        }
    }

    pub(super) fn validate(&self) -> Result<(), UpgradeError> {
        if is_version(&self.yb_db_version) {
            Ok(())
        } else {
            Err(UpgradeError::InvalidVersion(self.yb_db_version.clone()))
        }
    }
}

/// `2.20.1.0-b97`, `2.20.1.0`, `2.20`, ...
fn is_version(s: &str) -> bool {
    let (base, build) = match s.split_once("-b") {
        Some((base, build)) => (base, Some(build)),
        None => (s, None),
    };
    let numeric = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    let parts = base.split('.').collect::<Vec<_>>();
    (2..=4).contains(&parts.len()) && parts.into_iter().all(numeric) && build.is_none_or(numeric)
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  yb-db-version: {}", self.yb_db_version)?;
        writeln!(f, "  upgrade-option: {}", self.upgrade_option)?;
        writeln!(f, "  master-delay: {}s", self.master_delay)?;
        writeln!(f, "  tserver-delay: {}s", self.tserver_delay)
    }
}
