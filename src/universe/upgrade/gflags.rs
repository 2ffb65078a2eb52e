use std::collections::BTreeMap;
use std::fmt;

use clap::ArgMatches;
use tracing::trace;

use super::{UpgradeError, UpgradeOption};
use crate::command::{Flag, Node};

pub(crate) const NAME: &str = "gflags";

const UPGRADE_OPTIONS: &[&str] = &["Rolling", "Non-Rolling", "Non-Restart"];

pub(super) fn command() -> Node {
    Node::new(NAME, "Gflags upgrade for a YugabyteDB Anywhere universe")
        .long_about("Change the gflags of the master and tserver processes of a universe")
        .runs()
        .flag(Flag::text(
            "master-gflags",
            "GFLAGS",
            "[Optional] Master gflags as comma-separated name=value pairs.",
        ))
        .flag(Flag::text(
            "tserver-gflags",
            "GFLAGS",
            "[Optional] Tserver gflags as comma-separated name=value pairs.",
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
    pub(crate) master_gflags: BTreeMap<String, String>,
    pub(crate) tserver_gflags: BTreeMap<String, String>,
    pub(crate) upgrade_option: UpgradeOption,
    pub(crate) master_delay: u32,
    pub(crate) tserver_delay: u32,
}

/// Lenient: malformed entries are kept so that validation can report them
/// (or pass them through with `--skip-validations`).
fn parse_gflags(s: &str) -> BTreeMap<String, String> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

fn is_gflag_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Args {
    pub(super) fn from_matches(matches: &ArgMatches) -> Self {
        let gflags = |id| {
            matches
                .get_one::<String>(id)
                .map(|s| parse_gflags(s))
                .unwrap_or_default()
        };
        let (master_delay, tserver_delay) = super::delays(matches);
        Self {
            master_gflags: gflags("master-gflags"),
            tserver_gflags: gflags("tserver-gflags"),
            upgrade_option: UpgradeOption::from_matches(matches),
            master_delay,
            tserver_delay,
        }
    }

    pub(super) fn validate(&self) -> Result<(), UpgradeError> {
        if self.master_gflags.is_empty() && self.tserver_gflags.is_empty() {
            return Err(UpgradeError::NoGflags);
        }
        for (server, gflags) in [("master", &self.master_gflags), ("tserver", &self.tserver_gflags)] {
            for (name, value) in gflags {
                trace!("Validating {server} gflag {name}");
                if !is_gflag_name(name) || value.is_empty() {
                    let gflag = if value.is_empty() {
                        name.clone()
                    } else {
                        format!("{name}={value}")
                    };
                    return Err(UpgradeError::InvalidGflag { server, gflag });
                }
            }
        }
        Ok(())
    }
}

fn write_gflags(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    gflags: &BTreeMap<String, String>,
) -> fmt::Result {
    write!(f, "  {label}: ")?;
    if gflags.is_empty() {
        return writeln!(f, "(none)");
    }
    for (i, (name, value)) in gflags.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{name}={value}")?;
    }
    writeln!(f)
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  upgrade-option: {}", self.upgrade_option)?;
        write_gflags(f, "master-gflags", &self.master_gflags)?;
        write_gflags(f, "tserver-gflags", &self.tserver_gflags)?;
        writeln!(f, "  master-delay: {}s", self.master_delay)?;
        writeln!(f, "  tserver-delay: {}s", self.tserver_delay)
    }
}
