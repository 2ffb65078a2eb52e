//! `universe upgrade`: the flags every upgrade shares, and dispatch to the
//! `software` and `gflags` children.

use std::{fmt, io};

use clap::ArgMatches;
use tracing::{debug, info, warn};

use crate::command::{Action, Flag, Node, Resolved};
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::prompt::Confirm;

pub(crate) mod gflags;
pub(crate) mod software;

pub(crate) const NAME: &str = "upgrade";

const DEFAULT_DELAY: &str = "18";

pub(crate) fn command() -> Node {
    Node::new(NAME, "Upgrade a YugabyteDB Anywhere universe")
        .long_about("Upgrade a universe in YugabyteDB Anywhere")
        .child(software::command())
        .child(gflags::command())
        .flag(
            Flag::text(
                "name",
                "NAME",
                "[Required] The name of the universe to be upgraded.",
            )
            .short('n')
            .required()
            .persistent(),
        )
        .flag(
            Flag::bool(
                "force",
                "[Optional] Bypass the prompt for non-interactive usage.",
            )
            .short('f')
            .persistent(),
        )
        .flag(
            Flag::bool(
                "skip-validations",
                "[Optional] Skip validations before running the CLI command.",
            )
            .short('s')
            .persistent(),
        )
}

fn master_delay() -> Flag {
    Flag::number(
        "master-delay",
        "SECONDS",
        "[Optional] Seconds to wait after restarting each master.",
    )
    .default_value(DEFAULT_DELAY)
}

fn tserver_delay() -> Flag {
    Flag::number(
        "tserver-delay",
        "SECONDS",
        "[Optional] Seconds to wait after restarting each tserver.",
    )
    .default_value(DEFAULT_DELAY)
}

fn delays(matches: &ArgMatches) -> (u32, u32) {
    let get = |id| matches.get_one::<u32>(id).copied().unwrap_or_default();
    (get("master-delay"), get("tserver-delay"))
}

/// Flags declared on `universe upgrade` and inherited by both children
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct UpgradeFlags {
    pub(crate) name: String,
    pub(crate) force: bool,
    pub(crate) skip_validations: bool,
}

impl UpgradeFlags {
    fn from_resolved(resolved: &Resolved<'_>) -> Self {
        Self {
            // presence is checked by `Node::resolve`
            name: resolved.get_one::<String>("name").cloned().unwrap_or_default(),
            force: resolved.get_flag("force"),
            skip_validations: resolved.get_flag("skip-validations"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub(crate) enum UpgradeOption {
    #[default]
    #[serde(rename = "Rolling")]
    Rolling,
    #[serde(rename = "Non-Rolling")]
    NonRolling,
    #[serde(rename = "Non-Restart")]
    NonRestart,
}

impl UpgradeOption {
    fn from_matches(matches: &ArgMatches) -> Self {
        match matches.get_one::<String>("upgrade-option").map(String::as_str) {
            Some("Non-Rolling") => Self::NonRolling,
            Some("Non-Restart") => Self::NonRestart,
            _ => Self::Rolling,
        }
    }
}

impl fmt::Display for UpgradeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rolling => "Rolling",
            Self::NonRolling => "Non-Rolling",
            Self::NonRestart => "Non-Restart",
        })
    }
}

/// The request a child builds from its own flags
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum Child {
    Software(software::Args),
    Gflags(gflags::Args),
}

impl Child {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Software(_) => software::NAME,
            Self::Gflags(_) => gflags::NAME,
        }
    }

    fn validate(&self) -> Result<(), UpgradeError> {
        match self {
            Self::Software(args) => args.validate(),
            Self::Gflags(args) => args.validate(),
        }
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} upgrade", self.kind())?;
        match self {
            Self::Software(args) => write!(f, "{args}"),
            Self::Gflags(args) => write!(f, "{args}"),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Route {
    /// No child selected: show usage and succeed
    Help(String),
    Dispatch(Child, UpgradeFlags),
}

pub(crate) fn route(resolved: &Resolved<'_>) -> Route {
    if resolved.node().action == Action::Help {
        return Route::Help(resolved.help());
    }
    let matches = resolved.matches();
    let path = resolved.path();
    let child = match path.as_slice() {
        [.., NAME, software::NAME] => Child::Software(software::Args::from_matches(matches)),
        [.., NAME, gflags::NAME] => Child::Gflags(gflags::Args::from_matches(matches)),
        _ => unreachable!("no upgrade child handles {}", path.join(" ")),
    };
    let flags = UpgradeFlags::from_resolved(resolved);
    debug!("Dispatching to {} for universe {}", child.kind(), flags.name);
    Route::Dispatch(child, flags)
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UpgradeError {
    #[error("invalid YugabyteDB version '{0}', expected a version like 2.20.1.0-b97")]
    InvalidVersion(String),
    #[error("no gflags to upgrade, pass --master-gflags and/or --tserver-gflags")]
    NoGflags,
    #[error("invalid {server} gflag '{gflag}', expected <name>=<value>")]
    InvalidGflag { server: &'static str, gflag: String },
    #[error("upgrade of universe {0} aborted")]
    Aborted(String),
    #[error("failed to read confirmation: {0}")]
    Prompt(#[from] io::Error),
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

pub(crate) fn run(
    child: &Child,
    flags: &UpgradeFlags,
    plane: &mut dyn ControlPlane,
    confirm: &mut dyn Confirm,
) -> Result<(), UpgradeError> {
    if flags.skip_validations {
        warn!("Skipping validations for {} upgrade", child.kind());
    } else {
        child.validate()?;
        debug!("Validations passed");
    }
    if !flags.force {
        let question = format!("Upgrade universe {}\n{child}Continue?", flags.name);
        if !confirm.confirm(&question)? {
            return Err(UpgradeError::Aborted(flags.name.clone()));
        }
    }
    info!("Submitting {} upgrade of universe {}", child.kind(), flags.name);
    plane.submit(&flags.name, child)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;

    use clap::error::ErrorKind;

    use super::{Child, Route, UpgradeError, UpgradeFlags, UpgradeOption, gflags, run, software};
    use crate::cli;
    use crate::control_plane::{ControlPlane, ControlPlaneError};
    use crate::prompt::Confirm;

    const VERSION: &str = "2.20.1.0-b97";

    fn route(args: &[&str]) -> Result<Route, clap::Error> {
        let mut argv = vec!["yba", "universe", "upgrade"];
        argv.extend_from_slice(args);
        cli::resolve(argv).map(|invocation| invocation.route)
    }

    fn software_child() -> Child {
        Child::Software(software::Args {
            yb_db_version: String::from(VERSION),
            upgrade_option: UpgradeOption::Rolling,
            master_delay: 18,
            tserver_delay: 18,
        })
    }

    fn flags(name: &str, force: bool, skip_validations: bool) -> UpgradeFlags {
        UpgradeFlags {
            name: String::from(name),
            force,
            skip_validations,
        }
    }

    #[derive(Debug, Default)]
    struct Recorder(Vec<(String, Child)>);

    impl ControlPlane for Recorder {
        fn submit(&mut self, universe: &str, task: &Child) -> Result<(), ControlPlaneError> {
            self.0.push((universe.to_string(), task.clone()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Answer {
        yes: bool,
        asked: Vec<String>,
    }

    impl Answer {
        fn new(yes: bool) -> Self {
            Self {
                yes,
                asked: Vec::new(),
            }
        }
    }

    impl Confirm for Answer {
        fn confirm(&mut self, question: &str) -> io::Result<bool> {
            self.asked.push(question.to_string());
            Ok(self.yes)
        }
    }

    #[test]
    fn test_missing_name_fails_before_dispatch() {
        let cases: [&[&str]; 6] = [
            &[],
            &["-f", "-s"],
            &["software", "--yb-db-version", VERSION],
            &["software"],
            &["gflags"],
            &["gflags", "--master-gflags", "max_log_size=256", "-f"],
        ];
        for args in cases {
            let err = route(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument, "{args:?}");
        }
    }

    #[test]
    fn test_missing_name_is_reported() {
        let err = route(&["gflags", "-s"]).unwrap_err();
        assert!(err.to_string().contains("--name <NAME>"));
    }

    #[test]
    fn test_no_child_renders_help() {
        let Route::Help(help) = route(&["--name=U1"]).unwrap() else {
            panic!("expected help");
        };
        assert!(help.contains("software"));
        assert!(help.contains("gflags"));
        let name = help.find("--name").unwrap();
        let force = help.find("--force").unwrap();
        let skip = help.find("--skip-validations").unwrap();
        assert!(name < force);
        assert!(force < skip);
        assert!(help.contains("yba universe upgrade"));
    }

    #[test]
    fn test_dispatch_software_defaults() {
        assert_eq!(
            route(&["software", "--name=U1", "--yb-db-version", VERSION]).unwrap(),
            Route::Dispatch(software_child(), flags("U1", false, false))
        );
    }

    #[test]
    fn test_dispatch_gflags_with_switches() {
        assert_eq!(
            route(&["gflags", "--name=U2", "-f", "-s"]).unwrap(),
            Route::Dispatch(
                Child::Gflags(gflags::Args {
                    master_gflags: BTreeMap::new(),
                    tserver_gflags: BTreeMap::new(),
                    upgrade_option: UpgradeOption::Rolling,
                    master_delay: 18,
                    tserver_delay: 18,
                }),
                flags("U2", true, true)
            )
        );
    }

    #[test]
    fn test_short_and_long_forms_agree() {
        let short = route(&["software", "-n", "U3", "-f", "--yb-db-version", VERSION]).unwrap();
        let long = route(&["software", "--force", "--name=U3", "--yb-db-version", VERSION]).unwrap();
        let before_child =
            route(&["--force", "-n", "U3", "software", "--yb-db-version", VERSION]).unwrap();
        assert_eq!(short, long);
        assert_eq!(short, before_child);
        assert_eq!(short, Route::Dispatch(software_child(), flags("U3", true, false)));
    }

    #[test]
    fn test_dispatch_software_without_version() {
        let Route::Dispatch(child, flags_) = route(&["software", "--name=U1"]).unwrap() else {
            panic!("expected dispatch");
        };
        assert_eq!(
            child,
            Child::Software(software::Args {
                yb_db_version: String::new(),
                upgrade_option: UpgradeOption::Rolling,
                master_delay: 18,
                tserver_delay: 18,
            })
        );
        assert_eq!(flags_, flags("U1", false, false));

        let mut plane = Recorder::default();
        let err = run(&child, &flags("U1", true, false), &mut plane, &mut Answer::new(true))
            .unwrap_err();
        assert!(matches!(err, UpgradeError::InvalidVersion(ref v) if v.is_empty()));
        assert!(plane.0.is_empty());
    }

    #[test]
    fn test_bare_gflags_runs_only_when_skipping_validations() {
        let mut plane = Recorder::default();
        let Route::Dispatch(child, flags_) = route(&["gflags", "--name=U2", "-f"]).unwrap() else {
            panic!("expected dispatch");
        };
        let err = run(&child, &flags_, &mut plane, &mut Answer::new(true)).unwrap_err();
        assert!(matches!(err, UpgradeError::NoGflags));
        assert!(plane.0.is_empty());

        let Route::Dispatch(child, flags_) = route(&["gflags", "--name=U2", "-f", "-s"]).unwrap()
        else {
            panic!("expected dispatch");
        };
        run(&child, &flags_, &mut plane, &mut Answer::new(false)).unwrap();
        assert_eq!(child.kind(), gflags::NAME);
        assert_eq!(plane.0, [(String::from("U2"), child)]);
    }

    #[test]
    fn test_flags_bind_once_across_the_child() {
        let cases: [&[&str]; 3] = [
            &["-n", "U", "software", "--name", "V"],
            &["--name=U", "software", "-n", "U", "--yb-db-version", VERSION],
            &["-n", "U", "-f", "gflags", "--force"],
        ];
        for args in cases {
            let err = route(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "{args:?}");
        }
    }

    #[test]
    fn test_name_binds_once() {
        assert!(route(&["software", "-n", "a", "-n", "b", "--yb-db-version", VERSION]).is_err());
    }

    #[test]
    fn test_run_validates() {
        let child = Child::Software(software::Args {
            yb_db_version: String::from("latest"),
            ..software::Args::default()
        });
        let mut plane = Recorder::default();
        let mut answer = Answer::new(true);
        let err = run(&child, &flags("U1", true, false), &mut plane, &mut answer).unwrap_err();
        assert!(matches!(err, UpgradeError::InvalidVersion(ref v) if v == "latest"));
        assert!(plane.0.is_empty());

        run(&child, &flags("U1", true, true), &mut plane, &mut answer).unwrap();
        assert_eq!(plane.0, [(String::from("U1"), child)]);
    }

    #[test]
    fn test_run_asks_unless_forced() {
        let child = software_child();
        let mut plane = Recorder::default();

        let mut answer = Answer::new(false);
        let err = run(&child, &flags("U1", false, false), &mut plane, &mut answer).unwrap_err();
        assert!(matches!(err, UpgradeError::Aborted(ref name) if name == "U1"));
        assert_eq!(answer.asked.len(), 1);
        assert!(answer.asked[0].contains(VERSION));
        assert!(plane.0.is_empty());

        let mut answer = Answer::new(true);
        run(&child, &flags("U1", false, false), &mut plane, &mut answer).unwrap();
        assert_eq!(answer.asked.len(), 1);
        assert_eq!(plane.0.len(), 1);

        let mut answer = Answer::new(false);
        run(&child, &flags("U1", true, false), &mut plane, &mut answer).unwrap();
        assert!(answer.asked.is_empty());
        assert_eq!(plane.0.len(), 2);
    }
}
