use std::ffi::OsString;
use std::path::PathBuf;

use crate::command::{Flag, Node};
use crate::universe::{self, upgrade::Route};

/// The whole command tree, built once per process.
pub(crate) fn command() -> Node {
    Node::new("yba", "YugabyteDB Anywhere command line")
        .flag(
            Flag::count(
                "verbose",
                "Verbose mode: use multiple times for increased verbosity",
            )
            .short('v')
            .persistent(),
        )
        .flag(
            Flag::text(
                "config",
                "PATH",
                "Config file with the YugabyteDB Anywhere host and API token",
            )
            .persistent(),
        )
        .child(universe::command())
}

#[derive(Debug)]
pub(crate) struct Invocation {
    pub(crate) verbose: u8,
    pub(crate) config: Option<PathBuf>,
    pub(crate) route: Route,
}

pub(crate) fn resolve<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let tree = command();
    let matches = tree
        .to_clap()
        .version(env!("CARGO_PKG_VERSION"))
        .try_get_matches_from(args)?;
    let resolved = tree.resolve(&matches)?;
    Ok(Invocation {
        verbose: resolved.get_count("verbose"),
        config: resolved.get_one::<String>("config").map(PathBuf::from),
        route: universe::upgrade::route(&resolved),
    })
}
