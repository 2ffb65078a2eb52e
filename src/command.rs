//! An immutable command tree, lowered to [`clap`] for parsing and help.
//!
//! Persistent flags are not lowered as `clap` global arguments. Each one is
//! declared again on every descendant of the node that owns it, so every level
//! of the parsed matches records only what was bound at that level.
//! [`Node::resolve`] then merges the levels: it checks requiredness (`clap`
//! global arguments cannot be required) and rejects a flag bound at more than
//! one level.

use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Scope {
    Local,
    /// Visible to every descendant of the declaring node
    Persistent,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Kind {
    Bool,
    Count,
    Text,
    Number,
    Choice(&'static [&'static str]),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Flag {
    pub(crate) name: &'static str,
    pub(crate) short: Option<char>,
    pub(crate) kind: Kind,
    pub(crate) default: Option<&'static str>,
    pub(crate) required: bool,
    pub(crate) scope: Scope,
    help: &'static str,
    value_name: Option<&'static str>,
}

impl Flag {
    fn new(name: &'static str, kind: Kind, help: &'static str) -> Self {
        Self {
            name,
            short: None,
            kind,
            default: None,
            required: false,
            scope: Scope::Local,
            help,
            value_name: None,
        }
    }

    pub(crate) fn bool(name: &'static str, help: &'static str) -> Self {
        Self {
            default: Some("false"),
            ..Self::new(name, Kind::Bool, help)
        }
    }

    pub(crate) fn count(name: &'static str, help: &'static str) -> Self {
        Self {
            default: Some("0"),
            ..Self::new(name, Kind::Count, help)
        }
    }

    pub(crate) fn text(name: &'static str, value_name: &'static str, help: &'static str) -> Self {
        Self {
            value_name: Some(value_name),
            ..Self::new(name, Kind::Text, help)
        }
    }

    pub(crate) fn number(name: &'static str, value_name: &'static str, help: &'static str) -> Self {
        Self {
            value_name: Some(value_name),
            ..Self::new(name, Kind::Number, help)
        }
    }

    pub(crate) fn choice(
        name: &'static str,
        values: &'static [&'static str],
        help: &'static str,
    ) -> Self {
        Self::new(name, Kind::Choice(values), help)
    }

    #[must_use]
    pub(crate) fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    #[must_use]
    pub(crate) fn default_value(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub(crate) fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub(crate) fn persistent(mut self) -> Self {
        self.scope = Scope::Persistent;
        self
    }

    fn usage(&self) -> String {
        match self.kind {
            Kind::Bool | Kind::Count => format!("--{}", self.name),
            _ => format!("--{} <{}>", self.name, self.value_name.unwrap_or(self.name)),
        }
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name).long(self.name).help(self.help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(value_name) = self.value_name {
            arg = arg.value_name(value_name);
        }
        arg = match self.kind {
            Kind::Bool => arg.action(ArgAction::SetTrue),
            Kind::Count => arg.action(ArgAction::Count),
            Kind::Text => arg.action(ArgAction::Set),
            Kind::Number => arg
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32)),
            Kind::Choice(values) => arg
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(values.iter().copied())),
        };
        if let (Some(default), Kind::Text | Kind::Number | Kind::Choice(_)) =
            (self.default, self.kind)
        {
            arg = arg.default_value(default);
        }
        match self.scope {
            Scope::Local => arg.required(self.required),
            Scope::Persistent => arg,
        }
    }
}

/// Whether `id` got a value from the command line at this level, as opposed to
/// from its default.
fn is_bound(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(source) if source != ValueSource::DefaultValue
    )
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Action {
    /// Render the node's help and succeed
    Help,
    Run,
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) name: &'static str,
    about: &'static str,
    long_about: Option<&'static str>,
    pub(crate) children: Vec<Node>,
    pub(crate) flags: Vec<Flag>,
    pub(crate) action: Action,
}

impl Node {
    pub(crate) fn new(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            about,
            long_about: None,
            children: Vec::new(),
            flags: Vec::new(),
            action: Action::Help,
        }
    }

    #[must_use]
    pub(crate) fn long_about(mut self, long_about: &'static str) -> Self {
        self.long_about = Some(long_about);
        self
    }

    #[must_use]
    pub(crate) fn child(mut self, child: Node) -> Self {
        debug_assert!(self.child_named(child.name).is_none());
        self.children.push(child);
        self
    }

    #[must_use]
    pub(crate) fn flag(mut self, flag: Flag) -> Self {
        debug_assert!(self.flags.iter().all(|f| f.name != flag.name));
        self.flags.push(flag);
        self
    }

    #[must_use]
    pub(crate) fn runs(mut self) -> Self {
        self.action = Action::Run;
        self
    }

    pub(crate) fn child_named(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn to_clap(&self) -> clap::Command {
        self.lower(&[])
    }

    /// `inherited` are the persistent flags of this node's ancestors, listed
    /// under their own help heading.
    fn lower(&self, inherited: &[&Flag]) -> clap::Command {
        let mut cmd = clap::Command::new(self.name).about(self.about);
        if let Some(long_about) = self.long_about {
            cmd = cmd.long_about(long_about);
        }
        for flag in &self.flags {
            cmd = cmd.arg(flag.to_arg());
        }
        if !inherited.is_empty() {
            cmd = cmd.next_help_heading("Global Options");
            for flag in inherited {
                cmd = cmd.arg(flag.to_arg());
            }
        }
        let mut visible = inherited.to_vec();
        visible.extend(self.flags.iter().filter(|f| f.scope == Scope::Persistent));
        for child in &self.children {
            cmd = cmd.subcommand(child.lower(&visible));
        }
        cmd
    }

    fn declares(&self, id: &str) -> bool {
        self.flags
            .iter()
            .any(|f| f.name == id && f.scope == Scope::Persistent)
    }

    /// Find the deepest node selected by `matches`, and check that every
    /// persistent flag on the way there is bound at most once, and at least
    /// once if it is required.
    pub(crate) fn resolve<'a>(
        &'a self,
        matches: &'a ArgMatches,
    ) -> Result<Resolved<'a>, clap::Error> {
        let mut nodes = vec![self];
        let mut levels = vec![matches];
        let mut node = self;
        let mut matches = matches;
        while let Some((name, sub)) = matches.subcommand() {
            let Some(child) = node.child_named(name) else {
                break;
            };
            trace!("Descending into {name}");
            nodes.push(child);
            levels.push(sub);
            node = child;
            matches = sub;
        }
        let resolved = Resolved { nodes, levels };

        let mut repeated = Vec::new();
        let mut missing = Vec::new();
        for flag in resolved.persistent_flags() {
            let bound = resolved.bindings(flag.name).len();
            if bound > 1 && flag.kind != Kind::Count {
                repeated.push(flag.usage());
            } else if bound == 0 && flag.required {
                missing.push(flag.usage());
            }
        }
        if let Some(usage) = repeated.first() {
            debug!("Flags bound at more than one level: {}", repeated.join(", "));
            return Err(resolved.command().error(
                ErrorKind::ArgumentConflict,
                format!("the argument '{usage}' cannot be used multiple times"),
            ));
        }
        if !missing.is_empty() {
            debug!("Missing required flags: {}", missing.join(", "));
            return Err(resolved.command().error(
                ErrorKind::MissingRequiredArgument,
                format!(
                    "the following required arguments were not provided:\n  {}",
                    missing.join("\n  ")
                ),
            ));
        }
        Ok(resolved)
    }
}

/// The path selected by one parse, with the matches of every level on it.
#[derive(Debug)]
pub(crate) struct Resolved<'a> {
    /// Root first, selected node last; never empty
    nodes: Vec<&'a Node>,
    levels: Vec<&'a ArgMatches>,
}

impl<'a> Resolved<'a> {
    pub(crate) fn path(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.name).collect()
    }

    pub(crate) fn node(&self) -> &'a Node {
        self.nodes[self.nodes.len() - 1]
    }

    /// Matches of the selected node, holding its local flags.
    pub(crate) fn matches(&self) -> &'a ArgMatches {
        self.levels[self.levels.len() - 1]
    }

    fn persistent_flags(&self) -> impl Iterator<Item = &'a Flag> {
        self.nodes
            .iter()
            .copied()
            .flat_map(|n| &n.flags)
            .filter(|f| f.scope == Scope::Persistent)
    }

    /// Matches of each level at which the persistent flag `id` was bound.
    fn bindings(&self, id: &str) -> Vec<&'a ArgMatches> {
        let Some(declared) = self.nodes.iter().position(|n| n.declares(id)) else {
            return Vec::new();
        };
        self.levels[declared..]
            .iter()
            .copied()
            .filter(|m| is_bound(m, id))
            .collect()
    }

    /// Value of a flag, from wherever on the path it was bound, else its
    /// default.
    pub(crate) fn get_one<T>(&self, id: &str) -> Option<&'a T>
    where
        T: std::any::Any + Clone + Send + Sync + 'static,
    {
        self.bindings(id)
            .first()
            .copied()
            .unwrap_or(self.matches())
            .get_one::<T>(id)
    }

    pub(crate) fn get_flag(&self, id: &str) -> bool {
        self.get_one::<bool>(id).copied().unwrap_or_default()
    }

    /// Occurrences of a count flag, summed over every level.
    pub(crate) fn get_count(&self, id: &str) -> u8 {
        self.bindings(id)
            .iter()
            .map(|m| m.get_count(id))
            .fold(0, u8::saturating_add)
    }

    fn command(&self) -> clap::Command {
        let inherited = self.nodes[..self.nodes.len() - 1]
            .iter()
            .copied()
            .flat_map(|n| &n.flags)
            .filter(|f| f.scope == Scope::Persistent)
            .collect::<Vec<_>>();
        self.node()
            .lower(&inherited)
            .bin_name(self.path().join(" "))
    }

    pub(crate) fn help(&self) -> String {
        self.command().render_help().to_string()
    }
}
