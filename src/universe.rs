use crate::command::Node;

pub(crate) mod upgrade;

pub(crate) fn command() -> Node {
    Node::new("universe", "Manage YugabyteDB Anywhere universes")
        .long_about("Manage the universes of a YugabyteDB Anywhere installation")
        .child(upgrade::command())
}
