//! `:command` registry: one entry per root view, plus quit.

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["home", "overview"],
    description: "Store overview and recent orders",
  },
  Command {
    name: "users",
    aliases: &["u", "user"],
    description: "Manage user accounts",
  },
  Command {
    name: "customers",
    aliases: &["c", "customer"],
    description: "Users with the customer role",
  },
  Command {
    name: "products",
    aliases: &["p", "product"],
    description: "Manage the product catalog",
  },
  Command {
    name: "orders",
    aliases: &["o", "order"],
    description: "Track and ship orders",
  },
  Command {
    name: "categories",
    aliases: &["cat", "category"],
    description: "Browse product categories",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit shopdesk",
  },
];

impl Command {
  fn is_named(&self, input: &str) -> bool {
    self.name == input || self.aliases.contains(&input)
  }

  /// How well `input` matches: 0 is an exact name, 5 a substring of an
  /// alias, None no match at all.
  fn rank(&self, input: &str) -> Option<u8> {
    let aliases = || self.aliases.iter();
    if self.name == input {
      Some(0)
    } else if aliases().any(|a| *a == input) {
      Some(1)
    } else if self.name.starts_with(input) {
      Some(2)
    } else if aliases().any(|a| a.starts_with(input)) {
      Some(3)
    } else if self.name.contains(input) {
      Some(4)
    } else if aliases().any(|a| a.contains(input)) {
      Some(5)
    } else {
      None
    }
  }
}

/// Look up a command by exact name or alias.
pub fn find(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS.iter().find(|cmd| cmd.is_named(&input))
}

/// Commands matching `input`, best match first. Empty input lists them all
/// in registry order.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| cmd.rank(&input).map(|rank| (rank, cmd)))
    .collect();
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}
