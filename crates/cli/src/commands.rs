//! Line-oriented commands over the distributed map.

use corelib::Ring;
use meshmap::MeshMap;
use std::fmt;

pub const HELP: &str = "\
commands:
  put <key> <value>   store a value
  get <key>           read a value
  rm <key>            remove a key
  has <key>           check whether a key is present
  size                count entries across the cluster
  keys                list every key
  entries             list every entry
  clear               remove every entry on every node
  nodes               list ring members in placement order
  self                show this node
  help                show this text
  quit                leave the cluster and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Has { key: String },
    Size,
    Keys,
    Entries,
    Clear,
    Nodes,
    SelfNode,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    Usage(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::Unknown(name) => write!(f, "unknown command '{}', try 'help'", name),
            ParseError::Usage(usage) => write!(f, "usage: {}", usage),
        }
    }
}

impl std::error::Error for ParseError {}

impl Command {
    /// Parses one input line. The value of `put` is the rest of the line, so
    /// it may contain spaces.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let single_key = |usage: &'static str| -> Result<String, ParseError> {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                Err(ParseError::Usage(usage))
            } else {
                Ok(rest.to_string())
            }
        };
        let no_args = |command: Command, usage: &'static str| -> Result<Command, ParseError> {
            if rest.is_empty() {
                Ok(command)
            } else {
                Err(ParseError::Usage(usage))
            }
        };

        match name {
            "" => Err(ParseError::Empty),
            "put" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => Ok(Command::Put {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                }),
                _ => Err(ParseError::Usage("put <key> <value>")),
            },
            "get" => single_key("get <key>").map(|key| Command::Get { key }),
            "rm" => single_key("rm <key>").map(|key| Command::Remove { key }),
            "has" => single_key("has <key>").map(|key| Command::Has { key }),
            "size" => no_args(Command::Size, "size"),
            "keys" => no_args(Command::Keys, "keys"),
            "entries" => no_args(Command::Entries, "entries"),
            "clear" => no_args(Command::Clear, "clear"),
            "nodes" => no_args(Command::Nodes, "nodes"),
            "self" => no_args(Command::SelfNode, "self"),
            "help" => no_args(Command::Help, "help"),
            "quit" | "exit" => no_args(Command::Quit, "quit"),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }

    /// Runs the command against `map` and renders its outcome.
    pub async fn execute(&self, map: &MeshMap<String, String>) -> anyhow::Result<CommandResult> {
        let output = match self {
            Command::Put { key, value } => {
                map.put(key.clone(), value.clone()).await?;
                "OK".to_string()
            }
            Command::Get { key } => match map.get(key).await? {
                Some(value) => value,
                None => "(nil)".to_string(),
            },
            Command::Remove { key } => match map.remove(key).await? {
                Some(value) => format!("removed {}", value),
                None => "(nil)".to_string(),
            },
            Command::Has { key } => map.contains_key(key).await?.to_string(),
            Command::Size => map.size().await?.to_string(),
            Command::Keys => {
                let mut keys: Vec<String> = map.key_set().await?.into_iter().collect();
                keys.sort();
                keys.join("\n")
            }
            Command::Entries => {
                let mut entries: Vec<(String, String)> = map.entry_set().await?.into_iter().collect();
                entries.sort();
                entries
                    .iter()
                    .map(|(key, value)| format!("{} = {}", key, value))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Command::Clear => {
                map.clear().await?;
                "OK".to_string()
            }
            Command::Nodes => map
                .ring()
                .all_nodes()?
                .iter()
                .map(|node| format!("{} @ {}", node, node.placement()))
                .collect::<Vec<_>>()
                .join("\n"),
            Command::SelfNode => {
                let node = map.self_node();
                format!("{} @ {}", node, node.placement())
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(CommandResult::Quit),
        };
        Ok(CommandResult::Output(output))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Output(String),
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::MemoryDirectory;
    use meshmap::{MeshNode, NodeConfig};
    use std::sync::Arc;

    #[test]
    fn test_parse_put_keeps_spaces_in_value() {
        assert_eq!(
            Command::parse("put greeting hello there  world").unwrap(),
            Command::Put {
                key: "greeting".into(),
                value: "hello there  world".into()
            }
        );
    }

    #[test]
    fn test_parse_single_key_commands() {
        assert_eq!(Command::parse("get a").unwrap(), Command::Get { key: "a".into() });
        assert_eq!(Command::parse("  rm   a ").unwrap(), Command::Remove { key: "a".into() });
        assert_eq!(Command::parse("has a").unwrap(), Command::Has { key: "a".into() });
        assert_eq!(Command::parse("get a b"), Err(ParseError::Usage("get <key>")));
        assert_eq!(Command::parse("get"), Err(ParseError::Usage("get <key>")));
    }

    #[test]
    fn test_parse_bare_commands() {
        assert_eq!(Command::parse("size").unwrap(), Command::Size);
        assert_eq!(Command::parse("nodes").unwrap(), Command::Nodes);
        assert_eq!(Command::parse("self").unwrap(), Command::SelfNode);
        assert_eq!(Command::parse("exit").unwrap(), Command::Quit);
        assert_eq!(Command::parse("size 3"), Err(ParseError::Usage("size")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(Command::parse("put k"), Err(ParseError::Usage("put <key> <value>")));
        assert_eq!(
            Command::parse("frobnicate x"),
            Err(ParseError::Unknown("frobnicate".into()))
        );
    }

    #[tokio::test]
    async fn test_execute_against_single_node() {
        let directory = MemoryDirectory::new();
        let mut node = MeshNode::<String, String>::join(&NodeConfig::default(), Arc::new(directory))
            .await
            .unwrap();
        let map = node.map();

        let run = |line: &str| Command::parse(line).unwrap();
        assert_eq!(
            run("put a 1").execute(map).await.unwrap(),
            CommandResult::Output("OK".into())
        );
        assert_eq!(
            run("get a").execute(map).await.unwrap(),
            CommandResult::Output("1".into())
        );
        assert_eq!(
            run("size").execute(map).await.unwrap(),
            CommandResult::Output("1".into())
        );
        assert_eq!(
            run("rm a").execute(map).await.unwrap(),
            CommandResult::Output("removed 1".into())
        );
        assert_eq!(
            run("get a").execute(map).await.unwrap(),
            CommandResult::Output("(nil)".into())
        );
        assert_eq!(run("quit").execute(map).await.unwrap(), CommandResult::Quit);

        node.leave().await.unwrap();
    }
}
