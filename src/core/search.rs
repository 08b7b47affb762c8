// src/core/search.rs

use std::cmp::Reverse;

use thiserror::Error;

use crate::models::{CommandId, CommandTree, Component, ModuleId, Token};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Unknown command '{name}'{}.", in_path(.path))]
    NotFound { name: String, path: String },
    #[error("'{path}' needs a subcommand.")]
    MissingSubcommand { path: String },
}

fn in_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" in '{}'", path)
    }
}

type SearchResult<T> = Result<T, SearchError>;

/// Overloads matching the input, best first, and the tokens left for them.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub candidates: Vec<CommandId>,
    pub arguments: Vec<Token>,
    /// Group aliases and the command alias as typed, e.g. `["math", "add"]`.
    pub path: Vec<String>,
}

pub fn search(tree: &CommandTree, name: &str, tokens: &[Token]) -> SearchResult<SearchMatch> {
    let top: Vec<Component> = tree.roots().iter().map(|id| Component::Module(*id)).collect();
    search_level(tree, &top, name, tokens, &[])
}

fn search_level(
    tree: &CommandTree,
    level: &[Component],
    name: &str,
    tokens: &[Token],
    path: &[String],
) -> SearchResult<SearchMatch> {
    let mut commands = Vec::new();
    let mut groups = Vec::new();
    flatten(tree, level, &mut commands, &mut groups);

    let mut path = path.to_vec();
    path.push(name.to_string());

    let mut candidates: Vec<CommandId> = commands
        .into_iter()
        .filter(|id| tree.command(*id).matches(name))
        .collect();
    if !candidates.is_empty() {
        order_candidates(tree, &mut candidates);
        log::debug!("'{}' matched {} overload(s).", path.join(" "), candidates.len());
        return Ok(SearchMatch {
            candidates,
            arguments: tokens.to_vec(),
            path,
        });
    }

    groups.retain(|id| tree.module(*id).matches(name));
    if groups.is_empty() {
        path.pop();
        return Err(SearchError::NotFound {
            name: name.to_string(),
            path: path.join(" "),
        });
    }

    let Some((Token::Text(next), rest)) = tokens.split_first() else {
        return Err(SearchError::MissingSubcommand {
            path: path.join(" "),
        });
    };

    // Stable sort: equally populated groups keep declaration order.
    groups.sort_by_key(|id| Reverse(tree.command_count(*id)));

    let mut last_error = None;
    for group in groups {
        let children = &tree.module(group).children;
        match search_level(tree, children, next, rest, &path) {
            Ok(found) => return Ok(found),
            Err(error) => {
                log::debug!("Group '{}' did not resolve '{}': {}", tree.module(group).name, next, error);
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| SearchError::NotFound {
        name: next.clone(),
        path: path.join(" "),
    }))
}

/// Commands and group modules reachable at this level; plain modules are see-through.
fn flatten(
    tree: &CommandTree,
    level: &[Component],
    commands: &mut Vec<CommandId>,
    groups: &mut Vec<ModuleId>,
) {
    for component in level {
        match component {
            Component::Command(id) => commands.push(*id),
            Component::Module(id) => {
                let module = tree.module(*id);
                if module.group {
                    groups.push(*id);
                } else {
                    flatten(tree, &module.children, commands, groups);
                }
            }
        }
    }
}

/// Error overloads last, then fewer positional parameters, higher priority,
/// and declaration order.
pub fn order_candidates(tree: &CommandTree, candidates: &mut [CommandId]) {
    candidates.sort_by_key(|id| {
        let command = tree.command(*id);
        (
            command.error_overload,
            command.positional_parameters().count(),
            Reverse(command.priority),
            *id,
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{CommandBuilder, ModuleBuilder, ParameterDescriptor, build_tree};
    use crate::models::{CommandModule, CommandOutput};

    #[derive(Default)]
    struct Host;

    impl CommandModule for Host {}

    fn command(name: &str) -> CommandBuilder<Host> {
        CommandBuilder::new(name).sync_handler(|_, _, _| Ok(CommandOutput::Unit))
    }

    fn tree() -> CommandTree {
        let root = ModuleBuilder::<Host>::new("root")
            .default_constructor()
            .command(command("cmd").error_overload())
            .command(command("cmd").parameter(ParameterDescriptor::new::<i64>("a")).parameter(ParameterDescriptor::new::<i64>("b")))
            .command(command("cmd").parameter(ParameterDescriptor::new::<i64>("a")))
            .command(command("pick").parameter(ParameterDescriptor::new::<i64>("a")))
            .command(command("pick").parameter(ParameterDescriptor::new::<String>("a")).priority(5))
            .submodule(
                ModuleBuilder::<Host>::group("g").default_constructor().submodule(
                    ModuleBuilder::<Host>::group("gg").default_constructor().command(command("c")),
                ),
            )
            .submodule(ModuleBuilder::<Host>::group("dup").default_constructor().command(command("a")))
            .submodule(
                ModuleBuilder::<Host>::group("dup")
                    .default_constructor()
                    .command(command("b"))
                    .command(command("c")),
            );
        build_tree(vec![root.into_descriptor()]).unwrap()
    }

    fn arity(tree: &CommandTree, id: CommandId) -> (bool, usize) {
        let command = tree.command(id);
        (command.error_overload, command.parameters.len())
    }

    #[test]
    fn overloads_are_ordered() {
        let tree = tree();
        let found = search(&tree, "CMD", &[Token::from("1")]).unwrap();
        let order: Vec<_> = found.candidates.iter().map(|id| arity(&tree, *id)).collect();
        assert_eq!(order, vec![(false, 1), (false, 2), (true, 0)]);
        assert_eq!(found.arguments.len(), 1);
    }

    #[test]
    fn priority_breaks_ties() {
        let tree = tree();
        let found = search(&tree, "pick", &[]).unwrap();
        assert_eq!(tree.command(found.candidates[0]).priority, 5);
    }

    #[test]
    fn groups_recurse() {
        let tree = tree();
        let found = search(&tree, "g", &[Token::from("gg"), Token::from("c"), Token::from("x")]).unwrap();
        assert_eq!(found.path, vec!["g", "gg", "c"]);
        assert_eq!(found.arguments.len(), 1);

        assert!(matches!(
            search(&tree, "g", &[Token::from("c")]),
            Err(SearchError::NotFound { .. })
        ));
        assert_eq!(
            search(&tree, "g", &[]).unwrap_err(),
            SearchError::MissingSubcommand { path: "g".to_string() }
        );
    }

    #[test]
    fn same_named_groups_fall_back() {
        let tree = tree();
        assert!(search(&tree, "dup", &[Token::from("a")]).is_ok());
        assert!(search(&tree, "dup", &[Token::from("b")]).is_ok());
    }

    #[test]
    fn unknown_names_fail() {
        let err = search(&tree(), "nope", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown command 'nope'.");
    }
}
