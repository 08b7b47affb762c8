// src/core/builder.rs

//! Registration API and tree construction.
//!
//! Modules and commands are declared with [`ModuleBuilder`] and
//! [`CommandBuilder`], which erase the handler type into descriptors.
//! [`build_tree`] validates the descriptors and lays them out in a
//! [`CommandTree`]. Every configuration mistake is reported here, never at
//! execution time.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;

use crate::core::context::CommandContext;
use crate::core::preconditions::Precondition;
use crate::models::component::{
    ErasedHooks, ErasedInvoke, SyncInvoker, TypedHooks, TypedInvoker,
};
use crate::models::value::type_of;
use crate::models::{
    Arguments, Command, CommandFuture, CommandId, CommandModule, CommandOutput, CommandTree,
    ComplexParameter, Component, Module, ModuleConstructor, ModuleId, Parameter, ParameterKind,
    ReturnKind, Value, ValueFactory, ValueType,
};
use crate::readers::TypeReader;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Module '{module}' has commands but no constructor.")]
    MissingConstructor { module: String },
    #[error("Command '{command}' has no handler.")]
    MissingHandler { command: String },
    #[error("Alias '{alias}' is declared twice on '{component}'.")]
    DuplicateAlias { component: String, alias: String },
    #[error("Remainder parameter '{parameter}' of '{command}' must be the last positional parameter.")]
    RemainderNotLast { command: String, parameter: String },
    #[error("Command '{command}' declares more than one remainder parameter.")]
    MultipleRemainders { command: String },
    #[error("Remainder parameter '{parameter}' of '{command}' must be a String or carry its own reader.")]
    RemainderNotString { command: String, parameter: String },
    #[error("Complex parameter '{parameter}' of '{owner}' has no child parameters.")]
    EmptyComplexParameter { owner: String, parameter: String },
    #[error("Complex parameter '{parameter}' of '{owner}' has no constructor.")]
    MissingParameterConstructor { owner: String, parameter: String },
    #[error("Constructor for '{component}' produces '{produced}' but '{expected}' is declared.")]
    ConstructorTypeMismatch {
        component: String,
        expected: String,
        produced: String,
    },
    #[error("Child '{child}' of complex parameter '{parameter}' cannot be a remainder or named parameter.")]
    InvalidComplexChild { parameter: String, child: String },
    #[error("Named parameter '{parameter}' of '{owner}' cannot be complex.")]
    NamedComplex { owner: String, parameter: String },
    #[error("Required parameter '{parameter}' of '{owner}' follows an optional one.")]
    RequiredAfterOptional { owner: String, parameter: String },
    #[error("Default value of '{parameter}' on '{owner}' is not a '{expected}'.")]
    DefaultTypeMismatch {
        owner: String,
        parameter: String,
        expected: String,
    },
}

pub type BuildResult<T> = Result<T, BuildError>;

// --- Parameters ---

/// One way of building a complex parameter's value from its children.
#[derive(Clone)]
pub struct ComplexConstructor {
    parameters: Vec<ParameterDescriptor>,
    primary: bool,
    produces: ValueType,
    factory: ValueFactory,
}

impl ComplexConstructor {
    pub fn new<T, F>(parameters: Vec<ParameterDescriptor>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            parameters,
            primary: false,
            produces: ValueType::of::<T>(),
            factory: Arc::new(move |arguments: &Arguments| {
                factory(arguments).map(|built| Arc::new(built) as Value)
            }),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    value_type: ValueType,
    description: Option<String>,
    optional: bool,
    nullable: bool,
    remainder: bool,
    default: Option<Value>,
    names: Vec<String>,
    reader: Option<Arc<dyn TypeReader>>,
    constructors: Option<Vec<ComplexConstructor>>,
}

impl ParameterDescriptor {
    pub fn new<T: Any>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::of::<T>(),
            description: None,
            optional: false,
            nullable: false,
            remainder: false,
            default: None,
            names: Vec::new(),
            reader: None,
            constructors: None,
        }
    }

    /// A parameter built from several tokens by one of its constructors.
    pub fn complex<T: Any>(name: impl Into<String>) -> Self {
        Self {
            constructors: Some(Vec::new()),
            ..Self::new::<T>(name)
        }
    }

    pub fn constructor(mut self, constructor: ComplexConstructor) -> Self {
        self.constructors.get_or_insert_with(Vec::new).push(constructor);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Makes the parameter optional with `value` as its default.
    pub fn default_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.optional = true;
        self.default = Some(Arc::new(value));
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn remainder(mut self) -> Self {
        self.remainder = true;
        self
    }

    /// Binds the parameter from named arguments (`--name: value`) instead of position.
    pub fn named(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reader<R: TypeReader + 'static>(mut self, reader: R) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// A boolean switch: `true` when `--name` is given, `false` otherwise.
    pub fn flag(name: &str) -> Self {
        Self::new::<bool>(name).named(&[name]).default_value(false)
    }
}

// --- Commands ---

pub struct CommandDescriptor {
    aliases: Vec<String>,
    description: Option<String>,
    attributes: Vec<(String, String)>,
    preconditions: Vec<Arc<dyn Precondition>>,
    parameters: Vec<ParameterDescriptor>,
    priority: i32,
    error_overload: bool,
    return_kind: ReturnKind,
    invoker: Option<Arc<dyn ErasedInvoke>>,
}

pub struct CommandBuilder<M> {
    descriptor: CommandDescriptor,
    _module: PhantomData<fn() -> M>,
}

impl<M: CommandModule> CommandBuilder<M> {
    /// An empty `name` declares no alias; such a command is skipped at build time.
    pub fn new(name: &str) -> Self {
        let aliases = if name.trim().is_empty() {
            Vec::new()
        } else {
            vec![name.trim().to_string()]
        };
        Self {
            descriptor: CommandDescriptor {
                aliases,
                description: None,
                attributes: Vec::new(),
                preconditions: Vec::new(),
                parameters: Vec::new(),
                priority: 0,
                error_overload: false,
                return_kind: ReturnKind::Synchronous,
                invoker: None,
            },
            _module: PhantomData,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.descriptor.aliases.push(alias.to_string());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.attributes.push((key.into(), value.into()));
        self
    }

    pub fn precondition<P: Precondition + 'static>(mut self, precondition: P) -> Self {
        self.descriptor.preconditions.push(Arc::new(precondition));
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.descriptor.parameters.push(parameter);
        self
    }

    /// Higher runs first among otherwise equal overloads.
    pub fn priority(mut self, priority: i32) -> Self {
        self.descriptor.priority = priority;
        self
    }

    /// Tried last, with any token count, so it can report misuse of the command.
    pub fn error_overload(mut self) -> Self {
        self.descriptor.error_overload = true;
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut M, &'a CommandContext, Arguments) -> CommandFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.descriptor.invoker = Some(Arc::new(TypedInvoker::<M, F>::new(handler)));
        self.descriptor.return_kind = ReturnKind::Asynchronous;
        self
    }

    pub fn sync_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut M, &CommandContext, Arguments) -> anyhow::Result<CommandOutput>
            + Send
            + Sync
            + 'static,
    {
        self.descriptor.invoker = Some(Arc::new(SyncInvoker::<M, F>::new(handler)));
        self.descriptor.return_kind = ReturnKind::Synchronous;
        self
    }

    pub fn into_descriptor(self) -> CommandDescriptor {
        self.descriptor
    }
}

// --- Modules ---

enum ChildDescriptor {
    Command(CommandDescriptor),
    Module(ModuleDescriptor),
}

pub struct ModuleDescriptor {
    name: String,
    aliases: Vec<String>,
    group: bool,
    description: Option<String>,
    attributes: Vec<(String, String)>,
    preconditions: Vec<Arc<dyn Precondition>>,
    constructors: Vec<ModuleConstructor>,
    module_type: ValueType,
    hooks: Arc<dyn ErasedHooks>,
    children: Vec<ChildDescriptor>,
}

pub struct ModuleBuilder<M> {
    descriptor: ModuleDescriptor,
    _module: PhantomData<fn() -> M>,
}

impl<M: CommandModule> ModuleBuilder<M> {
    /// A plain module. Its commands are addressed as if declared by the parent.
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: ModuleDescriptor {
                name: name.to_string(),
                aliases: vec![name.to_string()],
                group: false,
                description: None,
                attributes: Vec::new(),
                preconditions: Vec::new(),
                constructors: Vec::new(),
                module_type: ValueType::of::<M>(),
                hooks: Arc::new(TypedHooks::<M>::new()),
                children: Vec::new(),
            },
            _module: PhantomData,
        }
    }

    /// A module addressed by name: `name command args...`.
    pub fn group(name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.descriptor.group = true;
        builder
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.descriptor.aliases.push(alias.to_string());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.attributes.push((key.into(), value.into()));
        self
    }

    pub fn precondition<P: Precondition + 'static>(mut self, precondition: P) -> Self {
        self.descriptor.preconditions.push(Arc::new(precondition));
        self
    }

    pub fn constructor(mut self, constructor: ModuleConstructor) -> Self {
        self.descriptor.constructors.push(constructor);
        self
    }

    pub fn command(mut self, command: CommandBuilder<M>) -> Self {
        self.descriptor
            .children
            .push(ChildDescriptor::Command(command.into_descriptor()));
        self
    }

    pub fn submodule<N: CommandModule>(mut self, module: ModuleBuilder<N>) -> Self {
        self.descriptor
            .children
            .push(ChildDescriptor::Module(module.into_descriptor()));
        self
    }

    pub fn into_descriptor(self) -> ModuleDescriptor {
        self.descriptor
    }
}

impl<M: CommandModule + Default> ModuleBuilder<M> {
    pub fn default_constructor(self) -> Self {
        self.constructor(ModuleConstructor::default_of::<M>())
    }
}

// --- Tree construction ---

/// Picks the constructor marked primary, else the first declared.
fn select_constructor<T>(mut candidates: Vec<T>, is_primary: impl Fn(&T) -> bool) -> Option<T> {
    if candidates.is_empty() {
        return None;
    }
    let index = candidates.iter().position(is_primary).unwrap_or(0);
    Some(candidates.swap_remove(index))
}

fn check_aliases(component: &str, aliases: &[String]) -> BuildResult<()> {
    let mut seen = HashSet::new();
    for alias in aliases {
        if !seen.insert(alias.to_lowercase()) {
            return Err(BuildError::DuplicateAlias {
                component: component.to_string(),
                alias: alias.clone(),
            });
        }
    }
    Ok(())
}

pub fn build_tree(descriptors: Vec<ModuleDescriptor>) -> BuildResult<CommandTree> {
    let mut tree = CommandTree::default();
    for descriptor in descriptors {
        let id = build_module(&mut tree, descriptor, None)?;
        tree.roots.push(id);
    }
    log::info!(
        "Command tree built: {} modules, {} commands.",
        tree.modules.len(),
        tree.commands.len()
    );
    Ok(tree)
}

fn build_module(
    tree: &mut CommandTree,
    descriptor: ModuleDescriptor,
    parent: Option<ModuleId>,
) -> BuildResult<ModuleId> {
    let ModuleDescriptor {
        name,
        aliases,
        group,
        description,
        attributes: own_attributes,
        preconditions: own_preconditions,
        constructors,
        module_type,
        hooks,
        children,
    } = descriptor;

    check_aliases(&name, &aliases)?;

    let (mut attributes, mut preconditions) = match parent {
        Some(parent) => {
            let parent = tree.module(parent);
            (parent.attributes.clone(), parent.preconditions.clone())
        }
        None => (HashMap::new(), Vec::new()),
    };
    attributes.extend(own_attributes);
    preconditions.extend(own_preconditions);

    let constructor = select_constructor(constructors, |c| c.primary);
    if let Some(constructor) = &constructor {
        if constructor.produces != module_type {
            return Err(BuildError::ConstructorTypeMismatch {
                component: name,
                expected: module_type.to_string(),
                produced: constructor.produces.to_string(),
            });
        }
    } else if children
        .iter()
        .any(|child| matches!(child, ChildDescriptor::Command(_)))
    {
        return Err(BuildError::MissingConstructor { module: name });
    }

    let id = ModuleId(tree.modules.len());
    log::debug!("Building module '{}' ({:?}, group: {}).", name, id, group);
    tree.modules.push(Module {
        id,
        name,
        aliases,
        group,
        description,
        attributes,
        preconditions,
        parent,
        children: Vec::new(),
        type_name: module_type.name(),
        constructor,
        hooks,
    });

    for child in children {
        let component = match child {
            ChildDescriptor::Command(command) => match build_command(tree, command, id)? {
                Some(command) => Component::Command(command),
                None => continue,
            },
            ChildDescriptor::Module(module) => Component::Module(build_module(tree, module, Some(id))?),
        };
        tree.modules[id.0].children.push(component);
    }
    Ok(id)
}

fn build_command(
    tree: &mut CommandTree,
    descriptor: CommandDescriptor,
    module: ModuleId,
) -> BuildResult<Option<CommandId>> {
    let Some(name) = descriptor.aliases.first().cloned() else {
        log::warn!(
            "Skipping a command without aliases in module '{}'.",
            tree.module(module).name
        );
        return Ok(None);
    };
    check_aliases(&name, &descriptor.aliases)?;

    let invoker = descriptor
        .invoker
        .ok_or_else(|| BuildError::MissingHandler {
            command: name.clone(),
        })?;

    let parameters = descriptor
        .parameters
        .into_iter()
        .map(|parameter| build_parameter(&name, parameter))
        .collect::<BuildResult<Vec<_>>>()?;
    validate_positional(&name, &parameters)?;

    let positional = parameters.iter().filter(|p| !p.is_named());
    let min_length = positional.clone().map(Parameter::min_length).sum();
    let max_length = positional
        .map(Parameter::max_length)
        .fold(0usize, usize::saturating_add);

    let owner = tree.module(module);
    let mut attributes = owner.attributes.clone();
    attributes.extend(descriptor.attributes);
    let inherited_preconditions = owner.preconditions.len();
    let mut preconditions = owner.preconditions.clone();
    preconditions.extend(descriptor.preconditions);

    let id = CommandId(tree.commands.len());
    log::debug!(
        "Registered command '{}' ({} parameters, {}..{} tokens).",
        name,
        parameters.len(),
        min_length,
        max_length
    );
    tree.commands.push(Command {
        id,
        name,
        aliases: descriptor.aliases,
        module,
        description: descriptor.description,
        attributes,
        parameters,
        preconditions,
        priority: descriptor.priority,
        error_overload: descriptor.error_overload,
        return_kind: descriptor.return_kind,
        inherited_preconditions,
        min_length,
        max_length,
        invoker,
    });
    Ok(Some(id))
}

fn build_parameter(owner: &str, descriptor: ParameterDescriptor) -> BuildResult<Parameter> {
    if let Some(default) = &descriptor.default {
        if type_of(default) != descriptor.value_type.id() {
            return Err(BuildError::DefaultTypeMismatch {
                owner: owner.to_string(),
                parameter: descriptor.name,
                expected: descriptor.value_type.to_string(),
            });
        }
    }

    let kind = match descriptor.constructors {
        None => ParameterKind::Leaf,
        Some(constructors) => {
            if !descriptor.names.is_empty() {
                return Err(BuildError::NamedComplex {
                    owner: owner.to_string(),
                    parameter: descriptor.name,
                });
            }
            let constructor = select_constructor(constructors, |c| c.primary).ok_or_else(|| {
                BuildError::MissingParameterConstructor {
                    owner: owner.to_string(),
                    parameter: descriptor.name.clone(),
                }
            })?;
            if constructor.produces != descriptor.value_type {
                return Err(BuildError::ConstructorTypeMismatch {
                    component: format!("{}.{}", owner, descriptor.name),
                    expected: descriptor.value_type.to_string(),
                    produced: constructor.produces.to_string(),
                });
            }
            if constructor.parameters.is_empty() {
                return Err(BuildError::EmptyComplexParameter {
                    owner: owner.to_string(),
                    parameter: descriptor.name,
                });
            }
            let children = constructor
                .parameters
                .into_iter()
                .map(|child| {
                    if child.remainder || !child.names.is_empty() {
                        return Err(BuildError::InvalidComplexChild {
                            parameter: descriptor.name.clone(),
                            child: child.name,
                        });
                    }
                    build_parameter(&descriptor.name, child)
                })
                .collect::<BuildResult<Vec<_>>>()?;
            validate_positional(&descriptor.name, &children)?;
            ParameterKind::Complex(ComplexParameter::new(children, constructor.factory))
        }
    };

    Ok(Parameter {
        name: descriptor.name,
        value_type: descriptor.value_type,
        description: descriptor.description,
        optional: descriptor.optional,
        nullable: descriptor.nullable,
        remainder: descriptor.remainder,
        default: descriptor.default,
        names: descriptor.names,
        reader: descriptor.reader,
        kind,
    })
}

fn validate_positional(owner: &str, parameters: &[Parameter]) -> BuildResult<()> {
    let positional: Vec<&Parameter> = parameters.iter().filter(|p| !p.is_named()).collect();

    if positional.iter().filter(|p| p.remainder).count() > 1 {
        return Err(BuildError::MultipleRemainders {
            command: owner.to_string(),
        });
    }

    let mut seen_optional = false;
    for (index, parameter) in positional.iter().enumerate() {
        if parameter.remainder {
            if index + 1 != positional.len() {
                return Err(BuildError::RemainderNotLast {
                    command: owner.to_string(),
                    parameter: parameter.name.clone(),
                });
            }
            let readable_as_text = parameter.value_type.is::<String>() || parameter.reader.is_some();
            if parameter.is_complex() || !readable_as_text {
                return Err(BuildError::RemainderNotString {
                    command: owner.to_string(),
                    parameter: parameter.name.clone(),
                });
            }
        }

        if parameter.optional || parameter.nullable {
            seen_optional = true;
        } else if seen_optional && parameter.min_length() > 0 {
            return Err(BuildError::RequiredAfterOptional {
                owner: owner.to_string(),
                parameter: parameter.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample;

    impl CommandModule for Sample {}

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn noop(name: &str) -> CommandBuilder<Sample> {
        CommandBuilder::new(name).sync_handler(|_, _, _| Ok(CommandOutput::Unit))
    }

    fn point() -> ParameterDescriptor {
        ParameterDescriptor::complex::<Point>("at").constructor(ComplexConstructor::new(
            vec![
                ParameterDescriptor::new::<i32>("x"),
                ParameterDescriptor::new::<i32>("y"),
            ],
            |args: &Arguments| {
                Ok(Point {
                    x: args.require(0)?,
                    y: args.require(1)?,
                })
            },
        ))
    }

    fn build(module: ModuleBuilder<Sample>) -> BuildResult<CommandTree> {
        build_tree(vec![module.into_descriptor()])
    }

    #[test]
    fn lengths_and_inherited_preconditions() {
        let tree = build(
            ModuleBuilder::<Sample>::group("math")
                .default_constructor()
                .attribute("category", "numbers")
                .precondition(crate::core::preconditions::PredicatePrecondition::new(
                    "always",
                    |_, _| Ok(()),
                ))
                .command(
                    noop("add")
                        .attribute("category", "arithmetic")
                        .parameter(ParameterDescriptor::new::<i64>("a"))
                        .parameter(ParameterDescriptor::new::<i64>("b").optional())
                        .parameter(ParameterDescriptor::flag("verbose")),
                )
                .command(
                    noop("say").parameter(ParameterDescriptor::new::<String>("text").remainder()),
                ),
        )
        .unwrap();

        let add = tree.commands().find(|c| c.name == "add").unwrap();
        assert_eq!((add.min_length(), add.max_length()), (1, 2));
        assert_eq!(add.inherited_preconditions().len(), 1);
        assert_eq!(add.own_preconditions().len(), 0);
        assert_eq!(add.attributes.get("category").map(String::as_str), Some("arithmetic"));
        assert_eq!(tree.usage(add), "math add <a> [b] [--verbose]");

        let say = tree.commands().find(|c| c.name == "say").unwrap();
        assert_eq!((say.min_length(), say.max_length()), (1, usize::MAX));
    }

    #[test]
    fn complex_parameters_aggregate_lengths() {
        let tree = build(
            ModuleBuilder::<Sample>::new("plot")
                .default_constructor()
                .command(noop("plot").parameter(point()).parameter(ParameterDescriptor::new::<String>("label"))),
        )
        .unwrap();
        let plot = tree.commands().next().unwrap();
        assert_eq!((plot.min_length(), plot.max_length()), (3, 3));
        assert_eq!(plot.signature(), "<at: <x> <y>> <label>");
    }

    #[test]
    fn aliasless_commands_are_skipped() {
        let tree = build(ModuleBuilder::<Sample>::new("m").default_constructor().command(noop("")))
            .unwrap();
        assert_eq!(tree.commands().count(), 0);
    }

    #[test]
    fn configuration_errors() {
        let remainder_first = ModuleBuilder::<Sample>::new("m").default_constructor().command(
            noop("c")
                .parameter(ParameterDescriptor::new::<String>("rest").remainder())
                .parameter(ParameterDescriptor::new::<String>("tail")),
        );
        assert!(matches!(build(remainder_first), Err(BuildError::RemainderNotLast { .. })));

        let numeric_remainder = ModuleBuilder::<Sample>::new("m")
            .default_constructor()
            .command(noop("c").parameter(ParameterDescriptor::new::<i64>("rest").remainder()));
        assert!(matches!(build(numeric_remainder), Err(BuildError::RemainderNotString { .. })));

        let duplicate = ModuleBuilder::<Sample>::new("m")
            .default_constructor()
            .command(noop("c").alias("C"));
        assert!(matches!(build(duplicate), Err(BuildError::DuplicateAlias { .. })));

        let no_constructor = ModuleBuilder::<Sample>::new("m").command(noop("c"));
        assert!(matches!(build(no_constructor), Err(BuildError::MissingConstructor { .. })));

        let no_handler = ModuleBuilder::<Sample>::new("m")
            .default_constructor()
            .command(CommandBuilder::new("c"));
        assert!(matches!(build(no_handler), Err(BuildError::MissingHandler { .. })));

        let empty_complex = ModuleBuilder::<Sample>::new("m").default_constructor().command(
            noop("c").parameter(
                ParameterDescriptor::complex::<Point>("p")
                    .constructor(ComplexConstructor::new(Vec::new(), |_| Ok(Point { x: 0, y: 0 }))),
            ),
        );
        assert!(matches!(build(empty_complex), Err(BuildError::EmptyComplexParameter { .. })));

        let wrong_product = ModuleBuilder::<Sample>::new("m").default_constructor().command(
            noop("c").parameter(ParameterDescriptor::complex::<Point>("p").constructor(
                ComplexConstructor::new(vec![ParameterDescriptor::new::<i32>("x")], |_| Ok(1_u8)),
            )),
        );
        assert!(matches!(build(wrong_product), Err(BuildError::ConstructorTypeMismatch { .. })));

        let optional_first = ModuleBuilder::<Sample>::new("m").default_constructor().command(
            noop("c")
                .parameter(ParameterDescriptor::new::<i64>("a").optional())
                .parameter(ParameterDescriptor::new::<i64>("b")),
        );
        assert!(matches!(build(optional_first), Err(BuildError::RequiredAfterOptional { .. })));

        let bad_default = ModuleBuilder::<Sample>::new("m")
            .default_constructor()
            .command(noop("c").parameter(ParameterDescriptor::new::<i64>("a").default_value(1_i32)));
        assert!(matches!(build(bad_default), Err(BuildError::DefaultTypeMismatch { .. })));
    }

    #[test]
    fn primary_constructor_wins() {
        let tree = build(
            ModuleBuilder::<Sample>::new("m")
                .constructor(ModuleConstructor::new(|_| Ok(Sample)))
                .constructor(ModuleConstructor::new(|_| Ok(Sample)).requires::<u64>().primary())
                .command(noop("c")),
        )
        .unwrap();
        let module = tree.module(tree.roots()[0]);
        assert_eq!(module.constructor().map(|c| c.dependencies.len()), Some(1));
    }
}
