// src/models/component.rs

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::core::context::CommandContext;
use crate::core::preconditions::Precondition;
use crate::models::parameter::Parameter;
use crate::models::value::{Arguments, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

/// A child of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Command(CommandId),
    Module(ModuleId),
}

/// What a command body produced.
#[derive(Clone)]
pub enum CommandOutput {
    Unit,
    Text(String),
    /// Anything else. The host decides what to do with it through
    /// [`DispatchHooks::unhandled_return`](crate::core::dispatcher::DispatchHooks::unhandled_return).
    Value { type_name: &'static str, value: Value },
}

impl CommandOutput {
    pub fn value<T: Any + Send + Sync>(inner: T) -> Self {
        CommandOutput::Value {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(inner),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            CommandOutput::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Unit => f.write_str("Unit"),
            CommandOutput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            CommandOutput::Value { type_name, .. } => write!(f, "Value({})", type_name),
        }
    }
}

impl From<()> for CommandOutput {
    fn from(_: ()) -> Self {
        CommandOutput::Unit
    }
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        CommandOutput::Text(text)
    }
}

impl From<&str> for CommandOutput {
    fn from(text: &str) -> Self {
        CommandOutput::Text(text.to_string())
    }
}

/// Whether a handler was registered as a plain function or as a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Synchronous,
    Asynchronous,
}

pub type CommandFuture<'a> = BoxFuture<'a, anyhow::Result<CommandOutput>>;

/// Implemented by every handler type. Both hooks run on the fresh instance
/// constructed for one execution.
#[async_trait]
pub trait CommandModule: Any + Send {
    async fn before_execute(
        &mut self,
        _context: &CommandContext,
        _command: &Command,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs only when the handler returned successfully.
    async fn after_execute(
        &mut self,
        _context: &CommandContext,
        _command: &Command,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) trait ErasedInvoke: Send + Sync {
    fn invoke<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        arguments: Arguments,
    ) -> CommandFuture<'a>;
}

pub(crate) struct TypedInvoker<M, F> {
    handler: F,
    _module: PhantomData<fn() -> M>,
}

impl<M, F> TypedInvoker<M, F> {
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            _module: PhantomData,
        }
    }
}

impl<M, F> ErasedInvoke for TypedInvoker<M, F>
where
    M: CommandModule,
    F: for<'a> Fn(&'a mut M, &'a CommandContext, Arguments) -> CommandFuture<'a> + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        arguments: Arguments,
    ) -> CommandFuture<'a> {
        match instance.downcast_mut::<M>() {
            Some(module) => (self.handler)(module, context, arguments),
            None => Box::pin(async move {
                Err(anyhow::anyhow!(
                    "handler instance is not a '{}'",
                    std::any::type_name::<M>()
                ))
            }),
        }
    }
}

/// Adapts a plain handler; it runs when the returned future is first polled.
pub(crate) struct SyncInvoker<M, F> {
    handler: F,
    _module: PhantomData<fn() -> M>,
}

impl<M, F> SyncInvoker<M, F> {
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            _module: PhantomData,
        }
    }
}

impl<M, F> ErasedInvoke for SyncInvoker<M, F>
where
    M: CommandModule,
    F: Fn(&mut M, &CommandContext, Arguments) -> anyhow::Result<CommandOutput> + Send + Sync,
{
    fn invoke<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        arguments: Arguments,
    ) -> CommandFuture<'a> {
        Box::pin(async move {
            match instance.downcast_mut::<M>() {
                Some(module) => (self.handler)(module, context, arguments),
                None => Err(anyhow::anyhow!(
                    "handler instance is not a '{}'",
                    std::any::type_name::<M>()
                )),
            }
        })
    }
}

pub(crate) trait ErasedHooks: Send + Sync {
    fn before<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        command: &'a Command,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn after<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        command: &'a Command,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

pub(crate) struct TypedHooks<M>(PhantomData<fn() -> M>);

impl<M> TypedHooks<M> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M: CommandModule> ErasedHooks for TypedHooks<M> {
    fn before<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        command: &'a Command,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        match instance.downcast_mut::<M>() {
            Some(module) => module.before_execute(context, command),
            None => Box::pin(async { Ok(()) }),
        }
    }

    fn after<'a>(
        &'a self,
        instance: &'a mut (dyn Any + Send),
        context: &'a CommandContext,
        command: &'a Command,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        match instance.downcast_mut::<M>() {
            Some(module) => module.after_execute(context, command),
            None => Box::pin(async { Ok(()) }),
        }
    }
}

/// A service a module constructor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub service: ValueType,
    pub optional: bool,
}

/// Services resolved for one constructor call, in declaration order.
pub struct Dependencies {
    resolved: Vec<(Dependency, Option<Value>)>,
}

impl Dependencies {
    pub(crate) fn new(resolved: Vec<(Dependency, Option<Value>)>) -> Self {
        Self { resolved }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolved
            .iter()
            .find(|(dependency, _)| dependency.service.is::<T>())
            .and_then(|(_, resolved)| resolved.clone())
            .and_then(|resolved| resolved.downcast::<T>().ok())
    }

    pub fn require<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!("service '{}' was not resolved", ValueType::of::<T>())
        })
    }
}

pub type ModuleFactory =
    Arc<dyn Fn(&Dependencies) -> anyhow::Result<Box<dyn Any + Send>> + Send + Sync>;

/// One way of building a handler instance.
#[derive(Clone)]
pub struct ModuleConstructor {
    pub dependencies: Vec<Dependency>,
    pub primary: bool,
    pub(crate) produces: ValueType,
    pub(crate) factory: ModuleFactory,
}

impl ModuleConstructor {
    pub fn new<M, F>(factory: F) -> Self
    where
        M: CommandModule,
        F: Fn(&Dependencies) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        Self {
            dependencies: Vec::new(),
            primary: false,
            produces: ValueType::of::<M>(),
            factory: Arc::new(move |deps: &Dependencies| {
                factory(deps).map(|module| Box::new(module) as Box<dyn Any + Send>)
            }),
        }
    }

    pub fn default_of<M: CommandModule + Default>() -> Self {
        Self::new(|_| Ok(M::default()))
    }

    pub fn requires<T: Any + Send + Sync>(mut self) -> Self {
        self.dependencies.push(Dependency {
            service: ValueType::of::<T>(),
            optional: false,
        });
        self
    }

    pub fn optional<T: Any + Send + Sync>(mut self) -> Self {
        self.dependencies.push(Dependency {
            service: ValueType::of::<T>(),
            optional: true,
        });
        self
    }

    /// Marks this constructor as the designated one when several are declared.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

impl fmt::Debug for ModuleConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleConstructor")
            .field("produces", &self.produces)
            .field("dependencies", &self.dependencies)
            .field("primary", &self.primary)
            .finish()
    }
}

/// A registered group of commands.
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub aliases: Vec<String>,
    /// Only group modules are addressed by alias; the children of other
    /// modules sit directly at their parent's level.
    pub group: bool,
    pub description: Option<String>,
    pub attributes: HashMap<String, String>,
    pub preconditions: Vec<Arc<dyn Precondition>>,
    pub parent: Option<ModuleId>,
    pub children: Vec<Component>,
    pub type_name: &'static str,
    /// `None` only for modules without commands of their own.
    pub(crate) constructor: Option<ModuleConstructor>,
    pub(crate) hooks: Arc<dyn ErasedHooks>,
}

impl Module {
    pub fn matches(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    pub fn constructor(&self) -> Option<&ModuleConstructor> {
        self.constructor.as_ref()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("group", &self.group)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// One invokable handler bound to one or more aliases.
pub struct Command {
    pub id: CommandId,
    pub name: String,
    pub aliases: Vec<String>,
    pub module: ModuleId,
    pub description: Option<String>,
    pub attributes: HashMap<String, String>,
    pub parameters: Vec<Parameter>,
    /// Module preconditions first, then the command's own.
    pub preconditions: Vec<Arc<dyn Precondition>>,
    pub priority: i32,
    pub error_overload: bool,
    pub return_kind: ReturnKind,
    pub(crate) inherited_preconditions: usize,
    pub(crate) min_length: usize,
    pub(crate) max_length: usize,
    pub(crate) invoker: Arc<dyn ErasedInvoke>,
}

impl Command {
    pub fn matches(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn positional_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.is_named())
    }

    pub fn named_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_named())
    }

    pub fn inherited_preconditions(&self) -> &[Arc<dyn Precondition>] {
        &self.preconditions[..self.inherited_preconditions]
    }

    pub fn own_preconditions(&self) -> &[Arc<dyn Precondition>] {
        &self.preconditions[self.inherited_preconditions..]
    }

    pub fn signature(&self) -> String {
        self.parameters
            .iter()
            .map(Parameter::signature)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("module", &self.module)
            .field("parameters", &self.parameters)
            .field("priority", &self.priority)
            .field("error_overload", &self.error_overload)
            .field("return_kind", &self.return_kind)
            .finish()
    }
}

/// The immutable module/command tree. Components reference each other by index.
#[derive(Debug, Default)]
pub struct CommandTree {
    pub(crate) modules: Vec<Module>,
    pub(crate) commands: Vec<Command>,
    pub(crate) roots: Vec<ModuleId>,
}

impl CommandTree {
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn command(&self, id: CommandId) -> &Command {
        &self.commands[id.0]
    }

    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Number of commands under `id`, nested groups included.
    pub fn command_count(&self, id: ModuleId) -> usize {
        self.module(id)
            .children
            .iter()
            .map(|child| match child {
                Component::Command(_) => 1,
                Component::Module(nested) => self.command_count(*nested),
            })
            .sum()
    }

    /// Group names leading to the command followed by its name, e.g. `math add`.
    pub fn qualified_name(&self, command: &Command) -> String {
        let mut parts = vec![command.name.as_str()];
        let mut current = Some(command.module);
        while let Some(id) = current {
            let module = self.module(id);
            if module.group {
                parts.push(module.name.as_str());
            }
            current = module.parent;
        }
        parts.reverse();
        parts.join(" ")
    }

    pub fn usage(&self, command: &Command) -> String {
        let signature = command.signature();
        if signature.is_empty() {
            self.qualified_name(command)
        } else {
            format!("{} {}", self.qualified_name(command), signature)
        }
    }
}
