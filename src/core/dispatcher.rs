// src/core/dispatcher.rs

//! The execution engine.
//!
//! [`CommandService::execute`] drives one input through
//! Parse → Search → Check → Read → Construct → Execute and always ends in a
//! single [`ExecutionResult`]. Errors and panics raised by host code are
//! captured into the result of the stage that raised them.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::config::{DispatchConfig, ReadFailurePolicy};
use crate::core::arguments::{ArgumentResolver, ReadError, check_length};
use crate::core::builder::{BuildResult, ModuleBuilder, ModuleDescriptor, build_tree};
use crate::core::context::CommandContext;
use crate::core::parser::Parser;
use crate::core::preconditions::{CheckFailure, PreconditionCache, run_preconditions};
use crate::core::results::{CommandSuccess, DispatchError, ExecutionResult};
use crate::core::search::{SearchError, SearchMatch, search};
use crate::core::services::Services;
use crate::models::{
    Arguments, Command, CommandId, CommandModule, CommandOutput, CommandTree, Dependencies,
    Dependency, Module, Value,
};
use crate::readers::{TypeReader, TypeReaderRegistry};

/// Extension points for what the engine does not decide itself.
#[async_trait]
pub trait DispatchHooks: Send + Sync {
    /// A body returned [`CommandOutput::Value`]. The default treats it as an
    /// Execute failure; hosts that know the type can turn it into output.
    async fn unhandled_return(
        &self,
        _context: &CommandContext,
        command: &Command,
        type_name: &'static str,
        _value: Value,
    ) -> anyhow::Result<CommandOutput> {
        anyhow::bail!(
            "'{}' returned a value of type '{}' that no hook handles",
            command.name,
            type_name
        )
    }

    /// An optional constructor dependency was not registered. The returned
    /// text, if any, is added to the success notices.
    fn missing_dependency(
        &self,
        context: &CommandContext,
        module: &Module,
        dependency: &Dependency,
    ) -> Option<String> {
        log::warn!(
            "[{}] Optional service '{}' for module '{}' is not registered.",
            context.id(),
            dependency.service,
            module.name
        );
        Some(format!(
            "Optional service '{}' is not available.",
            dependency.service
        ))
    }

    /// Called once per execution with the final result.
    async fn respond(&self, context: &CommandContext, result: &ExecutionResult) {
        let text = match result {
            Ok(success) => match success.output.text() {
                Some(text) => text.to_string(),
                None => return,
            },
            Err(error) => error.to_string(),
        };
        if let Err(e) = context.reply(&text).await {
            log::warn!("[{}] Responder failed: {:#}", context.id(), e);
        }
    }
}

/// Hooks with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl DispatchHooks for DefaultHooks {}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct CommandServiceBuilder {
    modules: Vec<ModuleDescriptor>,
    readers: Arc<TypeReaderRegistry>,
    services: Services,
    hooks: Arc<dyn DispatchHooks>,
    config: DispatchConfig,
}

impl Default for CommandServiceBuilder {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            readers: Arc::new(TypeReaderRegistry::with_defaults()),
            services: Services::new(),
            hooks: Arc::new(DefaultHooks),
            config: DispatchConfig::default(),
        }
    }
}

impl CommandServiceBuilder {
    pub fn module<M: CommandModule>(mut self, module: ModuleBuilder<M>) -> Self {
        self.modules.push(module.into_descriptor());
        self
    }

    pub fn descriptor(mut self, descriptor: ModuleDescriptor) -> Self {
        self.modules.push(descriptor);
        self
    }

    /// Replaces the default reader registry.
    pub fn readers(mut self, readers: Arc<TypeReaderRegistry>) -> Self {
        self.readers = readers;
        self
    }

    pub fn reader<R: TypeReader + 'static>(self, reader: R) -> Self {
        self.readers.register(reader);
        self
    }

    pub fn service<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.services.insert(service);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn hooks<H: DispatchHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> BuildResult<CommandService> {
        let tree = build_tree(self.modules)?;
        Ok(CommandService {
            tree: Arc::new(tree),
            readers: self.readers,
            services: self.services,
            hooks: self.hooks,
            parser: Parser::with_prefixes(self.config.prefixes.clone()),
            config: self.config,
        })
    }
}

/// Owns the command tree and runs executions against it. Shareable across tasks.
pub struct CommandService {
    tree: Arc<CommandTree>,
    readers: Arc<TypeReaderRegistry>,
    services: Services,
    hooks: Arc<dyn DispatchHooks>,
    parser: Parser,
    config: DispatchConfig,
}

impl CommandService {
    pub fn builder() -> CommandServiceBuilder {
        CommandServiceBuilder::default()
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// The live registry; readers registered here apply to later executions.
    pub fn readers(&self) -> &TypeReaderRegistry {
        &self.readers
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub async fn execute(&self, context: &mut CommandContext) -> ExecutionResult {
        log::debug!("[{}] Executing {:?}", context.id(), context.input());
        let result = self.run(context).await;
        match &result {
            Ok(success) => log::info!("[{}] '{}' completed.", context.id(), success.name),
            Err(error) => log::info!(
                "[{}] Execution stopped at {} stage: {}",
                context.id(),
                error.stage(),
                error
            ),
        }
        if let Err(panic) = AssertUnwindSafe(self.hooks.respond(context, &result))
            .catch_unwind()
            .await
        {
            log::error!(
                "[{}] Response hook panicked: {}",
                context.id(),
                panic_message(&*panic)
            );
        }
        result
    }

    /// Runs the execution on the tokio runtime without waiting for it.
    pub fn spawn(self: &Arc<Self>, mut context: CommandContext) -> JoinHandle<ExecutionResult> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.execute(&mut context).await })
    }

    async fn run(&self, context: &mut CommandContext) -> ExecutionResult {
        let parsed = self.parser.parse_input(context.input())?;
        context.parsed = Some(parsed.clone());

        let found = search(&self.tree, &parsed.name, &parsed.positional)?;
        let (id, arguments) = self.select(context, &found, &parsed.named).await?;
        context.command = Some(id);

        let command = self.tree.command(id);
        let module = self.tree.module(command.module);
        let name = self.tree.qualified_name(command);

        let (mut instance, notices) = self.construct(context, &name, module)?;
        let output = self
            .invoke(context, &name, command, module, instance.as_mut(), arguments)
            .await?;

        Ok(CommandSuccess {
            command: id,
            name,
            output,
            notices,
        })
    }

    /// Check and Read over the ordered candidates.
    async fn select(
        &self,
        context: &CommandContext,
        found: &SearchMatch,
        named: &HashMap<String, Option<String>>,
    ) -> Result<(CommandId, Arguments), DispatchError> {
        let resolver = ArgumentResolver::new(&self.readers, context);
        let mut cache = PreconditionCache::new();
        let mut length_failure: Option<(CommandId, ReadError)> = None;
        let mut check_failure: Option<(CommandId, CheckFailure)> = None;
        let mut read_failure: Option<(CommandId, ReadError)> = None;

        for &id in &found.candidates {
            let command = self.tree.command(id);

            if let Err(error) = check_length(command, found.arguments.len()) {
                log::debug!("[{}] Skipping '{}': {}", context.id(), command.name, error);
                length_failure.get_or_insert((id, error));
                continue;
            }

            if let Err(failure) = run_preconditions(context, command, &mut cache).await {
                check_failure.get_or_insert((id, failure));
                continue;
            }

            match resolver.resolve(command, &found.arguments, named).await {
                Ok(arguments) => {
                    log::debug!(
                        "[{}] Selected '{}' ({}).",
                        context.id(),
                        command.name,
                        command.signature()
                    );
                    return Ok((id, arguments));
                }
                Err(error) if self.config.read_failure == ReadFailurePolicy::Fail => {
                    return Err(self.read_error(id, error));
                }
                Err(error) => {
                    log::debug!("[{}] '{}' could not read its arguments: {}", context.id(), command.name, error);
                    read_failure.get_or_insert((id, error));
                }
            }
        }

        if let Some((id, error)) = read_failure {
            return Err(self.read_error(id, error));
        }
        if let Some((id, failure)) = check_failure {
            return Err(DispatchError::Check {
                command: self.tree.qualified_name(self.tree.command(id)),
                failure,
            });
        }
        match length_failure {
            Some((id, error)) => Err(self.read_error(id, error)),
            None => Err(DispatchError::Search(SearchError::NotFound {
                name: found.path.join(" "),
                path: String::new(),
            })),
        }
    }

    fn read_error(&self, id: CommandId, error: ReadError) -> DispatchError {
        DispatchError::Read {
            command: self.tree.qualified_name(self.tree.command(id)),
            error,
        }
    }

    fn construct(
        &self,
        context: &CommandContext,
        name: &str,
        module: &Module,
    ) -> Result<(Box<dyn Any + Send>, Vec<String>), DispatchError> {
        let constructor = module.constructor().ok_or_else(|| {
            DispatchError::construction(name, anyhow::anyhow!("module '{}' has no constructor", module.name))
        })?;

        let mut notices = Vec::new();
        let mut resolved = Vec::with_capacity(constructor.dependencies.len());
        for dependency in &constructor.dependencies {
            match self.services.resolve(&dependency.service) {
                Some(service) => resolved.push((*dependency, Some(service))),
                None if dependency.optional => {
                    let notice = catch_unwind(AssertUnwindSafe(|| {
                        self.hooks.missing_dependency(context, module, dependency)
                    }))
                    .map_err(|panic| {
                        DispatchError::construction(
                            name,
                            anyhow::anyhow!("missing-dependency hook panicked: {}", panic_message(&*panic)),
                        )
                    })?;
                    notices.extend(notice);
                    resolved.push((*dependency, None));
                }
                None => {
                    return Err(DispatchError::construction(
                        name,
                        anyhow::anyhow!("required service '{}' is not registered", dependency.service),
                    ));
                }
            }
        }

        let dependencies = Dependencies::new(resolved);
        match catch_unwind(AssertUnwindSafe(|| (constructor.factory)(&dependencies))) {
            Ok(Ok(instance)) => Ok((instance, notices)),
            Ok(Err(error)) => Err(DispatchError::construction(name, error)),
            Err(panic) => Err(DispatchError::construction(
                name,
                anyhow::anyhow!("constructor panicked: {}", panic_message(&*panic)),
            )),
        }
    }

    async fn invoke(
        &self,
        context: &CommandContext,
        name: &str,
        command: &Command,
        module: &Module,
        instance: &mut (dyn Any + Send),
        arguments: Arguments,
    ) -> Result<CommandOutput, DispatchError> {
        let body = async {
            module.hooks.before(&mut *instance, context, command).await?;
            let output = command
                .invoker
                .invoke(&mut *instance, context, arguments)
                .await?;
            module.hooks.after(&mut *instance, context, command).await?;
            Ok::<_, anyhow::Error>(output)
        };

        let output = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => return Err(DispatchError::execute(name, error)),
            Err(panic) => {
                return Err(DispatchError::execute(
                    name,
                    anyhow::anyhow!("panicked: {}", panic_message(&*panic)),
                ));
            }
        };

        match output {
            CommandOutput::Value { type_name, value } => {
                AssertUnwindSafe(self.hooks.unhandled_return(context, command, type_name, value))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(anyhow::anyhow!("return hook panicked: {}", panic_message(&*panic)))
                    })
                    .map_err(|error| DispatchError::execute(name, error))
            }
            other => Ok(other),
        }
    }
}

impl std::fmt::Debug for CommandService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandService")
            .field("commands", &self.tree.commands().count())
            .field("readers", &self.readers.len())
            .field("services", &self.services)
            .field("config", &self.config)
            .finish()
    }
}
