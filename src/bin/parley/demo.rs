// src/bin/parley/demo.rs

//! The command set served by the `parley` console.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use parley::{
    Arguments, Color, Command, CommandBuilder, CommandContext, CommandModule, CommandOutput,
    CommandService, ComplexConstructor, DispatchConfig, DispatchHooks, ModuleBuilder,
    ModuleConstructor, ParameterDescriptor, PredicatePrecondition, RequireExtension, Value,
};

/// Who is typing. Attached to every console context.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub operator: bool,
}

/// Usage lines of every command, for `help`.
#[derive(Debug, Clone, Default)]
pub struct HelpIndex(pub Arc<Vec<String>>);

/// Shared across executions through the service container.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

/// Never registered; its absence shows up as a notice on `count`.
#[derive(Debug)]
pub struct AuditLog;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

const MAX_GREETINGS: u32 = 20;

// --- Modules ---

#[derive(Default)]
struct Basics;

impl CommandModule for Basics {}

#[derive(Default)]
struct Math;

impl CommandModule for Math {}

#[derive(Default)]
struct Tools;

#[async_trait]
impl CommandModule for Tools {
    async fn before_execute(&mut self, context: &CommandContext, command: &Command) -> anyhow::Result<()> {
        log::debug!("[{}] tools: running '{}'", context.id(), command.name);
        Ok(())
    }
}

#[derive(Default)]
struct Admin;

impl CommandModule for Admin {}

struct Stats {
    counter: Arc<Counter>,
    audit: Option<Arc<AuditLog>>,
}

impl CommandModule for Stats {}

fn basics() -> ModuleBuilder<Basics> {
    ModuleBuilder::<Basics>::new("basics")
        .default_constructor()
        .command(
            CommandBuilder::new("ping")
                .description("Replies with pong.")
                .sync_handler(|_, _, _| Ok("pong".into())),
        )
        .command(
            CommandBuilder::new("echo")
                .alias("say")
                .description("Repeats the text back.")
                .parameter(ParameterDescriptor::new::<String>("text").remainder())
                .sync_handler(|_, _, args| Ok(args.require::<String>(0)?.into())),
        )
        .command(
            CommandBuilder::new("greet")
                .description("Greets someone, optionally loudly.")
                .parameter(ParameterDescriptor::new::<String>("who"))
                .parameter(
                    ParameterDescriptor::new::<u32>("times")
                        .named(&["times", "t"])
                        .default_value(1_u32),
                )
                .parameter(ParameterDescriptor::flag("shout"))
                .sync_handler(|_, _, args| {
                    let who: String = args.require(0)?;
                    let times: u32 = args.require(1)?;
                    if times > MAX_GREETINGS {
                        anyhow::bail!("at most {} greetings at a time", MAX_GREETINGS);
                    }
                    let mut line = format!("Hello, {}!", who);
                    if args.cloned::<bool>(2).unwrap_or(false) {
                        line = line.to_uppercase();
                    }
                    Ok(vec![line; times as usize].join("\n").into())
                }),
        )
        .command(
            CommandBuilder::new("whoami")
                .sync_handler(|_, ctx, _| {
                    let session = ctx
                        .extension::<Session>()
                        .ok_or_else(|| anyhow::anyhow!("no session attached"))?;
                    Ok(format!("{} (operator: {})", session.user, session.operator).into())
                }),
        )
        .command(
            CommandBuilder::new("help")
                .parameter(ParameterDescriptor::new::<String>("command").optional())
                .sync_handler(|_, ctx, args| {
                    let index = ctx.extension::<HelpIndex>().unwrap_or_default();
                    let filter = args.cloned::<String>(0);
                    let lines: Vec<&str> = index
                        .0
                        .iter()
                        .map(String::as_str)
                        .filter(|line| filter.as_deref().is_none_or(|f| line.contains(f)))
                        .collect();
                    if lines.is_empty() {
                        return Ok("No matching commands.".into());
                    }
                    Ok(lines.join("\n").into())
                }),
        )
}

fn math() -> ModuleBuilder<Math> {
    ModuleBuilder::<Math>::group("math")
        .alias("m")
        .description("Arithmetic.")
        .default_constructor()
        .command(
            CommandBuilder::new("add")
                .priority(1)
                .parameter(ParameterDescriptor::new::<i64>("a"))
                .parameter(ParameterDescriptor::new::<i64>("b"))
                .sync_handler(|_, _, args| {
                    let (a, b): (i64, i64) = (args.require(0)?, args.require(1)?);
                    let sum = a
                        .checked_add(b)
                        .ok_or_else(|| anyhow::anyhow!("{} + {} overflows", a, b))?;
                    Ok(sum.to_string().into())
                }),
        )
        .command(
            CommandBuilder::new("add")
                .parameter(ParameterDescriptor::new::<f64>("a"))
                .parameter(ParameterDescriptor::new::<f64>("b"))
                .sync_handler(|_, _, args| {
                    let (a, b): (f64, f64) = (args.require(0)?, args.require(1)?);
                    Ok((a + b).to_string().into())
                }),
        )
        .command(
            CommandBuilder::new("add")
                .error_overload()
                .sync_handler(|_, _, _| Ok("Usage: math add <a> <b>".into())),
        )
        .command(
            CommandBuilder::new("div")
                .parameter(ParameterDescriptor::new::<i64>("a"))
                .parameter(ParameterDescriptor::new::<i64>("b"))
                .sync_handler(|_, _, args| {
                    let (a, b): (i64, i64) = (args.require(0)?, args.require(1)?);
                    if b == 0 {
                        anyhow::bail!("division by zero");
                    }
                    Ok((a / b).to_string().into())
                }),
        )
}

fn point_parameter(name: &str) -> ParameterDescriptor {
    ParameterDescriptor::complex::<Point>(name).constructor(ComplexConstructor::new(
        vec![
            ParameterDescriptor::new::<f64>("x"),
            ParameterDescriptor::new::<f64>("y"),
        ],
        |args: &Arguments| {
            Ok(Point {
                x: args.require(0)?,
                y: args.require(1)?,
            })
        },
    ))
}

fn tools() -> ModuleBuilder<Tools> {
    ModuleBuilder::<Tools>::new("tools")
        .default_constructor()
        .command(
            CommandBuilder::new("color")
                .alias("colour")
                .parameter(ParameterDescriptor::new::<Color>("color"))
                .sync_handler(|_, _, args| Ok(CommandOutput::value(args.require::<Color>(0)?))),
        )
        .command(
            CommandBuilder::new("distance")
                .parameter(point_parameter("from"))
                .parameter(point_parameter("to"))
                .sync_handler(|_, _, args| {
                    let (from, to): (Point, Point) = (args.require(0)?, args.require(1)?);
                    let distance = ((to.x - from.x).powi(2) + (to.y - from.y).powi(2)).sqrt();
                    Ok(format!("{:.3}", distance).into())
                }),
        )
        .command(
            CommandBuilder::new("wait")
                .alias("sleep")
                .parameter(ParameterDescriptor::new::<Duration>("duration"))
                .handler(|_, ctx, args| Box::pin(wait(ctx, args))),
        )
}

async fn wait(ctx: &CommandContext, args: Arguments) -> anyhow::Result<CommandOutput> {
    let duration: Duration = args.require(0)?;
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(format!("Waited {:?}.", duration).into()),
        _ = ctx.cancellation().cancelled() => Ok("Wait cancelled.".into()),
    }
}

fn admin() -> ModuleBuilder<Admin> {
    ModuleBuilder::<Admin>::group("admin")
        .description("Operator-only commands.")
        .default_constructor()
        .precondition(RequireExtension::<Session>::new("No session is attached."))
        .precondition(PredicatePrecondition::new("operator-only", |ctx, _| {
            match ctx.extension::<Session>() {
                Some(session) if session.operator => Ok(()),
                _ => Err("Only operators may use admin commands.".to_string()),
            }
        }))
        .command(
            CommandBuilder::new("panic")
                .description("Panics inside the handler.")
                .sync_handler(|_, _, _| panic!("requested by an operator")),
        )
        .command(
            CommandBuilder::new("fail")
                .parameter(ParameterDescriptor::new::<String>("reason").remainder())
                .sync_handler(|_, _, args| {
                    anyhow::bail!("{}", args.require::<String>(0)?)
                }),
        )
}

fn stats() -> ModuleBuilder<Stats> {
    ModuleBuilder::<Stats>::new("stats")
        .constructor(
            ModuleConstructor::new(|deps| {
                Ok(Stats {
                    counter: deps.require::<Counter>()?,
                    audit: deps.get::<AuditLog>(),
                })
            })
            .requires::<Counter>()
            .optional::<AuditLog>(),
        )
        .command(CommandBuilder::new("count").sync_handler(|stats: &mut Stats, _, _| {
            let count = stats.counter.0.fetch_add(1, Ordering::SeqCst) + 1;
            if stats.audit.is_some() {
                log::info!("count audited");
            }
            Ok(format!("Counted {} time(s).", count).into())
        }))
}

/// Turns returned colors into text; anything else is still an error.
struct DemoHooks;

#[async_trait]
impl DispatchHooks for DemoHooks {
    async fn unhandled_return(
        &self,
        _context: &CommandContext,
        command: &Command,
        type_name: &'static str,
        value: Value,
    ) -> anyhow::Result<CommandOutput> {
        match value.downcast_ref::<Color>() {
            Some(color) => Ok(match color.name() {
                Some(name) => format!("{} ({})", color, name),
                None => color.to_string(),
            }
            .into()),
            None => anyhow::bail!("'{}' returned an unexpected '{}'", command.name, type_name),
        }
    }
}

pub fn service(config: DispatchConfig) -> Result<CommandService, parley::BuildError> {
    CommandService::builder()
        .config(config)
        .hooks(DemoHooks)
        .service(Counter::default())
        .module(basics())
        .module(math())
        .module(tools())
        .module(admin())
        .module(stats())
        .build()
}

pub fn help_index(service: &CommandService) -> HelpIndex {
    let tree = service.tree();
    let lines = tree
        .commands()
        .map(|command| match &command.description {
            Some(description) => format!("{}  - {}", tree.usage(command), description),
            None => tree.usage(command),
        })
        .collect();
    HelpIndex(Arc::new(lines))
}
