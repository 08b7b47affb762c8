// tests/dispatch.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use parley::core::parser::ParseError;
use parley::core::search::SearchError;
use parley::readers::FnReader;
use parley::{
    Arguments, Color, Command, CommandBuilder, CommandContext, CommandModule, CommandOutput,
    CommandService, DispatchConfig, DispatchError, DispatchHooks, ExecutionResult, ModuleBuilder,
    ModuleConstructor, ParameterDescriptor, Precondition, PreconditionError, ReadError,
    ReadFailurePolicy, Responder, Stage, Token, Value,
};

#[derive(Default)]
struct Host;

impl CommandModule for Host {}

fn answer(name: &str, text: &'static str) -> CommandBuilder<Host> {
    CommandBuilder::new(name).sync_handler(move |_, _, _| Ok(text.into()))
}

fn host(name: &str) -> ModuleBuilder<Host> {
    ModuleBuilder::<Host>::new(name).default_constructor()
}

async fn run(service: &CommandService, line: &str) -> ExecutionResult {
    service.execute(&mut CommandContext::new(line)).await
}

fn text(result: &ExecutionResult) -> &str {
    match result {
        Ok(success) => success.output.text().unwrap_or_default(),
        Err(error) => panic!("expected success, got {:?}", error),
    }
}

fn stage(result: &ExecutionResult) -> Stage {
    match result {
        Ok(success) => panic!("expected failure, got '{}'", success.name),
        Err(error) => error.stage(),
    }
}

fn int(name: &str) -> ParameterDescriptor {
    ParameterDescriptor::new::<i64>(name)
}

/// Counts its calls and passes or refuses as configured.
struct Counting {
    calls: Arc<AtomicUsize>,
    pass: bool,
}

impl Counting {
    fn new(pass: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
                pass,
            },
            calls,
        )
    }
}

#[async_trait]
impl Precondition for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    async fn check(&self, _context: &CommandContext, _command: &Command) -> Result<(), PreconditionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.pass {
            Ok(())
        } else {
            Err(PreconditionError::new("Not today."))
        }
    }
}

#[derive(Default)]
struct Replies(Mutex<Vec<String>>);

#[async_trait]
impl Responder for Replies {
    async fn respond(&self, text: &str) -> anyhow::Result<()> {
        self.0.lock().push(text.to_string());
        Ok(())
    }
}

// --- Search and overloads ---

fn overload_service() -> CommandService {
    CommandService::builder()
        .module(
            host("overloads")
                .command(answer("cmd", "usage").error_overload())
                .command(answer("cmd", "two").parameter(int("a")).parameter(int("b")))
                .command(answer("cmd", "one").parameter(int("a")))
                .command(answer("exact", "exact").parameter(int("a")))
                .submodule(
                    ModuleBuilder::<Host>::group("g")
                        .default_constructor()
                        .submodule(host("gg").command(answer("c", "plain")))
                        .submodule(
                            ModuleBuilder::<Host>::group("gg")
                                .default_constructor()
                                .command(answer("c", "nested")),
                        ),
                ),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn overloads_are_tried_fewest_parameters_first() {
    let service = overload_service();
    assert_eq!(text(&run(&service, "cmd 1").await), "one");
    assert_eq!(text(&run(&service, "CMD 1 2").await), "two");
}

#[tokio::test]
async fn error_overload_catches_whatever_the_others_reject() {
    let service = overload_service();
    assert_eq!(text(&run(&service, "cmd 1 2 3").await), "usage");
    assert_eq!(text(&run(&service, "cmd x").await), "usage");
    assert_eq!(text(&run(&service, "cmd").await), "usage");
}

#[tokio::test]
async fn wrong_token_count_is_a_read_failure() {
    let service = overload_service();
    let result = run(&service, "exact 1 2").await;
    assert_eq!(stage(&result), Stage::Read);
    let error = result.unwrap_err();
    assert!(matches!(
        error,
        DispatchError::Read {
            error: ReadError::ArgumentCount { min: 1, max: 1, given: 2, .. },
            ..
        }
    ));
    assert_eq!(error.to_string(), "'exact' takes 1 argument(s) but 2 were given.");
}

#[tokio::test]
async fn groups_are_addressed_level_by_level() {
    let service = overload_service();
    let result = run(&service, "g gg c").await;
    assert_eq!(text(&result), "nested");
    assert_eq!(result.unwrap().name, "g gg c");

    // `gg` without the group flag is see-through, so its `c` sits directly under `g`.
    assert_eq!(text(&run(&service, "g c").await), "plain");

    assert_eq!(stage(&run(&service, "gg c").await), Stage::Search);
    let missing = run(&service, "g").await.unwrap_err();
    assert!(matches!(missing, DispatchError::Search(SearchError::MissingSubcommand { .. })));
    let unknown = run(&service, "g gg nope").await.unwrap_err();
    assert_eq!(unknown.to_string(), "Unknown command 'nope' in 'g gg'.");
}

#[tokio::test]
async fn empty_input_is_a_parse_failure() {
    let service = overload_service();
    let result = run(&service, "   ").await;
    assert!(matches!(result, Err(DispatchError::Parse(ParseError::Empty))));
}

// --- Reading ---

fn reading_service(config: DispatchConfig) -> CommandService {
    CommandService::builder()
        .config(config)
        .module(
            host("reading")
                .command(
                    CommandBuilder::new("echo")
                        .parameter(ParameterDescriptor::new::<String>("text").remainder())
                        .sync_handler(|_, _, args| Ok(args.require::<String>(0)?.into())),
                )
                .command(
                    CommandBuilder::new("f")
                        .parameter(int("a"))
                        .parameter(int("b").default_value(10_i64))
                        .sync_handler(|_, _, args| {
                            Ok((args.require::<i64>(0)? + args.require::<i64>(1)?).to_string().into())
                        }),
                )
                .command(answer("p", "int").parameter(int("value")))
                .command(answer("p", "text").parameter(ParameterDescriptor::new::<String>("value")))
                .command(
                    CommandBuilder::new("paint")
                        .parameter(ParameterDescriptor::new::<Color>("color"))
                        .sync_handler(|_, _, args| Ok(args.require::<Color>(0)?.to_string().into())),
                )
                .command(
                    CommandBuilder::new("span")
                        .parameter(ParameterDescriptor::new::<Duration>("length"))
                        .sync_handler(|_, _, args| {
                            Ok(args.require::<Duration>(0)?.as_secs().to_string().into())
                        }),
                ),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn remainder_takes_the_rest_of_the_line() {
    let service = reading_service(DispatchConfig::default());
    assert_eq!(text(&run(&service, "echo  hello   big world").await), "hello big world");
}

#[tokio::test]
async fn optional_parameter_falls_back_to_its_default() {
    let service = reading_service(DispatchConfig::default());
    assert_eq!(text(&run(&service, "f 5").await), "15");
    assert_eq!(text(&run(&service, "f 5 1").await), "6");
}

#[tokio::test]
async fn cascade_moves_on_to_the_next_overload() {
    let service = reading_service(DispatchConfig::default());
    assert_eq!(text(&run(&service, "p 12").await), "int");
    assert_eq!(text(&run(&service, "p twelve").await), "text");
}

#[tokio::test]
async fn fail_policy_stops_at_the_first_read_failure() {
    let config = DispatchConfig {
        read_failure: ReadFailurePolicy::Fail,
        ..Default::default()
    };
    let service = reading_service(config);
    let error = run(&service, "p twelve").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Read);
    assert!(matches!(
        error,
        DispatchError::Read {
            error: ReadError::Conversion { .. },
            ..
        }
    ));
    assert!(error.to_string().contains("'twelve'"));
}

#[tokio::test]
async fn colors_and_durations_are_read_by_default() {
    let service = reading_service(DispatchConfig::default());
    assert_eq!(text(&run(&service, "paint red").await), "#FF0000");
    assert_eq!(text(&run(&service, "paint #00ff7f").await), "#00FF7F");
    assert_eq!(text(&run(&service, "span 00:05:30").await), "330");
    assert_eq!(text(&run(&service, "span \"5 minutes and 30 seconds\"").await), "330");
    assert_eq!(stage(&run(&service, "paint notacolor").await), Stage::Read);
}

#[tokio::test]
async fn typed_tokens_skip_the_readers() {
    let service = reading_service(DispatchConfig::default());
    let input = vec![Token::from("paint"), Token::typed(Color::rgb(1, 2, 3))];
    let result = service.execute(&mut CommandContext::new(input)).await;
    assert_eq!(text(&result), "#010203");
}

#[tokio::test]
async fn prefixes_come_from_the_config() {
    let config = DispatchConfig {
        prefixes: vec!["!".to_string()],
        ..Default::default()
    };
    let service = reading_service(config);
    assert_eq!(text(&run(&service, "!f 1").await), "11");
    assert!(matches!(
        run(&service, "f 1").await,
        Err(DispatchError::Parse(ParseError::MissingPrefix))
    ));
}

#[tokio::test]
async fn oversized_duration_is_a_read_failure() {
    let service = reading_service(DispatchConfig::default());
    let error = run(&service, "span 213503982334602.00:00:00").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Read);
    assert!(error.to_string().contains("too long"));

    let error = run(&service, "span 99999999999999999999.01:00:00").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Read);
    assert!(error.to_string().contains("out of range"));
}

struct Fuse;

#[tokio::test]
async fn reader_panic_is_a_read_failure() {
    let service = CommandService::builder()
        .reader(FnReader::new(|_raw: &str| -> Result<Fuse, String> { panic!("reader blew up") }))
        .module(host("fuses").command(answer("light", "lit").parameter(ParameterDescriptor::new::<Fuse>("fuse"))))
        .build()
        .unwrap();

    let error = run(&service, "light now").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Read);
    assert_eq!(error.command(), Some("light"));
    let message = error.to_string();
    assert!(message.contains("'fuse'"));
    assert!(message.contains("reader blew up"));
}

// --- Preconditions ---

struct Tag;

#[tokio::test]
async fn module_precondition_runs_once_and_blocks_reading() {
    let (locked, calls) = Counting::new(false);
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);

    let service = CommandService::builder()
        .reader(FnReader::new(move |_raw: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Tag)
        }))
        .module(
            ModuleBuilder::<Host>::group("locked")
                .default_constructor()
                .precondition(locked)
                .command(answer("x", "tag").parameter(ParameterDescriptor::new::<Tag>("tag")))
                .command(answer("x", "pair").parameter(int("a")).parameter(int("b"))),
        )
        .build()
        .unwrap();

    let error = run(&service, "locked x 1").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Check);
    assert_eq!(error.command(), Some("locked x"));
    assert_eq!(error.to_string(), "Not today.");
    match &error {
        DispatchError::Check { failure, .. } => assert_eq!(failure.precondition, "counting"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn command_precondition_failure_cascades_to_the_next_overload() {
    let (module_check, module_calls) = Counting::new(true);
    let (refuse, refuse_calls) = Counting::new(false);

    let service = CommandService::builder()
        .module(
            ModuleBuilder::<Host>::group("guarded")
                .default_constructor()
                .precondition(module_check)
                .command(answer("y", "first").priority(1).precondition(refuse))
                .command(answer("y", "second")),
        )
        .build()
        .unwrap();

    assert_eq!(text(&run(&service, "guarded y").await), "second");
    assert_eq!(module_calls.load(Ordering::SeqCst), 1);
    assert_eq!(refuse_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn first_failing_precondition_stops_the_rest() {
    let (refuse, refuse_calls) = Counting::new(false);
    let (allow, allow_calls) = Counting::new(true);

    let service = CommandService::builder()
        .module(host("gates").command(answer("open", "opened").precondition(refuse).precondition(allow)))
        .build()
        .unwrap();

    let error = run(&service, "open").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Check);
    assert_eq!(error.to_string(), "Not today.");
    assert_eq!(refuse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(allow_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_module_precondition_skips_command_preconditions() {
    let (module_check, module_calls) = Counting::new(false);
    let (own, own_calls) = Counting::new(true);

    let service = CommandService::builder()
        .module(
            ModuleBuilder::<Host>::group("vault")
                .default_constructor()
                .precondition(module_check)
                .command(answer("open", "opened").precondition(own)),
        )
        .build()
        .unwrap();

    let error = run(&service, "vault open").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Check);
    assert_eq!(error.to_string(), "Not today.");
    assert_eq!(module_calls.load(Ordering::SeqCst), 1);
    assert_eq!(own_calls.load(Ordering::SeqCst), 0);
}

struct Exploding;

#[async_trait]
impl Precondition for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn check(&self, _context: &CommandContext, _command: &Command) -> Result<(), PreconditionError> {
        panic!("precondition blew up")
    }
}

#[tokio::test]
async fn precondition_panic_is_a_check_failure() {
    let service = CommandService::builder()
        .module(host("mines").command(answer("step", "safe").precondition(Exploding)))
        .build()
        .unwrap();

    let error = run(&service, "step").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Check);
    match &error {
        DispatchError::Check { failure, .. } => assert_eq!(failure.precondition, "exploding"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(error.to_string().contains("precondition blew up"));
}

// --- Construction and execution ---

struct Database;

struct Needy {
    _database: Arc<Database>,
}

impl CommandModule for Needy {}

struct Relaxed {
    database: Option<Arc<Database>>,
}

impl CommandModule for Relaxed {}

struct Fragile;

impl CommandModule for Fragile {}

/// Records the order of hook and body calls.
#[derive(Default)]
struct Journal(Mutex<Vec<&'static str>>);

struct Hooked {
    journal: Arc<Journal>,
}

#[async_trait]
impl CommandModule for Hooked {
    async fn before_execute(&mut self, _context: &CommandContext, _command: &Command) -> anyhow::Result<()> {
        self.journal.0.lock().push("before");
        Ok(())
    }

    async fn after_execute(&mut self, _context: &CommandContext, _command: &Command) -> anyhow::Result<()> {
        self.journal.0.lock().push("after");
        Ok(())
    }
}

fn lifecycle_service(with_database: bool) -> (CommandService, Arc<Journal>) {
    let journal = Arc::new(Journal::default());
    let mut builder = CommandService::builder()
        .service(Arc::clone(&journal))
        .module(
            ModuleBuilder::<Needy>::new("needy")
                .constructor(
                    ModuleConstructor::new(|deps| {
                        Ok(Needy {
                            _database: deps.require::<Database>()?,
                        })
                    })
                    .requires::<Database>(),
                )
                .command(CommandBuilder::new("needy").sync_handler(|_, _, _| Ok("ok".into()))),
        )
        .module(
            ModuleBuilder::<Relaxed>::new("relaxed")
                .constructor(
                    ModuleConstructor::new(|deps| {
                        Ok(Relaxed {
                            database: deps.get::<Database>(),
                        })
                    })
                    .optional::<Database>(),
                )
                .command(CommandBuilder::new("relaxed").sync_handler(|module: &mut Relaxed, _, _| {
                    Ok(module.database.is_some().to_string().into())
                })),
        )
        .module(
            ModuleBuilder::<Fragile>::new("fragile")
                .constructor(ModuleConstructor::new::<Fragile, _>(|_| panic!("no way")))
                .command(CommandBuilder::new("fragile").sync_handler(|_, _, _| Ok(().into()))),
        )
        .module(
            ModuleBuilder::<Hooked>::new("hooked")
                .constructor(
                    ModuleConstructor::new(|deps| {
                        Ok(Hooked {
                            journal: deps.require::<Arc<Journal>>()?.as_ref().clone(),
                        })
                    })
                    .requires::<Arc<Journal>>(),
                )
                .command(CommandBuilder::new("work").sync_handler(|module: &mut Hooked, _, _| {
                    module.journal.0.lock().push("body");
                    Ok(().into())
                }))
                .command(CommandBuilder::new("broken").sync_handler(|module: &mut Hooked, _, _| {
                    module.journal.0.lock().push("body");
                    anyhow::bail!("disk full")
                }))
                .command(CommandBuilder::new("explode").sync_handler(|_, _, _| panic!("kaboom")))
                .command(
                    CommandBuilder::new("number").sync_handler(|_, _, _| Ok(CommandOutput::value(42_u8))),
                )
                .command(CommandBuilder::new("later").handler(|_, ctx, _| {
                    Box::pin(async move {
                        tokio::task::yield_now().await;
                        let output: CommandOutput =
                            format!("done {}", ctx.command_name().unwrap_or_default()).into();
                        Ok::<_, anyhow::Error>(output)
                    })
                })),
        );
    if with_database {
        builder = builder.service(Database);
    }
    (builder.build().unwrap(), journal)
}

#[tokio::test]
async fn missing_required_service_fails_construction() {
    let (service, _) = lifecycle_service(false);
    let error = run(&service, "needy").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Construction);
    assert!(error.to_string().contains("'Database'"));

    let (service, _) = lifecycle_service(true);
    assert_eq!(text(&run(&service, "needy").await), "ok");
}

#[tokio::test]
async fn missing_optional_service_leaves_a_notice() {
    let (service, _) = lifecycle_service(false);
    let success = run(&service, "relaxed").await.unwrap();
    assert_eq!(success.output.text(), Some("false"));
    assert_eq!(success.notices, vec!["Optional service 'Database' is not available.".to_string()]);

    let (service, _) = lifecycle_service(true);
    let success = run(&service, "relaxed").await.unwrap();
    assert_eq!(success.output.text(), Some("true"));
    assert!(success.notices.is_empty());
}

#[tokio::test]
async fn constructor_panic_is_a_construction_failure() {
    let (service, _) = lifecycle_service(true);
    let error = run(&service, "fragile").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Construction);
    assert!(error.to_string().contains("no way"));
}

#[tokio::test]
async fn hooks_wrap_the_body() {
    let (service, journal) = lifecycle_service(true);
    run(&service, "work").await.unwrap();
    assert_eq!(*journal.0.lock(), vec!["before", "body", "after"]);
}

#[tokio::test]
async fn body_error_skips_the_after_hook() {
    let (service, journal) = lifecycle_service(true);
    let error = run(&service, "broken").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Execute);
    assert_eq!(error.to_string(), "'broken' failed: disk full");
    assert!(error.error().is_some());
    assert_eq!(*journal.0.lock(), vec!["before", "body"]);
}

#[tokio::test]
async fn body_panic_is_an_execute_failure() {
    let (service, _) = lifecycle_service(true);
    let error = run(&service, "explode").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Execute);
    assert!(error.to_string().contains("kaboom"));
}

#[tokio::test]
async fn unhandled_return_value_is_an_execute_failure() {
    let (service, _) = lifecycle_service(true);
    let error = run(&service, "number").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Execute);
    assert!(error.to_string().contains("u8"));
}

#[tokio::test]
async fn spawned_executions_run_on_the_runtime() {
    let (service, _) = lifecycle_service(true);
    let service = Arc::new(service);
    let handles: Vec<_> = (0..4)
        .map(|_| service.spawn(CommandContext::new("later")))
        .collect();
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(text(&result), "done later");
    }
}

#[tokio::test]
async fn responder_receives_output_and_errors() {
    let (service, _) = lifecycle_service(true);
    let replies = Arc::new(Replies::default());

    let mut context = CommandContext::new("later").with_responder(replies.clone());
    service.execute(&mut context).await.unwrap();
    assert_eq!(context.command_name(), Some("later"));
    assert!(context.command().is_some());

    let mut context = CommandContext::new("broken").with_responder(replies.clone());
    service.execute(&mut context).await.unwrap_err();

    let mut context = CommandContext::new("work").with_responder(replies.clone());
    service.execute(&mut context).await.unwrap();

    assert_eq!(
        *replies.0.lock(),
        vec!["done later".to_string(), "'broken' failed: disk full".to_string()]
    );
}

#[tokio::test]
async fn complex_parameters_build_from_their_children() {
    #[derive(Clone, Debug, PartialEq)]
    struct Span {
        from: i64,
        to: i64,
    }

    let span = ParameterDescriptor::complex::<Span>("span").constructor(parley::ComplexConstructor::new(
        vec![int("from"), int("to")],
        |args: &Arguments| {
            let (from, to): (i64, i64) = (args.require(0)?, args.require(1)?);
            anyhow::ensure!(from <= to, "{} comes after {}", from, to);
            Ok(Span { from, to })
        },
    ));
    let service = CommandService::builder()
        .module(host("complex").command(
            CommandBuilder::new("len")
                .parameter(span)
                .sync_handler(|_, _, args| {
                    let span: Span = args.require(0)?;
                    Ok((span.to - span.from).to_string().into())
                }),
        ))
        .build()
        .unwrap();

    assert_eq!(text(&run(&service, "len 3 10").await), "7");
    let error = run(&service, "len 10 3").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Read);
    assert!(error.to_string().contains("10 comes after 3"));
}

/// Hooks that panic wherever they are called.
struct PanickyHooks;

#[async_trait]
impl DispatchHooks for PanickyHooks {
    async fn unhandled_return(
        &self,
        _context: &CommandContext,
        _command: &Command,
        _type_name: &'static str,
        _value: Value,
    ) -> anyhow::Result<CommandOutput> {
        panic!("return hook blew up")
    }

    async fn respond(&self, _context: &CommandContext, _result: &ExecutionResult) {
        panic!("respond hook blew up")
    }
}

#[tokio::test]
async fn hook_panics_stay_inside_the_result() {
    let service = CommandService::builder()
        .hooks(PanickyHooks)
        .module(
            host("hooks")
                .command(answer("ping", "pong"))
                .command(CommandBuilder::new("number").sync_handler(|_, _, _| Ok(CommandOutput::value(7_u8)))),
        )
        .build()
        .unwrap();

    assert_eq!(text(&run(&service, "ping").await), "pong");

    let error = run(&service, "number").await.unwrap_err();
    assert_eq!(error.stage(), Stage::Execute);
    assert!(error.to_string().contains("return hook blew up"));
}
