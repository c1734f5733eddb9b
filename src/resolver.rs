//! The resolver core
//!
//! [`revolve`] drives the whole pipeline: apply options, bootstrap the
//! logger if one was registered, then resolve the demand graph. The
//! resolver owns an arena of [`Node`]s with index links — the graph is
//! single-shot, so everything is dropped together when `revolve` returns.
//!
//! Resolution is demand-driven: a depth-first traversal starts from each
//! entry point in registration order, links nodes the first time they are
//! needed, and calls every producer strictly before its consumers.
//! Producers nothing demands are never linked nor called. Cycles are
//! detected structurally: a provider that is not yet `Called` while its
//! consumer collects arguments can only mean the traversal re-entered an
//! unfinished node, and the error is annotated with each signature as the
//! stack unwinds.

use crate::cancel::CancelToken;
use crate::error::{ResolveError, Result};
use crate::executor::Executor;
use crate::introspect::{is_error_sentinel, Assignability, ConformanceTable, TypeSpec, Value};
use crate::logger::{builtin_conformances, DiscardLogger, LogLevel, Logger};
use crate::node::{Node, NodeId, NodeState, ResolveFn};
use crate::option::{LoggerKind, LoggerTarget, Opt, OptItem};
use once_cell::sync::OnceCell;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

/// Safety net against pathological graphs; the state-based cycle
/// detector fires long before well-formed inputs get here.
const MAX_DEPTH: usize = 1000;

/// Resolve and run the registered graph.
///
/// Options apply in order, a failing option aborts immediately, then the
/// logger bootstrap (if a logger constructor was registered) and the main
/// resolve run under `token`. Returns the first error encountered:
/// registration errors, linking errors, cycles, a user function's own
/// error (unwrapped — downcast via
/// [`user_error`](ResolveError::user_error)), or
/// [`Cancelled`](ResolveError::Cancelled).
///
/// ```
/// use revolve::{invoke, provide, revolve, CancelToken};
/// use std::sync::Arc;
///
/// struct Config {
///     url: &'static str,
/// }
///
/// struct Database {
///     url: String,
/// }
///
/// let result = revolve(
///     &CancelToken::new(),
///     [
///         provide(|| Arc::new(Config { url: "postgres://localhost" })),
///         provide(|config: Arc<Config>| {
///             Arc::new(Database { url: config.url.to_string() })
///         }),
///         invoke(|db: Arc<Database>| {
///             assert_eq!(db.url, "postgres://localhost");
///         }),
///     ],
/// );
/// assert!(result.is_ok());
/// ```
pub fn revolve(token: &CancelToken, opts: impl IntoIterator<Item = Opt>) -> Result<()> {
    let mut resolver = Resolver::new(token.clone());
    for opt in opts {
        resolver.apply(opt)?;
    }
    resolver.log(LogLevel::Debug, "all options have been applied");

    resolver.bootstrap_logger()?;
    token.ensure_active()?;
    resolver.run()
}

struct Resolver {
    token: CancelToken,
    logger: Arc<dyn Logger>,
    table: ConformanceTable,
    assignability: Assignability,
    dry_run: bool,
    pool: Vec<Node>,
    /// Entry points, in registration order.
    invokes: Vec<NodeId>,
    /// Pool slot of the registered logger target, if any.
    logger_node: Option<NodeId>,
    /// Whether that target still needs the bootstrap sub-resolve.
    logger_is_ctor: bool,
}

impl Resolver {
    fn new(token: CancelToken) -> Self {
        #[cfg(feature = "tracing")]
        debug!("creating resolver");

        let mut table = ConformanceTable::default();
        table.extend(builtin_conformances());

        Self {
            token,
            logger: Arc::new(DiscardLogger),
            table,
            assignability: Assignability::default(),
            dry_run: false,
            pool: Vec::new(),
            invokes: Vec::new(),
            logger_node: None,
            logger_is_ctor: false,
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logger.print(level, message);
    }

    // =========================================================================
    // Option application
    // =========================================================================

    fn apply(&mut self, opt: Opt) -> Result<()> {
        for item in opt.items {
            match item {
                OptItem::Supply { spec, value } => {
                    self.pool.push(Node::supply(spec, value));
                }
                OptItem::Provide(seed) => {
                    if seed.value_outputs() == 0 {
                        return Err(ResolveError::UnsupportedProvideTarget(seed.signature()));
                    }
                    self.pool.push(Node::provide(seed));
                }
                OptItem::Invoke(seed) => {
                    if seed.value_outputs() > 0 {
                        return Err(ResolveError::UnsupportedInvokeTarget(seed.signature()));
                    }
                    let id = self.pool.len();
                    self.pool.push(Node::invoke(seed));
                    self.invokes.push(id);
                }
                OptItem::DuckTyping => self.assignability = Assignability::Structural,
                OptItem::DryRun => self.dry_run = true,
                OptItem::Conformances(entries) => self.table.extend(entries),
                OptItem::Logger(target) => self.set_logger(target),
            }
        }
        Ok(())
    }

    fn set_logger(&mut self, target: LoggerTarget) {
        let node = match target.kind {
            LoggerKind::Ready(logger) => {
                let node = Node::supply(
                    TypeSpec::of::<dyn Logger>(),
                    Value::of::<dyn Logger>(Arc::clone(&logger)),
                );
                self.logger = logger;
                self.logger_is_ctor = false;
                node
            }
            LoggerKind::Ctor(seed) => {
                // Until the bootstrap runs, nothing is installed.
                self.logger = Arc::new(DiscardLogger);
                self.logger_is_ctor = true;
                Node::provide(seed)
            }
        };

        // A later with_logger replaces the earlier target in place, so the
        // pool never holds two competing logger producers.
        match self.logger_node {
            Some(id) => self.pool[id] = node,
            None => {
                self.logger_node = Some(self.pool.len());
                self.pool.push(node);
            }
        }
    }

    // =========================================================================
    // Logger bootstrap
    // =========================================================================

    /// Resolve the logger constructor before anything else runs.
    ///
    /// The sub-resolve is rooted at a synthetic entry point consuming
    /// `Arc<dyn Logger>` and always uses structural assignability, so a
    /// constructor may return a logger implementation or a [`LogFn`]
    /// sink behind the same parameter. The provider pool is shared with
    /// the main resolve: dependencies built here are built exactly once.
    ///
    /// [`LogFn`]: crate::LogFn
    fn bootstrap_logger(&mut self) -> Result<()> {
        if !self.logger_is_ctor {
            return Ok(());
        }
        let logger_id = match self.logger_node {
            Some(id) => id,
            None => return Ok(()),
        };

        // The declared target must itself be able to produce a logger.
        let logger_spec = TypeSpec::of::<dyn Logger>();
        let produces_logger = self.pool[logger_id].outputs.iter().any(|output| {
            !is_error_sentinel(&output.spec)
                && self
                    .table
                    .assignable(Assignability::Structural, &output.spec, &logger_spec)
        });
        if !produces_logger {
            return Err(ResolveError::UnsupportedLoggerProvider(
                self.pool[logger_id].signature(),
            ));
        }

        let cell: Arc<OnceCell<Arc<dyn Logger>>> = Arc::new(OnceCell::new());
        let install = Arc::clone(&cell);
        let seed = ResolveFn::seed(move |logger: Arc<dyn Logger>| {
            let _ = install.set(logger);
        });

        let root = self.pool.len();
        self.pool.push(Node::invoke(seed));
        self.resolve_roots(&[root], Assignability::Structural)?;

        if let Some(logger) = cell.get() {
            self.logger = Arc::clone(logger);
            self.log(LogLevel::Debug, "logger installed");
        }
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    fn run(&mut self) -> Result<()> {
        if self.assignability == Assignability::Structural {
            self.log(LogLevel::Debug, "duck typing enabled");
        }
        for id in 0..self.pool.len() {
            if !self.pool[id].outputs.is_empty() {
                let message = format!("provide {}", self.pool[id].signature());
                self.log(LogLevel::Debug, &message);
            }
        }

        let roots = self.invokes.clone();
        self.resolve_roots(&roots, self.assignability)
    }

    /// Sub-resolve primitive: link and call everything the given roots
    /// transitively demand, then the roots themselves, in order.
    fn resolve_roots(&mut self, roots: &[NodeId], mode: Assignability) -> Result<()> {
        for &root in roots {
            self.dfs(root, 0, mode)?;
        }
        Ok(())
    }

    fn dfs(&mut self, id: NodeId, depth: usize, mode: Assignability) -> Result<()> {
        match self.step(id, depth, mode) {
            Err(ResolveError::CyclicProvideDetected { mut path }) => {
                // Annotate on the way up so the cycle reads left-to-right.
                path.insert(0, self.pool[id].signature());
                Err(ResolveError::CyclicProvideDetected { path })
            }
            other => other,
        }
    }

    fn step(&mut self, id: NodeId, depth: usize, mode: Assignability) -> Result<()> {
        self.token.ensure_active()?;
        if depth > MAX_DEPTH {
            return Err(ResolveError::CyclicProvideDetected { path: Vec::new() });
        }

        if self.pool[id].state == NodeState::Initialized {
            let providers = self.link(id, mode)?;
            for provider in providers {
                self.dfs(provider, depth + 1, mode)?;
            }
        }

        if self.pool[id].state < NodeState::Called {
            let executor = Executor {
                token: &self.token,
                logger: self.logger.as_ref(),
                table: &self.table,
                dry_run: self.dry_run,
            };
            executor.call(&mut self.pool, id)?;
        }
        Ok(())
    }

    // =========================================================================
    // Linking
    // =========================================================================

    /// Bind every input of `id` to its unique producer and return the
    /// producers in input-declaration order.
    fn link(&mut self, id: NodeId, mode: Assignability) -> Result<Vec<NodeId>> {
        let mut bindings = Vec::with_capacity(self.pool[id].inputs.len());
        for index in 0..self.pool[id].inputs.len() {
            let spec = self.pool[id].inputs[index].spec;
            bindings.push(self.find_provider(id, &spec, mode)?);
        }

        let node = &mut self.pool[id];
        for (input, source) in node.inputs.iter_mut().zip(&bindings) {
            input.source = Some(*source);
        }
        node.state = NodeState::Linked;

        #[cfg(feature = "tracing")]
        trace!(node = %self.pool[id].signature(), "linked");

        Ok(bindings.into_iter().map(|(provider, _)| provider).collect())
    }

    /// Find the single output across the pool assignable to `spec`.
    ///
    /// A node never provides for itself, error-typed outputs are never
    /// producers, and a second admissible output anywhere — including a
    /// second output of the same candidate — is an ambiguity.
    fn find_provider(
        &self,
        consumer: NodeId,
        spec: &TypeSpec,
        mode: Assignability,
    ) -> Result<(NodeId, usize)> {
        let mut selected: Option<(NodeId, usize)> = None;
        for (candidate_id, candidate) in self.pool.iter().enumerate() {
            if candidate_id == consumer {
                continue;
            }
            for (output_index, output) in candidate.outputs.iter().enumerate() {
                if is_error_sentinel(&output.spec) {
                    continue;
                }
                if !self.table.assignable(mode, &output.spec, spec) {
                    continue;
                }
                if let Some((first, _)) = selected {
                    return Err(ResolveError::MultipleProvide {
                        type_name: spec.name(),
                        first: self.pool[first].signature(),
                        second: candidate.signature(),
                    });
                }
                selected = Some((candidate_id, output_index));
            }
        }
        selected.ok_or_else(|| ResolveError::CannotProvideValue {
            type_name: spec.name(),
            consumer: self.pool[consumer].signature(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::logger::LogFn;
    use crate::option::{
        invoke, provide, supply, supply_arc, with_conformances, with_dry_run, with_duck_typing,
        with_logger,
    };
    use crate::conforms;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    struct Foo;
    struct Bar;
    struct Buzz;

    trait IFoo: Send + Sync {
        fn foo(&self) {}
    }

    trait IBar: Send + Sync {
        fn bar(&self) {}
    }

    struct FooBar;

    impl IFoo for Foo {}
    impl IFoo for FooBar {}
    impl IBar for FooBar {}

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[test]
    fn empty_run_resolves_nothing() {
        revolve(&CancelToken::new(), [Opt::noop()]).unwrap();
        revolve(&CancelToken::new(), None::<Opt>).unwrap();
    }

    #[test]
    fn undemanded_provider_is_never_called() {
        revolve(
            &CancelToken::new(),
            [provide(|| -> Arc<Foo> { panic!("nothing demands this") })],
        )
        .unwrap();
    }

    #[test]
    fn option_order_is_irrelevant_for_linking() {
        let calls = counter();
        let seen = Arc::clone(&calls);
        revolve(
            &CancelToken::new(),
            [
                invoke(move |_foo: Arc<Foo>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
                provide(|| Arc::new(Foo)),
            ],
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chained_providers_resolve_depth_first() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let bar_log = Arc::clone(&order);
        let foo_log = Arc::clone(&order);
        let invoke_log = Arc::clone(&order);

        revolve(
            &CancelToken::new(),
            [
                provide(move |_bar: Arc<Bar>| {
                    foo_log.lock().push("foo");
                    Arc::new(Foo)
                }),
                provide(move || {
                    bar_log.lock().push("bar");
                    Arc::new(Bar)
                }),
                invoke(move |_foo: Arc<Foo>| {
                    invoke_log.lock().push("invoke");
                }),
            ],
        )
        .unwrap();

        assert_eq!(*order.lock(), vec!["bar", "foo", "invoke"]);
    }

    #[test]
    fn shared_provider_is_called_at_most_once() {
        let calls = counter();

        let foo_calls = Arc::clone(&calls);
        revolve(
            &CancelToken::new(),
            [
                provide(move || {
                    foo_calls.fetch_add(1, Ordering::SeqCst);
                    Arc::new(Foo)
                }),
                provide(|foo: Arc<Foo>| -> (Arc<Bar>,) {
                    let _ = foo;
                    (Arc::new(Bar),)
                }),
                provide(|foo: Arc<Foo>| {
                    let _ = foo;
                    Arc::new(Buzz)
                }),
                invoke(|_bar: Arc<Bar>, _buzz: Arc<Buzz>| {}),
            ],
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoke_roots_run_in_registration_order() {
        let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);

        revolve(
            &CancelToken::new(),
            [
                invoke(move || first.lock().push(1)),
                invoke(move || second.lock().push(2)),
            ],
        )
        .unwrap();

        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn multiple_provide_is_rejected() {
        let err = revolve(
            &CancelToken::new(),
            [
                provide(|| Arc::new(Foo)),
                provide(|| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>| {}),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MultipleProvide { .. }));
    }

    #[test]
    fn strict_mode_rejects_duplicate_supplies_of_one_type() {
        let err = revolve(
            &CancelToken::new(),
            [supply(Foo), supply(Foo), invoke(|_foo: Arc<Foo>| {})],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MultipleProvide { .. }));
    }

    #[test]
    fn missing_provider_cites_the_consumer() {
        let err = revolve(&CancelToken::new(), [invoke(|_foo: Arc<Foo>| {})]).unwrap_err();
        match err {
            ResolveError::CannotProvideValue { type_name, consumer } => {
                assert!(type_name.contains("Foo"));
                assert!(consumer.contains("{{closure}}"));
            }
            other => panic!("expected CannotProvideValue, got {other}"),
        }
    }

    #[test]
    fn cycle_is_detected_and_annotated() {
        let err = revolve(
            &CancelToken::new(),
            [
                provide(|_foo: Arc<Foo>| Arc::new(Bar)),
                provide(|_bar: Arc<Bar>| Arc::new(Buzz)),
                provide(|_buzz: Arc<Buzz>| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>, _bar: Arc<Bar>| {}),
            ],
        )
        .unwrap_err();

        match err {
            ResolveError::CyclicProvideDetected { path } => {
                // root -> (Buzz)->Foo -> (Bar)->Buzz -> (Foo)->Bar -> (Buzz)->Foo
                assert_eq!(path.len(), 5);
                assert_eq!(path[1], path[4]);
            }
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[test]
    fn duck_typed_supply_satisfies_every_consumer() {
        let calls = counter();
        let first = Arc::clone(&calls);
        let second = Arc::clone(&calls);

        revolve(
            &CancelToken::new(),
            [
                with_duck_typing(),
                with_conformances(conforms!(FooBar => dyn IFoo, dyn IBar)),
                supply(FooBar),
                invoke(move |foo: Arc<dyn IFoo>| {
                    foo.foo();
                    first.fetch_add(1, Ordering::SeqCst);
                }),
                invoke(move |bar: Arc<dyn IBar>| {
                    bar.bar();
                    second.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duck_typed_supply_is_shared_by_independent_roots() {
        // One concrete supply, two entry points consuming the same
        // trait-object parameter: both link to the identical value.
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);

        revolve(
            &CancelToken::new(),
            [
                with_duck_typing(),
                with_conformances(conforms!(Foo => dyn IFoo)),
                supply(Foo),
                invoke(move |foo: Arc<dyn IFoo>| {
                    first.lock().push(Arc::as_ptr(&foo) as *const () as usize);
                }),
                invoke(move |foo: Arc<dyn IFoo>| {
                    second.lock().push(Arc::as_ptr(&foo) as *const () as usize);
                }),
            ],
        )
        .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn duck_typing_detects_ambiguous_conformances() {
        let err = revolve(
            &CancelToken::new(),
            [
                with_duck_typing(),
                with_conformances(conforms!(FooBar => dyn IFoo)),
                with_conformances(conforms!(Foo => dyn IFoo)),
                supply(FooBar),
                supply(Foo),
                invoke(|_foo: Arc<dyn IFoo>| {}),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MultipleProvide { .. }));
    }

    #[test]
    fn structural_admission_is_symmetric() {
        // A trait-object supply counts against a concrete consumer when
        // checking uniqueness.
        let err = revolve(
            &CancelToken::new(),
            [
                with_duck_typing(),
                with_conformances(conforms!(Foo => dyn IFoo)),
                supply_arc::<dyn IFoo>(Arc::new(FooBar)),
                supply(Foo),
                invoke(|_foo: Arc<Foo>| {}),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MultipleProvide { .. }));
    }

    #[test]
    fn trait_object_supply_matches_exactly_under_strict_mode() {
        let calls = counter();
        let seen = Arc::clone(&calls);

        revolve(
            &CancelToken::new(),
            [
                supply_arc::<dyn IFoo>(Arc::new(FooBar)),
                invoke(move |foo: Arc<dyn IFoo>| {
                    foo.foo();
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_values_are_never_producers() {
        let boxed: BoxError = "not a value".into();
        let err = revolve(
            &CancelToken::new(),
            [supply(boxed), invoke(|_e: Arc<BoxError>| {})],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::CannotProvideValue { .. }));
    }

    #[test]
    fn provider_error_short_circuits_the_resolve() {
        #[derive(Debug, thiserror::Error)]
        #[error("provide test err")]
        struct ProvideErr;

        let calls = counter();
        let seen = Arc::clone(&calls);

        let err = revolve(
            &CancelToken::new(),
            [
                provide(|| -> Result<Arc<Foo>, ProvideErr> { Err(ProvideErr) }),
                invoke(move |_foo: Arc<Foo>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap_err();

        assert!(err.user_error().unwrap().downcast_ref::<ProvideErr>().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_provider_aborts_the_resolve() {
        let calls = counter();
        let seen = Arc::clone(&calls);

        let err = revolve(
            &CancelToken::new(),
            [
                provide(|| -> Arc<Foo> { panic!("constructor exploded") }),
                invoke(move |_foo: Arc<Foo>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("panicked"));
        assert!(message.contains("constructor exploded"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invoke_error_propagates_unwrapped() {
        #[derive(Debug, thiserror::Error)]
        #[error("invoke test err")]
        struct InvokeErr;

        let err = revolve(
            &CancelToken::new(),
            [
                provide(|| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>| -> Result<(), InvokeErr> { Err(InvokeErr) }),
            ],
        )
        .unwrap_err();
        assert!(err.user_error().unwrap().downcast_ref::<InvokeErr>().is_some());
    }

    #[test]
    fn multi_output_and_fallible_tuple_providers() {
        let calls = counter();
        let seen = Arc::clone(&calls);

        revolve(
            &CancelToken::new(),
            [
                provide(|| (Arc::new(Foo), Arc::new(Bar))),
                provide(|| -> Result<(Arc<Buzz>,), BoxError> { Ok((Arc::new(Buzz),)) }),
                invoke(move |_foo: Arc<Foo>, _bar: Arc<Bar>, _buzz: Arc<Buzz>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // =========================================================================
    // Dry run
    // =========================================================================

    #[test]
    fn dry_run_links_but_never_invokes() {
        revolve(
            &CancelToken::new(),
            [
                with_dry_run(),
                provide(|| -> Arc<Foo> { panic!("dry run must not build") }),
                invoke(|_foo: Arc<Foo>| -> () {
                    panic!("dry run must not invoke");
                }),
            ],
        )
        .unwrap();
    }

    #[test]
    fn dry_run_still_reports_link_errors() {
        let err = revolve(
            &CancelToken::new(),
            [
                with_dry_run(),
                provide(|| Arc::new(Foo)),
                provide(|| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>| {}),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::MultipleProvide { .. }));
    }

    #[test]
    fn dry_run_still_reports_cycles() {
        let err = revolve(
            &CancelToken::new(),
            [
                with_dry_run(),
                provide(|_foo: Arc<Foo>| Arc::new(Bar)),
                provide(|_bar: Arc<Bar>| Arc::new(Buzz)),
                provide(|_buzz: Arc<Buzz>| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>, _bar: Arc<Bar>| {}),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::CyclicProvideDetected { .. }));
    }

    // =========================================================================
    // Registration validation
    // =========================================================================

    #[test]
    fn valueless_provide_is_unsupported() {
        let err = revolve(&CancelToken::new(), [provide(|| {})]).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedProvideTarget(_)));

        let err = revolve(
            &CancelToken::new(),
            [provide(|| -> Result<(), BoxError> { Ok(()) })],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedProvideTarget(_)));
    }

    #[test]
    fn value_returning_invoke_is_unsupported() {
        let err = revolve(&CancelToken::new(), [invoke(|| Arc::new(Foo))]).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedInvokeTarget(_)));
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn pre_cancelled_token_runs_nothing() {
        let token = CancelToken::new();
        token.cancel();

        let calls = counter();
        let seen = Arc::clone(&calls);
        let err = revolve(
            &token,
            [
                provide(|| Arc::new(Foo)),
                invoke(move |_foo: Arc<Foo>| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deadline_token_preempts_a_blocking_invoke() {
        let token = CancelToken::with_timeout(Duration::from_millis(50));
        let started = Instant::now();

        let err = revolve(
            &token,
            [invoke(|| thread::sleep(Duration::from_secs(5)))],
        )
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    // =========================================================================
    // Logger wiring
    // =========================================================================

    fn recording_sink() -> (Arc<Mutex<Vec<(LogLevel, String)>>>, Opt) {
        let entries: Arc<Mutex<Vec<(LogLevel, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&entries);
        let opt = with_logger(move |level: LogLevel, message: &str| {
            sink.lock().push((level, message.to_string()));
        });
        (entries, opt)
    }

    #[test]
    fn sink_logger_records_call_timing() {
        let (entries, logger) = recording_sink();

        revolve(
            &CancelToken::new(),
            [
                logger,
                provide(|| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>| {}),
            ],
        )
        .unwrap();

        let entries = entries.lock();
        assert!(entries.iter().any(|(level, message)| {
            *level == LogLevel::Info
                && message.starts_with("executing ")
                && message.contains("completed in")
        }));
    }

    #[test]
    fn logger_implementation_installs_directly() {
        revolve(
            &CancelToken::new(),
            [
                with_logger(DiscardLogger),
                provide(|| Arc::new(Foo)),
                invoke(|_foo: Arc<Foo>| {}),
            ],
        )
        .unwrap();
    }

    #[test]
    fn logger_constructor_resolves_from_the_shared_pool() {
        let foo_calls = counter();
        let entries: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let built = Arc::clone(&foo_calls);
        let sink = Arc::clone(&entries);
        let invoked = counter();
        let invoked_seen = Arc::clone(&invoked);

        revolve(
            &CancelToken::new(),
            [
                provide(move || {
                    built.fetch_add(1, Ordering::SeqCst);
                    Arc::new(Foo)
                }),
                with_logger(move |_foo: Arc<Foo>| -> Arc<dyn Logger> {
                    let sink = Arc::clone(&sink);
                    Arc::new(LogFn::new(move |_level, message: &str| {
                        sink.lock().push(message.to_string());
                    }))
                }),
                invoke(move |_foo: Arc<Foo>| {
                    invoked_seen.fetch_add(1, Ordering::SeqCst);
                }),
            ],
        )
        .unwrap();

        // The logger's dependency was built once, during the bootstrap,
        // and reused by the main resolve.
        assert_eq!(foo_calls.load(Ordering::SeqCst), 1);
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert!(entries.lock().iter().any(|m| m.contains("completed in")));
    }

    #[test]
    fn logger_constructor_may_return_a_sink() {
        revolve(
            &CancelToken::new(),
            [
                with_logger(|| Arc::new(LogFn::new(|_level, _message: &str| {}))),
                invoke(|| {}),
            ],
        )
        .unwrap();
    }

    #[test]
    fn non_logger_constructor_is_unsupported() {
        let err = revolve(
            &CancelToken::new(),
            [with_logger(|| Arc::new(Foo)), invoke(|| {})],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedLoggerProvider(_)));
    }

    #[test]
    fn later_logger_replaces_the_earlier_one() {
        let (entries, logger) = recording_sink();

        revolve(
            &CancelToken::new(),
            [
                with_logger(|_level: LogLevel, _message: &str| {
                    panic!("replaced logger must not receive entries")
                }),
                logger,
                invoke(|| {}),
            ],
        )
        .unwrap();

        assert!(!entries.lock().is_empty());
    }
}
