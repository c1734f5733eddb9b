//! Registration options
//!
//! Everything handed to [`revolve`](crate::revolve) is an [`Opt`]: an
//! inert, composable description of what the container should know.
//! Options are applied strictly in the order given; registration order
//! decides invoke execution order and how ambiguity errors cite their
//! candidates. [`options`] groups a batch into one value, and
//! [`Opt::noop`] is a legal do-nothing placeholder.

use crate::introspect::{Conformance, TypeSpec, Value};
use crate::logger::{LogFn, LogLevel, Logger};
use crate::node::{FuncSeed, ResolveFn};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A single registration, or a group of them.
pub struct Opt {
    pub(crate) items: Vec<OptItem>,
}

pub(crate) enum OptItem {
    Supply { spec: TypeSpec, value: Value },
    Provide(FuncSeed),
    Invoke(FuncSeed),
    DuckTyping,
    DryRun,
    Conformances(Vec<Conformance>),
    Logger(LoggerTarget),
}

impl Opt {
    /// An option that registers nothing.
    pub fn noop() -> Self {
        Self { items: Vec::new() }
    }

    fn one(item: OptItem) -> Self {
        Self { items: vec![item] }
    }
}

impl fmt::Debug for Opt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opt").field("items", &self.items.len()).finish()
    }
}

/// Group options into one, preserving order.
pub fn options(opts: impl IntoIterator<Item = Opt>) -> Opt {
    Opt {
        items: opts.into_iter().flat_map(|o| o.items).collect(),
    }
}

/// Register a pre-built value as a fully-computed output of its type.
///
/// Consumers receive it as `Arc<T>`; supplying never fails.
pub fn supply<T: Send + Sync + 'static>(value: T) -> Opt {
    supply_arc(Arc::new(value))
}

/// Register an already-shared value, possibly a trait object.
///
/// The output slot type is `U`, so `supply_arc::<dyn Greeter>(imp)`
/// registers an interface-typed supply.
pub fn supply_arc<U: ?Sized + Send + Sync + 'static>(value: Arc<U>) -> Opt {
    Opt::one(OptItem::Supply {
        spec: TypeSpec::of::<U>(),
        value: Value::of(value),
    })
}

/// Register a constructor.
///
/// Parameters arrive as `Arc<_>`; results may be a single `Arc<_>`, a
/// tuple of them, and/or `Result<_, E>`. The constructor only runs if
/// something reachable from an entry point needs one of its outputs.
pub fn provide<Marker>(constructor: impl ResolveFn<Marker>) -> Opt {
    Opt::one(OptItem::Provide(constructor.seed()))
}

/// Register an entry point.
///
/// Entry points return `()` or `Result<(), E>` and run in registration
/// order once their transitive dependencies have been built.
pub fn invoke<Marker>(entry_point: impl ResolveFn<Marker>) -> Opt {
    Opt::one(OptItem::Invoke(entry_point.seed()))
}

/// Switch assignability from type identity to declared conformance
/// ("duck typing"), in either direction.
pub fn with_duck_typing() -> Opt {
    Opt::one(OptItem::DuckTyping)
}

/// Validate the graph — parse, link, cycle-check — without invoking any
/// user function.
pub fn with_dry_run() -> Opt {
    Opt::one(OptItem::DryRun)
}

/// Declare conformances for structural assignability; see
/// [`conforms!`](crate::conforms).
pub fn with_conformances(entries: Vec<Conformance>) -> Opt {
    Opt::one(OptItem::Conformances(entries))
}

/// Install a logging capability.
///
/// Accepts a [`Logger`] implementation, a plain sink callable
/// `Fn(LogLevel, &str)`, or a constructor whose dependencies are resolved
/// from the shared pool before the main resolve (the logger bootstrap).
/// A later `with_logger` replaces an earlier one.
pub fn with_logger<Marker>(target: impl IntoLoggerTarget<Marker>) -> Opt {
    Opt::one(OptItem::Logger(target.into_target()))
}

/// Install the stderr logger; handy while wiring an application up.
pub fn with_std_logger() -> Opt {
    with_logger(crate::logger::StdLogger)
}

// =============================================================================
// Logger target forms
// =============================================================================

/// Opaque parsed form of a [`with_logger`] target.
pub struct LoggerTarget {
    pub(crate) kind: LoggerKind,
}

pub(crate) enum LoggerKind {
    /// A ready logger value (implementation or wrapped sink callable).
    Ready(Arc<dyn Logger>),
    /// A constructor; resolved by the bootstrap sub-resolve.
    Ctor(FuncSeed),
}

/// The three shapes [`with_logger`] accepts. The `Marker` parameter only
/// guides inference; callers never name it.
pub trait IntoLoggerTarget<Marker> {
    #[doc(hidden)]
    fn into_target(self) -> LoggerTarget;
}

#[doc(hidden)]
pub struct ByLogger;

#[doc(hidden)]
pub struct BySink;

#[doc(hidden)]
pub struct ByCtor<Marker>(PhantomData<Marker>);

impl<L: Logger + 'static> IntoLoggerTarget<ByLogger> for L {
    fn into_target(self) -> LoggerTarget {
        LoggerTarget {
            kind: LoggerKind::Ready(Arc::new(self)),
        }
    }
}

impl<F> IntoLoggerTarget<BySink> for F
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    fn into_target(self) -> LoggerTarget {
        LoggerTarget {
            kind: LoggerKind::Ready(Arc::new(LogFn::new(self))),
        }
    }
}

impl<F, Marker> IntoLoggerTarget<ByCtor<Marker>> for F
where
    F: ResolveFn<Marker>,
{
    fn into_target(self) -> LoggerTarget {
        LoggerTarget {
            kind: LoggerKind::Ctor(self.seed()),
        }
    }
}
