//! Nodes and function adapters
//!
//! Every registered input — a pre-built value, a constructor, an entry
//! point — becomes a uniform [`Node`]: an optional erased callable, typed
//! input slots, typed output slots, and a forward-only state. The
//! resolver never sees user types; it moves [`Value`]s between slots and
//! lets the adapters built here recover the concrete `Arc<T>`s.
//!
//! The [`ResolveFn`] trait is the signature introspector: implemented for
//! `Fn(Arc<A1>, …, Arc<An>) -> O` up to eight parameters, it records the
//! parameter and result types in order and erases the callable. Result
//! shapes are decomposed by [`Outputs`]; a `Result<_, E>` declares a
//! trailing slot of the universal error type, which the executor consumes
//! rather than provides.

use crate::error::BoxError;
use crate::introspect::{is_error_sentinel, TypeSpec, Value};
use std::fmt;
use std::sync::Arc;

/// Index of a node in the resolver's arena.
pub(crate) type NodeId = usize;

// =============================================================================
// Node model
// =============================================================================

/// Lifecycle of a node. Transitions are forward-only; a provider found
/// below `Called` while its consumer collects arguments is a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeState {
    Initialized,
    Linked,
    Called,
}

/// One parameter of a node, bound to its producer during linking.
pub(crate) struct Input {
    pub(crate) spec: TypeSpec,
    /// Producing node and output index, set by the linker.
    pub(crate) source: Option<(NodeId, usize)>,
}

/// One result of a node, filled once the node has been called.
pub(crate) struct OutputSlot {
    pub(crate) spec: TypeSpec,
    pub(crate) value: Option<Value>,
}

/// Why an erased call did not produce values.
#[derive(Debug)]
pub(crate) enum CallFailure {
    /// The user function returned its own error.
    User(BoxError),
    /// The user function panicked; the payload rendered as a message.
    Panicked(String),
    /// An argument did not carry the expected payload type.
    ArgMismatch(TypeSpec),
}

pub(crate) type CallOutcome = Result<Vec<Value>, CallFailure>;

/// A registered callable, erased to operate on slot values. Values are
/// returned for non-error slots only, in declaration order.
pub(crate) type ErasedFn = Arc<dyn Fn(Vec<Value>) -> CallOutcome + Send + Sync>;

/// The single unit the resolver manipulates.
pub(crate) struct Node {
    /// Absent iff the node is a pre-supplied value.
    pub(crate) func: Option<ErasedFn>,
    pub(crate) name: &'static str,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<OutputSlot>,
    pub(crate) state: NodeState,
}

impl Node {
    /// A pre-built value: no callable, one already-filled output.
    pub(crate) fn supply(spec: TypeSpec, value: Value) -> Self {
        Self {
            func: None,
            name: "supply",
            inputs: Vec::new(),
            outputs: vec![OutputSlot {
                spec,
                value: Some(value),
            }],
            state: NodeState::Called,
        }
    }

    /// A constructor: inputs and outputs from the signature.
    pub(crate) fn provide(seed: FuncSeed) -> Self {
        Self {
            func: Some(seed.call),
            name: seed.name,
            inputs: seed.inputs.into_iter().map(Input::unbound).collect(),
            outputs: seed
                .outputs
                .into_iter()
                .map(|spec| OutputSlot { spec, value: None })
                .collect(),
            state: NodeState::Initialized,
        }
    }

    /// An entry point: inputs from the signature, no stored outputs
    /// (error-only results are consumed, not provided).
    pub(crate) fn invoke(seed: FuncSeed) -> Self {
        Self {
            func: Some(seed.call),
            name: seed.name,
            inputs: seed.inputs.into_iter().map(Input::unbound).collect(),
            outputs: Vec::new(),
            state: NodeState::Initialized,
        }
    }

    /// Signature rendered for diagnostics, e.g.
    /// `app::make_db(app::Config) -> (app::Db)`.
    pub(crate) fn signature(&self) -> String {
        if self.func.is_none() {
            return format!("supply({})", join_specs(self.outputs.iter().map(|o| &o.spec)));
        }
        format!(
            "{}({}) -> ({})",
            self.name,
            join_specs(self.inputs.iter().map(|i| &i.spec)),
            join_specs(self.outputs.iter().map(|o| &o.spec)),
        )
    }
}

impl Input {
    fn unbound(spec: TypeSpec) -> Self {
        Self { spec, source: None }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("signature", &self.signature())
            .field("state", &self.state)
            .finish()
    }
}

fn join_specs<'a>(specs: impl Iterator<Item = &'a TypeSpec>) -> String {
    specs.map(TypeSpec::name).collect::<Vec<_>>().join(", ")
}

// =============================================================================
// Signature capture
// =============================================================================

/// Parsed form of a registered callable, before it becomes a node.
#[doc(hidden)]
pub struct FuncSeed {
    pub(crate) name: &'static str,
    pub(crate) inputs: Vec<TypeSpec>,
    pub(crate) outputs: Vec<TypeSpec>,
    pub(crate) call: ErasedFn,
}

impl FuncSeed {
    /// Number of outputs that carry a value (the error sentinel excluded).
    pub(crate) fn value_outputs(&self) -> usize {
        self.outputs
            .iter()
            .filter(|spec| !is_error_sentinel(spec))
            .count()
    }

    pub(crate) fn signature(&self) -> String {
        format!(
            "{}({}) -> ({})",
            self.name,
            join_specs(self.inputs.iter()),
            join_specs(self.outputs.iter()),
        )
    }
}

/// Result shapes a registered callable may return.
///
/// A constructor provides each `Arc<_>` component as one output slot; an
/// entry point must not produce values, so it returns `()` or
/// `Result<(), E>`. `Result<_, E>` for any `E: Into<BoxError>` adds a
/// trailing slot of the universal error type, consumed by the executor.
pub trait Outputs: Send + 'static {
    /// Declared slot types, in order, including the error sentinel.
    fn specs() -> Vec<TypeSpec>;

    /// Split a returned value into per-slot values (error slots skipped)
    /// or the user's error.
    fn into_values(self) -> Result<Vec<Value>, BoxError>;
}

impl Outputs for () {
    fn specs() -> Vec<TypeSpec> {
        Vec::new()
    }

    fn into_values(self) -> Result<Vec<Value>, BoxError> {
        Ok(Vec::new())
    }
}

impl<U: ?Sized + Send + Sync + 'static> Outputs for Arc<U> {
    fn specs() -> Vec<TypeSpec> {
        vec![TypeSpec::of::<U>()]
    }

    fn into_values(self) -> Result<Vec<Value>, BoxError> {
        Ok(vec![Value::of(self)])
    }
}

macro_rules! impl_outputs_for_tuple {
    ($($member:ident),+) => {
        impl<$($member),+> Outputs for ($(Arc<$member>,)+)
        where
            $($member: ?Sized + Send + Sync + 'static,)+
        {
            fn specs() -> Vec<TypeSpec> {
                vec![$(TypeSpec::of::<$member>()),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<Value>, BoxError> {
                let ($($member,)+) = self;
                Ok(vec![$(Value::of($member)),+])
            }
        }
    };
}

impl_outputs_for_tuple!(A);
impl_outputs_for_tuple!(A, B);
impl_outputs_for_tuple!(A, B, C);
impl_outputs_for_tuple!(A, B, C, D);

impl<T, E> Outputs for Result<T, E>
where
    T: Outputs,
    E: Into<BoxError> + Send + 'static,
{
    fn specs() -> Vec<TypeSpec> {
        let mut specs = T::specs();
        specs.push(TypeSpec::of::<BoxError>());
        specs
    }

    fn into_values(self) -> Result<Vec<Value>, BoxError> {
        match self {
            Ok(value) => value.into_values(),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Function adapters
// =============================================================================

/// A callable with an introspectable signature.
///
/// Implemented for `Fn(Arc<A1>, …, Arc<An>) -> O` with up to eight
/// parameters, each `Ai: ?Sized + Send + Sync + 'static` (trait objects
/// included) and `O:` [`Outputs`]. The `Marker` parameter only guides
/// inference; callers never name it.
pub trait ResolveFn<Marker>: Send + Sync + 'static {
    #[doc(hidden)]
    fn seed(self) -> FuncSeed;
}

macro_rules! impl_resolve_fn {
    ($($param:ident),*) => {
        impl<Func, Out, $($param),*> ResolveFn<(Out, $(Arc<$param>,)*)> for Func
        where
            Func: Fn($(Arc<$param>),*) -> Out + Send + Sync + 'static,
            Out: Outputs,
            $($param: ?Sized + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn seed(self) -> FuncSeed {
                let call: ErasedFn = Arc::new(move |args: Vec<Value>| {
                    let mut args = args.into_iter();
                    $(
                        let $param: Arc<$param> = match args.next().and_then(|v| v.extract::<$param>()) {
                            Some(value) => value,
                            None => return Err(CallFailure::ArgMismatch(TypeSpec::of::<$param>())),
                        };
                    )*
                    (self)($($param),*).into_values().map_err(CallFailure::User)
                });
                FuncSeed {
                    name: std::any::type_name::<Func>(),
                    inputs: vec![$(TypeSpec::of::<$param>()),*],
                    outputs: Out::specs(),
                    call,
                }
            }
        }
    };
}

impl_resolve_fn!();
impl_resolve_fn!(A0);
impl_resolve_fn!(A0, A1);
impl_resolve_fn!(A0, A1, A2);
impl_resolve_fn!(A0, A1, A2, A3);
impl_resolve_fn!(A0, A1, A2, A3, A4);
impl_resolve_fn!(A0, A1, A2, A3, A4, A5);
impl_resolve_fn!(A0, A1, A2, A3, A4, A5, A6);
impl_resolve_fn!(A0, A1, A2, A3, A4, A5, A6, A7);
