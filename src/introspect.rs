//! Runtime type descriptors and assignability
//!
//! Rust has no runtime reflection over function signatures, so the
//! resolver works with type tags captured at registration time: every
//! input and output slot carries a [`TypeSpec`], and every produced value
//! travels as an erased [`Value`] that can be recovered as `Arc<T>` for
//! the slot's declared type.
//!
//! Assignability comes in two flavors. Strict mode compares type
//! identities. Structural mode ("duck typing") additionally consults a
//! table of declared conformances between concrete types and trait
//! objects, in either direction — see [`conforms!`](crate::conforms).

use crate::error::BoxError;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Type descriptors
// =============================================================================

/// Runtime descriptor of a slot type.
///
/// Identity is the `TypeId`; the name is kept for diagnostics only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    id: TypeId,
    name: &'static str,
}

impl TypeSpec {
    /// Descriptor for `A`, which may be a trait object.
    #[inline]
    pub fn of<A: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: std::any::type_name::<A>(),
        }
    }

    /// Human-readable type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// True iff `spec` is the universal error type.
///
/// Error-typed results are consumed by the executor, never provided;
/// the check is structural on the type, not positional.
#[inline]
pub(crate) fn is_error_sentinel(spec: &TypeSpec) -> bool {
    spec.id == TypeId::of::<BoxError>()
}

// =============================================================================
// Erased values
// =============================================================================

/// A produced value, erased for storage in an output slot.
///
/// The payload is always `Arc<A>` for the slot's declared type `A`, so
/// sharing a value with several consumers is a reference-count bump.
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

impl Value {
    /// Erase an already-shared value.
    #[inline]
    pub fn of<A: ?Sized + Send + Sync + 'static>(value: Arc<A>) -> Self {
        Self(Arc::new(value))
    }

    /// Recover the payload as `Arc<A>`.
    ///
    /// Returns `None` when `A` is not the type the value was erased with.
    #[inline]
    pub fn extract<A: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<A>> {
        self.0.downcast_ref::<Arc<A>>().cloned()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Value(..)")
    }
}

// =============================================================================
// Conformances
// =============================================================================

/// A declared "implements" relation between a concrete type and a trait
/// object, with the upcast needed to materialize it.
///
/// Built with the [`conforms!`](crate::conforms) macro and handed to the
/// resolver via [`with_conformances`](crate::with_conformances).
#[derive(Clone)]
pub struct Conformance {
    concrete: TypeSpec,
    abstracted: TypeSpec,
    upcast: Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>,
}

impl Conformance {
    /// Declare that `C` satisfies `A` (typically `dyn Trait`).
    ///
    /// `cast` performs the unsizing coercion; [`conforms!`](crate::conforms)
    /// writes it for you.
    pub fn new<C, A>(cast: fn(Arc<C>) -> Arc<A>) -> Self
    where
        C: Send + Sync + 'static,
        A: ?Sized + Send + Sync + 'static,
    {
        Self {
            concrete: TypeSpec::of::<C>(),
            abstracted: TypeSpec::of::<A>(),
            upcast: Arc::new(move |value| value.extract::<C>().map(|c| Value::of(cast(c)))),
        }
    }
}

impl fmt::Debug for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.concrete.name, self.abstracted.name)
    }
}

/// Declare the trait objects a concrete type may stand in for.
///
/// Expands to a `Vec<Conformance>` suitable for
/// [`with_conformances`](crate::with_conformances):
///
/// ```
/// use revolve::conforms;
///
/// trait Greeter: Send + Sync {
///     fn hello(&self) -> &'static str;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn hello(&self) -> &'static str {
///         "hello"
///     }
/// }
///
/// let entries = conforms!(English => dyn Greeter);
/// assert_eq!(entries.len(), 1);
/// ```
#[macro_export]
macro_rules! conforms {
    ($concrete:ty => $($abstracted:ty),+ $(,)?) => {
        vec![$(
            $crate::Conformance::new::<$concrete, $abstracted>(
                |concrete| -> ::std::sync::Arc<$abstracted> { concrete },
            )
        ),+]
    };
}

// =============================================================================
// Assignability
// =============================================================================

/// Which values may satisfy which inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Assignability {
    /// Type identity only.
    #[default]
    Strict,
    /// Identity, or a declared conformance in either direction.
    Structural,
}

/// The resolver's view of all declared conformances.
#[derive(Clone, Default)]
pub(crate) struct ConformanceTable {
    entries: Vec<Conformance>,
}

impl ConformanceTable {
    pub(crate) fn extend(&mut self, entries: Vec<Conformance>) {
        self.entries.extend(entries);
    }

    fn conforms(&self, concrete: &TypeSpec, abstracted: &TypeSpec) -> bool {
        self.entries
            .iter()
            .any(|c| c.concrete == *concrete && c.abstracted == *abstracted)
    }

    /// May a value of `src` satisfy an input of `dst`?
    ///
    /// Structural mode admits both directions so that a concrete value can
    /// satisfy a trait-object parameter and a trait-object supply counts
    /// against a concrete consumer when checking uniqueness.
    pub(crate) fn assignable(&self, mode: Assignability, src: &TypeSpec, dst: &TypeSpec) -> bool {
        if src == dst {
            return true;
        }
        match mode {
            Assignability::Strict => false,
            Assignability::Structural => self.conforms(src, dst) || self.conforms(dst, src),
        }
    }

    /// Convert `value` (erased with type `src`) into the representation an
    /// input of `dst` expects, or `None` when no conversion exists.
    pub(crate) fn convert(&self, value: &Value, src: &TypeSpec, dst: &TypeSpec) -> Option<Value> {
        if src == dst {
            return Some(value.clone());
        }
        self.entries
            .iter()
            .find(|c| c.concrete == *src && c.abstracted == *dst)
            .and_then(|c| (c.upcast)(value))
    }
}
