//! Scoped attribute patching
//!
//! [`AttributePatch`] temporarily overrides an optional field of a target and
//! restores it when the guard is dropped: after normal completion, after an
//! early `?` return, or while unwinding from a panic. A field that was `None`
//! before the patch is `None` again afterwards.
//!
//! # Example
//!
//! ```
//! use cuantizar::patch::AttributePatch;
//!
//! struct Greeter {
//!     name: Option<String>,
//! }
//!
//! let mut greeter = Greeter { name: None };
//! {
//!     let patched = AttributePatch::new(&mut greeter, |g| &mut g.name, "bar".to_string());
//!     assert_eq!(patched.name.as_deref(), Some("bar"));
//!     assert!(!patched.existed());
//! }
//! assert!(greeter.name.is_none());
//! ```

use std::ops::{Deref, DerefMut};

/// Accessor for the patched slot of a target
pub type Slot<T, V> = fn(&mut T) -> &mut Option<V>;

/// Guard that restores a patched attribute on drop
///
/// The guard dereferences to the target, so code inside the scope keeps
/// using the target through it.
pub struct AttributePatch<'a, T, V> {
    target: &'a mut T,
    slot: Slot<T, V>,
    saved: Option<V>,
}

impl<'a, T, V> AttributePatch<'a, T, V> {
    /// Patch `slot` of `target` with `value` until the guard is dropped
    pub fn new(target: &'a mut T, slot: Slot<T, V>, value: V) -> Self {
        let saved = slot(target).replace(value);
        Self {
            target,
            slot,
            saved,
        }
    }

    /// Whether the attribute held a value before the patch
    pub fn existed(&self) -> bool {
        self.saved.is_some()
    }

    /// Value the attribute will be restored to
    pub fn saved(&self) -> Option<&V> {
        self.saved.as_ref()
    }
}

impl<T, V> Deref for AttributePatch<'_, T, V> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.target
    }
}

impl<T, V> DerefMut for AttributePatch<'_, T, V> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.target
    }
}

impl<T, V> Drop for AttributePatch<'_, T, V> {
    fn drop(&mut self) {
        let saved = self.saved.take();
        *(self.slot)(&mut *self.target) = saved;
    }
}

/// Run `f` with `slot` of `target` patched to `value`
///
/// The attribute is restored before the result, success or error, is
/// handed back.
pub fn with_patch<T, V, R>(
    target: &mut T,
    slot: Slot<T, V>,
    value: V,
    f: impl FnOnce(&mut T) -> R,
) -> R {
    let mut patched = AttributePatch::new(target, slot, value);
    f(&mut patched)
}
