// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cell payload contract.
//!
//! A cell carries no behavioral state. Everything the engine needs to decide a
//! swap lives in the parallel metadata array; the payload only has to be
//! totally ordered and expose a numeric projection for the insertion prefix
//! scan.

/// Payload sorted by the engine.
///
/// `Ord` drives every swap decision. [`Cell::value`] is consulted only by the
/// insertion algotype's left-prefix check, which compares numeric values
/// against a running sentinel. The two must agree in direction: if `a < b`
/// then `a.value() <= b.value()`.
pub trait Cell: Ord + Clone + Send + Sync + 'static {
    /// Numeric projection used by the insertion prefix check.
    fn value(&self) -> i64;
}

macro_rules! impl_cell_for_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Cell for $t {
                #[inline]
                fn value(&self) -> i64 {
                    i64::from(*self)
                }
            }
        )*
    };
}

impl_cell_for_int!(i8, i16, i32, i64, u8, u16, u32);
