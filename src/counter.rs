// SPDX-License-Identifier: Apache-2.0

//! A checked-overflow counter, used for `BytesInFlight` and related byte
//! tallies that must never silently wrap.
//!
//! Rather than wrapping on overflow/underflow, the counter saturates. The
//! counter operates in two modes:
//!
//! * If `debug_assertions` are enabled (or the `checked-counters` feature is
//!   set), the counter panics on overflow -- a contract violation should be
//!   caught in development rather than masked.
//! * Otherwise, the counter saturates at the numeric type's bounds.

use core::{cmp::Ordering, marker::PhantomData, ops};
use num_traits::{SaturatingAdd, SaturatingSub};

#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct Counter<T, Behavior = ()>(T, PhantomData<Behavior>);

/// Overrides the behavior of a counter to always saturate, even in debug builds.
#[derive(Clone, Copy, Debug, Default, Hash)]
pub struct Saturating;

impl<T, Behavior> Counter<T, Behavior> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value, PhantomData)
    }

    #[inline]
    pub fn set(&mut self, value: T) {
        self.0 = value;
    }

    #[inline]
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        self.0
    }
}

impl<T> ops::AddAssign<T> for Counter<T, ()>
where
    T: SaturatingAdd + ops::Add<Output = T> + Copy,
{
    #[inline]
    fn add_assign(&mut self, rhs: T) {
        if cfg!(feature = "checked-counters") || cfg!(debug_assertions) {
            self.0 = self.0 + rhs;
        } else {
            self.0 = self.0.saturating_add(&rhs);
        }
    }
}

impl<T> ops::SubAssign<T> for Counter<T, ()>
where
    T: SaturatingSub + ops::Sub<Output = T> + Copy,
{
    #[inline]
    fn sub_assign(&mut self, rhs: T) {
        if cfg!(feature = "checked-counters") || cfg!(debug_assertions) {
            self.0 = self.0 - rhs;
        } else {
            self.0 = self.0.saturating_sub(&rhs);
        }
    }
}

impl<T> ops::AddAssign<T> for Counter<T, Saturating>
where
    T: SaturatingAdd + Copy,
{
    #[inline]
    fn add_assign(&mut self, rhs: T) {
        self.0 = self.0.saturating_add(&rhs);
    }
}

impl<T> ops::SubAssign<T> for Counter<T, Saturating>
where
    T: SaturatingSub + Copy,
{
    #[inline]
    fn sub_assign(&mut self, rhs: T) {
        self.0 = self.0.saturating_sub(&rhs);
    }
}

impl<T, B> ops::Deref for Counter<T, B> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, B> PartialEq<T> for Counter<T, B>
where
    T: PartialEq<T>,
{
    #[inline]
    fn eq(&self, other: &T) -> bool {
        self.0 == *other
    }
}

impl<T, B> PartialOrd<T> for Counter<T, B>
where
    T: PartialOrd<T>,
{
    #[inline]
    fn partial_cmp(&self, other: &T) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_and_subs() {
        let mut a: Counter<u32> = Counter::new(0);
        a += 1u32;
        a += 2u32;
        a -= 1u32;
        assert_eq!(a, 2u32);
    }

    #[test]
    fn saturating_behavior_always_clamps() {
        let mut a: Counter<u8, Saturating> = Counter::new(0);
        a += 250u8;
        a += 250u8;
        assert_eq!(a, 255u8);

        a -= 255u8;
        a -= 10u8;
        assert_eq!(a, 0u8);
    }
}
