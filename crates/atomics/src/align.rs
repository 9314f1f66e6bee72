//! Alignment requirements of composed operations.
//!
//! An [`Alignment`] carries two thresholds:
//!
//! - `recommended`: any object aligned to this is always valid.
//! - `minimum`: an object aligned only to this is valid when `size_within`
//!   is 0, or when the object does not straddle a `size_within` boundary
//!   (`addr % size_within + width <= size_within`).
//!
//! # Ordering
//!
//! Alignments are totally ordered, "larger" meaning "stricter":
//!
//! 1. `recommended`, larger is greater
//! 2. `minimum`, larger is greater
//! 3. `size_within`: 0 is the smallest value; among nonzero values a larger
//!    window is looser and therefore smaller
//!
//! Combining two requirements keeps the greater one whole. Taking a fieldwise
//! maximum could produce a triple neither contributor asked for.

use core::cmp::Ordering;

/// Alignment requirement for objects passed to composed operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Alignment {
  pub recommended: usize,
  pub minimum: usize,
  pub size_within: usize,
}

/// An alignment triple that violates the field invariants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AlignmentError {
  #[error("recommended alignment {0} is not a power of two")]
  Recommended(usize),
  #[error("minimum alignment {0} is not a power of two")]
  Minimum(usize),
  #[error("minimum alignment {minimum} exceeds recommended alignment {recommended}")]
  MinimumExceedsRecommended { minimum: usize, recommended: usize },
}

impl Alignment {
  /// No requirement at all: `{1, 1, 0}`. Identity for [`stricter`](Self::stricter).
  pub const PERMISSIVE: Self = Self::new(1, 1, 0);

  /// Construct without validation.
  #[inline]
  #[must_use]
  pub const fn new(recommended: usize, minimum: usize, size_within: usize) -> Self {
    Self {
      recommended,
      minimum,
      size_within,
    }
  }

  /// Natural alignment: both thresholds equal, no window.
  #[inline]
  #[must_use]
  pub const fn natural(align: usize) -> Self {
    Self::new(align, align, 0)
  }

  /// Construct, checking that both thresholds are powers of two and
  /// `minimum <= recommended`.
  pub const fn try_new(recommended: usize, minimum: usize, size_within: usize) -> Result<Self, AlignmentError> {
    if !recommended.is_power_of_two() {
      return Err(AlignmentError::Recommended(recommended));
    }
    if !minimum.is_power_of_two() {
      return Err(AlignmentError::Minimum(minimum));
    }
    if minimum > recommended {
      return Err(AlignmentError::MinimumExceedsRecommended { minimum, recommended });
    }
    Ok(Self::new(recommended, minimum, size_within))
  }

  /// Ordering key for `size_within`: 0 first, then nonzero windows from
  /// largest to smallest.
  #[inline]
  const fn window_key(size_within: usize) -> usize {
    if size_within == 0 {
      0
    } else {
      usize::MAX - (size_within - 1)
    }
  }

  /// Three-way comparison, see the module docs.
  #[inline]
  #[must_use]
  pub fn compare(&self, other: &Self) -> Ordering {
    self
      .recommended
      .cmp(&other.recommended)
      .then(self.minimum.cmp(&other.minimum))
      .then(Self::window_key(self.size_within).cmp(&Self::window_key(other.size_within)))
  }

  /// The stricter of two requirements.
  #[inline]
  #[must_use]
  pub fn stricter(self, other: Self) -> Self {
    core::cmp::max(self, other)
  }

  /// Whether `ptr` satisfies the recommended alignment.
  ///
  /// False when `recommended` is not a power of two.
  #[inline]
  #[must_use]
  pub fn meets_recommended(&self, ptr: *const u8) -> bool {
    self.recommended.is_power_of_two() && (ptr as usize) & (self.recommended - 1) == 0
  }

  /// Whether an object of `width` bytes at `ptr` satisfies the minimum
  /// alignment, including the `size_within` window when one is set.
  ///
  /// False when `minimum` is not a power of two.
  #[inline]
  #[must_use]
  pub fn meets_minimum(&self, ptr: *const u8, width: usize) -> bool {
    if !self.minimum.is_power_of_two() {
      return false;
    }
    let addr = ptr as usize;
    if addr & (self.minimum - 1) != 0 {
      return false;
    }
    if self.size_within == 0 {
      return true;
    }
    (addr % self.size_within)
      .checked_add(width)
      .is_some_and(|end| end <= self.size_within)
  }
}

impl Default for Alignment {
  fn default() -> Self {
    Self::PERMISSIVE
  }
}

impl PartialOrd for Alignment {
  #[inline]
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Alignment {
  #[inline]
  fn cmp(&self, other: &Self) -> Ordering {
    self.compare(other)
  }
}

impl core::fmt::Display for Alignment {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{{{}, {}, {}}}", self.recommended, self.minimum, self.size_within)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-function forms
// ─────────────────────────────────────────────────────────────────────────────

/// See [`Alignment::meets_recommended`].
#[inline]
#[must_use]
pub fn align_meets_recommended(ptr: *const u8, align: Alignment) -> bool {
  align.meets_recommended(ptr)
}

/// See [`Alignment::meets_minimum`].
#[inline]
#[must_use]
pub fn align_meets_minimum(ptr: *const u8, align: Alignment, width: usize) -> bool {
  align.meets_minimum(ptr, width)
}

/// See [`Alignment::compare`]; returns -1, 0 or 1.
#[inline]
#[must_use]
pub fn align_compare(lhs: Alignment, rhs: Alignment) -> i32 {
  match lhs.compare(&rhs) {
    Ordering::Less => -1,
    Ordering::Equal => 0,
    Ordering::Greater => 1,
  }
}

/// Static upper bound on the cache-line size (a power of two).
#[inline]
#[must_use]
pub const fn cache_line_size() -> usize {
  platform::cache_line_size()
}

#[cfg(test)]
mod tests {
  use std::alloc::{Layout, alloc, dealloc};

  use proptest::prelude::*;

  use super::*;

  #[test]
  fn documented_comparisons() {
    assert_eq!(align_compare(Alignment::new(1, 16, 16), Alignment::new(2, 8, 8)), -1);
    assert_eq!(align_compare(Alignment::new(64, 32, 0), Alignment::new(64, 32, 2)), -1);
    assert_eq!(align_compare(Alignment::new(8, 8, 2), Alignment::new(8, 8, 8)), 1);
    assert_eq!(align_compare(Alignment::new(8, 4, 0), Alignment::new(8, 4, 0)), 0);
  }

  #[test]
  fn stricter_keeps_one_whole_triple() {
    let a = Alignment::new(16, 1, 0);
    let b = Alignment::new(8, 8, 64);
    assert_eq!(a.stricter(b), a);
    assert_eq!(b.stricter(a), a);
    assert_eq!(Alignment::PERMISSIVE.stricter(b), b);
  }

  #[test]
  fn try_new_validates() {
    assert_eq!(Alignment::try_new(8, 4, 0), Ok(Alignment::new(8, 4, 0)));
    assert_eq!(Alignment::try_new(12, 4, 0), Err(AlignmentError::Recommended(12)));
    assert_eq!(Alignment::try_new(8, 0, 0), Err(AlignmentError::Minimum(0)));
    assert_eq!(
      Alignment::try_new(4, 8, 0),
      Err(AlignmentError::MinimumExceedsRecommended { minimum: 8, recommended: 4 })
    );
  }

  #[test]
  fn meets_recommended_checks_address() {
    let a = Alignment::natural(8);
    assert!(a.meets_recommended(core::ptr::without_provenance(64)));
    assert!(!a.meets_recommended(core::ptr::without_provenance(68)));
    assert!(!Alignment::new(6, 1, 0).meets_recommended(core::ptr::without_provenance(12)));
  }

  #[test]
  fn meets_minimum_respects_window() {
    let a = Alignment::new(8, 2, 8);
    // 4-byte object at offset 2 within an 8-byte window fits.
    assert!(a.meets_minimum(core::ptr::without_provenance(66), 4));
    // Offset 6 + 4 straddles the window.
    assert!(!a.meets_minimum(core::ptr::without_provenance(70), 4));
    // Misaligned for the minimum.
    assert!(!a.meets_minimum(core::ptr::without_provenance(65), 1));
    // Overflowing widths never fit.
    assert!(!a.meets_minimum(core::ptr::without_provenance(64), usize::MAX));
    assert!(!Alignment::new(8, 3, 0).meets_minimum(core::ptr::without_provenance(3), 1));
  }

  #[test]
  fn aligned_allocation_meets_minimum() {
    for (align, width) in [(1, 1), (2, 2), (4, 4), (8, 8), (16, 16), (64, 24)] {
      let a = Alignment::new(align, align, 0);
      let layout = Layout::from_size_align(width, a.minimum).unwrap();
      // SAFETY: layout has nonzero size.
      let ptr = unsafe { alloc(layout) };
      assert!(!ptr.is_null());
      assert!(a.meets_minimum(ptr, width));
      assert!(a.meets_recommended(ptr));
      // SAFETY: allocated above with the same layout.
      unsafe { dealloc(ptr, layout) };
    }
  }

  #[test]
  fn windowed_allocation_fits_up_to_window_end() {
    for (minimum, window) in [(8, 64), (4, 16), (16, 128)] {
      let a = Alignment::new(minimum, minimum, window);
      let layout = Layout::from_size_align(2 * window, window).unwrap();
      // SAFETY: layout has nonzero size.
      let base = unsafe { alloc(layout) };
      assert!(!base.is_null());

      for off in (0..window).step_by(minimum) {
        // SAFETY: `off < window`, inside the allocation.
        let ptr = unsafe { base.add(off) };
        let room = window - (ptr as usize % window);
        assert_eq!(room, window - off);
        for width in 1..=room {
          assert!(a.meets_minimum(ptr, width), "min {minimum} window {window} off {off} width {width}");
        }
        assert!(!a.meets_minimum(ptr, room + 1), "min {minimum} window {window} off {off}");
      }

      // Off the minimum grid nothing fits, whatever the width.
      // SAFETY: inside the allocation.
      let skewed = unsafe { base.add(minimum / 2) };
      assert!(!a.meets_minimum(skewed, 1));

      // SAFETY: allocated above with the same layout.
      unsafe { dealloc(base, layout) };
    }
  }

  #[test]
  fn cache_line_is_power_of_two() {
    assert!(cache_line_size().is_power_of_two());
  }

  fn arb_alignment() -> impl Strategy<Value = Alignment> {
    (0u32..8, 0u32..8, prop_oneof![Just(0usize), 1usize..256]).prop_map(|(r, m, s)| {
      let recommended = 1usize << r.max(m);
      let minimum = 1usize << m.min(r);
      Alignment::new(recommended, minimum, s)
    })
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn compare_is_reflexive(a in arb_alignment()) {
      prop_assert_eq!(align_compare(a, a), 0);
    }

    #[test]
    fn compare_is_antisymmetric(a in arb_alignment(), b in arb_alignment()) {
      prop_assert_eq!(align_compare(a, b), -align_compare(b, a));
      if align_compare(a, b) == 0 {
        prop_assert_eq!(a, b);
      }
    }

    #[test]
    fn compare_is_transitive(a in arb_alignment(), b in arb_alignment(), c in arb_alignment()) {
      if align_compare(a, b) <= 0 && align_compare(b, c) <= 0 {
        prop_assert!(align_compare(a, c) <= 0);
      }
    }

    #[test]
    fn zero_window_sorts_first(r in 0u32..8, s in 1usize..1024) {
      let unconditional = Alignment::natural(1 << r);
      let windowed = Alignment::new(1 << r, 1 << r, s);
      prop_assert_eq!(align_compare(unconditional, windowed), -1);
    }

    #[test]
    fn larger_window_is_looser(r in 0u32..8, s in 1usize..1024, extra in 1usize..1024) {
      let tight = Alignment::new(1 << r, 1, s);
      let loose = Alignment::new(1 << r, 1, s + extra);
      prop_assert_eq!(align_compare(loose, tight), -1);
    }

    #[test]
    fn stricter_is_commutative_and_dominant(a in arb_alignment(), b in arb_alignment()) {
      let s = a.stricter(b);
      prop_assert_eq!(s, b.stricter(a));
      prop_assert!(align_compare(s, a) >= 0);
      prop_assert!(align_compare(s, b) >= 0);
      prop_assert!(s == a || s == b);
    }

    #[test]
    fn recommended_implies_minimum_without_window(r in 0u32..8, m in 0u32..8, addr in 0usize..4096) {
      let a = Alignment::new(1 << r.max(m), 1 << r.min(m), 0);
      let ptr: *const u8 = core::ptr::without_provenance(addr);
      if a.meets_recommended(ptr) {
        prop_assert!(a.meets_minimum(ptr, 1));
      }
    }
  }
}
