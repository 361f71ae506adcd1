//! Composite cache key for rendered text artifacts.
//!
//! A [`Key`] fingerprints everything that influences how a piece of text is
//! drawn: the interface style, the rendering attributes and the size the
//! layout was constrained to.  The hash is computed once, when the key is
//! built, so probing the store never rehashes the attribute bundle.
//!
//! # Example
//! ```
//! use layoutcache::key::{InterfaceStyle, Key, Size};
//!
//! let a = Key::new(InterfaceStyle::Dark, "Helvetica 14pt", Size::new(320.0, 44.0));
//! let b = Key::new(InterfaceStyle::Dark, "Helvetica 14pt", Size::new(320.0, 44.0));
//! assert_eq!(a, b);
//! assert_eq!(a.hash_value(), b.hash_value());
//! ```

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;

// Fixed seeds: keys built on different threads (or by different caches) must
// agree on their fingerprint.
const SEED: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

#[inline]
fn fingerprint_state() -> RandomState {
    RandomState::with_seeds(SEED[0], SEED[1], SEED[2], SEED[3])
}

// ---------------------------------------------------------------------------
// InterfaceStyle
// ---------------------------------------------------------------------------

/// Display-mode discriminator the text was rendered for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InterfaceStyle {
    #[default]
    Unspecified,
    Light,
    Dark,
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// A 2D size constraint in layout units.
///
/// Equality and hashing operate on the IEEE bit patterns with `-0.0` folded
/// into `0.0`, which keeps `Eq` reflexive even for NaN dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    #[inline]
    fn canonical_bits(v: f64) -> u64 {
        if v == 0.0 {
            0
        } else {
            v.to_bits()
        }
    }

    #[inline]
    fn bits(&self) -> (u64, u64) {
        (
            Self::canonical_bits(self.width),
            Self::canonical_bits(self.height),
        )
    }
}

impl PartialEq for Size {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Size {}

impl Hash for Size {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let (w, h) = self.bits();
        state.write_u64(w);
        state.write_u64(h);
    }
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Immutable composite key: `(interface style, attributes, constrained size)`.
///
/// `A` is the caller's attribute bundle (fonts, colours, paragraph style...).
/// Its `Hash` and `Eq` must agree with each other; the key relies on it.
#[derive(Clone, Debug)]
pub struct Key<A> {
    interface_style: InterfaceStyle,
    attributes: A,
    constrained_size: Size,
    hash: u64,
}

impl<A: Hash> Key<A> {
    pub fn new(interface_style: InterfaceStyle, attributes: A, constrained_size: Size) -> Self {
        let hash = fingerprint_state().hash_one((&interface_style, &attributes, &constrained_size));
        Key {
            interface_style,
            attributes,
            constrained_size,
            hash,
        }
    }
}

impl<A> Key<A> {
    #[inline]
    pub fn interface_style(&self) -> InterfaceStyle {
        self.interface_style
    }

    #[inline]
    pub fn attributes(&self) -> &A {
        &self.attributes
    }

    #[inline]
    pub fn constrained_size(&self) -> Size {
        self.constrained_size
    }

    /// The fingerprint computed at construction.
    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    #[cfg(test)]
    pub(crate) fn with_forced_hash(mut self, hash: u64) -> Self {
        self.hash = hash;
        self
    }
}

impl<A: PartialEq> PartialEq for Key<A> {
    /// Cheapest and most discriminating fields first.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.constrained_size == other.constrained_size
            && self.attributes == other.attributes
            && self.interface_style == other.interface_style
    }
}

impl<A: Eq> Eq for Key<A> {}

impl<A> Hash for Key<A> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

// ---------------------------------------------------------------------------
// Pass-through hasher
// ---------------------------------------------------------------------------

/// A [`Hasher`] that forwards a precomputed 64-bit fingerprint unchanged.
///
/// Intended for maps keyed by [`Key`], whose `Hash` impl writes exactly one
/// `u64`.  Other input is folded in with a multiplicative mix so the hasher
/// stays usable for arbitrary keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrecomputedHasher {
    state: u64,
}

impl Hasher for PrecomputedHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.state = if self.state == 0 {
            n
        } else {
            (self.state.rotate_left(5) ^ n).wrapping_mul(0x517c_c1b7_2722_0a95)
        };
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state.rotate_left(5) ^ b as u64).wrapping_mul(0x517c_c1b7_2722_0a95);
        }
    }
}

/// [`BuildHasher`] for [`PrecomputedHasher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyBuildHasher;

impl BuildHasher for KeyBuildHasher {
    type Hasher = PrecomputedHasher;

    #[inline]
    fn build_hasher(&self) -> PrecomputedHasher {
        PrecomputedHasher::default()
    }
}
