//! Barrier Dispatch - Decorator Resolution
//!
//! Every heap access carries decorator bits describing what kind of access
//! it is (heap or native, weak or strong, scalar or array). Which barriers
//! actually run depends on the decorators AND the collector flavor.
//!
//! Resolution happens once, outside the hot path: a lookup table
//! `flavor x decorator-bits -> BarrierOps` is built at startup, and access
//! sites resolve their (static) decorator set up front. The per-access cost
//! is an array index, not a decision tree.

/// Access decorator bits
pub const IN_HEAP: u8 = 1 << 0;
pub const ON_WEAK_REF: u8 = 1 << 1;
pub const AS_ARRAY: u8 = 1 << 2;
pub const DEST_UNINITIALIZED: u8 = 1 << 3;
pub const IN_NATIVE: u8 = 1 << 4;

const DECORATOR_COMBINATIONS: usize = 32;

/// Collector flavor selecting the barrier family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorFlavor {
    /// Generational/regional collection: SATB pre-write and dirty-card
    /// post-write barriers, no load barrier.
    Regional = 0,
    /// Concurrent relocation: colored-pointer load barrier, no post-write.
    Relocating = 1,
}

/// The barriers that apply to one access shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierOps {
    /// Run the load barrier on reference reads
    pub load_barrier: bool,
    /// Reads resolve through the weak variant (may null dead referents)
    pub weak_load: bool,
    /// Reads resolve through native-handle healing (no marking)
    pub native_resolve: bool,
    /// Capture the pre-image before reference stores
    pub satb_pre: bool,
    /// Dirty the covering card after reference stores
    pub card_post: bool,
}

impl BarrierOps {
    fn resolve(flavor: CollectorFlavor, decorators: u8) -> BarrierOps {
        let in_heap = decorators & IN_HEAP != 0;
        let weak = decorators & ON_WEAK_REF != 0;
        let uninit = decorators & DEST_UNINITIALIZED != 0;
        let native = decorators & IN_NATIVE != 0;

        match flavor {
            CollectorFlavor::Regional => BarrierOps {
                load_barrier: false,
                weak_load: false,
                native_resolve: false,
                satb_pre: in_heap && !uninit && !native,
                card_post: in_heap && !native,
            },
            CollectorFlavor::Relocating => BarrierOps {
                load_barrier: !native,
                weak_load: weak && !native,
                native_resolve: native,
                satb_pre: in_heap && !uninit && !native,
                card_post: false,
            },
        }
    }
}

/// BarrierDispatch - precomputed decorator resolution table
pub struct BarrierDispatch {
    flavor: CollectorFlavor,
    table: [[BarrierOps; DECORATOR_COMBINATIONS]; 2],
}

impl BarrierDispatch {
    pub fn new(flavor: CollectorFlavor) -> Self {
        let mut table = [[BarrierOps::default(); DECORATOR_COMBINATIONS]; 2];
        for (f, row) in [CollectorFlavor::Regional, CollectorFlavor::Relocating]
            .into_iter()
            .zip(table.iter_mut())
        {
            for (bits, entry) in row.iter_mut().enumerate() {
                *entry = BarrierOps::resolve(f, bits as u8);
            }
        }
        Self { flavor, table }
    }

    pub fn flavor(&self) -> CollectorFlavor {
        self.flavor
    }

    /// Barriers for an access with the given decorators under the
    /// configured flavor.
    #[inline]
    pub fn ops(&self, decorators: u8) -> BarrierOps {
        self.table[self.flavor as usize][(decorators as usize) % DECORATOR_COMBINATIONS]
    }

    /// Same resolution under an explicit flavor, for tooling and tests.
    pub fn ops_for(&self, flavor: CollectorFlavor, decorators: u8) -> BarrierOps {
        self.table[flavor as usize][(decorators as usize) % DECORATOR_COMBINATIONS]
    }
}
