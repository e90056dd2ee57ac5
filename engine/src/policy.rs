//! Priority tiers and the view range they are tested against.

/// Priority of a candidate when competing for high-resolution slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PriorityTier {
    Low,
    #[default]
    Normal,
    High,
}

impl PriorityTier {
    pub const ALL: [Self; 3] = [Self::Low, Self::Normal, Self::High];

    /// Dense index for per-tier counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Chooses the range a candidate must be within to stay or become visible.
pub trait PriorityPolicy: Send + Sync {
    /// `current` is the observer's possibly shrunk range, `preferred` the range
    /// it grows back towards.
    fn view_range(&self, tier: PriorityTier, current: u32, preferred: u32) -> u32;
}

/// High-priority candidates ignore a shrunk range.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPriorityPolicy;

impl PriorityPolicy for DefaultPriorityPolicy {
    fn view_range(&self, tier: PriorityTier, current: u32, preferred: u32) -> u32 {
        match tier {
            PriorityTier::High => current.max(preferred),
            PriorityTier::Low | PriorityTier::Normal => current,
        }
    }
}
