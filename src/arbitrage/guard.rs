use crate::models::SwapDirection;

/// Remembers the last confirmed swap direction so a stale signal cannot
/// repeat it. Alternating directions are let through.
#[derive(Debug, Clone, Default)]
pub struct DirectionGuard {
    last_direction: SwapDirection,
}

impl DirectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_direction(&self) -> SwapDirection {
        self.last_direction
    }

    pub fn should_suppress(&self, proposed: SwapDirection) -> bool {
        proposed == self.last_direction
    }

    /// Call only once the executor has confirmed the swap.
    pub fn record_swap(&mut self, direction: SwapDirection) {
        self.last_direction = direction;
    }
}
