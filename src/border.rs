use crate::utils::Position;

/// Playable area `[0, width) × [0, height)` in cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Border {
    pub width: i32,
    pub height: i32,
}

impl Border {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_inside(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    pub fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}
