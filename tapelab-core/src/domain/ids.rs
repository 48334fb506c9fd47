use std::fmt;

use serde::{Deserialize, Serialize};

/// Order ID, unique within one backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic order-id generator owned by the event loop.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next_order: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order);
        self.next_order += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_are_sequential() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.next_order_id(), OrderId(0));
        assert_eq!(gen.next_order_id(), OrderId(1));
        assert_eq!(gen.next_order_id(), OrderId(2));
    }
}
