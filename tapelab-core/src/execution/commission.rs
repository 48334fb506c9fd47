use crate::config::CommissionConfig;

/// Commission schedule: per-share + flat per-trade + basis points of
/// notional, all summed. Any component left at zero is a no-op.
#[derive(Debug, Clone)]
pub struct CommissionModel {
    config: CommissionConfig,
}

impl CommissionModel {
    pub fn new(config: CommissionConfig) -> Self {
        Self { config }
    }

    pub fn charge(&self, quantity: f64, fill_price: f64) -> f64 {
        let notional = quantity * fill_price;
        self.config.per_share * quantity
            + self.config.per_trade
            + self.config.bps / 10_000.0 * notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_config_charges_nothing() {
        let model = CommissionModel::new(CommissionConfig::default());
        assert_eq!(model.charge(100.0, 50.0), 0.0);
    }

    #[test]
    fn components_sum() {
        let model = CommissionModel::new(CommissionConfig {
            per_share: 0.005,
            per_trade: 1.0,
            bps: 5.0,
        });
        // 100 shares at $50: 0.5 + 1.0 + 5000 * 0.0005 = 4.0
        assert_eq!(model.charge(100.0, 50.0), 4.0);
    }
}
