use serde::{Deserialize, Serialize};

/// Instrument metadata: pip size, minimum tradable unit, account conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Instrument {
    pub symbol: String,
    /// Price increment of one pip (0.0001 for most majors, 0.01 for JPY crosses).
    pub pip_size: f64,
    /// Minimum tradable unit; sizes are floored to a multiple of this.
    pub lot_step: f64,
    /// Multiplier converting one unit of quote currency into account currency.
    pub quote_to_account: f64,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            pip_size: 0.0001,
            lot_step: 1.0,
            quote_to_account: 1.0,
        }
    }
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, pip_size: f64, lot_step: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pip_size,
            lot_step,
            quote_to_account: 1.0,
        }
    }

    /// Convert a price distance into pips.
    pub fn to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size
    }

    /// Convert a pip count into a price distance.
    pub fn from_pips(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    /// Round a quantity down to a whole number of lot steps.
    ///
    /// A relative tolerance absorbs representation error so that, e.g.,
    /// 124_999.999_999_99 units become 125_000 rather than 124_999.
    pub fn floor_to_lot(&self, quantity: f64) -> f64 {
        if !quantity.is_finite() || quantity <= 0.0 {
            return 0.0;
        }
        let lots = quantity / self.lot_step;
        (lots + lots.abs() * 1e-9).floor() * self.lot_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pip_conversion_roundtrip() {
        let eurusd = Instrument::default();
        assert!((eurusd.to_pips(0.0008) - 8.0).abs() < 1e-9);
        assert!((eurusd.from_pips(16.0) - 0.0016).abs() < 1e-12);

        let usdjpy = Instrument::new("USDJPY", 0.01, 1.0);
        assert!((usdjpy.to_pips(0.25) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn floor_to_lot_rounds_down() {
        let micro = Instrument::new("EURUSD", 0.0001, 1_000.0);
        assert_eq!(micro.floor_to_lot(125_999.0), 125_000.0);
        assert_eq!(micro.floor_to_lot(999.0), 0.0);
    }

    #[test]
    fn floor_to_lot_absorbs_representation_error() {
        let inst = Instrument::default();
        let qty = 100.0 / (1.09042 - 1.08962);
        assert_eq!(inst.floor_to_lot(qty), 125_000.0);
    }

    #[test]
    fn floor_to_lot_rejects_garbage() {
        let inst = Instrument::default();
        assert_eq!(inst.floor_to_lot(-5.0), 0.0);
        assert_eq!(inst.floor_to_lot(f64::NAN), 0.0);
        assert_eq!(inst.floor_to_lot(f64::INFINITY), 0.0);
    }
}
