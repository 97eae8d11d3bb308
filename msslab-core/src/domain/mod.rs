//! Domain types for MSSLab

pub mod bar;
pub mod equity;
pub mod instrument;
pub mod ledger;
pub mod plan;
pub mod setup;
pub mod swing;
pub mod trade;
pub mod trend;

pub use bar::Bar;
pub use equity::EquityState;
pub use instrument::Instrument;
pub use ledger::Ledger;
pub use plan::{RejectReason, RejectedSetup, TradePlan};
pub use setup::Setup;
pub use swing::{SwingKind, SwingPoint};
pub use trade::{CloseReason, ClosedTrade, OpenPosition, PositionStatus};
pub use trend::{Direction, TrendState};
