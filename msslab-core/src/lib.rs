//! MSSLab Core: deterministic Market Structure Shift detection and backtest simulation.
//!
//! This crate contains the engine:
//! - Domain types (bars, swings, setups, plans, positions, closed trades, equity)
//! - Series preprocessor and CSV row reader
//! - Streaming indicator engine (EMA, swing points, trend)
//! - Session filter and MSS detector state machine
//! - Risk sizer and history evaluator
//! - Bar-by-bar simulation loop
//!
//! The engine performs no I/O beyond the optional CSV reader and never
//! installs a tracing subscriber.

pub mod buckets;
pub mod data;
pub mod detector;
pub mod domain;
pub mod engine;
pub mod history;
pub mod indicators;
pub mod risk;
pub mod scanner;
pub mod session;
