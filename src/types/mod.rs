//! Type definitions for Safe transactions

mod operation;
mod wallet_info;

pub use operation::Operation;
pub use wallet_info::{ExecutionResult, WalletInfo};
