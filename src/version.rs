//! Safe protocol revisions and the behaviour that differs between them

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a revision produces its initial `safeTxGas` estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStrategy {
    /// `requiredTxGas`, which reports the estimate through revert data
    RequiredTxGas,
    /// `SimulateTxAccessor.simulate` routed through the fallback handler
    SimulateAccessor,
}

/// A historically distinct Safe contract revision.
///
/// Every released version maps to exactly one revision; revisions are ordered oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Revision {
    /// 0.0.x and 0.1.0. Uses `dataGas` in the SafeTx struct.
    V001,
    V100,
    /// 1.1.x. Introduces paginated modules and the fallback manager.
    V111,
    V120,
    /// 1.3.x. Binds the chain id into the EIP-712 domain and adds guards.
    V130,
    /// 1.4.x. Drops `requiredTxGas`.
    V141,
}

impl Revision {
    /// Newest known revision, used when detection fails
    pub const LATEST: Revision = Revision::V141;

    pub const ALL: [Revision; 6] = [
        Revision::V001,
        Revision::V100,
        Revision::V111,
        Revision::V120,
        Revision::V130,
        Revision::V141,
    ];

    /// Maps a version string such as `1.3.0` or `1.3.0+L2` onto its revision
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim().trim_start_matches('v');
        let parsed = Version::parse(trimmed).ok()?;
        match (parsed.major, parsed.minor) {
            (0, _) => Some(Revision::V001),
            (1, 0) => Some(Revision::V100),
            (1, 1) => Some(Revision::V111),
            (1, 2) => Some(Revision::V120),
            (1, 3) => Some(Revision::V130),
            (1, _) => Some(Revision::V141),
            _ => None,
        }
    }

    /// Like [`Revision::parse`] but falls back to [`Revision::LATEST`]
    pub fn from_version(version: &str) -> Self {
        Self::parse(version).unwrap_or_else(|| {
            warn!(version, fallback = %Self::LATEST, "unrecognized Safe version");
            Self::LATEST
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Revision::V001 => "0.0.1",
            Revision::V100 => "1.0.0",
            Revision::V111 => "1.1.1",
            Revision::V120 => "1.2.0",
            Revision::V130 => "1.3.0",
            Revision::V141 => "1.4.1",
        }
    }

    /// `baseGas` instead of the legacy `dataGas` field name
    pub fn uses_base_gas(&self) -> bool {
        *self >= Revision::V100
    }

    pub fn chain_id_in_domain(&self) -> bool {
        *self >= Revision::V130
    }

    pub fn paginated_modules(&self) -> bool {
        *self >= Revision::V111
    }

    /// Whether `getModulesPaginated` returns the last listed module as `next`.
    ///
    /// Before 1.4.1 `next` is the first module left out of the page, so a query starting from it
    /// skips that module.
    pub fn module_cursor_is_inclusive(&self) -> bool {
        *self >= Revision::V141
    }

    pub fn supports_fallback_handler(&self) -> bool {
        *self >= Revision::V111
    }

    pub fn supports_guard(&self) -> bool {
        *self >= Revision::V130
    }

    pub fn supports_required_tx_gas(&self) -> bool {
        *self < Revision::V141
    }

    pub fn simulation_strategy(&self) -> SimulationStrategy {
        if self.supports_required_tx_gas() {
            SimulationStrategy::RequiredTxGas
        } else {
            SimulationStrategy::SimulateAccessor
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
