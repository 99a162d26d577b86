//! Gas estimation for Safe transactions.
//!
//! A Safe transaction needs two budgets: `safeTxGas` for the inner call and `baseGas` for
//! everything around it (signature checks, nonce bump, refund). The inner estimate comes from an
//! on-chain simulation and is then re-checked with explicit gas limits, because the Safe can only
//! forward 63/64 of its remaining gas to the inner call.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{decode_revert_reason, SolCall};
use tracing::{debug, warn};

use crate::client::{CallRequest, ChainClient};
use crate::contracts::{ICompatibilityFallbackHandler, ISafe, ISimulateTxAccessor};
use crate::error::{Error, Result};
use crate::types::Operation;
use crate::version::{Revision, SimulationStrategy};

/// Cost of routing through the proxy and nested calls
pub const PROXY_GAS: u64 = 1_000;

/// Gas a caller compiled before solc 0.4.21 keeps back when calling
pub const OLD_CALL_GAS: u64 = 35_000;

/// Intrinsic cost of the outer transaction
pub const CALL_OVERHEAD: u64 = 32_000;

/// Upper bound of the 63/64 retry loop
pub const MAX_ESTIMATION_ATTEMPTS: u32 = 30;

/// Added to `eth_estimateGas`, which undercounts relative to the simulation path
pub const RPC_ESTIMATE_OFFSET: u64 = 20_000;

/// Margin on top of `baseGas + safeTxGas` for the executing transaction
pub const RECOMMENDED_GAS_MARGIN: u64 = 75_000;

const GAS_CALL_DATA_ZERO_BYTE: u64 = 4;
const GAS_CALL_DATA_BYTE: u64 = 16;

/// Per-signature cost: `v` plus `r` and `s` as calldata, and an ecrecover
const SIGNATURE_GAS: u64 = 68 + 2 * 32 * 68 + 6_000;

/// Nonce storage goes from zero to non-zero on the first transaction
const FIRST_NONCE_GAS: u64 = 20_000;
const NONCE_GAS: u64 = 5_000;

/// Keccak of the Safe transaction
const HASH_GENERATION_GAS: u64 = 1_500;

/// `Error(string)` carrying a single 32-byte word: selector, offset, length, value
const REQUIRED_TX_GAS_REVERT_LEN: usize = 4 + 32 + 32 + 32;

/// Calldata cost of `data`
pub fn calldata_gas(data: &[u8]) -> u64 {
    data.iter()
        .map(|byte| {
            if *byte == 0 {
                GAS_CALL_DATA_ZERO_BYTE
            } else {
                GAS_CALL_DATA_BYTE
            }
        })
        .sum()
}

/// Gas spent by `execTransaction` outside of the inner call.
///
/// `exec_calldata` is the `execTransaction` payload built with the final `safeTxGas`, a zero
/// `baseGas`, a gas price of one and no signatures.
pub fn estimate_base_gas(threshold: u64, nonce: U256, exec_calldata: &[u8]) -> u64 {
    let nonce_gas = if nonce.is_zero() {
        FIRST_NONCE_GAS
    } else {
        NONCE_GAS
    };

    let mut base_gas = threshold.saturating_mul(SIGNATURE_GAS)
        + calldata_gas(exec_calldata)
        + nonce_gas
        + HASH_GENERATION_GAS;

    base_gas += if base_gas > 65_536 { 64 } else { 128 };
    base_gas + CALL_OVERHEAD
}

/// Builds the calldata that [`estimate_base_gas`] prices
pub fn base_gas_calldata(
    to: Address,
    value: U256,
    data: &Bytes,
    operation: Operation,
    safe_tx_gas: u64,
    gas_token: Address,
) -> Bytes {
    let call = ISafe::execTransactionCall {
        to,
        value,
        data: data.clone(),
        operation: operation.as_u8(),
        safeTxGas: U256::from(safe_tx_gas),
        baseGas: U256::ZERO,
        gasPrice: U256::from(1),
        gasToken: gas_token,
        refundReceiver: Address::ZERO,
        signatures: Bytes::new(),
    };
    Bytes::from(call.abi_encode())
}

/// Reads the estimate smuggled out of `requiredTxGas` as `Error(string)` revert data
fn parse_required_tx_gas(data: &[u8]) -> Result<u64> {
    if data.len() != REQUIRED_TX_GAS_REVERT_LEN || U256::from_be_slice(&data[36..68]) != U256::from(32)
    {
        return Err(Error::CannotEstimateGas(format!(
            "unexpected requiredTxGas result {}",
            Bytes::copy_from_slice(data)
        )));
    }
    to_gas(U256::from_be_slice(&data[68..]))
}

/// Estimate after `attempt` shortfalls: grows by 3% more per attempt, and by at least 1
fn grow_estimate(estimate: u64, attempt: u32) -> u64 {
    let percent = u64::from(attempt).saturating_mul(3).saturating_add(100);
    let grown = u128::from(estimate).saturating_mul(u128::from(percent)) / 100;
    u64::try_from(grown)
        .unwrap_or(u64::MAX)
        .max(estimate.saturating_add(1))
}

fn to_gas(estimate: U256) -> Result<u64> {
    u64::try_from(estimate)
        .map_err(|_| Error::CannotEstimateGas(format!("estimate {estimate} does not fit in u64")))
}

/// Gas estimation for one Safe.
///
/// Borrowed from a [`crate::Safe`] or built directly for callers that already know the revision.
pub struct GasEstimator<'a, C> {
    client: &'a C,
    safe: Address,
    revision: Revision,
    simulate_tx_accessor: Address,
    max_attempts: u32,
    rpc_offset: u64,
}

impl<'a, C: ChainClient> GasEstimator<'a, C> {
    pub fn new(client: &'a C, safe: Address, revision: Revision, simulate_tx_accessor: Address) -> Self {
        Self {
            client,
            safe,
            revision,
            simulate_tx_accessor,
            max_attempts: MAX_ESTIMATION_ATTEMPTS,
            rpc_offset: RPC_ESTIMATE_OFFSET,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_rpc_offset(mut self, rpc_offset: u64) -> Self {
        self.rpc_offset = rpc_offset;
        self
    }

    /// Runs the revision's simulation entry point once and returns its estimate.
    ///
    /// With `gas` set the simulation runs under that limit, and a 63/64 shortfall surfaces as
    /// [`Error::OutOfGas`] or an empty [`Error::Reverted`].
    pub async fn simulate(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
        gas: Option<u64>,
    ) -> Result<u64> {
        match self.revision.simulation_strategy() {
            SimulationStrategy::RequiredTxGas => {
                self.simulate_required_tx_gas(to, value, data, operation, gas).await
            }
            SimulationStrategy::SimulateAccessor => {
                self.simulate_accessor(to, value, data, operation, gas).await
            }
        }
    }

    async fn simulate_required_tx_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
        gas: Option<u64>,
    ) -> Result<u64> {
        let call = ISafe::requiredTxGasCall {
            to,
            value,
            data: data.clone(),
            operation: operation.as_u8(),
        };
        let mut request = CallRequest::for_call(self.safe, &call).with_from(self.safe);
        if let Some(gas) = gas {
            request = request.with_gas(gas);
        }

        match self.client.call(request).await {
            // some nodes hand the revert payload back as output
            Ok(output) => parse_required_tx_gas(&output),
            Err(Error::Reverted { data, .. }) if data.len() == REQUIRED_TX_GAS_REVERT_LEN => {
                parse_required_tx_gas(&data)
            }
            Err(err) => Err(err),
        }
    }

    async fn simulate_accessor(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
        gas: Option<u64>,
    ) -> Result<u64> {
        let payload = ISimulateTxAccessor::simulateCall {
            to,
            value,
            data: data.clone(),
            operation: operation.as_u8(),
        };
        let call = ICompatibilityFallbackHandler::simulateCall {
            targetContract: self.simulate_tx_accessor,
            calldataPayload: Bytes::from(payload.abi_encode()),
        };
        let mut request = CallRequest::for_call(self.safe, &call);
        if let Some(gas) = gas {
            request = request.with_gas(gas);
        }

        let output = self.client.call(request).await?;
        let response = ICompatibilityFallbackHandler::simulateCall::abi_decode_returns(&output)?;
        let result = ISimulateTxAccessor::simulateCall::abi_decode_returns(&response)?;

        if !result.success {
            // empty return data is a shortfall
            return Err(Error::Reverted {
                reason: decode_revert_reason(&result.returnData)
                    .filter(|reason| !reason.is_empty()),
                data: result.returnData,
            });
        }

        to_gas(result.estimate)
    }

    /// `eth_estimateGas` of the inner call sent from the Safe, plus the configured offset
    pub async fn estimate_with_rpc(&self, to: Address, value: U256, data: &Bytes) -> Result<u64> {
        let request = CallRequest::new(to, data.clone())
            .with_from(self.safe)
            .with_value(value);
        let estimate = self.client.estimate_gas(request).await?;
        Ok(estimate.saturating_add(self.rpc_offset))
    }

    /// Estimates `safeTxGas`, re-simulating under explicit limits until the 63/64 rule is satisfied.
    ///
    /// The result never exceeds the block gas limit. A simulated transaction that reverts with a
    /// decodable reason is reported as [`Error::Reverted`]; other simulation failures fall back to
    /// `eth_estimateGas`.
    pub async fn estimate_safe_tx_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
    ) -> Result<u64> {
        let block_gas_limit = self.client.block_gas_limit().await?;

        let mut estimate = match self.simulate(to, value, data, operation, None).await {
            Ok(estimate) => estimate,
            Err(Error::Provider(reason)) => return Err(Error::Provider(reason)),
            Err(err) if err.is_explained_revert() => return Err(err),
            Err(err) => {
                warn!(
                    safe = %self.safe,
                    revision = %self.revision,
                    error = %err,
                    "safe simulation unavailable, falling back to eth_estimateGas"
                );
                return match self.estimate_with_rpc(to, value, data).await {
                    Ok(estimate) => Ok(estimate.min(block_gas_limit)),
                    Err(Error::Provider(reason)) => Err(Error::Provider(reason)),
                    Err(rpc_err) => Err(Error::CannotEstimateGas(format!(
                        "simulation failed ({err}) and eth_estimateGas failed ({rpc_err})"
                    ))),
                };
            }
        };

        if estimate >= block_gas_limit {
            return Ok(block_gas_limit);
        }

        let data_gas = calldata_gas(data);
        for attempt in 1..=self.max_attempts {
            let limit = estimate
                .saturating_add(data_gas)
                .saturating_add(CALL_OVERHEAD)
                .min(block_gas_limit);

            match self.simulate(to, value, data, operation, Some(limit)).await {
                Ok(_) => {
                    debug!(safe = %self.safe, attempt, gas = estimate, "safe tx gas estimated");
                    return Ok(estimate);
                }
                Err(err) if err.is_gas_shortfall() => {
                    estimate = grow_estimate(estimate, attempt);
                    warn!(
                        safe = %self.safe,
                        attempt,
                        limit,
                        gas = estimate,
                        "simulation ran out of gas, retrying with a higher estimate"
                    );
                    if estimate >= block_gas_limit {
                        return Ok(block_gas_limit);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::CannotEstimateGas(format!(
            "gas limit still insufficient after {} attempts",
            self.max_attempts
        )))
    }

    /// Final `safeTxGas`: the simulated estimate plus proxy and legacy call overheads.
    ///
    /// For plain calls the larger of that and `eth_estimateGas` is used, since a delegatecall
    /// cannot be estimated against the target's storage.
    pub async fn estimate_tx_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
    ) -> Result<u64> {
        let block_gas_limit = self.client.block_gas_limit().await?;
        let safe_estimate = self
            .estimate_safe_tx_gas(to, value, data, operation)
            .await?
            .saturating_add(PROXY_GAS + OLD_CALL_GAS);

        let estimate = if operation == Operation::Call {
            let request = CallRequest::new(to, data.clone())
                .with_from(self.safe)
                .with_value(value);
            let rpc_estimate = match self.client.estimate_gas(request).await {
                Ok(estimate) => estimate.saturating_add(PROXY_GAS + OLD_CALL_GAS),
                Err(Error::Provider(reason)) => return Err(Error::Provider(reason)),
                Err(err) => {
                    debug!(safe = %self.safe, error = %err, "eth_estimateGas failed for call");
                    0
                }
            };
            safe_estimate.max(rpc_estimate)
        } else {
            safe_estimate
        };

        Ok(estimate.min(block_gas_limit))
    }
}
