//! Safe client dispatching reads, estimation and transaction building by protocol revision

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use tracing::{debug, warn};

use crate::address::{address_from_word, is_null_address};
use crate::chain::{deployments, ChainAddresses, ChainConfig};
use crate::client::{CallRequest, ChainClient};
use crate::contracts::{
    IMultiSend, ISafe, FALLBACK_HANDLER_STORAGE_SLOT, GUARD_STORAGE_SLOT, SENTINEL_ADDRESS,
};
use crate::encoding::{encode_multisend_data, MultiSendTx, SafeTxParams};
use crate::error::{Error, Result};
use crate::gas::{base_gas_calldata, estimate_base_gas, GasEstimator, RECOMMENDED_GAS_MARGIN};
use crate::proxy::check_proxy_code;
use crate::safe_tx::SafeTx;
use crate::types::{Operation, WalletInfo};
use crate::version::Revision;

/// Safe proxy singleton storage slot (slot 0)
/// Safe proxies store the implementation/singleton address at storage slot 0,
/// as the first declared variable in the proxy contract.
pub const SAFE_SINGLETON_SLOT: B256 = B256::ZERO;

/// Modules requested per `getModulesPaginated` call
pub const MODULES_PAGE_SIZE: u64 = 10;

/// Stops pagination over a module list that never returns to the sentinel
const MAX_MODULE_PAGES: usize = 256;

/// Checks if an address is a Safe by its singleton slot or its deployed proxy code.
///
/// The singleton is matched against known deployments for `chain_id` and the canonical
/// 1.3.0 and 1.4.1 singletons.
pub async fn is_safe<C: ChainClient>(client: &C, address: Address, chain_id: u64) -> Result<bool> {
    let slot = client
        .get_storage_at(address, SAFE_SINGLETON_SLOT)
        .await
        .map_err(|e| fetch_error("singleton slot", e))?;
    let singleton = address_from_word(slot);

    if deployments::find_master_copy(chain_id, singleton).is_some()
        || singleton == ChainAddresses::v1_4_1().safe_singleton
        || singleton == ChainAddresses::v1_3_0().safe_singleton
    {
        return Ok(true);
    }

    Ok(check_proxy_code(client, address).await?.is_some())
}

/// Reads `VERSION()` and maps it onto a revision, falling back to the newest on any failure
pub async fn detect_revision<C: ChainClient>(client: &C, address: Address) -> (Revision, Option<String>) {
    let request = CallRequest::for_call(address, &ISafe::VERSIONCall {});
    let version = match client.call(request).await {
        Ok(data) => ISafe::VERSIONCall::abi_decode_returns(&data).map_err(Error::from),
        Err(err) => Err(err),
    };

    match version {
        Ok(version) => (Revision::from_version(&version), Some(version)),
        Err(err) => {
            warn!(safe = %address, error = %err, fallback = %Revision::LATEST, "could not detect Safe version");
            (Revision::LATEST, None)
        }
    }
}

/// Transport errors pass through unchanged; everything else is tagged with what was read
fn fetch_error(what: &'static str, err: Error) -> Error {
    match err {
        Error::Provider(reason) => Error::Provider(reason),
        other => Error::Fetch {
            what,
            reason: other.to_string(),
        },
    }
}

fn decode_result<T: SolCall>(what: &'static str, result: Option<Result<Bytes>>) -> Result<T::Return> {
    let data = result
        .ok_or_else(|| Error::Fetch {
            what,
            reason: "missing batch result".to_string(),
        })?
        .map_err(|e| fetch_error(what, e))?;
    T::abi_decode_returns(&data).map_err(|e| Error::Fetch {
        what,
        reason: e.to_string(),
    })
}

fn to_threshold(threshold: U256) -> Result<u64> {
    u64::try_from(threshold).map_err(|_| Error::Fetch {
        what: "threshold",
        reason: format!("{threshold} does not fit in u64"),
    })
}

/// Appends the addresses of `page` not seen yet, returning whether any were new
fn merge_modules(modules: &mut Vec<Address>, page: Vec<Address>) -> bool {
    let before = modules.len();
    for module in page {
        if !modules.contains(&module) {
            modules.push(module);
        }
    }
    modules.len() > before
}

/// The two gas budgets of a Safe transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub safe_tx_gas: u64,
    pub base_gas: u64,
}

impl GasEstimate {
    /// Gas limit for the executing transaction
    pub fn recommended_gas(&self) -> u64 {
        self.safe_tx_gas
            .saturating_add(self.base_gas)
            .saturating_add(RECOMMENDED_GAS_MARGIN)
    }
}

/// A deployed Safe, bound to the revision it runs.
///
/// The revision is detected once at construction; every operation then dispatches on it.
#[derive(Debug, Clone)]
pub struct Safe<C> {
    client: C,
    address: Address,
    chain_id: u64,
    revision: Revision,
    version: Option<String>,
    config: ChainConfig,
}

impl<C: ChainClient> Safe<C> {
    /// Reads the chain id and detects the revision, using canonical addresses for the chain
    pub async fn connect(client: C, address: Address) -> Result<Self> {
        let chain_id = client.chain_id().await?;
        Ok(Self::connect_with_config(client, address, ChainConfig::new(chain_id)).await)
    }

    /// Detects the revision with caller-supplied chain configuration
    pub async fn connect_with_config(client: C, address: Address, config: ChainConfig) -> Self {
        let (revision, version) = detect_revision(&client, address).await;
        debug!(safe = %address, %revision, ?version, "connected to Safe");
        Self {
            client,
            address,
            chain_id: config.chain_id,
            revision,
            version,
            config,
        }
    }

    /// Binds to a Safe whose revision is already known, without touching the chain
    pub fn with_revision(client: C, address: Address, revision: Revision, config: ChainConfig) -> Self {
        Self {
            client,
            address,
            chain_id: config.chain_id,
            revision,
            version: None,
            config,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// `VERSION()` as reported at construction
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn addresses(&self) -> &ChainAddresses {
        &self.config.addresses
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn call_safe<T: SolCall>(&self, what: &'static str, call: T) -> Result<T::Return> {
        let data = self
            .client
            .call(CallRequest::for_call(self.address, &call))
            .await
            .map_err(|e| fetch_error(what, e))?;
        T::abi_decode_returns(&data).map_err(|e| Error::Fetch {
            what,
            reason: e.to_string(),
        })
    }

    async fn read_address_slot(&self, what: &'static str, slot: B256) -> Result<Address> {
        let word = self
            .client
            .get_storage_at(self.address, slot)
            .await
            .map_err(|e| fetch_error(what, e))?;
        Ok(address_from_word(word))
    }

    pub async fn retrieve_version(&self) -> Result<String> {
        self.call_safe("version", ISafe::VERSIONCall {}).await
    }

    pub async fn retrieve_owners(&self) -> Result<Vec<Address>> {
        self.call_safe("owners", ISafe::getOwnersCall {}).await
    }

    pub async fn retrieve_threshold(&self) -> Result<u64> {
        to_threshold(self.call_safe("threshold", ISafe::getThresholdCall {}).await?)
    }

    pub async fn retrieve_nonce(&self) -> Result<U256> {
        self.call_safe("nonce", ISafe::nonceCall {}).await
    }

    /// Singleton the proxy delegates to, read from storage slot 0
    pub async fn retrieve_master_copy(&self) -> Result<Address> {
        self.read_address_slot("master copy", SAFE_SINGLETON_SLOT).await
    }

    pub async fn retrieve_fallback_handler(&self) -> Result<Address> {
        if !self.revision.supports_fallback_handler() {
            return Err(Error::Unsupported {
                operation: "retrieve_fallback_handler",
                revision: self.revision,
            });
        }
        self.read_address_slot("fallback handler", FALLBACK_HANDLER_STORAGE_SLOT)
            .await
    }

    pub async fn retrieve_guard(&self) -> Result<Address> {
        if !self.revision.supports_guard() {
            return Err(Error::Unsupported {
                operation: "retrieve_guard",
                revision: self.revision,
            });
        }
        self.read_address_slot("guard", GUARD_STORAGE_SLOT).await
    }

    pub async fn retrieve_is_owner(&self, owner: Address) -> Result<bool> {
        self.call_safe("is owner", ISafe::isOwnerCall { owner }).await
    }

    pub async fn retrieve_is_hash_approved(&self, owner: Address, hash: B256) -> Result<bool> {
        let approved = self
            .call_safe("approved hash", ISafe::approvedHashesCall { owner, hash })
            .await?;
        Ok(approved == U256::from(1))
    }

    /// Enabled modules.
    ///
    /// Paginated revisions are walked page by page from the sentinel. Older revisions return the
    /// whole list at once, except for an uninitialized Safe (threshold 0), whose `getModules`
    /// would never terminate.
    pub async fn retrieve_modules(&self) -> Result<Vec<Address>> {
        if !self.revision.paginated_modules() {
            if self.retrieve_threshold().await? == 0 {
                return Ok(Vec::new());
            }
            return self.call_safe("modules", ISafe::getModulesCall {}).await;
        }

        let (page, next) = self.fetch_modules_page(SENTINEL_ADDRESS).await?;
        let mut modules = Vec::new();
        if !merge_modules(&mut modules, page) {
            return Ok(modules);
        }
        self.collect_modules(modules, next, 1).await
    }

    async fn fetch_modules_page(&self, start: Address) -> Result<(Vec<Address>, Address)> {
        let page = self
            .call_safe(
                "modules",
                ISafe::getModulesPaginatedCall {
                    start,
                    pageSize: U256::from(MODULES_PAGE_SIZE),
                },
            )
            .await?;
        Ok((page.array, page.next))
    }

    /// Follows the cursor until it returns to the sentinel or a page adds nothing new.
    ///
    /// On exclusive-cursor revisions the cursor itself is the next module and is listed before
    /// its successors are fetched.
    async fn collect_modules(
        &self,
        mut modules: Vec<Address>,
        mut next: Address,
        mut pages: usize,
    ) -> Result<Vec<Address>> {
        while !is_null_address(next) {
            if pages >= MAX_MODULE_PAGES {
                warn!(safe = %self.address, pages, "module pagination cut off");
                break;
            }
            let carried = !self.revision.module_cursor_is_inclusive()
                && merge_modules(&mut modules, vec![next]);
            let (page, cursor) = self.fetch_modules_page(next).await?;
            pages += 1;
            if !merge_modules(&mut modules, page) && !carried {
                break;
            }
            next = cursor;
        }
        Ok(modules)
    }

    /// Snapshot of the Safe's state.
    ///
    /// Owners, threshold, nonce, version and the first module page go out in a single batch.
    pub async fn retrieve_all_info(&self) -> Result<WalletInfo> {
        let paginated = self.revision.paginated_modules();
        let mut requests = vec![
            CallRequest::for_call(self.address, &ISafe::getOwnersCall {}),
            CallRequest::for_call(self.address, &ISafe::getThresholdCall {}),
            CallRequest::for_call(self.address, &ISafe::nonceCall {}),
            CallRequest::for_call(self.address, &ISafe::VERSIONCall {}),
        ];
        if paginated {
            requests.push(CallRequest::for_call(
                self.address,
                &ISafe::getModulesPaginatedCall {
                    start: SENTINEL_ADDRESS,
                    pageSize: U256::from(MODULES_PAGE_SIZE),
                },
            ));
        }

        let mut results = self.client.batch(requests).await?.into_iter();
        let owners = decode_result::<ISafe::getOwnersCall>("owners", results.next())?;
        let threshold = to_threshold(decode_result::<ISafe::getThresholdCall>(
            "threshold",
            results.next(),
        )?)?;
        let nonce = decode_result::<ISafe::nonceCall>("nonce", results.next())?;
        let version = decode_result::<ISafe::VERSIONCall>("version", results.next())
            .ok()
            .or_else(|| self.version.clone());

        if threshold == 0 && !owners.is_empty() {
            return Err(Error::ThresholdZeroWithOwners {
                safe: self.address,
                owners: owners.len(),
            });
        }

        let modules = if paginated {
            let page = decode_result::<ISafe::getModulesPaginatedCall>("modules", results.next())?;
            let mut modules = Vec::new();
            if merge_modules(&mut modules, page.array) {
                self.collect_modules(modules, page.next, 1).await?
            } else {
                modules
            }
        } else if threshold == 0 {
            Vec::new()
        } else {
            self.call_safe("modules", ISafe::getModulesCall {}).await?
        };

        let master_copy = self.retrieve_master_copy().await?;
        let fallback_handler = match self.retrieve_fallback_handler().await {
            Err(Error::Unsupported { .. }) => Address::ZERO,
            other => other?,
        };
        let guard = match self.retrieve_guard().await {
            Err(Error::Unsupported { .. }) => Address::ZERO,
            other => other?,
        };

        Ok(WalletInfo {
            address: self.address,
            owners,
            threshold,
            nonce,
            master_copy,
            fallback_handler,
            guard,
            modules,
            version,
            revision: self.revision,
        })
    }

    /// Builds a transaction against the current nonce, with every gas field zeroed
    pub async fn build_transaction(
        &self,
        to: Address,
        value: U256,
        data: impl Into<Bytes>,
        operation: Operation,
    ) -> Result<SafeTx> {
        let nonce = self.retrieve_nonce().await?;
        let params = SafeTxParams::new(to, value, data, operation);
        Ok(SafeTx::new(self.address, self.chain_id, self.revision, params).with_nonce(nonce))
    }

    /// Batches `txs` into a delegatecall to MultiSend.
    ///
    /// With `call_only` the batch targets MultiSendCallOnly, which reverts on inner delegatecalls.
    pub async fn build_multisend_transaction(&self, txs: &[MultiSendTx], call_only: bool) -> Result<SafeTx> {
        let target = if call_only {
            self.addresses().multi_send_call_only
        } else {
            self.addresses().multi_send
        };
        let call = IMultiSend::multiSendCall {
            transactions: encode_multisend_data(txs),
        };
        self.build_transaction(target, U256::ZERO, call.abi_encode(), Operation::DelegateCall)
            .await
    }

    /// Gas estimator bound to this Safe and its revision
    pub fn gas_estimator(&self) -> GasEstimator<'_, C> {
        GasEstimator::new(
            &self.client,
            self.address,
            self.revision,
            self.addresses().simulate_tx_accessor,
        )
    }

    /// `safeTxGas` for the inner call, including proxy and legacy call overheads
    pub async fn estimate_tx_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
    ) -> Result<u64> {
        self.gas_estimator()
            .estimate_tx_gas(to, value, data, operation)
            .await
    }

    /// `baseGas` for a transaction that will run with `safe_tx_gas`
    pub async fn estimate_tx_base_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
        gas_token: Address,
        safe_tx_gas: u64,
    ) -> Result<u64> {
        let threshold = self.retrieve_threshold().await?;
        let nonce = self.retrieve_nonce().await?;
        let calldata = base_gas_calldata(to, value, data, operation, safe_tx_gas, gas_token);
        Ok(estimate_base_gas(threshold, nonce, &calldata))
    }

    /// Both gas budgets for a transaction paying refunds in `gas_token`
    pub async fn estimate_gas(
        &self,
        to: Address,
        value: U256,
        data: &Bytes,
        operation: Operation,
        gas_token: Address,
    ) -> Result<GasEstimate> {
        let safe_tx_gas = self.estimate_tx_gas(to, value, data, operation).await?;
        let base_gas = self
            .estimate_tx_base_gas(to, value, data, operation, gas_token, safe_tx_gas)
            .await?;
        Ok(GasEstimate {
            safe_tx_gas,
            base_gas,
        })
    }

    /// Fills `safeTxGas` and `baseGas` of `tx`.
    ///
    /// Changing gas fields changes the hash, so any collected signatures are dropped.
    pub async fn estimate_transaction(&self, mut tx: SafeTx) -> Result<SafeTx> {
        let params = &tx.params;
        let estimate = self
            .estimate_gas(params.to, params.value, &params.data, params.operation, params.gas_token)
            .await?;

        tx.params.safe_tx_gas = U256::from(estimate.safe_tx_gas);
        tx.params.base_gas = U256::from(estimate.base_gas);
        Ok(tx.with_signatures(Bytes::new()))
    }
}
