//! The Safe transaction: payload, wallet context, collected signatures and execution

use alloy::network::primitives::ReceiptResponse;
use alloy::network::AnyNetwork;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::Provider;
use alloy::signers::Signer;
use alloy::sol_types::SolCall;
use tracing::debug;

use crate::client::{CallRequest, ChainClient};
use crate::contracts::ISafe;
use crate::encoding::{
    compute_domain_separator, compute_safe_tx_hash, compute_transaction_hash,
    encode_transaction_data, SafeTxParams,
};
use crate::error::{Error, Result};
use crate::gas::RECOMMENDED_GAS_MARGIN;
use crate::signing::{
    eth_sign_hash, insert_signature, parse_signatures, remove_signature, sign_hash,
    verify_signature, SafeSignature,
};
use crate::types::ExecutionResult;
use crate::version::Revision;

/// A transaction to be authorized by the owners of one Safe.
///
/// The hash covers every field except `signatures`, so changing the payload or the nonce
/// invalidates signatures collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTx {
    pub safe_address: Address,
    pub chain_id: u64,
    pub revision: Revision,
    pub params: SafeTxParams,
    /// Never defaulted; zero is a valid nonce
    pub nonce: Option<U256>,
    signatures: Bytes,
}

impl SafeTx {
    pub fn new(safe_address: Address, chain_id: u64, revision: Revision, params: SafeTxParams) -> Self {
        Self {
            safe_address,
            chain_id,
            revision,
            params,
            nonce: None,
            signatures: Bytes::new(),
        }
    }

    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Replaces the packed signatures wholesale
    pub fn with_signatures(mut self, signatures: impl Into<Bytes>) -> Self {
        self.signatures = signatures.into();
        self
    }

    fn nonce(&self) -> Result<U256> {
        self.nonce.ok_or(Error::MissingNonce)
    }

    pub fn domain_separator(&self) -> B256 {
        compute_domain_separator(self.revision, self.chain_id, self.safe_address)
    }

    pub fn struct_hash(&self) -> Result<B256> {
        Ok(compute_safe_tx_hash(self.revision, &self.params, self.nonce()?))
    }

    /// The hash owners sign
    pub fn hash(&self) -> Result<B256> {
        Ok(compute_transaction_hash(self.domain_separator(), self.struct_hash()?))
    }

    /// `0x1901 || domainSeparator || structHash`, forwarded to legacy EIP-1271 owners
    pub fn hash_preimage(&self) -> Result<Bytes> {
        Ok(encode_transaction_data(self.domain_separator(), self.struct_hash()?))
    }

    /// Packed signatures, ordered by owner
    pub fn signatures(&self) -> &Bytes {
        &self.signatures
    }

    pub fn parsed_signatures(&self) -> Result<Vec<SafeSignature>> {
        parse_signatures(&self.signatures, self.hash()?)
    }

    /// Owners that signed, ascending
    pub fn signers(&self) -> Result<Vec<Address>> {
        Ok(self
            .parsed_signatures()?
            .into_iter()
            .map(|signature| signature.owner)
            .collect())
    }

    /// Signs the transaction hash and inserts the signature in owner order
    pub async fn sign<S: Signer + Sync>(&mut self, signer: &S) -> Result<SafeSignature> {
        let hash = self.hash()?;
        let signature = sign_hash(signer, hash).await?;
        self.signatures = insert_signature(&self.signatures, signature.clone(), hash)?;
        Ok(signature)
    }

    /// Like [`SafeTx::sign`], signing the hash as a personal message
    pub async fn sign_eth<S: Signer + Sync>(&mut self, signer: &S) -> Result<SafeSignature> {
        let hash = self.hash()?;
        let signature = eth_sign_hash(signer, hash).await?;
        self.signatures = insert_signature(&self.signatures, signature.clone(), hash)?;
        Ok(signature)
    }

    /// Adds a signature produced elsewhere, e.g. an approved hash or a contract signature
    pub fn add_signature(&mut self, signature: SafeSignature) -> Result<()> {
        let hash = self.hash()?;
        self.signatures = insert_signature(&self.signatures, signature, hash)?;
        Ok(())
    }

    /// Removes the signature of `owner`, returning whether one was present
    pub fn unsign(&mut self, owner: Address) -> Result<bool> {
        let (signatures, removed) = remove_signature(&self.signatures, owner, self.hash()?)?;
        self.signatures = signatures;
        Ok(removed)
    }

    /// Fails with [`Error::NotOwner`] for the first signer not in `owners`.
    ///
    /// Optional; the Safe rejects such signatures on execution anyway.
    pub fn check_owners(&self, owners: &[Address]) -> Result<()> {
        match self.signers()?.into_iter().find(|signer| !owners.contains(signer)) {
            Some(owner) => Err(Error::NotOwner {
                owner,
                safe: self.safe_address,
            }),
            None => Ok(()),
        }
    }

    /// Checks approved-hash and contract signatures on-chain.
    ///
    /// Returns the owners whose signatures did not verify. The result is advisory: execution
    /// performs the authoritative check.
    pub async fn verify_signatures<C: ChainClient>(&self, client: &C) -> Result<Vec<Address>> {
        let hash = self.hash()?;
        let preimage = self.hash_preimage()?;

        let mut invalid = Vec::new();
        for signature in self.parsed_signatures()? {
            if !verify_signature(client, self.safe_address, &signature, hash, &preimage).await? {
                invalid.push(signature.owner);
            }
        }
        Ok(invalid)
    }

    fn exec_call(&self) -> ISafe::execTransactionCall {
        let params = &self.params;
        ISafe::execTransactionCall {
            to: params.to,
            value: params.value,
            data: params.data.clone(),
            operation: params.operation.as_u8(),
            safeTxGas: params.safe_tx_gas,
            baseGas: params.base_gas,
            gasPrice: params.gas_price,
            gasToken: params.gas_token,
            refundReceiver: params.refund_receiver,
            signatures: self.signatures.clone(),
        }
    }

    /// `execTransaction` calldata with the current signatures
    pub fn exec_calldata(&self) -> Bytes {
        Bytes::from(self.exec_call().abi_encode())
    }

    /// Gas limit for the outer transaction: `baseGas + safeTxGas` plus a fixed margin
    pub fn recommended_gas(&self) -> u64 {
        let inner = self.params.base_gas.saturating_add(self.params.safe_tx_gas);
        u64::try_from(inner)
            .unwrap_or(u64::MAX)
            .saturating_add(RECOMMENDED_GAS_MARGIN)
    }

    /// Dry-runs `execTransaction` from `sender` and returns the Safe's success flag.
    ///
    /// Reverts are classified into [`Error::SafeRejected`].
    pub async fn simulate<C: ChainClient>(&self, client: &C, sender: Address) -> Result<bool> {
        let request = CallRequest::new(self.safe_address, self.exec_calldata()).with_from(sender);
        let output = client
            .call(request)
            .await
            .map_err(Error::into_safe_rejection)?;
        Ok(ISafe::execTransactionCall::abi_decode_returns(&output)?)
    }

    /// Sends `execTransaction` through `provider` and waits for the receipt.
    ///
    /// Consumes the transaction: once mined, the nonce it was built against is spent.
    pub async fn execute<P: Provider<AnyNetwork>>(
        self,
        provider: &P,
        sender: Option<Address>,
        gas: Option<u64>,
    ) -> Result<ExecutionResult> {
        let safe = ISafe::new(self.safe_address, provider);
        let call = self.exec_call();
        let mut builder = safe.execTransaction(
            call.to,
            call.value,
            call.data,
            call.operation,
            call.safeTxGas,
            call.baseGas,
            call.gasPrice,
            call.gasToken,
            call.refundReceiver,
            call.signatures,
        );
        if let Some(sender) = sender {
            builder = builder.from(sender);
        }
        builder = builder.gas(gas.unwrap_or_else(|| self.recommended_gas()));

        let pending_tx = builder.send().await.map_err(|e| Error::ExecutionFailed {
            reason: e.to_string(),
        })?;
        let receipt = pending_tx.get_receipt().await.map_err(|e| Error::ExecutionFailed {
            reason: e.to_string(),
        })?;

        let result = ExecutionResult {
            tx_hash: receipt.transaction_hash(),
            success: receipt.status(),
        };
        debug!(safe = %self.safe_address, tx_hash = %result.tx_hash, success = result.success, "executed safe transaction");
        Ok(result)
    }
}
