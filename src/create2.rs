//! CREATE2 address computation for Safe proxy deployment
//!
//! The Safe proxy factory deploys proxies at deterministic addresses based on the singleton
//! address, the initializer data and a salt nonce:
//!
//! ```text
//! salt = keccak256(keccak256(initializer) ++ saltNonce [++ chainId])
//! init_code = proxyCreationCode ++ uint256(singleton)
//! address = keccak256(0xff ++ factory ++ salt ++ keccak256(init_code))[12:]
//! ```

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::BoundedCache;
use crate::client::{CallRequest, ChainClient};
use crate::contracts::{ISafeProxyFactory, ISafeSetup};
use crate::error::{Error, Result};

/// Arguments of `Safe.setup`, called by the factory on the fresh proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSetup {
    pub owners: Vec<Address>,
    pub threshold: u64,
    /// Optional delegatecall target run during setup, e.g. a module enabler
    pub to: Address,
    pub data: Bytes,
    pub fallback_handler: Address,
    pub payment_token: Address,
    pub payment: U256,
    pub payment_receiver: Address,
}

impl SafeSetup {
    pub fn new(owners: Vec<Address>, threshold: u64, fallback_handler: Address) -> Self {
        Self {
            owners,
            threshold,
            to: Address::ZERO,
            data: Bytes::new(),
            fallback_handler,
            payment_token: Address::ZERO,
            payment: U256::ZERO,
            payment_receiver: Address::ZERO,
        }
    }

    /// Delegatecalls `to` with `data` during setup
    pub fn with_setup_call(mut self, to: Address, data: impl Into<Bytes>) -> Self {
        self.to = to;
        self.data = data.into();
        self
    }

    /// Pays the deployer `payment` in `payment_token` out of the new Safe
    pub fn with_payment(mut self, payment_token: Address, payment: U256, payment_receiver: Address) -> Self {
        self.payment_token = payment_token;
        self.payment = payment;
        self.payment_receiver = payment_receiver;
        self
    }

    /// ABI-encoded `setup(...)` call, used as the proxy initializer
    pub fn encode(&self) -> Bytes {
        let setup_call = ISafeSetup::setupCall {
            _owners: self.owners.clone(),
            _threshold: U256::from(self.threshold),
            to: self.to,
            data: self.data.clone(),
            fallbackHandler: self.fallback_handler,
            paymentToken: self.payment_token,
            payment: self.payment,
            paymentReceiver: self.payment_receiver,
        };

        Bytes::from(setup_call.abi_encode())
    }
}

/// Encodes a plain `Safe.setup()` call with no setup delegatecall and no payment
pub fn encode_setup_call(owners: &[Address], threshold: u64, fallback_handler: Address) -> Bytes {
    SafeSetup::new(owners.to_vec(), threshold, fallback_handler).encode()
}

/// Salt the factory derives from the initializer and nonce.
///
/// `chain_id` is mixed in for `createChainSpecificProxyWithNonce`.
pub fn calculate_salt(initializer: &[u8], salt_nonce: U256, chain_id: Option<u64>) -> B256 {
    let mut salt_input = Vec::with_capacity(96);
    salt_input.extend_from_slice(keccak256(initializer).as_slice());
    salt_input.extend_from_slice(&salt_nonce.to_be_bytes::<32>());
    if let Some(chain_id) = chain_id {
        salt_input.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    }
    keccak256(&salt_input)
}

/// Proxy creation code followed by the singleton as constructor argument
pub fn proxy_init_code(creation_code: &[u8], master_copy: Address) -> Vec<u8> {
    let mut init_code = Vec::with_capacity(creation_code.len() + 32);
    init_code.extend_from_slice(creation_code);
    init_code.extend_from_slice(master_copy.into_word().as_slice());
    init_code
}

/// Generic CREATE2: `keccak256(0xff ++ from ++ salt ++ keccak256(init_code))[12:]`
pub fn create2_address(from: Address, salt: B256, init_code: &[u8]) -> Address {
    from.create2_from_code(salt, init_code)
}

pub fn predict_address_from_init_code_hash(factory: Address, salt: B256, init_code_hash: B256) -> Address {
    factory.create2(salt, init_code_hash)
}

/// Address a factory will deploy a proxy to
pub fn predict_address(
    factory: Address,
    master_copy: Address,
    initializer: &[u8],
    salt_nonce: U256,
    chain_id: Option<u64>,
    creation_code: &[u8],
) -> Address {
    let salt = calculate_salt(initializer, salt_nonce, chain_id);
    create2_address(factory, salt, &proxy_init_code(creation_code, master_copy))
}

/// A proxy deployment through a Safe proxy factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDeployment {
    pub factory_address: Address,
    pub salt_nonce: U256,
    pub initializer: Bytes,
    pub master_copy: Address,
    /// Deploy with `createChainSpecificProxyWithNonce` (1.4.1 factories)
    pub chain_specific: bool,
    /// Filled by [`ProxyDeployment::predict`]
    pub predicted_address: Option<Address>,
}

impl ProxyDeployment {
    pub fn new(
        factory_address: Address,
        master_copy: Address,
        initializer: impl Into<Bytes>,
        salt_nonce: U256,
    ) -> Self {
        Self {
            factory_address,
            salt_nonce,
            initializer: initializer.into(),
            master_copy,
            chain_specific: false,
            predicted_address: None,
        }
    }

    pub fn chain_specific(mut self) -> Self {
        self.chain_specific = true;
        self.predicted_address = None;
        self
    }

    pub fn salt(&self, chain_id: u64) -> B256 {
        let chain_id = self.chain_specific.then_some(chain_id);
        calculate_salt(&self.initializer, self.salt_nonce, chain_id)
    }

    /// Computes and stores the address the factory will deploy to
    pub fn predict(&mut self, creation_code: &[u8], chain_id: u64) -> Address {
        let address = create2_address(
            self.factory_address,
            self.salt(chain_id),
            &proxy_init_code(creation_code, self.master_copy),
        );
        self.predicted_address = Some(address);
        address
    }

    /// Factory calldata performing this deployment
    pub fn deploy_calldata(&self) -> Bytes {
        let encoded = if self.chain_specific {
            ISafeProxyFactory::createChainSpecificProxyWithNonceCall {
                _singleton: self.master_copy,
                initializer: self.initializer.clone(),
                saltNonce: self.salt_nonce,
            }
            .abi_encode()
        } else {
            ISafeProxyFactory::createProxyWithNonceCall {
                _singleton: self.master_copy,
                initializer: self.initializer.clone(),
                saltNonce: self.salt_nonce,
            }
            .abi_encode()
        };
        Bytes::from(encoded)
    }

    /// Reads `proxyCreationCode()` from the factory, going through `cache` first
    pub async fn fetch_creation_code<C: ChainClient>(
        &self,
        client: &C,
        cache: &mut BoundedCache<Address, Bytes>,
    ) -> Result<Bytes> {
        if let Some(code) = cache.get(&self.factory_address) {
            return Ok(code);
        }

        let request = CallRequest::for_call(
            self.factory_address,
            &ISafeProxyFactory::proxyCreationCodeCall {},
        );
        let data = client.call(request).await.map_err(|e| match e {
            Error::Provider(reason) => Error::Provider(reason),
            other => Error::Fetch {
                what: "proxy creation code",
                reason: other.to_string(),
            },
        })?;
        let code = ISafeProxyFactory::proxyCreationCodeCall::abi_decode_returns(&data)?;

        debug!(factory = %self.factory_address, len = code.len(), "fetched proxy creation code");
        cache.insert(self.factory_address, code.clone());
        Ok(code)
    }
}
