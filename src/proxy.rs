//! Recognition of deployed Safe proxies by their runtime bytecode.
//!
//! Proxies from different factory releases differ in their Solidity metadata trailer, and
//! sometimes only in that trailer, so code is compared exactly first and then with the
//! metadata removed. When several releases share a body, the compiler version recorded in the
//! trailer narrows the match.

use alloy::primitives::{hex, Address, Bytes};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{CallRequest, ChainClient};
use crate::contracts::ISafeProxyFactory;
use crate::error::{Error, Result};

/// Runtime code of proxies deployed by the 1.4.1 factory
pub const PROXY_1_4_1_RUNTIME: &[u8] = &hex!(
    "608060405273ffffffffffffffffffffffffffffffffffffffff600054167fa619486e0000000000000000000000000000000000000000000000000000000060003514156050578060005260206000f35b3660008037600080366000845af43d6000803e60008114156070573d6000fd5b3d6000f3fea264697066735822122003d1488ee65e08fa41e58e888a9865554c535f2c77126a82cb4c0f917f31441364736f6c63430007060033"
);

/// Runtime code of proxies deployed by the 1.3.0 factory
pub const PROXY_1_3_0_RUNTIME: &[u8] = &hex!(
    "608060405273ffffffffffffffffffffffffffffffffffffffff600054167fa619486e0000000000000000000000000000000000000000000000000000000060003514156050578060005260206000f35b3660008037600080366000845af43d6000803e60008114156070573d6000fd5b3d6000f3fea2646970667358221220d1429297349653a4918076d650332de1a1068c5f3e07c5c82360c277770b955264736f6c63430007060033"
);

/// Runtime code of proxies deployed by the 1.1.1 factory on mainnet.
///
/// Built with the toolchain used for that deployment; a fresh compile only reproduces the code
/// up to its metadata trailer.
pub const PROXY_1_1_1_MAINNET_RUNTIME: &[u8] = &hex!(
    "608060405273ffffffffffffffffffffffffffffffffffffffff600054167fa619486e0000000000000000000000000000000000000000000000000000000060003514156050578060005260206000f35b3660008037600080366000845af43d6000803e60008114156070573d6000fd5b3d6000f3fea265627a7a72315820d8a00dc4fe6bf675a9d7416fc2d00bb3433362aa8186b750f76c4027269667ff64736f6c634300050e0032"
);

/// Runtime code of proxies deployed by the 1.0.0 factory, before `masterCopy()` was routed
pub const PROXY_1_0_0_RUNTIME: &[u8] = &hex!(
    "608060405273ffffffffffffffffffffffffffffffffffffffff600054163660008037600080366000845af43d6000803e6000811415603d573d6000fd5b3d6000f3fea165627a7a723058201e7d648b83cfac072cbccefc2ffc62a6999d4a050ee87a721942de1da9670db80029"
);

/// Runtime code of the 0.1.0 paying proxy, which exposes `proxyType()` and `implementation()`
pub const PAYING_PROXY_RUNTIME: &[u8] = &hex!(
    "60806040526004361061004c576000357c0100000000000000000000000000000000000000000000000000000000900463ffffffff1680634555d5c91461008b5780635c60da1b146100b6575b73ffffffffffffffffffffffffffffffffffffffff600054163660008037600080366000845af43d6000803e6000811415610086573d6000fd5b3d6000f35b34801561009757600080fd5b506100a061010d565b6040518082815260200191505060405180910390f35b3480156100c257600080fd5b506100cb610116565b604051808273ffffffffffffffffffffffffffffffffffffffff1673ffffffffffffffffffffffffffffffffffffffff16815260200191505060405180910390f35b60006002905090565b60008060009054906101000a900473ffffffffffffffffffffffffffffffffffffffff169050905600a165627a7a7230582007fffd557dfc8c4d2fdf56ba6381a6ce5b65b6260e1492d87f26c6d4f1d041080029"
);

/// `0xa1 0x65 "bzzr0" 0x58 0x20`
const BZZR0_MARKER: &[u8] = &hex!("a165627a7a72305820");

/// `0xa2 0x65 "bzzr1" 0x58 0x20`
const BZZR1_MARKER: &[u8] = &hex!("a265627a7a72315820");

/// CBOR key `"solc"` followed by a 3-byte string header
const SOLC_MARKER: &[u8] = &hex!("64736f6c634300");

/// Which proxy a runtime bytecode belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    Paying,
    V100,
    /// 1.1.1 built outside the mainnet deployment; same body and compiler, other metadata hash
    V111,
    V111Mainnet,
    V130,
    V141,
    /// A Safe proxy body shared by several releases, none of which the metadata singles out
    Unversioned,
    /// Matched the `proxyRuntimeCode()` of a caller-supplied factory
    Factory,
}

/// Known proxies, newest first
const KNOWN_PROXIES: [(ProxyKind, &[u8]); 5] = [
    (ProxyKind::V141, PROXY_1_4_1_RUNTIME),
    (ProxyKind::V130, PROXY_1_3_0_RUNTIME),
    (ProxyKind::V111Mainnet, PROXY_1_1_1_MAINNET_RUNTIME),
    (ProxyKind::V100, PROXY_1_0_0_RUNTIME),
    (ProxyKind::Paying, PAYING_PROXY_RUNTIME),
];

/// Removes the Solidity metadata trailer, if any.
///
/// The trailer is a CBOR map whose length is stored in the final two bytes. Code with
/// trailing data after the map (e.g. constructor arguments) is cut at the last swarm marker.
pub fn strip_metadata(code: &[u8]) -> &[u8] {
    if code.len() >= 2 {
        let trailer = u16::from_be_bytes([code[code.len() - 2], code[code.len() - 1]]) as usize;
        if let Some(start) = code.len().checked_sub(trailer + 2) {
            if (0xa1..=0xa5).contains(&code[start]) && trailer > 0 {
                return &code[..start];
            }
        }
    }

    [BZZR1_MARKER, BZZR0_MARKER]
        .iter()
        .filter_map(|marker| rfind(code, marker))
        .max()
        .map(|position| &code[..position])
        .unwrap_or(code)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

/// Compiler version `(major, minor, patch)` recorded in the metadata trailer.
///
/// Only solc 0.5.10 and later write it, so older code yields `None`.
pub fn solc_version(code: &[u8]) -> Option<(u8, u8, u8)> {
    let start = rfind(code, SOLC_MARKER)? + SOLC_MARKER.len() - 1;
    match code.get(start..start + 3)? {
        [major, minor, patch] => Some((*major, *minor, *patch)),
        _ => None,
    }
}

/// Whether two runtime bytecodes are equal, ignoring metadata
pub fn compare_bytecode(a: &[u8], b: &[u8]) -> bool {
    a == b || strip_metadata(a) == strip_metadata(b)
}

/// Classifies deployed code against the known proxies
pub fn classify_proxy_bytecode(code: &[u8]) -> Option<ProxyKind> {
    if code.is_empty() {
        return None;
    }
    if let Some((kind, _)) = KNOWN_PROXIES.iter().find(|(_, known)| *known == code) {
        return Some(*kind);
    }

    let body = strip_metadata(code);
    let same_body: Vec<(ProxyKind, &[u8])> = KNOWN_PROXIES
        .iter()
        .filter(|(_, known)| strip_metadata(known) == body)
        .copied()
        .collect();
    if let [(kind, _)] = same_body.as_slice() {
        return Some(rebuilt(*kind));
    }
    if same_body.is_empty() {
        return None;
    }

    let compiler = solc_version(code);
    let same_compiler: Vec<ProxyKind> = same_body
        .iter()
        .filter(|(_, known)| compiler.is_some() && solc_version(known) == compiler)
        .map(|(kind, _)| *kind)
        .collect();
    match same_compiler.as_slice() {
        [kind] => Some(rebuilt(*kind)),
        _ => Some(ProxyKind::Unversioned),
    }
}

/// Kind of a release's proxy whose metadata hash differs from the recorded literal
fn rebuilt(kind: ProxyKind) -> ProxyKind {
    match kind {
        ProxyKind::V111Mainnet => ProxyKind::V111,
        other => other,
    }
}

pub fn is_proxy_bytecode(code: &[u8]) -> bool {
    classify_proxy_bytecode(code).is_some()
}

/// Reads the code at `address` and classifies it.
///
/// `None` for accounts without code or with unknown code.
pub async fn check_proxy_code<C: ChainClient>(client: &C, address: Address) -> Result<Option<ProxyKind>> {
    let code = client.get_code(address).await?;
    Ok(classify_proxy_bytecode(&code))
}

/// Like [`check_proxy_code`], also accepting the runtime code advertised by `factory`.
///
/// Factories from 1.4.1 on no longer expose `proxyRuntimeCode()`; a failed read is ignored.
pub async fn check_proxy_code_with_factory<C: ChainClient>(
    client: &C,
    address: Address,
    factory: Address,
) -> Result<Option<ProxyKind>> {
    let code = client.get_code(address).await?;
    if let Some(kind) = classify_proxy_bytecode(&code) {
        return Ok(Some(kind));
    }
    if code.is_empty() {
        return Ok(None);
    }

    let request = CallRequest::for_call(factory, &ISafeProxyFactory::proxyRuntimeCodeCall {});
    let runtime: Bytes = match client.call(request).await {
        Ok(data) => ISafeProxyFactory::proxyRuntimeCodeCall::abi_decode_returns(&data)?,
        Err(Error::Provider(reason)) => return Err(Error::Provider(reason)),
        Err(err) => {
            debug!(%factory, error = %err, "factory has no proxyRuntimeCode");
            return Ok(None);
        }
    };

    Ok(compare_bytecode(&code, &runtime).then_some(ProxyKind::Factory))
}
