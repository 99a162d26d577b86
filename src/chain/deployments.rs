//! Known Safe singleton and proxy factory deployments.
//!
//! Used to recognise trusted contracts; nothing here is needed for hashing, signing or estimation.

use alloy::primitives::{address, Address};

use super::config::chain_ids;

/// A contract deployment recorded on a given chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    /// Block the contract was deployed in
    pub first_block: u64,
    pub version: &'static str,
}

const fn deployment(address: Address, first_block: u64, version: &'static str) -> Deployment {
    Deployment {
        address,
        first_block,
        version,
    }
}

const SINGLETON_141_L2: Address = address!("29fcB43b46531BcA003ddC8FCB67FFE91900C762");
const SINGLETON_141: Address = address!("41675C099F32341bf84BFc5382aF534df5C7461a");
const SINGLETON_130_L2: Address = address!("3E5c63644E683549055b9Be8653de26E0B4CD36E");
const SINGLETON_130_L2_SINGLETON_FACTORY: Address = address!("fb1bffC9d739B8D520DaF37dF666da4C687191EA");
const SINGLETON_130: Address = address!("d9Db270c1B5E3Bd161E8c8503c55cEABeE709552");
const SINGLETON_130_SINGLETON_FACTORY: Address = address!("69f4D1788e39c87893C980c06EdF4b7f686e2938");
const SINGLETON_120: Address = address!("6851D6fDFAfD08c0295C392436245E5bc78B0185");
const SINGLETON_111: Address = address!("34CfAC646f301356fAa8B21e94227e3583Fe3F5F");
const SINGLETON_100: Address = address!("b6029EA3B2c51D09a50B53CA8012FeEB05bDa35A");

const FACTORY_141: Address = address!("4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67");
const FACTORY_130_SINGLETON_FACTORY: Address = address!("C22834581EbC8527d974F8a1c97E1bEA4EF910BC");
const FACTORY_130: Address = address!("a6B71E26C5e0845f74c812102Ca7114b6a896AB2");
const FACTORY_111: Address = address!("76E2cFc1F5Fa8F6a5b3fC4c8F4788F0116861F9B");
const FACTORY_100: Address = address!("12302fE9c02ff50939BaAaaf415fc226C078613C");

static MAINNET_MASTER_COPIES: [Deployment; 12] = [
    deployment(SINGLETON_141_L2, 17486982, "1.4.1+L2"),
    deployment(SINGLETON_141, 17487000, "1.4.1"),
    deployment(SINGLETON_130_L2_SINGLETON_FACTORY, 14981217, "1.3.0+L2"),
    deployment(SINGLETON_130_L2, 12504423, "1.3.0+L2"),
    deployment(SINGLETON_130_SINGLETON_FACTORY, 17530813, "1.3.0"),
    deployment(SINGLETON_130, 12504268, "1.3.0"),
    deployment(SINGLETON_120, 10329734, "1.2.0"),
    deployment(SINGLETON_111, 9084503, "1.1.1"),
    deployment(address!("aE32496491b53841efb51829d6f886387708F99B"), 8915728, "1.1.0"),
    deployment(SINGLETON_100, 7457553, "1.0.0"),
    deployment(address!("8942595A2dC5181Df0465AF0D7be08c8f23C93af"), 6766257, "0.1.0"),
    deployment(address!("AC6072986E985aaBE7804695EC2d8970Cf7541A2"), 6569433, "0.0.2"),
];

static GNOSIS_MASTER_COPIES: [Deployment; 9] = [
    deployment(SINGLETON_141_L2, 28204126, "1.4.1+L2"),
    deployment(SINGLETON_141, 28204128, "1.4.1"),
    deployment(SINGLETON_130_L2_SINGLETON_FACTORY, 27679972, "1.3.0+L2"),
    deployment(SINGLETON_130_L2, 16236936, "1.3.0+L2"),
    deployment(SINGLETON_130_SINGLETON_FACTORY, 27679975, "1.3.0"),
    deployment(SINGLETON_130, 16236998, "1.3.0"),
    deployment(SINGLETON_120, 10612049, "1.2.0"),
    deployment(SINGLETON_111, 10045292, "1.1.1"),
    deployment(SINGLETON_100, 19560130, "1.0.0"),
];

static SEPOLIA_MASTER_COPIES: [Deployment; 6] = [
    deployment(SINGLETON_141_L2, 3921532, "1.4.1+L2"),
    deployment(SINGLETON_141, 3921533, "1.4.1"),
    deployment(SINGLETON_130_L2, 2086878, "1.3.0+L2"),
    deployment(SINGLETON_130_L2_SINGLETON_FACTORY, 2087039, "1.3.0+L2"),
    deployment(SINGLETON_130, 2086880, "1.3.0"),
    deployment(SINGLETON_130_SINGLETON_FACTORY, 2087040, "1.3.0"),
];

static MAINNET_PROXY_FACTORIES: [Deployment; 6] = [
    deployment(FACTORY_141, 17440707, "1.4.1"),
    deployment(FACTORY_130_SINGLETON_FACTORY, 14981216, "1.3.0"),
    deployment(FACTORY_130, 12504126, "1.3.0"),
    deployment(FACTORY_111, 9084508, "1.1.1"),
    deployment(address!("50e55Af101C777bA7A1d560a774A82eF002ced9F"), 8915731, "1.1.0"),
    deployment(FACTORY_100, 7450116, "1.0.0"),
];

static GNOSIS_PROXY_FACTORIES: [Deployment; 5] = [
    deployment(FACTORY_141, 27419153, "1.4.1"),
    deployment(FACTORY_130_SINGLETON_FACTORY, 27679953, "1.3.0"),
    deployment(FACTORY_130, 16236878, "1.3.0"),
    deployment(FACTORY_111, 10045327, "1.1.1"),
    deployment(FACTORY_100, 17677119, "1.0.0"),
];

static SEPOLIA_PROXY_FACTORIES: [Deployment; 3] = [
    deployment(FACTORY_141, 3312223, "1.4.1"),
    deployment(FACTORY_130_SINGLETON_FACTORY, 2087031, "1.3.0"),
    deployment(FACTORY_130, 2086864, "1.3.0"),
];

/// Singleton (master copy) deployments for a chain, newest first
pub fn master_copies(chain_id: u64) -> &'static [Deployment] {
    match chain_id {
        chain_ids::MAINNET => &MAINNET_MASTER_COPIES,
        chain_ids::GNOSIS => &GNOSIS_MASTER_COPIES,
        chain_ids::SEPOLIA => &SEPOLIA_MASTER_COPIES,
        _ => &[],
    }
}

/// Proxy factory deployments for a chain, newest first
pub fn proxy_factories(chain_id: u64) -> &'static [Deployment] {
    match chain_id {
        chain_ids::MAINNET => &MAINNET_PROXY_FACTORIES,
        chain_ids::GNOSIS => &GNOSIS_PROXY_FACTORIES,
        chain_ids::SEPOLIA => &SEPOLIA_PROXY_FACTORIES,
        _ => &[],
    }
}

pub fn find_master_copy(chain_id: u64, address: Address) -> Option<&'static Deployment> {
    master_copies(chain_id).iter().find(|d| d.address == address)
}

pub fn find_proxy_factory(chain_id: u64, address: Address) -> Option<&'static Deployment> {
    proxy_factories(chain_id).iter().find(|d| d.address == address)
}
