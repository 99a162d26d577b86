//! Contract ABI definitions and protocol constants shared by every Safe revision

use alloy::primitives::{address, b256, fixed_bytes, Address, FixedBytes, B256};
use alloy::sol;

sol! {
    /// Safe singleton interface. The `execTransaction` layout is identical from 0.1.0 onwards;
    /// only the EIP-712 name of the sixth field changed (`dataGas` to `baseGas`).
    #[sol(rpc)]
    interface ISafe {
        function execTransaction(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address payable refundReceiver,
            bytes memory signatures
        ) external payable returns (bool success);

        function VERSION() external view returns (string memory version);

        function nonce() external view returns (uint256 nonce);

        function getThreshold() external view returns (uint256 threshold);

        function getOwners() external view returns (address[] memory owners);

        function isOwner(address owner) external view returns (bool isOwner);

        function domainSeparator() external view returns (bytes32);

        /// Returns every module. Unbounded before 1.1.1
        function getModules() external view returns (address[] memory modules);

        function getModulesPaginated(address start, uint256 pageSize)
            external
            view
            returns (address[] memory array, address next);

        function approvedHashes(address owner, bytes32 hash) external view returns (uint256 approved);

        function approveHash(bytes32 hashToApprove) external;

        /// Always reverts; the estimate is abi-encoded in the revert data. Removed in 1.4.0
        function requiredTxGas(address to, uint256 value, bytes calldata data, uint8 operation)
            external
            returns (uint256 estimate);

        event ExecutionSuccess(bytes32 indexed txHash, uint256 payment);
        event ExecutionFailure(bytes32 indexed txHash, uint256 payment);
    }

    /// Initializer called by the proxy factory on a fresh proxy
    interface ISafeSetup {
        function setup(
            address[] calldata _owners,
            uint256 _threshold,
            address to,
            bytes calldata data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address payable paymentReceiver
        ) external;
    }

    #[sol(rpc)]
    interface ISafeProxyFactory {
        function proxyCreationCode() external pure returns (bytes memory code);

        /// Removed in 1.4.1
        function proxyRuntimeCode() external pure returns (bytes memory code);

        function createProxyWithNonce(address _singleton, bytes memory initializer, uint256 saltNonce)
            external
            returns (address proxy);

        /// 1.4.1 factories only; mixes the chain id into the salt
        function createChainSpecificProxyWithNonce(
            address _singleton,
            bytes memory initializer,
            uint256 saltNonce
        ) external returns (address proxy);

        event ProxyCreation(address indexed proxy, address singleton);
    }

    interface ISimulateTxAccessor {
        function simulate(address to, uint256 value, bytes calldata data, uint8 operation)
            external
            returns (uint256 estimate, bool success, bytes memory returnData);
    }

    /// Fallback handler entry point that delegatecalls `targetContract` through the Safe
    interface ICompatibilityFallbackHandler {
        function simulate(address targetContract, bytes calldata calldataPayload)
            external
            returns (bytes memory response);
    }

    interface IERC1271 {
        function isValidSignature(bytes32 _hash, bytes memory _signature)
            external
            view
            returns (bytes4 magicValue);
    }

    /// Pre-standard EIP-1271 variant used by Safe 1.x contract owners
    interface IERC1271Legacy {
        function isValidSignature(bytes memory _data, bytes memory _signature)
            external
            view
            returns (bytes4 magicValue);
    }

    interface IMultiSend {
        /// @param transactions Packed encoding of transactions:
        ///        operation (1 byte) | to (20 bytes) | value (32 bytes) | data length (32 bytes) | data
        function multiSend(bytes memory transactions) external payable;
    }

    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// keccak256("SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)")
pub const SAFE_TX_TYPEHASH: B256 =
    b256!("bb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8");

/// Pre-1.0.0 struct, where `baseGas` was still called `dataGas`
pub const LEGACY_SAFE_TX_TYPEHASH: B256 =
    b256!("14d461bc7412367e924637b363c7bf29b8f47e2f84869f4426e5633d8af47b20");

/// keccak256("EIP712Domain(uint256 chainId,address verifyingContract)")
pub const DOMAIN_SEPARATOR_TYPEHASH: B256 =
    b256!("47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218");

/// keccak256("EIP712Domain(address verifyingContract)"), used before 1.3.0
pub const LEGACY_DOMAIN_SEPARATOR_TYPEHASH: B256 =
    b256!("035aff83d86937d35b32e04f0ddc6ff469290eef2f1b692d8a815c89404d4749");

/// keccak256("fallback_manager.handler.address")
pub const FALLBACK_HANDLER_STORAGE_SLOT: B256 =
    b256!("6c9a6c4a39284e37ed1cf53d337577d14212a4870fb976a4366c693b939918d5");

/// keccak256("guard_manager.guard.address")
pub const GUARD_STORAGE_SLOT: B256 =
    b256!("4a204f620c8c5ccdca3fd54d003badd85ba500436a431f0cbda4f558c93c34c8");

/// Head and tail of the owner and module linked lists
pub const SENTINEL_ADDRESS: Address = address!("0000000000000000000000000000000000000001");

/// `isValidSignature(bytes32,bytes)` selector, returned on success
pub const EIP1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("1626ba7e");

/// `isValidSignature(bytes,bytes)` selector, returned on success
pub const EIP1271_LEGACY_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("20c13b0b");
