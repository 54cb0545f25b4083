pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8546";

pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private.key";
pub const DEFAULT_SOURCE_FILE: &str = "chain_contract.sol";
pub const DEFAULT_ABI_FILE: &str = "chain_contract.sol.json";
pub const DEFAULT_ADDRESSES_FILE: &str = "chain_contract.sol.txt";

/// Keeps the suite under the 24KB contract size limit.
pub const DEFAULT_OPTIMIZER_RUNS: usize = 200;

pub const ENV_PREFIX: &str = "VDS_DEPLOYER";
