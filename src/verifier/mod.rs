//! Read-only checks that a deployed suite is wired together.
//!
//! Every contract is checked on its own: a failing call is reported for
//! that contract and the remaining contracts are still checked.

mod caller;

pub use caller::{CallError, ContractCaller, EthersCaller};

use crate::{
    artifacts::DeploymentArtifacts,
    types::{display_address, VdsContract},
};
use ethers_core::{
    abi::Token,
    types::{Address, U256},
};
use mismatch::Mismatch;

pub mod functions {
    pub const PUBLIC_PARAMETERS: &str = "getPublicParameters";
    pub const INITIALIZED: &str = "initialized";
    pub const SYSTEM_STATS: &str = "getSystemStats";
    pub const CORE_CONTRACT: &str = "coreContract";
    pub const SEARCH_CONTRACT: &str = "searchContract";
    pub const TOTAL_SEARCH_REQUESTS: &str = "getTotalSearchRequests";
    pub const SEARCH_REQUEST_IDS: &str = "getAllSearchRequestIds";
    pub const INTEGRITY_PROOF_IDS: &str = "getAllIntegrityProofIds";
}

/// Address a contract stores for one of its dependencies, next to the
/// address the registry holds for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCheck {
    pub reference: VdsContract,
    pub on_chain: Address,
    pub registered: Address,
}

impl ReferenceCheck {
    /// Addresses are compared as bytes, so hex casing never matters.
    pub fn matches(&self) -> bool {
        self.on_chain == self.registered
    }

    pub fn mismatch(&self) -> Option<Mismatch<String>> {
        (!self.matches()).then(|| {
            Mismatch::new(
                display_address(&self.registered),
                display_address(&self.on_chain),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStats {
    pub clients: U256,
    pub storage_nodes: U256,
    pub files: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStatus {
    pub initialized: bool,
    /// Only read while the system is not initialized.
    pub stats: Option<SystemStats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStatus {
    pub core: ReferenceCheck,
    pub total_requests: U256,
    pub request_ids: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationStatus {
    pub core: ReferenceCheck,
    pub search: ReferenceCheck,
    pub proof_ids: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub core: Result<CoreStatus, CallError>,
    pub search: Result<SearchStatus, CallError>,
    pub verification: Result<VerificationStatus, CallError>,
}

impl ConnectivityReport {
    pub fn references(&self) -> Vec<ReferenceCheck> {
        let mut references = Vec::new();
        if let Ok(search) = &self.search {
            references.push(search.core);
        }
        if let Ok(verification) = &self.verification {
            references.extend([verification.core, verification.search]);
        }
        references
    }

    /// Every check ran and every stored reference matches the registry.
    pub fn is_fully_connected(&self) -> bool {
        self.core.is_ok()
            && self.search.is_ok()
            && self.verification.is_ok()
            && self.references().iter().all(ReferenceCheck::matches)
    }
}

fn first_token(function: &str, outputs: Vec<Token>) -> Result<Token, CallError> {
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| CallError::unexpected(function, "no outputs"))
}

fn as_address(function: &str, outputs: Vec<Token>) -> Result<Address, CallError> {
    first_token(function, outputs)?
        .into_address()
        .ok_or_else(|| CallError::unexpected(function, "expected an address"))
}

fn as_uint(function: &str, outputs: Vec<Token>) -> Result<U256, CallError> {
    first_token(function, outputs)?
        .into_uint()
        .ok_or_else(|| CallError::unexpected(function, "expected an integer"))
}

fn array_len(function: &str, outputs: Vec<Token>) -> Result<usize, CallError> {
    first_token(function, outputs)?
        .into_array()
        .map(|items| items.len())
        .ok_or_else(|| CallError::unexpected(function, "expected an array"))
}

/// Outputs of a function returning either several values or a single struct.
fn members(outputs: Vec<Token>) -> Vec<Token> {
    if !matches!(outputs.as_slice(), [Token::Tuple(_)]) {
        return outputs;
    }
    outputs
        .into_iter()
        .next()
        .and_then(Token::into_tuple)
        .unwrap_or_default()
}

pub struct ConnectivityChecker<'a, C: ?Sized> {
    caller: &'a C,
    artifacts: &'a DeploymentArtifacts,
}

impl<'a, C: ContractCaller + ?Sized> ConnectivityChecker<'a, C> {
    pub fn new(caller: &'a C, artifacts: &'a DeploymentArtifacts) -> Self {
        Self { caller, artifacts }
    }

    async fn call(&self, contract: VdsContract, function: &str) -> Result<Vec<Token>, CallError> {
        self.caller
            .call(
                self.artifacts.address(contract),
                &self.artifacts.abi(contract).abi,
                function,
            )
            .await
    }

    fn reference(&self, reference: VdsContract, on_chain: Address) -> ReferenceCheck {
        ReferenceCheck {
            reference,
            on_chain,
            registered: self.artifacts.address(reference),
        }
    }

    pub async fn check_core(&self) -> Result<CoreStatus, CallError> {
        use self::functions::*;

        let position = self
            .artifacts
            .abi(VdsContract::Core)
            .output_position(PUBLIC_PARAMETERS, INITIALIZED)
            .ok_or_else(|| CallError::unexpected(PUBLIC_PARAMETERS, "no `initialized` output"))?;
        let initialized = position
            .extract(self.call(VdsContract::Core, PUBLIC_PARAMETERS).await?)
            .and_then(Token::into_bool)
            .ok_or_else(|| CallError::unexpected(PUBLIC_PARAMETERS, "expected a bool"))?;

        let stats = if initialized {
            None
        } else {
            let counters = members(self.call(VdsContract::Core, SYSTEM_STATS).await?)
                .into_iter()
                .take(3)
                .map(Token::into_uint)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| CallError::unexpected(SYSTEM_STATS, "expected integers"))?;
            match counters.as_slice() {
                [clients, storage_nodes, files] => Some(SystemStats {
                    clients: *clients,
                    storage_nodes: *storage_nodes,
                    files: *files,
                }),
                _ => {
                    return Err(CallError::unexpected(
                        SYSTEM_STATS,
                        "expected at least three counters",
                    ))
                }
            }
        };

        Ok(CoreStatus { initialized, stats })
    }

    pub async fn check_search(&self) -> Result<SearchStatus, CallError> {
        use self::functions::*;

        let core = as_address(
            CORE_CONTRACT,
            self.call(VdsContract::Search, CORE_CONTRACT).await?,
        )?;
        let total_requests = as_uint(
            TOTAL_SEARCH_REQUESTS,
            self.call(VdsContract::Search, TOTAL_SEARCH_REQUESTS).await?,
        )?;
        let request_ids = array_len(
            SEARCH_REQUEST_IDS,
            self.call(VdsContract::Search, SEARCH_REQUEST_IDS).await?,
        )?;

        Ok(SearchStatus {
            core: self.reference(VdsContract::Core, core),
            total_requests,
            request_ids,
        })
    }

    pub async fn check_verification(&self) -> Result<VerificationStatus, CallError> {
        use self::functions::*;

        let core = as_address(
            CORE_CONTRACT,
            self.call(VdsContract::Verification, CORE_CONTRACT).await?,
        )?;
        let search = as_address(
            SEARCH_CONTRACT,
            self.call(VdsContract::Verification, SEARCH_CONTRACT).await?,
        )?;
        let proof_ids = array_len(
            INTEGRITY_PROOF_IDS,
            self.call(VdsContract::Verification, INTEGRITY_PROOF_IDS).await?,
        )?;

        Ok(VerificationStatus {
            core: self.reference(VdsContract::Core, core),
            search: self.reference(VdsContract::Search, search),
            proof_ids,
        })
    }

    /// Runs all checks and logs their outcome.
    pub async fn run(&self) -> ConnectivityReport {
        log::info!("--- checking {} ---", VdsContract::Core);
        let core = self.check_core().await;
        log_core(&core);

        log::info!("--- checking {} ---", VdsContract::Search);
        let search = self.check_search().await;
        log_search(&search);

        log::info!("--- checking {} ---", VdsContract::Verification);
        let verification = self.check_verification().await;
        log_verification(&verification);

        ConnectivityReport {
            core,
            search,
            verification,
        }
    }
}

fn reference_messages(owner: VdsContract, check: &ReferenceCheck) -> Vec<(log::Level, String)> {
    let verdict = match check.mismatch() {
        None => (
            log::Level::Info,
            format!("[ok] {} address match: true", check.reference),
        ),
        Some(mismatch) => (
            log::Level::Warn,
            format!(
                "[fail] {owner}: {} address match: false ({mismatch})",
                check.reference
            ),
        ),
    };
    vec![
        (
            log::Level::Info,
            format!(
                "{owner} stores {} address {}",
                check.reference,
                display_address(&check.on_chain)
            ),
        ),
        (
            log::Level::Info,
            format!(
                "registry {} address {}",
                check.reference,
                display_address(&check.registered)
            ),
        ),
        verdict,
    ]
}

fn log_reference(owner: VdsContract, check: &ReferenceCheck) {
    for (level, message) in reference_messages(owner, check) {
        log::log!(level, "{message}");
    }
}

fn log_core(result: &Result<CoreStatus, CallError>) {
    match result {
        Ok(status) => {
            log::info!("[ok] {} initialized: {}", VdsContract::Core, status.initialized);
            if let Some(stats) = &status.stats {
                log::info!(
                    "{} is not initialized yet; clients: {}, storage nodes: {}, files: {}",
                    VdsContract::Core,
                    stats.clients,
                    stats.storage_nodes,
                    stats.files
                );
            }
        }
        Err(err) => log::error!("[fail] {} check failed: {err}", VdsContract::Core),
    }
}

fn log_search(result: &Result<SearchStatus, CallError>) {
    match result {
        Ok(status) => {
            log_reference(VdsContract::Search, &status.core);
            log::info!("{} search requests: {}", VdsContract::Search, status.total_requests);
            log::info!(
                "{} search request ids: {}",
                VdsContract::Search,
                status.request_ids
            );
        }
        Err(err) => log::error!("[fail] {} check failed: {err}", VdsContract::Search),
    }
}

fn log_verification(result: &Result<VerificationStatus, CallError>) {
    match result {
        Ok(status) => {
            log_reference(VdsContract::Verification, &status.core);
            log_reference(VdsContract::Verification, &status.search);
            if status.core.matches() && status.search.matches() {
                log::info!(
                    "[ok] {} is connected to {} and {}",
                    VdsContract::Verification,
                    VdsContract::Core,
                    VdsContract::Search
                );
            } else {
                log::warn!(
                    "[fail] {} connection to its dependencies looks wrong",
                    VdsContract::Verification
                );
            }
            log::info!(
                "{} integrity proofs: {}",
                VdsContract::Verification,
                status.proof_ids
            );
        }
        Err(err) => log::error!("[fail] {} check failed: {err}", VdsContract::Verification),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::AddressRegistry;
    use async_trait::async_trait;
    use ethers_core::abi::Abi;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::{collections::HashMap, str::FromStr};

    const CORE: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const SEARCH: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";
    const VERIFICATION: &str = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0";

    fn address(value: &str) -> Address {
        Address::from_str(value).unwrap()
    }

    fn view(name: &str, outputs: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "function",
            "name": name,
            "inputs": [],
            "outputs": outputs,
            "stateMutability": "view"
        })
    }

    fn artifacts() -> DeploymentArtifacts {
        let abis = json!({
            "VDSCore": [
                view("getPublicParameters", json!([{
                    "name": "",
                    "type": "tuple",
                    "components": [
                        {"name": "g", "type": "uint256"},
                        {"name": "initialized", "type": "bool"}
                    ]
                }])),
                view("getSystemStats", json!([
                    {"name": "", "type": "uint256"},
                    {"name": "", "type": "uint256"},
                    {"name": "", "type": "uint256"}
                ]))
            ],
            "VDSSearch": [
                view("coreContract", json!([{"name": "", "type": "address"}])),
                view("getTotalSearchRequests", json!([{"name": "", "type": "uint256"}])),
                view("getAllSearchRequestIds", json!([{"name": "", "type": "bytes32[]"}]))
            ],
            "VDSVerification": [
                view("coreContract", json!([{"name": "", "type": "address"}])),
                view("searchContract", json!([{"name": "", "type": "address"}])),
                view("getAllIntegrityProofIds", json!([{"name": "", "type": "bytes32[]"}]))
            ]
        });
        // Lower case on purpose.
        let registry = AddressRegistry::parse(&format!(
            "VDSCore: {}\nVDSSearch: {}\nVDSVerification: {}\n",
            CORE.to_lowercase(),
            SEARCH.to_lowercase(),
            VERIFICATION.to_lowercase()
        ))
        .unwrap();

        DeploymentArtifacts::new(
            String::new(),
            serde_json::from_value(abis).unwrap(),
            registry,
        )
        .unwrap()
    }

    #[derive(Default)]
    struct StaticCaller {
        responses: HashMap<(Address, &'static str), Result<Vec<Token>, CallError>>,
    }

    impl StaticCaller {
        fn with(mut self, at: &str, function: &'static str, outputs: Vec<Token>) -> Self {
            self.responses.insert((address(at), function), Ok(outputs));
            self
        }

        fn failing(mut self, at: &str, function: &'static str) -> Self {
            let err = CallError::Rpc {
                function: function.to_string(),
                message: "execution reverted".to_string(),
            };
            self.responses.insert((address(at), function), Err(err));
            self
        }

        fn healthy() -> Self {
            let zero = || Token::Uint(U256::zero());
            Self::default()
                .with(
                    CORE,
                    functions::PUBLIC_PARAMETERS,
                    vec![Token::Tuple(vec![zero(), Token::Bool(false)])],
                )
                .with(CORE, functions::SYSTEM_STATS, vec![zero(), zero(), zero()])
                .with(SEARCH, functions::CORE_CONTRACT, vec![Token::Address(address(CORE))])
                .with(SEARCH, functions::TOTAL_SEARCH_REQUESTS, vec![zero()])
                .with(SEARCH, functions::SEARCH_REQUEST_IDS, vec![Token::Array(vec![])])
                .with(
                    VERIFICATION,
                    functions::CORE_CONTRACT,
                    vec![Token::Address(address(CORE))],
                )
                .with(
                    VERIFICATION,
                    functions::SEARCH_CONTRACT,
                    vec![Token::Address(address(SEARCH))],
                )
                .with(
                    VERIFICATION,
                    functions::INTEGRITY_PROOF_IDS,
                    vec![Token::Array(vec![])],
                )
        }
    }

    #[async_trait]
    impl ContractCaller for StaticCaller {
        async fn call(
            &self,
            address: Address,
            abi: &Abi,
            function: &str,
        ) -> Result<Vec<Token>, CallError> {
            abi.function(function)
                .map_err(|_| CallError::UnknownFunction(function.to_string()))?;
            self.responses
                .iter()
                .find(|((at, name), _)| *at == address && *name == function)
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Err(CallError::unexpected(function, "no response")))
        }
    }

    #[tokio::test]
    async fn healthy_suite_is_connected() {
        let artifacts = artifacts();
        let caller = StaticCaller::healthy();
        let report = ConnectivityChecker::new(&caller, &artifacts).run().await;

        assert_eq!(
            Ok(CoreStatus {
                initialized: false,
                stats: Some(SystemStats {
                    clients: U256::zero(),
                    storage_nodes: U256::zero(),
                    files: U256::zero(),
                }),
            }),
            report.core
        );
        assert_eq!(3, report.references().len());
        assert!(report.is_fully_connected());
    }

    #[tokio::test]
    async fn initialized_core_skips_stats() {
        let artifacts = artifacts();
        let caller = StaticCaller::default().with(
            CORE,
            functions::PUBLIC_PARAMETERS,
            vec![Token::Tuple(vec![Token::Uint(U256::one()), Token::Bool(true)])],
        );
        let status = ConnectivityChecker::new(&caller, &artifacts)
            .check_core()
            .await
            .expect("core check");
        assert_eq!(
            CoreStatus {
                initialized: true,
                stats: None
            },
            status
        );
    }

    #[tokio::test]
    async fn mismatched_reference_is_reported_not_fatal() {
        let artifacts = artifacts();
        let wrong = Address::from_low_u64_be(42);
        let caller = StaticCaller::healthy().with(
            VERIFICATION,
            functions::SEARCH_CONTRACT,
            vec![Token::Address(wrong)],
        );
        let report = ConnectivityChecker::new(&caller, &artifacts).run().await;

        let verification = report.verification.clone().expect("calls succeed");
        assert!(verification.core.matches());
        assert!(!verification.search.matches());
        assert_eq!(
            Some(Mismatch::new(
                SEARCH.to_string(),
                display_address(&wrong)
            )),
            verification.search.mismatch()
        );
        assert!(report.search.is_ok());
        assert!(!report.is_fully_connected());
    }

    #[tokio::test]
    async fn failing_contract_does_not_stop_other_checks() {
        let artifacts = artifacts();
        let caller = StaticCaller::healthy().failing(CORE, functions::PUBLIC_PARAMETERS);
        let report = ConnectivityChecker::new(&caller, &artifacts).run().await;

        assert!(matches!(report.core, Err(CallError::Rpc { .. })));
        assert!(report.search.is_ok());
        assert!(report.verification.is_ok());
        assert!(report.references().iter().all(ReferenceCheck::matches));
        assert!(!report.is_fully_connected());
    }

    #[test]
    fn reference_comparison_ignores_case() {
        let check = ReferenceCheck {
            reference: VdsContract::Core,
            on_chain: address(&CORE.to_uppercase().replace("0X", "0x")),
            registered: address(&CORE.to_lowercase()),
        };
        assert!(check.matches());
        assert_eq!(None, check.mismatch());
    }

    #[test]
    fn only_the_verdict_of_a_mismatch_is_marked() {
        let check = ReferenceCheck {
            reference: VdsContract::Core,
            on_chain: address(SEARCH),
            registered: address(CORE),
        };

        let messages = reference_messages(VdsContract::Search, &check);

        let (info, verdict) = messages.split_at(2);
        assert!(info
            .iter()
            .all(|(level, message)| *level == log::Level::Info && !message.contains("[ok]")));
        assert_eq!(log::Level::Warn, verdict[0].0);
        assert!(verdict[0].1.starts_with("[fail]"), "{}", verdict[0].1);
    }
}
