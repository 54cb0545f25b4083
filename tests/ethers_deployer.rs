use ethers::signers::Signer;
use ethers_core::types::{Address, Bytes, H256};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::{collections::HashMap, str::FromStr, time::Duration};
use url::Url;
use vds_deployer::{
    deployment::{DeployError, Deployer, EthersDeployer},
    signer::{self, ConnectError, SigningIdentity},
    types::{CompiledContract, ContractAbi},
};
use wiremock::{matchers::method, Mock, MockServer, Request, Respond, ResponseTemplate};

const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SIGNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const DEPLOYED: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const CHAIN_ID: u64 = 31337;

/// Json-rpc node answering by method name; unknown methods get an error.
#[derive(Clone, Default)]
struct Node {
    results: HashMap<&'static str, Value>,
    errors: HashMap<&'static str, Value>,
}

impl Node {
    fn with(mut self, method: &'static str, result: Value) -> Self {
        self.results.insert(method, result);
        self
    }

    fn failing(mut self, method: &'static str, message: &str) -> Self {
        self.results.remove(method);
        self.errors
            .insert(method, json!({"code": -32000, "message": message}));
        self
    }
}

impl Respond for Node {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("json-rpc request");
        let name = body["method"].as_str().unwrap_or_default();
        let mut response = json!({"jsonrpc": "2.0", "id": body["id"]});
        match (self.results.get(name), self.errors.get(name)) {
            (Some(result), _) => response["result"] = result.clone(),
            (None, Some(error)) => response["error"] = error.clone(),
            (None, None) => {
                let message = format!("{name} not found");
                response["error"] = json!({"code": -32601, "message": message})
            }
        }
        ResponseTemplate::new(200).set_body_json(response)
    }
}

fn hash(byte: u8) -> String {
    format!("0x{}", hex::encode([byte; 32]))
}

fn bloom() -> String {
    format!("0x{}", hex::encode([0u8; 256]))
}

/// A node that mines every creation in block 1 with the given receipt status.
fn mining_node(status: &str) -> Node {
    let tx_hash = hash(0xab);
    let block_hash = hash(0x0b);
    let zero = hash(0);
    Node::default()
        .with("eth_chainId", json!(format!("{CHAIN_ID:#x}")))
        .with("eth_blockNumber", json!("0x5"))
        .with("eth_gasPrice", json!("0x3b9aca00"))
        .with("eth_getTransactionCount", json!("0x0"))
        .with("eth_estimateGas", json!("0x100000"))
        .with(
            "eth_feeHistory",
            json!({
                "oldestBlock": "0x1",
                "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
                "gasUsedRatio": [0.5],
                "reward": [["0x3b9aca00"]]
            }),
        )
        .with(
            "eth_getBlockByNumber",
            json!({
                "hash": block_hash,
                "parentHash": zero,
                "sha3Uncles": zero,
                "miner": SIGNER,
                "stateRoot": zero,
                "transactionsRoot": zero,
                "receiptsRoot": zero,
                "number": "0x1",
                "gasUsed": "0x0",
                "gasLimit": "0x1c9c380",
                "extraData": "0x",
                "logsBloom": bloom(),
                "timestamp": "0x1",
                "difficulty": "0x0",
                "totalDifficulty": "0x0",
                "uncles": [],
                "transactions": [],
                "size": "0x200",
                "mixHash": zero,
                "nonce": "0x0000000000000000",
                "baseFeePerGas": "0x3b9aca00"
            }),
        )
        .with("eth_sendRawTransaction", json!(tx_hash))
        .with(
            "eth_getTransactionByHash",
            json!({
                "hash": tx_hash,
                "nonce": "0x0",
                "blockHash": block_hash,
                "blockNumber": "0x1",
                "transactionIndex": "0x0",
                "from": SIGNER,
                "to": null,
                "value": "0x0",
                "gasPrice": "0x3b9aca00",
                "gas": "0x100000",
                "input": "0x6080",
                "v": "0x0",
                "r": "0x1",
                "s": "0x1",
                "type": "0x2",
                "accessList": [],
                "maxPriorityFeePerGas": "0x3b9aca00",
                "maxFeePerGas": "0x77359400",
                "chainId": format!("{CHAIN_ID:#x}")
            }),
        )
        .with(
            "eth_getTransactionReceipt",
            json!({
                "transactionHash": tx_hash,
                "transactionIndex": "0x0",
                "blockHash": block_hash,
                "blockNumber": "0x1",
                "from": SIGNER,
                "to": null,
                "cumulativeGasUsed": "0x100000",
                "gasUsed": "0x100000",
                "contractAddress": DEPLOYED,
                "logs": [],
                "logsBloom": bloom(),
                "status": status,
                "type": "0x2",
                "effectiveGasPrice": "0x3b9aca00"
            }),
        )
}

async fn start(node: Node) -> (MockServer, Url) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(node)
        .mount(&server)
        .await;
    let url = Url::parse(&server.uri()).expect("valid url");
    (server, url)
}

async fn deployer_for(url: &Url) -> EthersDeployer<signer::Client> {
    let identity = SigningIdentity::from_key(DEV_KEY).unwrap();
    let client = signer::connect(url, identity, Duration::from_millis(10))
        .await
        .expect("node is reachable");
    EthersDeployer::new(client, 1)
}

fn core_contract() -> CompiledContract {
    CompiledContract {
        name: "VDSCore".to_string(),
        abi: ContractAbi::try_from(json!([])).unwrap(),
        bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
    }
}

#[tokio::test]
async fn connect_binds_signer_to_chain_id() {
    let (_server, url) = start(mining_node("0x1")).await;
    let identity = SigningIdentity::from_key(DEV_KEY).unwrap();

    let client = signer::connect(&url, identity, Duration::from_millis(10))
        .await
        .expect("node is reachable");

    assert_eq!(CHAIN_ID, client.signer().chain_id());
    assert_eq!(Address::from_str(SIGNER).unwrap(), client.signer().address());
}

#[tokio::test]
async fn connect_fails_when_chain_id_is_unavailable() {
    let (_server, url) = start(mining_node("0x1").failing("eth_chainId", "node is syncing")).await;
    let identity = SigningIdentity::from_key(DEV_KEY).unwrap();

    let err = signer::connect(&url, identity, Duration::from_millis(10))
        .await
        .expect_err("chain id is unavailable");

    match err {
        ConnectError::Rpc { url: failed, message } => {
            assert_eq!(url, failed);
            assert!(message.contains("node is syncing"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn deploy_returns_receipt_address() {
    let (_server, url) = start(mining_node("0x1")).await;

    let address = deployer_for(&url)
        .await
        .deploy(&core_contract(), vec![])
        .await
        .expect("creation succeeds");

    assert_eq!(Address::from_str(DEPLOYED).unwrap(), address);
}

#[tokio::test]
async fn reverted_creation_is_not_a_deployment() {
    let (_server, url) = start(mining_node("0x0")).await;

    let err = deployer_for(&url)
        .await
        .deploy(&core_contract(), vec![])
        .await
        .expect_err("constructor reverted");

    match err {
        DeployError::Reverted { contract, tx_hash } => {
            assert_eq!("VDSCore", contract);
            assert_eq!(H256::from_str(&hash(0xab)).unwrap(), tx_hash);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_transaction_is_submit_error() {
    let node = mining_node("0x1").failing("eth_sendRawTransaction", "insufficient funds");
    let (_server, url) = start(node).await;

    let err = deployer_for(&url)
        .await
        .deploy(&core_contract(), vec![])
        .await
        .expect_err("node rejects the transaction");

    match err {
        DeployError::Submit { contract, message } => {
            assert_eq!("VDSCore", contract);
            assert!(message.contains("insufficient funds"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn constructor_arguments_need_a_constructor() {
    let (_server, url) = start(mining_node("0x1")).await;

    let err = deployer_for(&url)
        .await
        .deploy(
            &core_contract(),
            vec![ethers_core::abi::Token::Address(Address::zero())],
        )
        .await
        .expect_err("abi has no constructor");

    assert!(
        matches!(err, DeployError::Prepare { ref contract, .. } if contract == "VDSCore"),
        "{err:?}"
    );
}
