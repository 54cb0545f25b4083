use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer, WalletError},
};
use ethers_core::types::Address;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("private key is invalid: {0}")]
    InvalidKey(#[from] WalletError),
    #[error("couldn't reach rpc node at {url}: {message}")]
    Rpc { url: Url, message: String },
}

/// Private key and its address. Used to sign every transaction of a run.
#[derive(Clone)]
pub struct SigningIdentity {
    wallet: LocalWallet,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    /// Accepts a hex key with or without the `0x` prefix.
    pub fn from_key(key: &str) -> Result<Self, ConnectError> {
        let wallet = LocalWallet::from_str(key.trim())?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

/// Connects to the node and binds the identity to its chain id.
pub async fn connect(
    url: &Url,
    identity: SigningIdentity,
    poll_interval: Duration,
) -> Result<Arc<Client>, ConnectError> {
    let rpc_err = |message: String| ConnectError::Rpc {
        url: url.clone(),
        message,
    };
    let provider = Provider::<Http>::try_from(url.as_str())
        .map_err(|err| rpc_err(err.to_string()))?
        .interval(poll_interval);
    let chain_id = provider
        .get_chainid()
        .await
        .map_err(|err| rpc_err(err.to_string()))?;

    let wallet = identity.wallet.with_chain_id(chain_id.as_u64());
    log::info!("connected to rpc {url} (chain id {chain_id})");
    log::info!("signing account: {:?}", wallet.address());

    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}
