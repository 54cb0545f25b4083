use ethers_core::{
    abi::{Abi, Token},
    types::{Address, Bytes},
    utils::to_checksum,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// The three contracts of the VDS suite, in deployment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VdsContract {
    Core,
    Search,
    Verification,
}

impl VdsContract {
    pub const ALL: [VdsContract; 3] = [Self::Core, Self::Search, Self::Verification];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Core => "VDSCore",
            Self::Search => "VDSSearch",
            Self::Verification => "VDSVerification",
        }
    }
}

impl fmt::Display for VdsContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VdsContract {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|contract| contract.name() == s)
            .ok_or_else(|| format!("unknown contract: {s}"))
    }
}

/// Contract ABI that keeps the original json next to the parsed form.
///
/// The parsed [`Abi`] drops struct component names, which are needed
/// to look up named fields of returned structs.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractAbi {
    pub json: Value,
    pub abi: Abi,
}

impl TryFrom<Value> for ContractAbi {
    type Error = serde_json::Error;

    fn try_from(json: Value) -> Result<Self, Self::Error> {
        let abi = serde_json::from_value(json.clone())?;
        Ok(Self { json, abi })
    }
}

impl Serialize for ContractAbi {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.json.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContractAbi {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Value::deserialize(deserializer)?;
        ContractAbi::try_from(json).map_err(serde::de::Error::custom)
    }
}

/// Position of a named value inside decoded function outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPosition {
    /// The function returns the value directly as its n-th output.
    Output(usize),
    /// The function returns a single struct and the value is its n-th member.
    StructMember(usize),
}

impl OutputPosition {
    pub fn extract(&self, mut outputs: Vec<Token>) -> Option<Token> {
        match *self {
            Self::Output(index) => (index < outputs.len()).then(|| outputs.swap_remove(index)),
            Self::StructMember(index) => {
                let mut members = outputs.into_iter().next()?.into_tuple()?;
                (index < members.len()).then(|| members.swap_remove(index))
            }
        }
    }
}

impl ContractAbi {
    fn function_json(&self, function: &str) -> Option<&Value> {
        self.json.as_array()?.iter().find(|entry| {
            entry.get("type").and_then(Value::as_str) == Some("function")
                && entry.get("name").and_then(Value::as_str) == Some(function)
        })
    }

    /// Finds where the output named `field` of `function` ends up after decoding.
    pub fn output_position(&self, function: &str, field: &str) -> Option<OutputPosition> {
        let outputs = self.function_json(function)?.get("outputs")?.as_array()?;
        let name_of = |param: &Value| param.get("name").and_then(Value::as_str).map(str::to_owned);

        if let Some(index) = outputs
            .iter()
            .position(|param| name_of(param).as_deref() == Some(field))
        {
            return Some(OutputPosition::Output(index));
        }
        match outputs.as_slice() {
            [single] => single
                .get("components")?
                .as_array()?
                .iter()
                .position(|member| name_of(member).as_deref() == Some(field))
                .map(OutputPosition::StructMember),
            _ => None,
        }
    }
}

/// Result of compiling a single contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    pub name: String,
    pub abi: ContractAbi,
    pub bytecode: Bytes,
}

/// Formats an address the way the registry file stores it.
pub fn display_address(address: &Address) -> String {
    to_checksum(address, None)
}
