//! Maps configured test names to test-case implementations.
//!
//! Preparation validates each test's slice of the configuration once, before
//! any worker starts. Instantiation per worker cannot fail.

use std::collections::BTreeMap;

use crate::cases::{
    ContractInvoke, PrivateMessage, SimulatorSettings, TestCase, TokenMint, TransactionSimulator,
    WorkerHandle, CUSTOM_ETHEREUM_CONTRACT, CUSTOM_FABRIC_CONTRACT, PRIVATE_MESSAGE, TOKEN_MINT,
    TRANSACTION_SIMULATOR,
};
use crate::config::{RunConfig, TestInstance};
use crate::error::{PerfError, PerfResult};
use crate::payload::{ContractInvokeBuilder, PrivateMessageBuilder, TokenMintBuilder};

/// A test case whose configuration has been validated.
#[derive(Debug, Clone)]
pub enum Blueprint {
    Contract(ContractInvokeBuilder),
    TokenMint(TokenMintBuilder),
    PrivateMessage(PrivateMessageBuilder),
    TransactionSimulator(SimulatorSettings),
}

impl Blueprint {
    /// Construct the test case owned by one worker.
    pub fn instantiate(&self, worker: WorkerHandle) -> Box<dyn TestCase> {
        match self {
            Self::Contract(b) => Box::new(ContractInvoke::new(worker, b.clone())),
            Self::TokenMint(b) => Box::new(TokenMint::new(worker, b.clone())),
            Self::PrivateMessage(b) => Box::new(PrivateMessage::new(worker, b.clone())),
            Self::TransactionSimulator(s) => Box::new(TransactionSimulator::new(worker, s.clone())),
        }
    }
}

/// Validates a test's configuration and returns its blueprint.
pub type Preparer = fn(&RunConfig, &str) -> PerfResult<Blueprint>;

/// Registry of known test cases.
pub struct TestCaseRegistry {
    entries: BTreeMap<&'static str, Preparer>,
}

impl TestCaseRegistry {
    pub fn new() -> Self {
        let mut entries: BTreeMap<&'static str, Preparer> = BTreeMap::new();
        entries.insert(CUSTOM_ETHEREUM_CONTRACT, |config, _| {
            ContractInvokeBuilder::ethereum(config).map(Blueprint::Contract)
        });
        entries.insert(CUSTOM_FABRIC_CONTRACT, |config, _| {
            ContractInvokeBuilder::fabric(config).map(Blueprint::Contract)
        });
        entries.insert(TOKEN_MINT, |config, tag_prefix| {
            TokenMintBuilder::new(config, tag_prefix).map(Blueprint::TokenMint)
        });
        entries.insert(PRIVATE_MESSAGE, |config, tag_prefix| {
            PrivateMessageBuilder::new(config, tag_prefix).map(Blueprint::PrivateMessage)
        });
        entries.insert(TRANSACTION_SIMULATOR, |config, _| {
            SimulatorSettings::from_config(config).map(Blueprint::TransactionSimulator)
        });
        Self { entries }
    }

    /// Registered test names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Prepare a single test case by name.
    pub fn prepare(
        &self,
        name: &str,
        config: &RunConfig,
        tag_prefix: &str,
    ) -> PerfResult<Blueprint> {
        let preparer = self
            .entries
            .get(name)
            .ok_or_else(|| PerfError::UnknownTestCase(name.to_string()))?;
        preparer(config, tag_prefix)
    }

    /// Prepare every configured test, failing on the first bad one.
    pub fn prepare_all(
        &self,
        config: &RunConfig,
        tag_prefix: &str,
    ) -> PerfResult<Vec<(TestInstance, Blueprint)>> {
        config
            .tests
            .iter()
            .map(|test| {
                self.prepare(&test.name, config, tag_prefix)
                    .map(|blueprint| (test.clone(), blueprint))
            })
            .collect()
    }
}

impl Default for TestCaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}
