//! In-memory chain simulating the lottery and the VRF coordinator simulator.
//!
//! Contracts are recognised by their init code prefix, calls by selector. The
//! behaviour follows the contracts closely enough to drive the workflow in tests:
//! reverting transactions are rejected at submission like a development node does
//! after gas estimation. [`FakeChain::mine_reverted`] switches to mining them with a
//! failed status instead.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy_core::primitives::{Address, B256, Bytes, U256, aliases::U96, keccak256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use anyhow::{Context, Result, anyhow};

use super::{Chain, LogEntry, TxReceipt, TxRequest};
use crate::contracts::{Lottery, VRFCoordinatorV2Mock};

/// Init code recognised as the lottery.
pub(crate) const LOTTERY_BYTECODE: [u8; 4] = [0x60, 0x01, 0x60, 0x00];
/// Init code recognised as the coordinator simulator.
pub(crate) const COORDINATOR_BYTECODE: [u8; 4] = [0x60, 0x02, 0x60, 0x00];

/// Timestamp of the first simulated block.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
pub(crate) struct FakeLottery {
    pub coordinator: Address,
    pub minimum_entry: U256,
    pub gas_lane: B256,
    pub subscription_id: u64,
    pub interval: U256,
    pub callback_gas_limit: u32,
    pub players: Vec<Address>,
    pub balance: U256,
    pub state: u8,
    pub last_timestamp: u64,
    pub recent_winner: Address,
}

impl FakeLottery {
    fn upkeep_needed(&self, now: u64) -> bool {
        self.state == 0
            && U256::from(now - self.last_timestamp) > self.interval
            && !self.players.is_empty()
            && self.balance > U256::ZERO
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSubscription {
    pub balance: U96,
    pub consumers: Vec<Address>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCoordinator {
    pub subscriptions: HashMap<u64, FakeSubscription>,
    pub next_subscription_id: u64,
    pub pending_requests: HashMap<U256, Address>,
    pub next_request_id: u64,
}

#[derive(Debug)]
struct FakeState {
    time: u64,
    block: u64,
    nonce: u64,
    lotteries: HashMap<Address, FakeLottery>,
    coordinators: HashMap<Address, FakeCoordinator>,
    receipts: HashMap<B256, TxReceipt>,
    sent: Vec<TxRequest>,
    revert_creations: bool,
    mine_reverted: bool,
}

/// In-memory [`Chain`] for tests.
#[derive(Debug)]
pub(crate) struct FakeChain {
    sender: Address,
    chain_id: u64,
    state: Mutex<FakeState>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            sender: Address::repeat_byte(0xaa),
            chain_id,
            state: Mutex::new(FakeState {
                time: GENESIS_TIMESTAMP,
                block: 1,
                nonce: 0,
                lotteries: HashMap::new(),
                coordinators: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                revert_creations: false,
                mine_reverted: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every following contract creation revert.
    pub fn revert_creations(&self) {
        self.state().revert_creations = true;
    }

    /// Accept every following transaction and mine it with a failed status, without
    /// executing it.
    pub fn mine_reverted(&self) {
        self.state().mine_reverted = true;
    }

    /// Every transaction submitted so far, rejected ones included.
    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.state().sent.clone()
    }

    /// Number of submitted transactions calling the given selector.
    pub fn calls_to(&self, selector: [u8; 4]) -> usize {
        self.state()
            .sent
            .iter()
            .filter(|tx| tx.to.is_some() && tx.input.starts_with(&selector))
            .count()
    }

    pub fn lottery(&self, address: Address) -> Option<FakeLottery> {
        self.state().lotteries.get(&address).cloned()
    }

    pub fn coordinator(&self, address: Address) -> Option<FakeCoordinator> {
        self.state().coordinators.get(&address).cloned()
    }

    /// Wipe all contracts, like restarting a development node.
    pub fn reset_contracts(&self) {
        let mut state = self.state();
        state.lotteries.clear();
        state.coordinators.clear();
    }
}

impl FakeState {
    fn next_address(&mut self) -> Address {
        let mut bytes = [0xc0u8; 20];
        bytes[12..].copy_from_slice(&self.nonce.to_be_bytes());
        Address::from(bytes)
    }

    fn execute(
        &mut self,
        sender: Address,
        tx: &TxRequest,
    ) -> Result<(Vec<LogEntry>, Option<Address>), String> {
        match tx.to {
            None => self.create(&tx.input).map(|address| (Vec::new(), Some(address))),
            Some(to) if self.lotteries.contains_key(&to) => {
                self.lottery_tx(sender, to, tx).map(|logs| (logs, None))
            }
            Some(to) if self.coordinators.contains_key(&to) => {
                self.coordinator_tx(sender, to, &tx.input).map(|logs| (logs, None))
            }
            Some(to) => Err(format!("no contract at {to}")),
        }
    }

    fn create(&mut self, init_code: &[u8]) -> Result<Address, String> {
        if self.revert_creations {
            return Err("constructor reverted".to_string());
        }

        let address = self.next_address();
        if init_code.starts_with(&COORDINATOR_BYTECODE) {
            self.coordinators.insert(
                address,
                FakeCoordinator {
                    next_subscription_id: 1,
                    next_request_id: 1,
                    ..Default::default()
                },
            );
        } else if let Some(args) = init_code.strip_prefix(&LOTTERY_BYTECODE) {
            let (coordinator, minimum_entry, gas_lane, subscription_id, interval, callback_gas_limit) =
                <(Address, U256, B256, u64, U256, u32)>::abi_decode_params(args)
                    .map_err(|e| format!("bad constructor arguments: {e}"))?;
            self.lotteries.insert(
                address,
                FakeLottery {
                    coordinator,
                    minimum_entry,
                    gas_lane,
                    subscription_id,
                    interval,
                    callback_gas_limit,
                    players: Vec::new(),
                    balance: U256::ZERO,
                    state: 0,
                    last_timestamp: self.time,
                    recent_winner: Address::ZERO,
                },
            );
        } else {
            return Err("unknown init code".to_string());
        }

        Ok(address)
    }

    fn lottery_tx(
        &mut self,
        sender: Address,
        address: Address,
        tx: &TxRequest,
    ) -> Result<Vec<LogEntry>, String> {
        let now = self.time;
        let lottery = self.lotteries.get_mut(&address).ok_or("no lottery")?;
        let selector: [u8; 4] = tx.input.get(..4).and_then(|s| s.try_into().ok()).ok_or("no selector")?;

        match selector {
            Lottery::enterLotteryCall::SELECTOR => {
                if lottery.state != 0 {
                    return Err("Lottery__NotOpen".to_string());
                }
                if tx.value < lottery.minimum_entry {
                    return Err("Lottery__NotEnoughETHEntered".to_string());
                }
                lottery.players.push(sender);
                lottery.balance += tx.value;
                Ok(Vec::new())
            }
            Lottery::performUpkeepCall::SELECTOR => {
                if !lottery.upkeep_needed(now) {
                    return Err("Lottery__UpkeepNotNeeded".to_string());
                }

                let coordinator = self
                    .coordinators
                    .get_mut(&lottery.coordinator)
                    .ok_or("coordinator not deployed")?;
                let subscription = coordinator
                    .subscriptions
                    .get(&lottery.subscription_id)
                    .ok_or("InvalidSubscription")?;
                if !subscription.consumers.contains(&address) {
                    return Err("InvalidConsumer".to_string());
                }

                let request_id = U256::from(coordinator.next_request_id);
                coordinator.next_request_id += 1;
                coordinator.pending_requests.insert(request_id, address);
                lottery.state = 1;

                let requested = VRFCoordinatorV2Mock::RandomWordsRequested {
                    keyHash: lottery.gas_lane,
                    requestId: request_id,
                    preSeed: U256::from(100),
                    subId: lottery.subscription_id,
                    minimumRequestConfirmations: 3,
                    callbackGasLimit: lottery.callback_gas_limit,
                    numWords: 1,
                    sender: address,
                };
                let winner_requested = Lottery::RequestedLotteryWinner {
                    requestId: request_id,
                };

                Ok(vec![
                    log_entry(lottery.coordinator, &requested),
                    log_entry(address, &winner_requested),
                ])
            }
            other => Err(format!("unknown lottery selector 0x{}", hex::encode(other))),
        }
    }

    fn coordinator_tx(
        &mut self,
        sender: Address,
        address: Address,
        input: &[u8],
    ) -> Result<Vec<LogEntry>, String> {
        let now = self.time;
        let coordinator = self.coordinators.get_mut(&address).ok_or("no coordinator")?;
        let selector: [u8; 4] = input.get(..4).and_then(|s| s.try_into().ok()).ok_or("no selector")?;
        let decode_err = |e: alloy_sol_types::Error| e.to_string();

        match selector {
            VRFCoordinatorV2Mock::createSubscriptionCall::SELECTOR => {
                let id = coordinator.next_subscription_id;
                coordinator.next_subscription_id += 1;
                coordinator.subscriptions.insert(id, FakeSubscription::default());

                let created = VRFCoordinatorV2Mock::SubscriptionCreated {
                    subId: id,
                    owner: sender,
                };
                Ok(vec![log_entry(address, &created)])
            }
            VRFCoordinatorV2Mock::fundSubscriptionCall::SELECTOR => {
                let call = VRFCoordinatorV2Mock::fundSubscriptionCall::abi_decode(input)
                    .map_err(decode_err)?;
                let subscription = coordinator
                    .subscriptions
                    .get_mut(&call.subId)
                    .ok_or("InvalidSubscription")?;
                subscription.balance += call.amount;
                Ok(Vec::new())
            }
            VRFCoordinatorV2Mock::addConsumerCall::SELECTOR => {
                let call =
                    VRFCoordinatorV2Mock::addConsumerCall::abi_decode(input).map_err(decode_err)?;
                let subscription = coordinator
                    .subscriptions
                    .get_mut(&call.subId)
                    .ok_or("InvalidSubscription")?;
                if !subscription.consumers.contains(&call.consumer) {
                    subscription.consumers.push(call.consumer);
                }
                Ok(Vec::new())
            }
            VRFCoordinatorV2Mock::fulfillRandomWordsCall::SELECTOR => {
                let call = VRFCoordinatorV2Mock::fulfillRandomWordsCall::abi_decode(input)
                    .map_err(decode_err)?;
                coordinator
                    .pending_requests
                    .remove(&call.requestId)
                    .ok_or("nonexistent request")?;

                let lottery = self
                    .lotteries
                    .get_mut(&call.consumer)
                    .ok_or("consumer is not a lottery")?;
                let random_word = U256::from_be_bytes(keccak256(call.requestId.to_be_bytes::<32>()).0);
                let index = (random_word % U256::from(lottery.players.len().max(1))).to::<usize>();
                let winner = lottery.players.get(index).copied().unwrap_or_default();

                lottery.recent_winner = winner;
                lottery.players.clear();
                lottery.balance = U256::ZERO;
                lottery.state = 0;
                lottery.last_timestamp = now;

                let picked = Lottery::WinnerPicked { winner };
                Ok(vec![log_entry(call.consumer, &picked)])
            }
            other => Err(format!("unknown coordinator selector 0x{}", hex::encode(other))),
        }
    }

    fn read(&self, to: Address, input: &[u8]) -> Result<Bytes> {
        let lottery = self
            .lotteries
            .get(&to)
            .with_context(|| format!("no readable contract at {to}"))?;
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .context("calldata without selector")?;

        let output = match selector {
            Lottery::minimumContributionCall::SELECTOR => lottery.minimum_entry.abi_encode(),
            Lottery::checkUpkeepCall::SELECTOR => {
                (lottery.upkeep_needed(self.time), Bytes::new()).abi_encode_params()
            }
            Lottery::getRecentWinnerCall::SELECTOR => lottery.recent_winner.abi_encode(),
            Lottery::getIntervalCall::SELECTOR => lottery.interval.abi_encode(),
            Lottery::getLotteryStateCall::SELECTOR => U256::from(lottery.state).abi_encode(),
            Lottery::getNumberOfPlayersCall::SELECTOR => {
                U256::from(lottery.players.len()).abi_encode()
            }
            Lottery::getLotteryBalanceCall::SELECTOR => lottery.balance.abi_encode(),
            other => return Err(anyhow!("unknown view selector 0x{}", hex::encode(other))),
        };

        Ok(Bytes::from(output))
    }
}

fn log_entry<E: SolEvent>(address: Address, event: &E) -> LogEntry {
    let data = event.encode_log_data();
    LogEntry {
        address,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
    }
}

impl Chain for FakeChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        let state = self.state();
        let deployed = state.lotteries.contains_key(&address)
            || state.coordinators.contains_key(&address);
        Ok(if deployed {
            Bytes::from_static(&[0x60, 0x80])
        } else {
            Bytes::new()
        })
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes> {
        self.state().read(to, &input)
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        let mut state = self.state();
        state.sent.push(tx.clone());
        state.nonce += 1;

        let (status, logs, contract_address) = if state.mine_reverted {
            (false, Vec::new(), None)
        } else {
            let (logs, contract_address) = state
                .execute(self.sender, &tx)
                .map_err(|reason| anyhow!("execution reverted: {reason}"))?;
            (true, logs, contract_address)
        };

        state.block += 1;
        let tx_hash = keccak256(state.nonce.to_be_bytes());
        let receipt = TxReceipt {
            transaction_hash: tx_hash,
            block_number: state.block,
            status,
            contract_address,
            logs,
        };
        state.receipts.insert(tx_hash, receipt);

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256, _confirmations: u64) -> Result<TxReceipt> {
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .with_context(|| format!("unknown transaction {tx_hash}"))
    }

    async fn increase_time(&self, seconds: u64) -> Result<()> {
        let mut state = self.state();
        state.time = state.time.saturating_add(seconds);
        Ok(())
    }

    async fn mine(&self) -> Result<()> {
        self.state().block += 1;
        Ok(())
    }
}
