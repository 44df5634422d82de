use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use l2_rollup_interface::services::{ChainError, ChainStore};
use l2_rollup_interface::{empty_uncle_hash, Address, Block, Header, Receipt, H256};

use super::state::{state_root, Accounts, StateProbe};
use super::{Account, MemoryState};

#[derive(Debug)]
struct ChainData {
    blocks: HashMap<H256, Block>,
    receipts: HashMap<H256, Vec<Receipt>>,
    states: HashMap<H256, Accounts>,
    canonical: BTreeMap<u64, H256>,
    head: H256,
    safe: Option<H256>,
    finalized: Option<H256>,
}

/// A [`ChainStore`] kept entirely in memory.
///
/// Clones share the same chain, so a test can keep a handle while the
/// backend owns another.
#[derive(Debug, Clone)]
pub struct MemoryChain {
    inner: Arc<RwLock<ChainData>>,
    probe: Arc<StateProbe>,
}

impl MemoryChain {
    /// Creates a chain whose genesis state holds `alloc`.
    pub fn new(alloc: impl IntoIterator<Item = (Address, Account)>, gas_limit: u64) -> Self {
        let accounts: Accounts = alloc.into_iter().collect();
        let root = state_root(&accounts);
        let genesis = Block {
            header: Header {
                uncle_hash: empty_uncle_hash(),
                state_root: root,
                gas_limit,
                ..Default::default()
            },
            transactions: Vec::new(),
        };
        let hash = genesis.hash();

        Self {
            inner: Arc::new(RwLock::new(ChainData {
                blocks: HashMap::from([(hash, genesis)]),
                receipts: HashMap::new(),
                states: HashMap::from([(root, accounts)]),
                canonical: BTreeMap::from([(0, hash)]),
                head: hash,
                safe: None,
                finalized: None,
            })),
            probe: Arc::default(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `block` without touching the canonical chain.
    pub fn insert_block(&self, block: Block) {
        self.write().blocks.insert(block.hash(), block);
    }

    /// Hash of the genesis block.
    pub fn genesis_hash(&self) -> H256 {
        self.read().canonical.get(&0).copied().unwrap_or_default()
    }

    /// Hash of the current head.
    pub fn head_hash(&self) -> H256 {
        self.read().head
    }

    /// Hash of the block marked safe, if any.
    pub fn safe_hash(&self) -> Option<H256> {
        self.read().safe
    }

    /// Hash of the block marked finalized, if any.
    pub fn finalized_hash(&self) -> Option<H256> {
        self.read().finalized
    }

    /// Receipts written with the block `hash`.
    pub fn receipts(&self, hash: H256) -> Option<Vec<Receipt>> {
        self.read().receipts.get(&hash).cloned()
    }

    /// The account at `address` in the head state.
    pub fn account(&self, address: Address) -> Account {
        let data = self.read();
        data.blocks
            .get(&data.head)
            .and_then(|head| data.states.get(&head.header.state_root))
            .and_then(|accounts| accounts.get(&address).copied())
            .unwrap_or_default()
    }

    /// Hashes of every transaction applied to any state of this chain, in order.
    pub fn attempted_transactions(&self) -> Vec<H256> {
        self.probe.attempted()
    }

    /// Number of states with a running prefetcher.
    pub fn active_prefetchers(&self) -> usize {
        self.probe.active_prefetchers()
    }
}

impl ChainStore for MemoryChain {
    type State = MemoryState;

    fn block_by_hash(&self, hash: H256) -> Option<Block> {
        self.read().blocks.get(&hash).cloned()
    }

    fn header_by_hash(&self, hash: H256) -> Option<Header> {
        self.read()
            .blocks
            .get(&hash)
            .map(|block| block.header.clone())
    }

    fn canonical_hash(&self, number: u64) -> Option<H256> {
        self.read().canonical.get(&number).copied()
    }

    fn current_header(&self) -> Header {
        let data = self.read();
        data.blocks
            .get(&data.head)
            .map(|block| block.header.clone())
            .unwrap_or_default()
    }

    fn set_canonical(&mut self, block: &Block) -> Result<H256, ChainError> {
        let mut data = self.write();
        let target = block.hash();

        let mut rewrites = Vec::new();
        let (mut number, mut hash) = (block.number(), target);
        while data.canonical.get(&number) != Some(&hash) {
            let Some(ancestor) = data.blocks.get(&hash) else {
                return Err(ChainError::Reorg {
                    target,
                    latest_valid_hash: data.head,
                });
            };
            rewrites.push((number, hash));
            if number == 0 {
                break;
            }
            hash = ancestor.header.parent_hash;
            number -= 1;
        }

        let height = block.number();
        data.canonical.retain(|number, _| *number <= height);
        data.canonical.extend(rewrites);
        data.head = target;
        Ok(target)
    }

    fn set_safe(&mut self, header: &Header) {
        self.write().safe = Some(header.hash());
    }

    fn set_finalized(&mut self, header: &Header) {
        self.write().finalized = Some(header.hash());
    }

    fn state_at(&self, root: H256) -> Result<MemoryState, ChainError> {
        let accounts = self
            .read()
            .states
            .get(&root)
            .cloned()
            .ok_or(ChainError::MissingState(root))?;
        Ok(MemoryState::new(accounts, self.probe.clone()))
    }

    fn write_block_and_set_head(
        &mut self,
        block: Block,
        receipts: Vec<Receipt>,
        state: MemoryState,
    ) -> Result<(), ChainError> {
        let mut data = self.write();
        let parent = block.header.parent_hash;
        if !data.blocks.contains_key(&parent) {
            return Err(ChainError::UnknownBlock(parent));
        }

        let hash = block.hash();
        let number = block.number();
        data.states
            .insert(block.header.state_root, state.into_accounts());
        data.receipts.insert(hash, receipts);
        data.blocks.insert(hash, block);
        data.canonical.retain(|height, _| *height < number);
        data.canonical.insert(number, hash);
        data.head = hash;
        Ok(())
    }
}
