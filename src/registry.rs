//! Registry of accounts keyed by an external identifier

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::ledger::{Holdings, LedgerActions, XrpAccount};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_identifier;

struct RegistryState<C: LedgerClient> {
    by_identifier: HashMap<String, Arc<XrpAccount<C>>>,
    by_address: HashMap<Address, Arc<XrpAccount<C>>>,
}

/// Accounts created during one process lifetime
///
/// Create it at start-up, pass it to whatever needs accounts, and call
/// [`AccountRegistry::clear`] at shutdown.
pub struct AccountRegistry<C: LedgerClient> {
    actions: Arc<LedgerActions<C>>,
    state: Arc<RwLock<RegistryState<C>>>,
}

impl<C: LedgerClient> Clone for AccountRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            state: self.state.clone(),
        }
    }
}

impl<C: LedgerClient> AccountRegistry<C> {
    pub fn new(actions: Arc<LedgerActions<C>>) -> Self {
        Self {
            actions,
            state: Arc::new(RwLock::new(RegistryState {
                by_identifier: HashMap::new(),
                by_address: HashMap::new(),
            })),
        }
    }

    pub fn actions(&self) -> &Arc<LedgerActions<C>> {
        &self.actions
    }

    /// Return the account for `identifier`, creating and funding one if needed.
    ///
    /// A known identifier never touches the network. When two registrations
    /// for the same identifier race, the first to be stored wins and both
    /// callers receive it.
    pub async fn register(
        &self,
        identifier: &str,
        username: &str,
    ) -> LedgerResult<Arc<XrpAccount<C>>> {
        validate_identifier(identifier)?;

        if let Some(existing) = self.get(identifier)? {
            debug!("Reusing account {} for {}", existing.address(), identifier);
            return Ok(existing);
        }

        let account = Arc::new(XrpAccount::create(username, self.actions.clone()).await?);

        let mut state = self.write()?;
        if let Some(existing) = state.by_identifier.get(identifier) {
            return Ok(existing.clone());
        }
        state
            .by_identifier
            .insert(identifier.to_string(), account.clone());
        state
            .by_address
            .insert(account.address().clone(), account.clone());
        info!("Registered {} as {}", identifier, account.address());
        Ok(account)
    }

    /// Like [`register`](Self::register), using the identifier as the username
    pub async fn get_or_create(&self, identifier: &str) -> LedgerResult<Arc<XrpAccount<C>>> {
        self.register(identifier, identifier).await
    }

    /// Add an account created elsewhere
    pub fn insert(&self, identifier: &str, account: XrpAccount<C>) -> LedgerResult<Arc<XrpAccount<C>>> {
        validate_identifier(identifier)?;
        let account = Arc::new(account);
        let mut state = self.write()?;
        state
            .by_identifier
            .insert(identifier.to_string(), account.clone());
        state
            .by_address
            .insert(account.address().clone(), account.clone());
        Ok(account)
    }

    pub fn get(&self, identifier: &str) -> LedgerResult<Option<Arc<XrpAccount<C>>>> {
        Ok(self.read()?.by_identifier.get(identifier).cloned())
    }

    pub fn by_address(&self, address: &Address) -> LedgerResult<Option<Arc<XrpAccount<C>>>> {
        Ok(self.read()?.by_address.get(address).cloned())
    }

    /// Username of a registered address
    pub fn name_for(&self, address: &Address) -> LedgerResult<Option<String>> {
        Ok(self
            .read()?
            .by_address
            .get(address)
            .map(|account| account.username().to_string()))
    }

    /// Holdings with issuer addresses resolved to usernames where known
    pub async fn describe_holdings(&self, account: &XrpAccount<C>) -> LedgerResult<Holdings> {
        let mut holdings = account.holdings().await?;
        for token in &mut holdings.tokens {
            token.issuer_name = self.name_for(&token.issuer)?;
        }
        Ok(holdings)
    }

    pub fn identifiers(&self) -> LedgerResult<Vec<String>> {
        let mut identifiers: Vec<String> = self.read()?.by_identifier.keys().cloned().collect();
        identifiers.sort();
        Ok(identifiers)
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.by_identifier.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every account
    pub fn clear(&self) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.by_identifier.clear();
        state.by_address.clear();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, RegistryState<C>>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("registry lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, RegistryState<C>>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("registry lock poisoned".to_string()))
    }
}
