//! Administrative flows: program setup, pool and custody lifecycle, admin
//! rotation, global permissions and custom oracle prices. Each flow
//! validates locally, then goes through the quorum executor.

use perpliq_core::accounts::MAX_ADMIN_SIGNERS;
use perpliq_core::instructions::{
    self, AddCustodyParams, InitParams, SetCustomOraclePriceParams,
};
use perpliq_core::{rebalance, CustodyConfig, Permissions, Pool, TokenRatios};
use perpliq_ledger::fetch_account;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::error::{AdminError, AdminResult};
use crate::quorum::{AdminAction, QuorumExecutor, QuorumOutcome};

/// Ratios after appending a new custody.
#[must_use]
pub fn ratios_after_add(current: &[TokenRatios]) -> Vec<TokenRatios> {
    let mut ratios = current.to_vec();
    ratios.push(TokenRatios::NEW_CUSTODY);
    rebalance(&ratios)
}

/// Ratios after removing the custody at `index`.
pub fn ratios_after_remove(current: &[TokenRatios], index: usize) -> AdminResult<Vec<TokenRatios>> {
    if index >= current.len() {
        return Err(AdminError::InvalidParams(format!(
            "custody index {index} out of range for {} ratios",
            current.len()
        )));
    }
    let mut ratios = current.to_vec();
    ratios.remove(index);
    Ok(rebalance(&ratios))
}

fn validate_admin_set(admins: &[Pubkey], min_signatures: u8) -> AdminResult<()> {
    if admins.is_empty() || admins.len() > MAX_ADMIN_SIGNERS {
        return Err(AdminError::InvalidParams(format!(
            "admin set must have 1..={MAX_ADMIN_SIGNERS} keys, got {}",
            admins.len()
        )));
    }
    if min_signatures == 0 || usize::from(min_signatures) > admins.len() {
        return Err(AdminError::InvalidParams(format!(
            "min_signatures {min_signatures} out of range for {} admins",
            admins.len()
        )));
    }
    Ok(())
}

/// Administrative operations against one program deployment.
pub struct PoolAdmin {
    quorum: QuorumExecutor,
}

impl PoolAdmin {
    pub fn new(quorum: QuorumExecutor) -> Self {
        Self { quorum }
    }

    #[must_use]
    pub fn quorum(&self) -> &QuorumExecutor {
        &self.quorum
    }

    async fn load_pool(&self, name: &str) -> AdminResult<(Pubkey, Pool)> {
        let address = self.quorum.addresses().pool(name)?;
        let pool = fetch_account::<Pool, AdminError>(self.quorum.gateway().as_ref(), address)
            .await?
            .ok_or(AdminError::AccountNotFound(address))?;
        Ok((address, pool))
    }

    /// Initialize the program with its first admin set.
    ///
    /// No multisig exists yet, so the threshold is one: the first configured
    /// key signs alone and must be the program's upgrade authority.
    pub async fn init(
        &self,
        admins: &[Pubkey],
        min_signatures: u8,
        permissions: &Permissions,
    ) -> AdminResult<QuorumOutcome> {
        validate_admin_set(admins, min_signatures)?;
        let addrs = self.quorum.addresses();
        let multisig = addrs.multisig();
        if self.quorum.gateway().get_account(multisig).await?.is_some() {
            return Err(AdminError::InvalidParams(format!(
                "program {} is already initialized",
                addrs.program_id()
            )));
        }

        let params = InitParams {
            min_signatures,
            permissions: *permissions,
        };
        info!(admins = admins.len(), min_signatures, %multisig, "Initializing program");
        self.quorum
            .execute_with_threshold(AdminAction::Init, 1, |authority| {
                instructions::init(addrs, authority, admins, &params)
            })
            .await
    }

    pub async fn add_pool(&self, name: &str) -> AdminResult<QuorumOutcome> {
        if name.is_empty() {
            return Err(AdminError::InvalidParams("pool name is empty".to_string()));
        }
        let addrs = self.quorum.addresses();
        let pool = addrs.pool(name)?;
        info!(pool_name = name, %pool, "Adding pool");
        self.quorum
            .execute(AdminAction::AddPool, |admin| {
                instructions::add_pool(addrs, admin, name)
            })
            .await
    }

    pub async fn remove_pool(&self, name: &str) -> AdminResult<QuorumOutcome> {
        let (pool, state) = self.load_pool(name).await?;
        if !state.custodies.is_empty() {
            return Err(AdminError::InvalidParams(format!(
                "pool {name} still has {} custodies",
                state.custodies.len()
            )));
        }
        info!(pool_name = name, %pool, "Removing pool");
        let addrs = self.quorum.addresses();
        self.quorum
            .execute(AdminAction::RemovePool, |admin| {
                instructions::remove_pool(addrs, admin, name)
            })
            .await
    }

    /// Add a custody for `mint`, rebalancing every target ratio in the pool.
    pub async fn add_custody(
        &self,
        pool_name: &str,
        mint: &Pubkey,
        config: &CustodyConfig,
    ) -> AdminResult<QuorumOutcome> {
        config.validate()?;
        let (pool, state) = self.load_pool(pool_name).await?;
        let addrs = self.quorum.addresses();
        let custody = addrs.custody(&pool, mint)?;
        if state.custody_index(&custody).is_some() {
            return Err(AdminError::InvalidParams(format!(
                "custody for {mint} already in pool {pool_name}"
            )));
        }

        let params = AddCustodyParams::new(config, ratios_after_add(&state.ratios));
        info!(
            pool_name,
            %mint,
            %custody,
            custodies = state.custodies.len() + 1,
            "Adding custody"
        );
        self.quorum
            .execute(AdminAction::AddCustody, |admin| {
                instructions::add_custody(addrs, admin, pool_name, mint, &params)
            })
            .await
    }

    /// Remove the custody for `mint`, dropping its ratio and rebalancing the rest.
    pub async fn remove_custody(
        &self,
        pool_name: &str,
        mint: &Pubkey,
    ) -> AdminResult<QuorumOutcome> {
        let (pool, state) = self.load_pool(pool_name).await?;
        let addrs = self.quorum.addresses();
        let custody = addrs.custody(&pool, mint)?;
        let index = state.custody_index(&custody).ok_or_else(|| {
            AdminError::InvalidParams(format!("custody for {mint} not in pool {pool_name}"))
        })?;

        let ratios = ratios_after_remove(&state.ratios, index)?;
        info!(pool_name, %mint, %custody, index, "Removing custody");
        self.quorum
            .execute(AdminAction::RemoveCustody, |admin| {
                instructions::remove_custody(addrs, admin, pool_name, mint, ratios.clone())
            })
            .await
    }

    /// Replace the admin set and threshold.
    pub async fn set_authority(
        &self,
        new_admins: &[Pubkey],
        min_signatures: u8,
    ) -> AdminResult<QuorumOutcome> {
        validate_admin_set(new_admins, min_signatures)?;
        info!(admins = new_admins.len(), min_signatures, "Rotating admin set");
        let addrs = self.quorum.addresses();
        self.quorum
            .execute(AdminAction::SetAdminSigners, |admin| {
                instructions::set_admin_signers(addrs, admin, new_admins, min_signatures)
            })
            .await
    }

    /// Write a price into the custom oracle account of (`pool_name`, `mint`).
    pub async fn set_oracle_price(
        &self,
        pool_name: &str,
        mint: &Pubkey,
        params: &SetCustomOraclePriceParams,
    ) -> AdminResult<QuorumOutcome> {
        let (pool, state) = self.load_pool(pool_name).await?;
        let addrs = self.quorum.addresses();
        let custody = addrs.custody(&pool, mint)?;
        if state.custody_index(&custody).is_none() {
            return Err(AdminError::InvalidParams(format!(
                "custody for {mint} not in pool {pool_name}"
            )));
        }
        if params.price == 0 {
            return Err(AdminError::InvalidParams("oracle price must be positive".to_string()));
        }

        let oracle = addrs.oracle_account(&pool, mint)?;
        info!(
            pool_name,
            %mint,
            %oracle,
            price = params.price,
            expo = params.expo,
            "Setting custom oracle price"
        );
        self.quorum
            .execute(AdminAction::SetCustomOraclePrice, |admin| {
                instructions::set_custom_oracle_price(addrs, admin, pool_name, mint, params)
            })
            .await
    }

    pub async fn set_permissions(&self, permissions: &Permissions) -> AdminResult<QuorumOutcome> {
        info!(?permissions, "Setting global permissions");
        let addrs = self.quorum.addresses();
        self.quorum
            .execute(AdminAction::SetPermissions, |admin| {
                instructions::set_permissions(addrs, admin, permissions)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(target: u64) -> TokenRatios {
        TokenRatios {
            target,
            min: 10,
            max: 10_000,
        }
    }

    #[test]
    fn test_ratios_after_add() {
        let out = ratios_after_add(&[ratio(5000), ratio(5000)]);
        let targets: Vec<u64> = out.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![3333, 3333, 3334]);
        assert_eq!(out[2].min, TokenRatios::NEW_CUSTODY.min);
    }

    #[test]
    fn test_ratios_after_add_first_custody() {
        let out = ratios_after_add(&[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, 10_000);
    }

    #[test]
    fn test_ratios_after_remove_by_index() {
        let current = vec![
            TokenRatios {
                target: 3333,
                min: 1,
                max: 9000,
            },
            TokenRatios {
                target: 3333,
                min: 2,
                max: 9000,
            },
            TokenRatios {
                target: 3334,
                min: 3,
                max: 9000,
            },
        ];
        let out = ratios_after_remove(&current, 0).unwrap();
        assert_eq!(out.len(), 2);
        // the removed entry is the first one, so the survivors keep their mins
        assert_eq!(out[0].min, 2);
        assert_eq!(out[1].min, 3);
        assert_eq!(out.iter().map(|r| r.target).sum::<u64>(), 10_000);
    }

    #[test]
    fn test_ratios_after_remove_last_leaves_empty() {
        assert!(ratios_after_remove(&[ratio(10_000)], 0).unwrap().is_empty());
        assert!(ratios_after_remove(&[ratio(10_000)], 1).is_err());
    }
}
