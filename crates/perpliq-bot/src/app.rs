//! Application wiring.
//!
//! Builds the gateway and address deriver once from [`AppConfig`], then
//! hands them to the daemon, the admin flows or the read-only queries.
//! Views are simulated and never submitted.

use std::sync::Arc;

use borsh::BorshDeserialize;
use perpliq_admin::{PoolAdmin, QuorumExecutor};
use perpliq_core::instructions::{
    self, GetEntryPriceAndFeeParams, NewPositionAccounts, NewPositionPricesAndFee, PriceAndFee,
    ProfitAndLoss,
};
use perpliq_core::{Custody, Multisig, Perpetuals, Pool, Position, ProgramAddresses};
use perpliq_ledger::{
    fetch_account, load_keypair, load_keypairs, DynGateway, KeySource, RpcGateway,
};
use perpliq_liquidator::{
    CustodyCache, DecisionEvaluator, HealthState, LiquidationDaemon, PositionScanner,
    ResolvedPosition, ScannedPosition,
};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

pub struct Application {
    config: AppConfig,
    gateway: DynGateway,
    addrs: ProgramAddresses,
}

impl Application {
    /// Validate `config` and connect an RPC gateway to `rpc_url`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let rpc = RpcGateway::new(config.rpc_url.clone(), config.gateway.clone())?;
        debug!(url = rpc.url(), "RPC gateway connected");
        Self::with_gateway(config, Arc::new(rpc))
    }

    pub fn with_gateway(config: AppConfig, gateway: DynGateway) -> AppResult<Self> {
        let addrs = ProgramAddresses::new(config.program_id()?)?;
        info!(
            rpc_url = %config.rpc_url,
            program_id = %addrs.program_id(),
            "Application initialized"
        );
        Ok(Self {
            config,
            gateway,
            addrs,
        })
    }

    #[must_use]
    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addrs
    }

    /// Load the liquidator keypair.
    pub fn signer(&self) -> AppResult<Arc<Keypair>> {
        let keypair = load_keypair(&KeySource::file(self.config.keypair_path()))?;
        Ok(Arc::new(keypair))
    }

    /// Run the liquidation daemon for (`pool_name`, `mint`) until Ctrl-C.
    pub async fn run_daemon(&self, pool_name: &str, mint: Pubkey) -> AppResult<()> {
        let signer = self.signer()?;
        let mut daemon = LiquidationDaemon::new(
            self.gateway.clone(),
            self.addrs.clone(),
            signer,
            pool_name,
            mint,
            self.config.daemon.clone(),
            self.config.scanner.clone(),
        )?;

        tokio::select! {
            () = daemon.run() => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                info!(pool_name, %mint, "Shutdown signal received");
            }
        }
        Ok(())
    }

    /// Admin flows signed by the configured admin keys.
    pub fn pool_admin(&self) -> AppResult<PoolAdmin> {
        let admins = load_keypairs(&self.config.admin_keypair_paths())?;
        Ok(self.pool_admin_with(admins))
    }

    #[must_use]
    pub fn pool_admin_with(&self, admins: Vec<Arc<Keypair>>) -> PoolAdmin {
        PoolAdmin::new(QuorumExecutor::new(
            self.gateway.clone(),
            self.addrs.clone(),
            admins,
        ))
    }

    fn scanner(&self) -> PositionScanner {
        PositionScanner::new(
            self.gateway.clone(),
            self.addrs.clone(),
            self.config.scanner.clone(),
        )
    }

    pub async fn pool_positions(&self, pool_name: &str) -> AppResult<Vec<ScannedPosition>> {
        let pool = self.addrs.pool(pool_name)?;
        Ok(self.scanner().scan_pool(&pool).await?)
    }

    pub async fn user_positions(&self, owner: &Pubkey) -> AppResult<Vec<ScannedPosition>> {
        Ok(self.scanner().scan_owner(owner).await?)
    }

    // ------------------------------------------------------------------------
    // Position views
    // ------------------------------------------------------------------------
    //
    // `payer` only names the fee payer of the simulated transaction.

    fn evaluator(&self, payer: Pubkey) -> DecisionEvaluator {
        DecisionEvaluator::new(self.gateway.clone(), self.addrs.clone(), payer)
    }

    async fn resolve_position(
        &self,
        address: Pubkey,
        evaluator: &DecisionEvaluator,
    ) -> AppResult<ResolvedPosition> {
        let position = self.load::<Position>(address).await?;
        let scanned = ScannedPosition { address, position };
        Ok(evaluator.resolve(&scanned, &mut CustodyCache::new()).await?)
    }

    /// Ask the ledger whether the position at `address` can be liquidated.
    pub async fn liquidation_state(
        &self,
        address: Pubkey,
        payer: Pubkey,
    ) -> AppResult<HealthState> {
        let evaluator = self.evaluator(payer);
        let resolved = self.resolve_position(address, &evaluator).await?;
        Ok(evaluator.classify_resolved(&resolved).await?)
    }

    /// Liquidation price of a position after adding or removing collateral.
    pub async fn liquidation_price(
        &self,
        address: Pubkey,
        add_collateral: u64,
        remove_collateral: u64,
        payer: Pubkey,
    ) -> AppResult<u64> {
        if add_collateral > 0 && remove_collateral > 0 {
            return Err(AppError::InvalidArgument(
                "add and remove collateral are mutually exclusive".to_string(),
            ));
        }
        let resolved = self.resolve_position(address, &self.evaluator(payer)).await?;
        let ix = instructions::get_liquidation_price(
            &self.addrs,
            &resolved.accounts,
            add_collateral,
            remove_collateral,
        )?;
        self.view("get_liquidation_price", ix, payer).await
    }

    pub async fn pnl(&self, address: Pubkey, payer: Pubkey) -> AppResult<ProfitAndLoss> {
        let resolved = self.resolve_position(address, &self.evaluator(payer)).await?;
        let ix = instructions::get_pnl(&self.addrs, &resolved.accounts)?;
        self.view("get_pnl", ix, payer).await
    }

    pub async fn exit_price_and_fee(
        &self,
        address: Pubkey,
        payer: Pubkey,
    ) -> AppResult<PriceAndFee> {
        let resolved = self.resolve_position(address, &self.evaluator(payer)).await?;
        let ix = instructions::get_exit_price_and_fee(&self.addrs, &resolved.accounts)?;
        self.view("get_exit_price_and_fee", ix, payer).await
    }

    // ------------------------------------------------------------------------
    // Pool views
    // ------------------------------------------------------------------------

    /// Entry price, liquidation price and fee for opening a position on
    /// `mint` backed by `collateral_mint`.
    pub async fn entry_price_and_fee(
        &self,
        pool_name: &str,
        mint: &Pubkey,
        collateral_mint: &Pubkey,
        params: &GetEntryPriceAndFeeParams,
        payer: Pubkey,
    ) -> AppResult<NewPositionPricesAndFee> {
        if params.size == 0 {
            return Err(AppError::InvalidArgument("size must be positive".to_string()));
        }
        let (pool, custody_address, custody) = self.pool_custody(pool_name, mint).await?;
        let (_, collateral_address, collateral) =
            self.pool_custody(pool_name, collateral_mint).await?;
        let accounts = NewPositionAccounts {
            pool,
            custody: custody_address,
            custody_oracle_account: custody.oracle.oracle_account,
            collateral_custody: collateral_address,
            collateral_custody_oracle_account: collateral.oracle.oracle_account,
        };
        let ix = instructions::get_entry_price_and_fee(&self.addrs, &accounts, params)?;
        self.view("get_entry_price_and_fee", ix, payer).await
    }

    /// Spot or EMA price the program reads for `mint`.
    pub async fn oracle_price(
        &self,
        pool_name: &str,
        mint: &Pubkey,
        ema: bool,
        payer: Pubkey,
    ) -> AppResult<u64> {
        let (pool, address, custody) = self.pool_custody(pool_name, mint).await?;
        let ix = instructions::get_oracle_price(
            &self.addrs,
            &pool,
            &address,
            &custody.oracle.oracle_account,
            ema,
        )?;
        self.view("get_oracle_price", ix, payer).await
    }

    /// Assets under management of a pool, in USD.
    pub async fn aum(&self, pool_name: &str, payer: Pubkey) -> AppResult<u128> {
        let address = self.addrs.pool(pool_name)?;
        let pool = self.load::<Pool>(address).await?;
        let mut custodies = Vec::with_capacity(pool.custodies.len());
        for custody in &pool.custodies {
            let state = self.load::<Custody>(*custody).await?;
            custodies.push((*custody, state.oracle.oracle_account));
        }
        let ix = instructions::get_assets_under_management(&self.addrs, &address, &custodies)?;
        self.view("get_assets_under_management", ix, payer).await
    }

    async fn view<T: BorshDeserialize>(
        &self,
        view: &'static str,
        ix: Instruction,
        payer: Pubkey,
    ) -> AppResult<T> {
        let data = self
            .gateway
            .simulate(vec![ix], payer)
            .await?
            .ok_or_else(|| AppError::View {
                view,
                reason: "no return data".to_string(),
            })?;
        T::try_from_slice(&data).map_err(|e| AppError::View {
            view,
            reason: e.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Account reads
    // ------------------------------------------------------------------------

    pub async fn multisig(&self) -> AppResult<Multisig> {
        self.load(self.addrs.multisig()).await
    }

    pub async fn perpetuals(&self) -> AppResult<Perpetuals> {
        self.load(self.addrs.perpetuals()).await
    }

    pub async fn pool(&self, pool_name: &str) -> AppResult<Pool> {
        self.load(self.addrs.pool(pool_name)?).await
    }

    /// Every pool listed in the perpetuals account, in ledger order.
    pub async fn pools(&self) -> AppResult<Vec<Pool>> {
        let perpetuals = self.perpetuals().await?;
        let mut pools = Vec::with_capacity(perpetuals.pools.len());
        for address in perpetuals.pools {
            pools.push(self.load(address).await?);
        }
        Ok(pools)
    }

    pub async fn custody(&self, pool_name: &str, mint: &Pubkey) -> AppResult<Custody> {
        Ok(self.pool_custody(pool_name, mint).await?.2)
    }

    /// Every custody of a pool, in pool order.
    pub async fn custodies(&self, pool_name: &str) -> AppResult<Vec<Custody>> {
        let pool = self.pool(pool_name).await?;
        let mut custodies = Vec::with_capacity(pool.custodies.len());
        for address in pool.custodies {
            custodies.push(self.load(address).await?);
        }
        Ok(custodies)
    }

    /// Pool address, custody address and custody for `mint`, which must be
    /// listed in the pool.
    async fn pool_custody(
        &self,
        pool_name: &str,
        mint: &Pubkey,
    ) -> AppResult<(Pubkey, Pubkey, Custody)> {
        let address = self.addrs.pool(pool_name)?;
        let pool = self.load::<Pool>(address).await?;
        let custody = self.addrs.custody(&address, mint)?;
        if pool.custody_index(&custody).is_none() {
            return Err(AppError::InvalidArgument(format!(
                "{mint} is not a custody of pool {pool_name}"
            )));
        }
        Ok((address, custody, self.load(custody).await?))
    }

    async fn load<T: perpliq_core::LedgerAccount>(&self, address: Pubkey) -> AppResult<T> {
        fetch_account::<T, AppError>(self.gateway.as_ref(), address)
            .await?
            .ok_or(AppError::AccountNotFound(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use borsh::BorshSerialize;
    use perpliq_core::{LedgerAccount, OracleParams, OracleType, Permissions, Side, TokenRatios};
    use perpliq_ledger::MockGateway;

    struct Market {
        pool: Pubkey,
        mints: Vec<Pubkey>,
        custodies: Vec<Pubkey>,
        oracles: Vec<Pubkey>,
    }

    /// One pool listed in perpetuals, with a custody per mint.
    fn store_market(mock: &MockGateway, app: &Application, mints: usize) -> Market {
        let addrs = app.addresses();
        let program = addrs.program_id();
        let pool = addrs.pool("SOL-PERP").unwrap();
        let mints: Vec<Pubkey> = (0..mints).map(|_| Pubkey::new_unique()).collect();
        let oracles: Vec<Pubkey> = mints.iter().map(|_| Pubkey::new_unique()).collect();
        let custodies: Vec<Pubkey> = mints
            .iter()
            .map(|m| addrs.custody(&pool, m).unwrap())
            .collect();

        for ((mint, custody), oracle) in mints.iter().zip(&custodies).zip(&oracles) {
            let state = Custody {
                pool,
                mint: *mint,
                token_account: addrs.custody_token_account(&pool, mint).unwrap(),
                decimals: 9,
                is_stable: false,
                is_virtual: false,
                oracle: OracleParams::new(*oracle, OracleType::Pyth),
            };
            mock.set_account(*custody, program, state.to_account_data().unwrap());
        }
        let state = Pool {
            name: "SOL-PERP".to_string(),
            custodies: custodies.clone(),
            ratios: perpliq_core::rebalance(&vec![TokenRatios::NEW_CUSTODY; mints.len()]),
            aum_usd: 0,
            bump: 255,
            lp_token_bump: 254,
            inception_time: 0,
        };
        mock.set_account(pool, program, state.to_account_data().unwrap());
        let perpetuals = Perpetuals {
            permissions: Permissions::all(),
            pools: vec![pool],
            transfer_authority_bump: 254,
            perpetuals_bump: 253,
            inception_time: 0,
        };
        mock.set_account(addrs.perpetuals(), program, perpetuals.to_account_data().unwrap());

        Market {
            pool,
            mints,
            custodies,
            oracles,
        }
    }

    fn borsh_bytes<T: BorshSerialize>(value: &T) -> Vec<u8> {
        borsh::to_vec(value).unwrap()
    }

    fn app(mock: Arc<MockGateway>) -> Application {
        Application::with_gateway(AppConfig::default(), mock).unwrap()
    }

    fn position(owner: Pubkey, pool: Pubkey, custody: Pubkey) -> Position {
        Position {
            owner,
            pool,
            custody,
            collateral_custody: custody,
            open_time: 0,
            update_time: 0,
            side: Side::Short,
            price: 1,
            size_usd: 1,
            borrow_size_usd: 0,
            collateral_usd: 1,
            unrealized_profit_usd: 0,
            unrealized_loss_usd: 0,
            cumulative_interest_snapshot: 0,
            locked_amount: 0,
            collateral_amount: 0,
            bump: 255,
        }
    }

    #[tokio::test]
    async fn test_position_queries() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let program = app.addresses().program_id();
        let pool = app.addresses().pool("SOL-PERP").unwrap();
        let other_pool = app.addresses().pool("ETH-PERP").unwrap();
        let owner = Pubkey::new_unique();
        let custody = Pubkey::new_unique();

        for target in [pool, pool, other_pool] {
            mock.set_account(
                Pubkey::new_unique(),
                program,
                position(owner, target, custody).to_account_data().unwrap(),
            );
        }
        mock.set_account(
            Pubkey::new_unique(),
            program,
            position(Pubkey::new_unique(), pool, custody)
                .to_account_data()
                .unwrap(),
        );

        assert_eq!(app.pool_positions("SOL-PERP").await.unwrap().len(), 3);
        assert_eq!(app.pool_positions("ETH-PERP").await.unwrap().len(), 1);
        assert_eq!(app.user_positions(&owner).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_accounts_are_reported() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock);
        assert!(matches!(
            app.multisig().await,
            Err(AppError::AccountNotFound(addr)) if addr == app.addresses().multisig()
        ));
        assert!(matches!(
            app.liquidation_state(Pubkey::new_unique(), Pubkey::new_unique())
                .await,
            Err(AppError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_perpetuals_and_multisig() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let program = app.addresses().program_id();
        let admins = [Pubkey::new_unique(), Pubkey::new_unique()];

        let perpetuals = Perpetuals {
            permissions: Permissions::none(),
            pools: Vec::new(),
            transfer_authority_bump: 254,
            perpetuals_bump: 253,
            inception_time: 0,
        };
        mock.set_account(
            app.addresses().perpetuals(),
            program,
            perpetuals.to_account_data().unwrap(),
        );
        mock.set_account(
            app.addresses().multisig(),
            program,
            Multisig::with_signers(&admins, 2).to_account_data().unwrap(),
        );

        assert_eq!(app.perpetuals().await.unwrap(), perpetuals);
        let multisig = app.multisig().await.unwrap();
        assert_eq!(multisig.min_signatures, 2);
        assert_eq!(multisig.admin_signers(), &admins[..]);
    }

    #[test]
    fn test_invalid_program_id_fails() {
        let mut config = AppConfig::default();
        config.program_id = "bad".to_string();
        assert!(Application::with_gateway(config, Arc::new(MockGateway::new())).is_err());
    }

    #[tokio::test]
    async fn test_pool_and_custody_reads() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let market = store_market(&mock, &app, 2);

        let pools = app.pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "SOL-PERP");
        assert_eq!(app.pool("SOL-PERP").await.unwrap(), pools[0]);

        let custodies = app.custodies("SOL-PERP").await.unwrap();
        let mints: Vec<Pubkey> = custodies.iter().map(|c| c.mint).collect();
        assert_eq!(mints, market.mints);

        let custody = app.custody("SOL-PERP", &market.mints[1]).await.unwrap();
        assert_eq!(custody.oracle.oracle_account, market.oracles[1]);

        assert!(matches!(
            app.custody("SOL-PERP", &Pubkey::new_unique()).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            app.pool("ETH-PERP").await,
            Err(AppError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_position_views_decode_return_data() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let market = store_market(&mock, &app, 1);
        let payer = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        mock.set_account(
            address,
            app.addresses().program_id(),
            position(Pubkey::new_unique(), market.pool, market.custodies[0])
                .to_account_data()
                .unwrap(),
        );

        let pnl = ProfitAndLoss {
            profit: 0,
            loss: 7_500_000,
        };
        mock.set_view_result(address, borsh_bytes(&pnl));
        assert_eq!(app.pnl(address, payer).await.unwrap(), pnl);

        let exit = PriceAndFee {
            price: 24_000_000,
            fee: 1_000,
        };
        mock.set_view_result(address, borsh_bytes(&exit));
        assert_eq!(app.exit_price_and_fee(address, payer).await.unwrap(), exit);

        mock.set_view_result(address, borsh_bytes(&26_000_000u64));
        assert_eq!(
            app.liquidation_price(address, 0, 5, payer).await.unwrap(),
            26_000_000
        );
        assert!(matches!(
            app.liquidation_price(address, 5, 5, payer).await,
            Err(AppError::InvalidArgument(_))
        ));

        // a one-byte liquidation state decodes, a u64 does not
        mock.set_view_result(address, vec![1]);
        assert_eq!(
            app.liquidation_state(address, payer).await.unwrap(),
            HealthState::Liquidatable
        );
        assert!(matches!(
            app.liquidation_price(address, 0, 0, payer).await,
            Err(AppError::View { view: "get_liquidation_price", .. })
        ));

        let sims = mock.simulations();
        let last = &sims[sims.len() - 1][0];
        assert_eq!(last.accounts[2].pubkey, address);
        assert_eq!(last.accounts[4].pubkey, market.oracles[0]);
    }

    #[tokio::test]
    async fn test_pool_views() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let market = store_market(&mock, &app, 2);
        let payer = Pubkey::new_unique();

        mock.set_view_result(market.oracles[0], borsh_bytes(&25_000_000u64));
        assert_eq!(
            app.oracle_price("SOL-PERP", &market.mints[0], true, payer)
                .await
                .unwrap(),
            25_000_000
        );

        // pool is named before any custody, so its result wins from here on
        mock.set_view_result(market.pool, borsh_bytes(&123_456_789u128));
        assert_eq!(app.aum("SOL-PERP", payer).await.unwrap(), 123_456_789);
        let sims = mock.simulations();
        let aum = &sims[sims.len() - 1][0];
        assert_eq!(aum.accounts.len(), 2 + 2 * 2);
        assert_eq!(aum.accounts[3].pubkey, market.custodies[1]);
        assert_eq!(aum.accounts[5].pubkey, market.oracles[1]);

        let quote = NewPositionPricesAndFee {
            entry_price: 25_000_000,
            liquidation_price: 20_000_000,
            fee: 2_500,
        };
        mock.set_view_result(market.pool, borsh_bytes(&quote));
        let params = GetEntryPriceAndFeeParams {
            collateral: 1_000_000,
            size: 10_000_000,
            side: Side::Long,
        };
        let got = app
            .entry_price_and_fee("SOL-PERP", &market.mints[0], &market.mints[1], &params, payer)
            .await
            .unwrap();
        assert_eq!(got, quote);

        let empty = GetEntryPriceAndFeeParams { size: 0, ..params };
        assert!(matches!(
            app.entry_price_and_fee("SOL-PERP", &market.mints[0], &market.mints[1], &empty, payer)
                .await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_view_without_return_data() {
        let mock = Arc::new(MockGateway::new());
        let app = app(mock.clone());
        let market = store_market(&mock, &app, 1);
        let err = app
            .oracle_price("SOL-PERP", &market.mints[0], false, Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::View { view: "get_oracle_price", .. }));
    }
}
