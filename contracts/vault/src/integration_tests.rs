//! Integration Tests
//!
//! End-to-end scenarios across the registry, the hooks, the fee ledger and
//! the vault, run on the in-memory ledger through the transaction runtime.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::*;
    use warden_common::{
        abi::{self, selectors},
        address_from_low_byte,
        constants::{fees::MAX_FEE, precision::ONE, time::DAY},
        events::EventType,
        ledger::{ExternalTarget, Ledger},
        math::mul_div,
        types::{Address, AssetInfo, AssetValue, Operation, Revert, Selector, TargetSighash},
        WardenError, WardenEvent,
    };

    const OWNER: Address = address_from_low_byte(0x01);
    const GUARDIAN: Address = address_from_low_byte(0x02);
    const FEE_RECIPIENT: Address = address_from_low_byte(0x03);
    const VAULT: Address = address_from_low_byte(0x04);
    const HOOKS: Address = address_from_low_byte(0x05);
    const NEW_HOOKS: Address = address_from_low_byte(0x06);
    const STRANGER: Address = address_from_low_byte(0x07);

    const USDC: Address = address_from_low_byte(0x10);
    const WETH: Address = address_from_low_byte(0x20);
    const WBTC: Address = address_from_low_byte(0x30);
    const SDAI: Address = address_from_low_byte(0x40);
    const DAI: Address = address_from_low_byte(0x50);

    const WETH_FEED: Address = address_from_low_byte(0x80);
    const WBTC_FEED: Address = address_from_low_byte(0x81);
    const DAI_FEED: Address = address_from_low_byte(0x82);
    const SEQUENCER: Address = address_from_low_byte(0x8f);

    const SINK: Address = address_from_low_byte(0x90);
    const SWAPPER: Address = address_from_low_byte(0x91);

    const SWAP: Selector = [0x94, 0xb9, 0x18, 0xde];
    const PING: Selector = [0x5c, 0x36, 0xb1, 0x86];

    const USDC_UNIT: u128 = 1_000_000;
    const WETH_PRICE: i128 = 2_000_00000000; // $2,000
    const DAI_PRICE: i128 = 1_00000000; // $1

    /// One hour into UTC day 19675
    const START: u64 = 19_675 * DAY + 3_600;

    /// Accepts any call and any native value
    struct Sink;

    impl ExternalTarget for Sink {
        fn call(&self, _: &mut Ledger, _: Address, _: u128, _: &[u8]) -> Result<Vec<u8>, Revert> {
            Ok(Vec::new())
        }
    }

    /// Sells USDC for WETH at $2,000, pulling USDC through an allowance
    struct Swapper;

    impl ExternalTarget for Swapper {
        fn call(&self, ledger: &mut Ledger, caller: Address, _: u128, data: &[u8]) -> Result<Vec<u8>, Revert> {
            let amount_in = abi::uint_arg(data, 0).ok_or_else(Revert::silent)?;
            let amount_out = amount_in * 1_000_000_000_000 / 2_000;
            ledger
                .transfer_from(USDC, SWAPPER, caller, SWAPPER, amount_in)
                .map_err(|e| Revert::reason(e.code()))?;
            ledger
                .transfer(WETH, SWAPPER, caller, amount_out)
                .map_err(|e| Revert::reason(e.code()))?;
            Ok(abi::encode_uint(amount_out))
        }
    }

    // ============================================================================
    // Fixtures
    // ============================================================================

    fn create_ledger() -> Ledger {
        let mut ledger = Ledger::new(START);

        ledger.create_token(USDC, 6);
        ledger.create_wrapped_native(WETH);
        ledger.create_token(DAI, 18);
        ledger.create_yield_bearing(SDAI, DAI, 18).unwrap();

        ledger.create_feed(WETH_FEED, 8);
        ledger.create_feed(DAI_FEED, 8);
        ledger.set_price(WETH_FEED, WETH_PRICE).unwrap();
        ledger.set_price(DAI_FEED, DAI_PRICE).unwrap();
        ledger.create_feed(SEQUENCER, 0);
        ledger.set_sequencer(SEQUENCER, true, START - DAY).unwrap();

        ledger.deploy_target(SINK, Arc::new(Sink));
        ledger.deploy_target(SWAPPER, Arc::new(Swapper));
        ledger.mint(WETH, SWAPPER, 1_000 * ONE).unwrap();

        ledger.mint(USDC, OWNER, 10_000 * USDC_UNIT).unwrap();
        ledger.mint(WETH, OWNER, 10 * ONE).unwrap();
        ledger.mint(SDAI, OWNER, 100 * ONE).unwrap();
        for token in [USDC, WETH, SDAI] {
            ledger.approve(token, OWNER, VAULT, u128::MAX).unwrap();
        }

        ledger
    }

    fn create_registry(ledger: &Ledger, vault: Address) -> AssetRegistry {
        AssetRegistry::new(
            RegistryParameters {
                owner: OWNER,
                vault,
                assets: vec![
                    AssetInfo::numeraire(USDC),
                    AssetInfo::priced(WETH, WETH_FEED, 3_600),
                    AssetInfo::yield_bearing(SDAI),
                    AssetInfo::priced(DAI, DAI_FEED, DAY),
                ],
                numeraire_token: USDC,
                fee_token: WETH,
                wrapped_native_token: WETH,
                sequencer: Some(SEQUENCER),
            },
            ledger,
        )
        .unwrap()
    }

    fn create_hooks(ledger: &Ledger, address: Address, vault: Address) -> Hooks {
        Hooks::new(
            HooksParameters {
                address,
                owner: OWNER,
                vault,
                min_daily_value: ONE * 9 / 10,
                allowlist: vec![
                    TargetSighash::new(USDC, selectors::TRANSFER),
                    TargetSighash::new(USDC, selectors::APPROVE),
                    TargetSighash::new(WETH, selectors::TRANSFER),
                    TargetSighash::new(SWAPPER, SWAP),
                    TargetSighash::new(SINK, PING),
                ],
            },
            ledger,
        )
        .unwrap()
    }

    fn vault_params(fee: u128) -> VaultParameters {
        VaultParameters {
            address: VAULT,
            owner: OWNER,
            guardian: GUARDIAN,
            fee_recipient: FEE_RECIPIENT,
            fee,
        }
    }

    fn setup(fee: u128) -> Chain {
        let ledger = create_ledger();
        let registry = create_registry(&ledger, VAULT);
        let hooks = create_hooks(&ledger, HOOKS, VAULT);
        let vault = Vault::new(vault_params(fee), registry, hooks, &ledger).unwrap();
        Chain::new(ledger, vault)
    }

    fn refresh_prices(chain: &mut Chain) {
        chain.ledger.set_price(WETH_FEED, WETH_PRICE).unwrap();
        chain.ledger.set_price(DAI_FEED, DAI_PRICE).unwrap();
    }

    fn usdc(amount: u128) -> AssetValue {
        AssetValue::new(USDC, amount * USDC_UNIT)
    }

    fn pay(token: Address, to: Address, amount: u128) -> Operation {
        Operation::new(token, abi::transfer(to, amount))
    }

    // ============================================================================
    // Construction
    // ============================================================================

    #[test]
    fn test_vault_created() {
        let chain = setup(MAX_FEE);

        assert_eq!(chain.vault.owner(), OWNER);
        assert_eq!(chain.vault.guardian(), GUARDIAN);
        assert_eq!(chain.value().unwrap(), 0);
        assert_eq!(chain.holdings().len(), 4);
        assert_eq!(chain.vault.events().filter_by_type(EventType::VaultCreated).len(), 1);
        assert_eq!(chain.vault.state().fees.last_fee_checkpoint, START);
    }

    #[test]
    fn test_constructor_validation() {
        let ledger = create_ledger();

        let result = Vault::new(
            vault_params(MAX_FEE + 1),
            create_registry(&ledger, VAULT),
            create_hooks(&ledger, HOOKS, VAULT),
            &ledger,
        );
        assert!(matches!(result, Err(WardenError::FeeIsAboveMax { .. })));

        let result = Vault::new(
            vault_params(0),
            create_registry(&ledger, STRANGER),
            create_hooks(&ledger, HOOKS, VAULT),
            &ledger,
        );
        assert_eq!(
            result.unwrap_err(),
            WardenError::VaultMismatch { expected: VAULT, actual: Some(STRANGER) }
        );

        let result = Vault::new(
            vault_params(0),
            create_registry(&ledger, VAULT),
            create_hooks(&ledger, HOOKS, STRANGER),
            &ledger,
        );
        assert_eq!(
            result.unwrap_err(),
            WardenError::VaultMismatch { expected: VAULT, actual: Some(STRANGER) }
        );

        let mut params = vault_params(0);
        params.guardian = OWNER;
        let result = Vault::new(
            params,
            create_registry(&ledger, VAULT),
            create_hooks(&ledger, HOOKS, VAULT),
            &ledger,
        );
        assert_eq!(result.unwrap_err(), WardenError::GuardianIsOwner);
    }

    // ============================================================================
    // Deposit / Withdraw
    // ============================================================================

    #[test]
    fn test_deposit_and_value() {
        let mut chain = setup(0);

        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        // 1000 USDC + 1 WETH at $2,000
        assert_eq!(chain.value().unwrap(), 3_000 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(USDC, OWNER), 9_000 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), ONE);
        assert_eq!(chain.vault.events().filter_by_type(EventType::Deposited).len(), 1);
    }

    #[test]
    fn test_deposit_requires_ascending_assets() {
        let mut chain = setup(0);

        // WETH (0x..20) before USDC (0x..10)
        let result = chain.deposit(OWNER, &[AssetValue::new(WETH, ONE), usdc(100)]);
        assert_eq!(result.unwrap_err(), WardenError::AmountsOrderIsIncorrect { index: 1 });
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), 0);

        let result = chain.deposit(OWNER, &[usdc(1), usdc(2)]);
        assert_eq!(result.unwrap_err(), WardenError::AmountsOrderIsIncorrect { index: 1 });

        let unknown = address_from_low_byte(0x60);
        let result = chain.deposit(OWNER, &[AssetValue::new(unknown, 1)]);
        assert_eq!(result.unwrap_err(), WardenError::AssetNotRegistered { asset: unknown });

        chain.deposit(OWNER, &[usdc(100), AssetValue::new(WETH, ONE)]).unwrap();
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), ONE);
    }

    #[test]
    fn test_deposit_only_owner() {
        let mut chain = setup(0);
        let result = chain.deposit(STRANGER, &[usdc(1)]);
        assert_eq!(result.unwrap_err(), WardenError::CallerIsNotOwner { caller: STRANGER });
    }

    #[test]
    fn test_withdraw_respects_reserved_fees() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);

        // $3000 * 1e-9/s * 1000s = $0.003 = 1.5e-6 WETH
        let reserved = 1_500_000_000_000;
        let result = chain.withdraw(OWNER, &[AssetValue::new(WETH, ONE)]);
        assert_eq!(
            result.unwrap_err(),
            WardenError::AmountExceedsAvailable { asset: WETH, amount: ONE, available: ONE - reserved }
        );
        assert_eq!(chain.vault.fee_total(), 0);

        chain
            .withdraw(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE - reserved)])
            .unwrap();
        assert_eq!(chain.vault.fee_total(), reserved);
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), reserved);
        assert_eq!(chain.ledger.balance_of(USDC, OWNER), 10_000 * USDC_UNIT);
        assert!(chain.holdings().iter().all(|h| h.value == 0));
    }

    #[test]
    fn test_yield_bearing_holdings_valued_through_underlying() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[AssetValue::new(SDAI, 100 * ONE)]).unwrap();
        chain.ledger.set_share_rate(SDAI, ONE + ONE / 10).unwrap();

        assert_eq!(chain.value().unwrap(), 110 * USDC_UNIT);
    }

    // ============================================================================
    // Guardian Submissions
    // ============================================================================

    #[test]
    fn test_daily_bound_scenario() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        // 1. 1000 -> 920: multiplier 0.92, above the 0.9 floor
        chain.submit(GUARDIAN, &[pay(USDC, SINK, 80 * USDC_UNIT)]).unwrap();
        assert_eq!(chain.value().unwrap(), 920 * USDC_UNIT);
        assert_eq!(chain.vault.hooks().cumulative_daily_multiplier(), ONE * 92 / 100);

        // 2. 920 -> 890 the same day: 0.89 breaches the floor
        let events_before = chain.vault.events().len();
        let result = chain.submit(GUARDIAN, &[pay(USDC, SINK, 30 * USDC_UNIT)]);
        assert!(matches!(result, Err(WardenError::VaultValueBelowMinDailyValue { .. })));

        // 3. Nothing moved
        assert_eq!(chain.ledger.balance_of(USDC, VAULT), 920 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(USDC, SINK), 80 * USDC_UNIT);
        assert_eq!(chain.vault.hooks().cumulative_daily_multiplier(), ONE * 92 / 100);
        assert_eq!(chain.vault.events().len(), events_before);
    }

    #[test]
    fn test_daily_bound_resets_next_day() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();
        chain.submit(GUARDIAN, &[pay(USDC, SINK, 80 * USDC_UNIT)]).unwrap();

        chain.advance(DAY);
        refresh_prices(&mut chain);

        chain.submit(GUARDIAN, &[pay(USDC, SINK, 30 * USDC_UNIT)]).unwrap();
        assert_eq!(chain.vault.hooks().current_day(), 19_676);
        assert_eq!(
            chain.vault.hooks().cumulative_daily_multiplier(),
            mul_div(890, ONE, 920).unwrap()
        );
    }

    #[test]
    fn test_submit_requires_allowlist() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        let result = chain.submit(GUARDIAN, &[pay(USDC, SINK, 1), pay(DAI, SINK, 1)]);
        assert_eq!(result.unwrap_err(), WardenError::CallIsNotAllowed { index: 1 });
    }

    #[test]
    fn test_submit_only_guardian() {
        let mut chain = setup(0);
        let result = chain.submit(OWNER, &[]);
        assert_eq!(result.unwrap_err(), WardenError::CallerIsNotGuardian { caller: OWNER });
    }

    #[test]
    fn test_submit_rejects_owner_pulls() {
        let mut chain = setup(0);

        let pull = Operation::new(USDC, abi::transfer_from(OWNER, VAULT, 1));
        assert_eq!(
            chain.submit(GUARDIAN, &[pull]).unwrap_err(),
            WardenError::SubmitTransfersAssetFromOwner { index: 0 }
        );

        let redeem = Operation::new(SDAI, abi::redeem(1, VAULT, OWNER));
        assert_eq!(
            chain.submit(GUARDIAN, &[pay(USDC, SINK, 0), redeem]).unwrap_err(),
            WardenError::SubmitRedeemsAssetFromOwner { index: 1 }
        );

        let withdraw = Operation::new(SDAI, abi::vault_withdraw(1, VAULT, OWNER));
        assert_eq!(
            chain.submit(GUARDIAN, &[withdraw]).unwrap_err(),
            WardenError::SubmitRedeemsAssetFromOwner { index: 0 }
        );

        // Pulling from someone else falls through to the allowlist
        let other = Operation::new(USDC, abi::transfer_from(STRANGER, VAULT, 1));
        assert_eq!(
            chain.submit(GUARDIAN, &[other]).unwrap_err(),
            WardenError::CallIsNotAllowed { index: 0 }
        );
    }

    #[test]
    fn test_calls_into_vault_or_hooks_rejected() {
        let mut chain = setup(0);

        let to_vault = Operation::new(VAULT, PING.to_vec());
        let to_hooks = Operation::new(HOOKS, PING.to_vec());

        assert_eq!(chain.submit(GUARDIAN, &[to_vault.clone()]).unwrap_err(), WardenError::TargetIsVault);
        assert_eq!(chain.submit(GUARDIAN, &[to_hooks.clone()]).unwrap_err(), WardenError::TargetIsHooks);
        assert_eq!(chain.execute(OWNER, &to_vault).unwrap_err(), WardenError::TargetIsVault);
        assert_eq!(chain.execute(OWNER, &to_hooks).unwrap_err(), WardenError::TargetIsHooks);
    }

    #[test]
    fn test_failed_call_rolls_back_submission() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        let result = chain.submit(
            GUARDIAN,
            &[pay(USDC, SINK, 10 * USDC_UNIT), pay(USDC, SINK, 5_000 * USDC_UNIT)],
        );
        assert!(matches!(result, Err(WardenError::SubmissionFailed { index: 1, .. })));
        assert_eq!(chain.ledger.balance_of(USDC, SINK), 0);
        assert_eq!(chain.ledger.balance_of(USDC, VAULT), 1_000 * USDC_UNIT);
    }

    #[test]
    fn test_outstanding_allowance_rejected() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        let approve = Operation::new(USDC, abi::approve(SWAPPER, 100 * USDC_UNIT));
        let partial = Operation::new(SWAPPER, abi::encode_call(SWAP, &[abi::Token::Uint(60 * USDC_UNIT)]));
        let result = chain.submit(GUARDIAN, &[approve.clone(), partial]);
        assert_eq!(
            result.unwrap_err(),
            WardenError::AllowanceIsNotZero { token: USDC, spender: SWAPPER, allowance: 40 * USDC_UNIT }
        );

        let full = Operation::new(SWAPPER, abi::encode_call(SWAP, &[abi::Token::Uint(100 * USDC_UNIT)]));
        chain.submit(GUARDIAN, &[approve, full]).unwrap();

        assert_eq!(chain.ledger.balance_of(WETH, VAULT), ONE / 20);
        assert_eq!(chain.value().unwrap(), 1_000 * USDC_UNIT);
        assert_eq!(chain.ledger.allowance(USDC, VAULT, SWAPPER), 0);
    }

    #[test]
    fn test_outstanding_increased_allowance_rejected() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();
        chain
            .transact(|vault, ledger| {
                vault
                    .hooks_mut()
                    .add_target_sighash(ledger, OWNER, USDC, selectors::INCREASE_ALLOWANCE)
            })
            .unwrap();

        let grant = Operation::new(USDC, abi::increase_allowance(SWAPPER, 100 * USDC_UNIT));
        let partial = Operation::new(SWAPPER, abi::encode_call(SWAP, &[abi::Token::Uint(60 * USDC_UNIT)]));
        let events_before = chain.vault.events().len();

        let result = chain.submit(GUARDIAN, &[grant.clone(), partial]);
        assert_eq!(
            result.unwrap_err(),
            WardenError::AllowanceIsNotZero { token: USDC, spender: SWAPPER, allowance: 40 * USDC_UNIT }
        );

        // Nothing from the batch survives
        assert_eq!(chain.ledger.allowance(USDC, VAULT, SWAPPER), 0);
        assert_eq!(chain.ledger.balance_of(USDC, VAULT), 1_000 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), 0);
        assert_eq!(chain.vault.hooks().cumulative_daily_multiplier(), ONE);
        assert_eq!(chain.vault.events().len(), events_before);

        let full = Operation::new(SWAPPER, abi::encode_call(SWAP, &[abi::Token::Uint(100 * USDC_UNIT)]));
        chain.submit(GUARDIAN, &[grant, full]).unwrap();
        assert_eq!(chain.ledger.allowance(USDC, VAULT, SWAPPER), 0);
    }

    #[test]
    fn test_registry_administered_through_vault() {
        let mut chain = setup(0);

        chain.ledger.create_token(WBTC, 8);
        chain.ledger.create_feed(WBTC_FEED, 8);
        chain.ledger.set_price(WBTC_FEED, 40_000_00000000).unwrap();
        chain.ledger.mint(WBTC, OWNER, 100_000_000).unwrap();
        chain.ledger.approve(WBTC, OWNER, VAULT, u128::MAX).unwrap();

        // 1. Only the registry owner may add
        let result = chain.transact(|vault, ledger| {
            vault
                .registry_mut()
                .add_asset(ledger, STRANGER, AssetInfo::priced(WBTC, WBTC_FEED, 3_600))
        });
        assert!(result.is_err());
        assert_eq!(
            chain.deposit(OWNER, &[AssetValue::new(WBTC, 1)]).unwrap_err(),
            WardenError::AssetNotRegistered { asset: WBTC }
        );

        // 2. Register and deposit
        chain
            .transact(|vault, ledger| {
                vault
                    .registry_mut()
                    .add_asset(ledger, OWNER, AssetInfo::priced(WBTC, WBTC_FEED, 3_600))
            })
            .unwrap();
        chain.deposit(OWNER, &[usdc(1_000), AssetValue::new(WBTC, 100_000_000)]).unwrap();

        let holdings = chain.holdings();
        assert_eq!(holdings.len(), 5);
        assert!(holdings.windows(2).all(|w| w[0].asset < w[1].asset));
        assert!(holdings.contains(&AssetValue::new(WBTC, 100_000_000)));
        assert_eq!(chain.value().unwrap(), 41_000 * USDC_UNIT);

        // 3. Once removed, the balance no longer counts
        chain
            .transact(|vault, ledger| vault.registry_mut().remove_asset(ledger, OWNER, WBTC))
            .unwrap();
        assert_eq!(chain.holdings().len(), 4);
        assert_eq!(chain.value().unwrap(), 1_000 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(WBTC, VAULT), 100_000_000);
    }

    #[test]
    fn test_leftover_native_is_wrapped() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();
        chain.ledger.credit_native(VAULT, 2 * ONE).unwrap();

        let ping = Operation {
            target: SINK,
            value: ONE / 2,
            data: PING.to_vec(),
        };
        chain.submit(GUARDIAN, &[ping]).unwrap();

        assert_eq!(chain.ledger.native_balance(SINK), ONE / 2);
        assert_eq!(chain.ledger.native_balance(VAULT), 0);
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), 3 * ONE / 2);
        assert_eq!(chain.value().unwrap(), 4_000 * USDC_UNIT);
    }

    #[test]
    fn test_submitted_event_carries_digest() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        let ops = vec![pay(USDC, SINK, USDC_UNIT)];
        chain.submit(GUARDIAN, &ops).unwrap();

        match chain.vault.events().last() {
            Some(WardenEvent::Submitted { guardian, operation_count, digest, .. }) => {
                assert_eq!(*guardian, GUARDIAN);
                assert_eq!(*operation_count, 1);
                assert_eq!(*digest, warden_common::events::operations_digest(&ops));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // ============================================================================
    // Fees
    // ============================================================================

    #[test]
    fn test_fee_accrual_idempotent_within_timestamp() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);

        chain.deposit(OWNER, &[]).unwrap();
        let fee_total = chain.vault.fee_total();
        assert_eq!(fee_total, 1_500_000_000_000);

        chain.deposit(OWNER, &[]).unwrap();
        assert_eq!(chain.vault.fee_total(), fee_total);
        assert_eq!(chain.vault.fees(FEE_RECIPIENT), fee_total);
        assert_eq!(chain.vault.events().filter_by_type(EventType::FeesReserved).len(), 1);
    }

    #[test]
    fn test_stale_oracle_skips_fees() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        // 1. Feeds go quiet for three hours
        chain.advance(3 * 3_600);
        assert!(matches!(chain.value(), Err(WardenError::StalePrice { asset: WETH, .. })));
        assert!(matches!(
            chain.vault.registry().spot_prices(&chain.ledger),
            Err(WardenError::StalePrice { .. })
        ));

        // 2. Owner actions still go through; accrual is skipped
        chain.deposit(OWNER, &[AssetValue::new(USDC, 1)]).unwrap();
        assert_eq!(chain.vault.fee_total(), 0);
        assert_eq!(chain.vault.state().fees.last_fee_checkpoint, START);
        assert_eq!(chain.vault.events().filter_by_type(EventType::SpotPricesReverted).len(), 1);

        // 3. Once prices return, the whole gap is charged
        refresh_prices(&mut chain);
        chain.deposit(OWNER, &[]).unwrap();
        let expected = mul_div(
            (3_000 * USDC_UNIT + 1) * 3 * 3_600,
            MAX_FEE * 1_000_000_000_000,
            2_000 * ONE,
        )
        .unwrap();
        assert_eq!(chain.vault.fee_total(), expected);
        assert_eq!(chain.vault.state().fees.last_fee_checkpoint, chain.timestamp());
    }

    #[test]
    fn test_silent_oracle_revert_is_fatal() {
        let mut chain = setup(MAX_FEE);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();
        chain.advance(60);

        chain.ledger.set_feed_revert(WETH_FEED, Some(Revert::silent())).unwrap();
        let result = chain.deposit(OWNER, &[usdc(1)]);
        assert!(matches!(result, Err(WardenError::OracleReverted { oracle: WETH_FEED, .. })));
        assert_eq!(chain.ledger.balance_of(USDC, VAULT), 1_000 * USDC_UNIT);

        // A revert with data is tolerated
        chain
            .ledger
            .set_feed_revert(WETH_FEED, Some(Revert::reason("feed paused")))
            .unwrap();
        chain.deposit(OWNER, &[usdc(1)]).unwrap();
        match chain.vault.events().filter_by_type(EventType::SpotPricesReverted).last() {
            Some(WardenEvent::SpotPricesReverted { code, elapsed, .. }) => {
                assert_eq!(code, "W054_ORACLE_REVERTED");
                assert_eq!(*elapsed, 60);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_silent_conversion_revert_is_fatal() {
        let mut chain = setup(MAX_FEE);
        chain.deposit(OWNER, &[AssetValue::new(SDAI, 10 * ONE)]).unwrap();
        chain.advance(60);

        chain.ledger.set_conversion_revert(SDAI, Some(Revert::silent())).unwrap();
        let result = chain.deposit(OWNER, &[]);
        assert!(matches!(result, Err(WardenError::ConversionReverted { asset: SDAI, .. })));
        assert!(chain.value().is_err());
    }

    #[test]
    fn test_claim_round_trip() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);

        chain.claim(FEE_RECIPIENT).unwrap();
        assert_eq!(chain.ledger.balance_of(WETH, FEE_RECIPIENT), 1_500_000_000_000);
        assert_eq!(chain.vault.fee_total(), 0);
        assert_eq!(chain.vault.fees(FEE_RECIPIENT), 0);

        assert_eq!(
            chain.claim(FEE_RECIPIENT).unwrap_err(),
            WardenError::NoClaimableFees { caller: FEE_RECIPIENT }
        );
        assert_eq!(
            chain.claim(STRANGER).unwrap_err(),
            WardenError::NoClaimableFees { caller: STRANGER }
        );
    }

    #[test]
    fn test_claim_bounded_by_balance() {
        let mut chain = setup(MAX_FEE);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);
        chain.pause(OWNER).unwrap();

        // $1000 * 1e-9/s * 1000s = $0.001 = 5e-7 WETH, and no WETH in the vault
        assert_eq!(chain.vault.fee_total(), 500_000_000_000);
        assert_eq!(
            chain.claim(FEE_RECIPIENT).unwrap_err(),
            WardenError::NoAvailableFeesForCaller { caller: FEE_RECIPIENT }
        );

        chain.deposit(OWNER, &[AssetValue::new(WETH, 200_000_000_000)]).unwrap();
        chain.claim(FEE_RECIPIENT).unwrap();

        assert_eq!(chain.ledger.balance_of(WETH, FEE_RECIPIENT), 200_000_000_000);
        assert_eq!(chain.vault.fees(FEE_RECIPIENT), 300_000_000_000);
        assert_eq!(chain.vault.fee_total(), 300_000_000_000);
        match chain.vault.events().last() {
            Some(WardenEvent::Claimed { claimed, unclaimed, .. }) => {
                assert_eq!(*claimed, 200_000_000_000);
                assert_eq!(*unclaimed, 300_000_000_000);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_reserved_fees_cannot_be_spent() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE / 100)])
            .unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);

        // $1020 over 1000s reserves 5.1e11 WETH
        let result = chain.submit(GUARDIAN, &[pay(WETH, SINK, ONE / 100)]);
        assert!(matches!(result, Err(WardenError::CannotUseReservedFees { .. })));
        assert_eq!(chain.vault.fee_total(), 0);

        let result = chain.execute(OWNER, &pay(WETH, SINK, ONE / 100));
        assert_eq!(
            result.unwrap_err(),
            WardenError::CannotUseReservedFees { balance: 0, fee_total: 510_000_000_000 }
        );

        chain
            .execute(OWNER, &pay(WETH, SINK, ONE / 100 - 510_000_000_000))
            .unwrap();
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), chain.vault.fee_total());
    }

    #[test]
    fn test_set_guardian_and_fee_recipient() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        let new_guardian = address_from_low_byte(0x08);
        let new_recipient = address_from_low_byte(0x09);

        assert_eq!(
            chain.set_guardian_and_fee_recipient(OWNER, [0u8; 20], new_recipient).unwrap_err(),
            WardenError::ZeroAddress { param: "guardian" }
        );
        assert_eq!(
            chain.set_guardian_and_fee_recipient(OWNER, OWNER, new_recipient).unwrap_err(),
            WardenError::GuardianIsOwner
        );
        assert_eq!(
            chain.set_guardian_and_fee_recipient(OWNER, new_guardian, OWNER).unwrap_err(),
            WardenError::FeeRecipientIsOwner
        );
        assert_eq!(
            chain.set_guardian_and_fee_recipient(STRANGER, new_guardian, new_recipient).unwrap_err(),
            WardenError::CallerIsNotOwner { caller: STRANGER }
        );

        chain.advance(1_000);
        refresh_prices(&mut chain);
        chain
            .set_guardian_and_fee_recipient(OWNER, new_guardian, new_recipient)
            .unwrap();

        // Accrued fees stay with the outgoing recipient
        assert_eq!(chain.vault.fees(FEE_RECIPIENT), 1_500_000_000_000);
        assert_eq!(chain.vault.fees(new_recipient), 0);
        assert_eq!(chain.vault.guardian(), new_guardian);

        assert_eq!(
            chain.submit(GUARDIAN, &[]).unwrap_err(),
            WardenError::CallerIsNotGuardian { caller: GUARDIAN }
        );
        chain.submit(new_guardian, &[]).unwrap();
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    #[test]
    fn test_pause_and_resume() {
        let mut chain = setup(MAX_FEE);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        assert_eq!(
            chain.pause(STRANGER).unwrap_err(),
            WardenError::CallerIsNotOwnerOrGuardian { caller: STRANGER }
        );
        chain.pause(GUARDIAN).unwrap();
        assert!(chain.vault.is_paused());
        assert_eq!(chain.pause(OWNER).unwrap_err(), WardenError::VaultIsPaused);
        assert_eq!(chain.submit(GUARDIAN, &[]).unwrap_err(), WardenError::VaultIsPaused);
        assert_eq!(
            chain.resume(GUARDIAN).unwrap_err(),
            WardenError::CallerIsNotOwner { caller: GUARDIAN }
        );

        // A paused day is not charged
        chain.advance(DAY);
        refresh_prices(&mut chain);
        chain.resume(OWNER).unwrap();

        assert!(!chain.vault.is_paused());
        assert_eq!(chain.vault.fee_total(), 0);
        assert_eq!(chain.vault.state().fees.last_fee_checkpoint, chain.timestamp());
        assert_eq!(chain.resume(OWNER).unwrap_err(), WardenError::VaultIsNotPaused);
    }

    #[test]
    fn test_finalize() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();

        chain.advance(1_000);
        refresh_prices(&mut chain);
        chain.finalize(OWNER).unwrap();

        let reserved = 1_500_000_000_000;
        assert!(chain.vault.is_finalized());
        assert_eq!(chain.ledger.balance_of(USDC, OWNER), 10_000 * USDC_UNIT);
        assert_eq!(chain.ledger.balance_of(WETH, OWNER), 10 * ONE - reserved);
        assert_eq!(chain.ledger.balance_of(WETH, VAULT), reserved);

        match chain.vault.events().last() {
            Some(WardenEvent::Finalized { withdrawn, .. }) => {
                assert_eq!(withdrawn, &vec![usdc(1_000), AssetValue::new(WETH, ONE - reserved)]);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // 1. Terminal for everything but execute and claim
        assert_eq!(chain.deposit(OWNER, &[]).unwrap_err(), WardenError::VaultIsFinalized);
        assert_eq!(chain.submit(GUARDIAN, &[]).unwrap_err(), WardenError::VaultIsFinalized);
        assert_eq!(chain.pause(OWNER).unwrap_err(), WardenError::VaultIsFinalized);
        assert_eq!(chain.finalize(OWNER).unwrap_err(), WardenError::VaultIsFinalized);

        // 2. Fees remain claimable
        chain.claim(FEE_RECIPIENT).unwrap();
        assert_eq!(chain.ledger.balance_of(WETH, FEE_RECIPIENT), reserved);

        // 3. Owner escape hatch still works
        chain.execute(OWNER, &Operation::new(SINK, PING.to_vec())).unwrap();
        assert_eq!(chain.vault.events().filter_by_type(EventType::Executed).len(), 1);
    }

    #[test]
    fn test_execute() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        chain.execute(OWNER, &pay(USDC, STRANGER, 5 * USDC_UNIT)).unwrap();
        assert_eq!(chain.ledger.balance_of(USDC, STRANGER), 5 * USDC_UNIT);

        assert_eq!(
            chain.execute(STRANGER, &pay(USDC, STRANGER, 1)).unwrap_err(),
            WardenError::CallerIsNotOwner { caller: STRANGER }
        );
        assert!(matches!(
            chain.execute(OWNER, &pay(USDC, STRANGER, 10_000 * USDC_UNIT)),
            Err(WardenError::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_set_hooks() {
        let mut chain = setup(0);
        chain.deposit(OWNER, &[usdc(1_000)]).unwrap();

        let foreign = create_hooks(&chain.ledger, NEW_HOOKS, STRANGER);
        assert_eq!(
            chain.set_hooks(OWNER, foreign).unwrap_err(),
            WardenError::VaultMismatch { expected: VAULT, actual: Some(STRANGER) }
        );

        let same = create_hooks(&chain.ledger, HOOKS, VAULT);
        assert_eq!(
            chain.set_hooks(OWNER, same).unwrap_err(),
            WardenError::HooksAlreadySet { hooks: HOOKS }
        );

        let replacement = Hooks::new(
            HooksParameters {
                address: NEW_HOOKS,
                owner: OWNER,
                vault: VAULT,
                min_daily_value: ONE / 2,
                allowlist: vec![],
            },
            &chain.ledger,
        )
        .unwrap();
        let old = chain.set_hooks(OWNER, replacement).unwrap();

        assert!(old.is_decommissioned());
        assert_eq!(old.vault(), None);
        assert_eq!(old.events().filter_by_type(EventType::HooksDecommissioned).len(), 1);
        assert_eq!(chain.vault.hooks().address(), NEW_HOOKS);

        // The new allowlist is empty
        assert_eq!(
            chain.submit(GUARDIAN, &[pay(USDC, SINK, 1)]).unwrap_err(),
            WardenError::CallIsNotAllowed { index: 0 }
        );
    }

    #[test]
    fn test_guard_released_after_error() {
        let mut chain = setup(0);

        let result = chain.vault.deposit(&mut chain.ledger, STRANGER, &[]);
        assert!(result.is_err());
        chain.vault.deposit(&mut chain.ledger, OWNER, &[]).unwrap();
    }

    #[test]
    fn test_vault_state_through_cbor() {
        let mut chain = setup(MAX_FEE);
        chain
            .deposit(OWNER, &[usdc(1_000), AssetValue::new(WETH, ONE)])
            .unwrap();
        chain.advance(1_000);
        refresh_prices(&mut chain);
        chain.pause(GUARDIAN).unwrap();

        let mut bytes = Vec::new();
        ciborium::into_writer(chain.vault.state(), &mut bytes).unwrap();
        let decoded: VaultState = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(&decoded, chain.vault.state());
        assert_eq!(decoded.fees.fees_of(FEE_RECIPIENT), 1_500_000_000_000);
    }
}
