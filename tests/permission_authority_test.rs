use alloy::primitives::{Address, B256, U256};
use dca_positions::domain::{
    AddressBook, ChainId, Permission, Position, PositionKey, PositionStatus, PositionVersion,
    ProtocolContracts, Token, TokenKind, TxHash, Underlying,
};
use dca_positions::permissions::{
    MockPermissionRegistry, MockTypedDataSigner, PermissionAuthority, DEFAULT_PERMIT_DOMAIN_NAME,
};
use dca_positions::{DataSourceError, EngineError};
use std::sync::Arc;

const CHAIN: ChainId = ChainId(10);
const LEGACY_DOMAIN: &str = "Mean Finance DCA";

fn manager() -> Address {
    Address::repeat_byte(0x22)
}

fn delegate() -> Address {
    Address::repeat_byte(0x33)
}

fn signer_address() -> Address {
    Address::repeat_byte(0xaa)
}

fn contracts(permit_domain_name: Option<String>) -> ProtocolContracts {
    ProtocolContracts {
        hub: Address::repeat_byte(0x11),
        permission_manager: manager(),
        companion: delegate(),
        permit_domain_name,
    }
}

fn address_book() -> AddressBook {
    AddressBook::new()
        .with(CHAIN, PositionVersion::V4, contracts(None))
        .with(
            CHAIN,
            PositionVersion::V3,
            contracts(Some(LEGACY_DOMAIN.to_string())),
        )
}

fn position(id: u64, version: PositionVersion) -> Position {
    let token = |byte: u8, symbol: &str| {
        Token::new(CHAIN, Address::repeat_byte(byte), 18, symbol, TokenKind::Base)
    };
    Position {
        key: PositionKey::onchain(id, version),
        chain_id: CHAIN,
        user: signer_address(),
        from: token(0x01, "DAI"),
        to: token(0x02, "WETH"),
        swap_interval: 86400,
        rate: U256::from(10u64),
        remaining_swaps: 10,
        total_swaps: 10,
        total_executed_swaps: 0,
        remaining_liquidity: U256::from(100u64),
        total_deposited: U256::from(100u64),
        swapped: U256::ZERO,
        withdrawn: U256::ZERO,
        to_withdraw: U256::ZERO,
        remaining_liquidity_underlying: Underlying::NotApplicable,
        to_withdraw_underlying: Underlying::NotApplicable,
        deposited_rate_underlying: Underlying::NotApplicable,
        total_swapped_underlying_accum: Underlying::NotApplicable,
        to_withdraw_underlying_accum: Underlying::NotApplicable,
        status: PositionStatus::Active,
        started_at: 0,
        pending_transaction: TxHash::default(),
        permissions: Vec::new(),
        pair_last_swapped_at: None,
        pair_next_swap_available_at: None,
    }
}

fn authority(registry: MockPermissionRegistry, signer: MockTypedDataSigner) -> PermissionAuthority {
    PermissionAuthority::new(
        Arc::new(registry),
        Arc::new(signer),
        address_book(),
        DEFAULT_PERMIT_DOMAIN_NAME.to_string(),
    )
}

#[tokio::test]
async fn test_grant_unions_held_capabilities() {
    let registry = MockPermissionRegistry::new()
        .with_permission(5u64, delegate(), Permission::Terminate)
        .with_permission(5u64, delegate(), Permission::Increase)
        .with_nonce(U256::from(9u64));
    let signer = MockTypedDataSigner::new(signer_address());
    let authority = authority(registry, signer.clone());

    let grant = authority
        .build_permission_grant(
            &position(5, PositionVersion::V4),
            delegate(),
            Permission::Withdraw,
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        grant.permissions,
        vec![Permission::Increase, Permission::Withdraw, Permission::Terminate]
    );
    assert_eq!(grant.operator, delegate());
    assert_eq!(grant.nonce, U256::from(9u64));
    assert!(grant.deadline > U256::from(1_700_000_000u64));
    assert_eq!(grant.signature.v, 27);
    assert_eq!(grant.signature.r, B256::repeat_byte(0x11));
    assert_eq!(grant.signature.s, B256::repeat_byte(0x22));

    let signed = signer.signed();
    assert_eq!(signed.len(), 1);
    let (domain, permit) = &signed[0];
    assert_eq!(domain.name.as_deref(), Some(DEFAULT_PERMIT_DOMAIN_NAME));
    assert_eq!(domain.verifying_contract, Some(manager()));
    assert_eq!(domain.chain_id, Some(U256::from(10u64)));
    assert_eq!(permit.tokenId, U256::from(5u64));
    assert_eq!(permit.permissions[0].operator, delegate());
    assert_eq!(permit.permissions[0].permissions, vec![0u8, 2, 3]);
}

#[tokio::test]
async fn test_legacy_version_uses_its_domain_name() {
    let signer = MockTypedDataSigner::new(signer_address());
    let authority = authority(MockPermissionRegistry::new(), signer.clone());

    authority
        .build_permission_grant(
            &position(5, PositionVersion::V3),
            delegate(),
            Permission::Withdraw,
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(signer.signed()[0].0.name.as_deref(), Some(LEGACY_DOMAIN));
}

#[tokio::test]
async fn test_overrides_take_precedence() {
    let signer = MockTypedDataSigner::new(signer_address());
    let authority = authority(MockPermissionRegistry::new(), signer.clone());
    let other_manager = Address::repeat_byte(0x44);

    authority
        .build_permission_grant(
            &position(5, PositionVersion::V3),
            delegate(),
            Permission::Reduce,
            Some(other_manager),
            Some("Custom Domain"),
        )
        .await
        .unwrap();

    let (domain, _) = &signer.signed()[0];
    assert_eq!(domain.name.as_deref(), Some("Custom Domain"));
    assert_eq!(domain.verifying_contract, Some(other_manager));
}

#[tokio::test]
async fn test_declined_signature() {
    let authority = authority(
        MockPermissionRegistry::new(),
        MockTypedDataSigner::new(signer_address()).declining(),
    );

    let err = authority
        .build_permission_grant(
            &position(5, PositionVersion::V4),
            delegate(),
            Permission::Terminate,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionSignatureDeclined));
}

#[tokio::test]
async fn test_registry_failure_propagates_without_signing() {
    let signer = MockTypedDataSigner::new(signer_address());
    let authority = authority(
        MockPermissionRegistry::new()
            .failing(DataSourceError::NetworkError("rpc down".to_string())),
        signer.clone(),
    );

    let err = authority
        .build_permission_grant(
            &position(5, PositionVersion::V4),
            delegate(),
            Permission::Terminate,
            None,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Remote(DataSourceError::NetworkError(_))
    ));
    assert_eq!(signer.call_count(), 0);
}

#[tokio::test]
async fn test_has_capability() {
    let authority = authority(
        MockPermissionRegistry::new().with_permission(5u64, delegate(), Permission::Reduce),
        MockTypedDataSigner::new(signer_address()),
    );
    let p = position(5, PositionVersion::V4);

    assert!(authority
        .has_capability(&p, delegate(), Permission::Reduce)
        .await
        .unwrap());
    assert!(!authority
        .has_capability(&p, delegate(), Permission::Increase)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unknown_deployment() {
    let authority = authority(
        MockPermissionRegistry::new(),
        MockTypedDataSigner::new(signer_address()),
    );
    let mut p = position(5, PositionVersion::V4);
    p.chain_id = ChainId(1);

    let err = authority
        .has_capability(&p, delegate(), Permission::Reduce)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingContracts { .. }));
}

#[tokio::test]
async fn test_grant_reads_permissions_in_one_batch() {
    let registry = MockPermissionRegistry::new()
        .with_permission(5u64, delegate(), Permission::Reduce)
        .with_nonce(U256::from(1u64));
    let authority = authority(registry.clone(), MockTypedDataSigner::new(signer_address()));

    let grant = authority
        .build_permission_grant(
            &position(5, PositionVersion::V4),
            delegate(),
            Permission::Increase,
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(grant.permissions, vec![Permission::Increase, Permission::Reduce]);
    // one batched capability read plus the nonce
    assert_eq!(registry.call_count(), 2);
}
