use crate::domain::{
    ChainId, Position, PositionKey, PositionStatus, PositionVersion, Token, TokenKind, TxHash,
    Underlying,
};
use alloy::primitives::{Address, U256};

pub fn plain_token(chain_id: ChainId, byte: u8, symbol: &str) -> Token {
    Token::new(chain_id, Address::repeat_byte(byte), 18, symbol, TokenKind::Base)
}

pub fn wrapped_token(chain_id: ChainId) -> Token {
    Token::new(
        chain_id,
        Address::repeat_byte(0x5a),
        18,
        "yvUSDC",
        TokenKind::YieldBearingShare,
    )
    .with_underlying(vec![Token::new(
        chain_id,
        Address::repeat_byte(0x5b),
        6,
        "USDC",
        TokenKind::Base,
    )])
}

/// 100 units over 10 swaps at rate 10, plain tokens on both sides.
pub fn sample_position(id: u64, version: PositionVersion, chain_id: ChainId) -> Position {
    Position {
        key: PositionKey::onchain(id, version),
        chain_id,
        user: Address::repeat_byte(0xaa),
        from: plain_token(chain_id, 0x01, "DAI"),
        to: plain_token(chain_id, 0x02, "WETH"),
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
        started_at: id * 100,
        pending_transaction: TxHash::default(),
        permissions: Vec::new(),
        pair_last_swapped_at: None,
        pair_next_swap_available_at: None,
    }
}
