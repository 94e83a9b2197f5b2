//! Well-known program ids.

use solana_sdk::pubkey::Pubkey;

/// SPL token program (`TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`).
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// SPL associated token account program (`ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`).
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153,
    218, 255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// Default perpetuals program deployment (`PERP9EeXeGnyEqGmxGSan4nGRAFNLwTufLJmiYsTJ8j`).
pub const DEFAULT_PERPETUALS_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    5, 177, 243, 199, 183, 204, 206, 102, 247, 204, 12, 121, 187, 178, 220, 201, 227, 168, 67,
    131, 171, 84, 90, 27, 58, 43, 77, 5, 30, 255, 217, 244,
]);

/// Upgradeable BPF loader (`BPFLoaderUpgradeab1e11111111111111111111111`).
pub const BPF_LOADER_UPGRADEABLE_ID: Pubkey = Pubkey::new_from_array([
    2, 168, 246, 145, 78, 136, 161, 176, 226, 16, 21, 62, 247, 99, 174, 43, 0, 194, 185, 61, 22,
    193, 36, 210, 192, 83, 122, 16, 4, 128, 0, 0,
]);
