//! 恢复凭证
//!
//! 生成不可猜测的一次性凭证，与调用方输入无关。

use rand::Rng;
use rand::rngs::OsRng;

/// 凭证长度
pub const RESUME_CREDENTIAL_LEN: usize = 42;

/// 去掉易混淆字符后的字母表
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTWXYZabcdefghijkmnopqrstuvwxyz";

/// 生成新的恢复凭证
pub fn generate_resume_credential() -> String {
    let mut rng = OsRng;
    (0..RESUME_CREDENTIAL_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
