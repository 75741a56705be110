//! 安全码生成
//!
//! 员工当面转告顾客的 6 位数字码，用于证明顾客确实在桌台旁。

use rand::Rng;

/// Generate a random 6-digit security code
///
/// Uniform over `000000..=999999`, leading zeros preserved. Each call is
/// independent of any prior code for the same table.
pub fn generate_security_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}
