// External imports
use ethers::core::types::I256;

/// Định dạng số lượng token thô thành chuỗi thập phân chính xác (raw / 10^decimals).
///
/// Giữ nguyên dấu, bỏ các số 0 thừa ở phần thập phân:
/// `50_000_000` với 8 decimals thành `"0.5"`, `30_000_000_000` với 6 decimals thành `"30000"`.
pub fn normalize_amount(raw: I256, decimals: u32) -> String {
    let negative = raw.is_negative();
    let digits = raw.unsigned_abs().to_string();
    let decimals = decimals as usize;

    let (integer_part, decimal_part) = if digits.len() > decimals {
        let split = digits.len() - decimals;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        // Số lượng nhỏ hơn 1 token
        let padding_zeros = decimals - digits.len();
        ("0".to_string(), format!("{}{}", "0".repeat(padding_zeros), digits))
    };

    let decimal_part = decimal_part.trim_end_matches('0');
    let body = if decimal_part.is_empty() {
        integer_part
    } else {
        format!("{}.{}", integer_part, decimal_part)
    };

    if negative && body != "0" {
        format!("-{}", body)
    } else {
        body
    }
}

/// Tính giá của một swap: |amount1 / amount0|.
///
/// Trả về `None` khi một trong hai phía bằng 0, không parse được, hoặc kết quả không hữu hạn.
pub fn derive_price(amount0: &str, amount1: &str) -> Option<f64> {
    let amount0: f64 = amount0.parse().ok()?;
    let amount1: f64 = amount1.parse().ok()?;

    if amount0 == 0.0 || amount1 == 0.0 {
        return None;
    }

    let price = (amount1 / amount0).abs();
    price.is_finite().then_some(price)
}
