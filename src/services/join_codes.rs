use rand::Rng;
use sqlx::PgPool;

use crate::error::AppResult;

const JOIN_CODE_LEN: usize = 8;
const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn random_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

/// Draws random codes until one is free of collisions. Uniqueness is still
/// backed by the UNIQUE constraint on chamas.join_code.
pub async fn generate_unique_join_code(db: &PgPool) -> AppResult<String> {
    loop {
        let code = random_join_code();
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chamas WHERE join_code = $1)")
                .bind(&code)
                .fetch_one(db)
                .await?;
        if !taken {
            return Ok(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = random_join_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }
}
