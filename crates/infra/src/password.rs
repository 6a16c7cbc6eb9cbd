//! # パスワードハッシュ
//!
//! Argon2id による顧客パスワード・クライアントシークレットのハッシュ化と照合。
//!
//! 保存形式は PHC 文字列（`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`）で、
//! ソルトとパラメータはハッシュ値自体に含まれる。

use argon2::{
    Argon2,
    PasswordHasher as _,
    PasswordVerifier as _,
    password_hash::{PasswordHash as Argon2PasswordHash, SaltString},
};
use salesdesk_domain::password::{PasswordHash, PasswordVerifyResult, PlainPassword};

use crate::InfraError;

/// 照合時間を均一化するためのダミーハッシュ（有効な Argon2id 形式）
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// パスワードのハッシュ化と照合を担当するトレイト
pub trait PasswordHasher: Send + Sync {
    /// 平文からソルト付きハッシュを生成する
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError>;

    /// 平文とハッシュを照合する
    ///
    /// # Errors
    ///
    /// - ハッシュの形式が不正な場合
    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError>;

    /// ダミーハッシュで照合を実行する
    ///
    /// 照合対象が見つからなかった場合にも実際の照合と同等の時間を消費させ、
    /// 応答時間からログイン ID の存在を推測されないようにする。
    fn dummy_verify(&self, password: &PlainPassword) {
        let _ = self.verify(password, &PasswordHash::new(DUMMY_HASH));
    }
}

/// Argon2id による実装
///
/// パラメータは argon2 クレートの既定値（m=19456 KiB, t=2, p=1）。
#[derive(Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| InfraError::unexpected(format!("ソルトの生成に失敗: {e}")))?;

        let hash = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| InfraError::unexpected(format!("ハッシュ化に失敗: {e}")))?;

        Ok(PasswordHash::new(hash.to_string()))
    }

    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError> {
        let parsed = Argon2PasswordHash::new(hash.as_str())
            .map_err(|e| InfraError::unexpected(format!("不正なハッシュ形式: {e}")))?;

        let matched = self
            .argon2
            .verify_password(password.as_str().as_bytes(), &parsed)
            .is_ok();

        Ok(PasswordVerifyResult::from(matched))
    }
}
