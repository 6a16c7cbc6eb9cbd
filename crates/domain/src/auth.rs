//! # 認証要求と認証結果
//!
//! 認証フローの入力（[`AuthRequest`]）と出力（[`AuthGrant`]）を定義する。
//!
//! 認証要求はフローに参照で渡され、変更されることはない。
//! フローが解決した事業者 ID やユーザー ID は、成功時にのみ
//! 新しい [`AuthGrant`] として返される。

use serde::Deserialize;

use crate::{
    client::{ClientId, ClientRecord, ClientScope, ClientType, SCOPE_BUSINESS_ID, ScopeParams},
    entity::EntityId,
    password::PlainPassword,
    tenant::BusinessId,
};

/// グラント種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum GrantType {
    Password,
    ClientCredentials,
    RefreshToken,
}

/// 認証要求
///
/// `client_type` / `client_scope` はクライアントが自己申告する値であり、
/// フローでは参照しない（認証済みクライアントレコードの値を使用する）。
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub client_id:     String,
    pub client_secret: PlainPassword,
    #[serde(default)]
    pub client_type:   Option<String>,
    #[serde(default)]
    pub client_scope:  Option<String>,
    pub grant_type:    String,
    #[serde(default)]
    pub username:      Option<String>,
    #[serde(default)]
    pub password:      Option<PlainPassword>,
    #[serde(default)]
    pub refresh_token: Option<PlainPassword>,
    #[serde(default)]
    pub scope:         Option<String>,
    /// 明示的に指定された事業者 ID（`scope` に含まれない場合の補完値）
    #[serde(default)]
    pub business_id:   Option<String>,
}

impl AuthRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        grant_type: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: PlainPassword::new(client_secret),
            client_type: None,
            client_scope: None,
            grant_type: grant_type.into(),
            username: None,
            password: None,
            refresh_token: None,
            scope: None,
            business_id: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(PlainPassword::new(password));
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_business_id(mut self, business_id: impl Into<String>) -> Self {
        self.business_id = Some(business_id.into());
        self
    }

    /// スコープパラメータを取得する
    ///
    /// `scope` に `business_id` がなければ、明示的に指定された事業者 ID で補う。
    pub fn scope_params(&self) -> ScopeParams {
        let params = ScopeParams::parse(self.scope.as_deref().unwrap_or_default());
        match self.business_id.as_deref() {
            Some(business_id) => params.with_default(SCOPE_BUSINESS_ID, business_id),
            None => params,
        }
    }
}

/// 認証結果
///
/// 認証フローが成功した場合にのみ生成される不変の値。
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    client_id:    ClientId,
    client_type:  ClientType,
    client_scope: ClientScope,
    grant_type:   GrantType,
    business_id:  Option<BusinessId>,
    user_id:      Option<EntityId>,
}

impl AuthGrant {
    pub fn new(client: &ClientRecord, grant_type: GrantType, business_id: Option<BusinessId>) -> Self {
        Self {
            client_id: client.client_id().clone(),
            client_type: client.client_type().clone(),
            client_scope: client.client_scope().clone(),
            grant_type,
            business_id,
            user_id: None,
        }
    }

    /// 認証済みユーザーを付与した新しいインスタンスを返す
    pub fn with_user(self, user_id: EntityId) -> Self {
        Self {
            user_id: Some(user_id),
            ..self
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn client_type(&self) -> &ClientType {
        &self.client_type
    }

    pub fn client_scope(&self) -> &ClientScope {
        &self.client_scope
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    pub fn business_id(&self) -> Option<&BusinessId> {
        self.business_id.as_ref()
    }

    pub fn user_id(&self) -> Option<&EntityId> {
        self.user_id.as_ref()
    }
}
