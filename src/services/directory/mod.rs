/*
 * Responsibility
 * - AD/LDAP グループ所属チェック (認可)。RequestAuthenticator からは呼ばれず、handler 側が使う
 * - client: collaborator trait / ldap: ldap3 実装 / authorizer: 2 段キャッシュ + controller fallback
 */
pub mod authorizer;
pub mod client;
pub mod ldap;

pub use authorizer::GroupAuthorizer;
pub use client::{DirectoryClient, DirectoryDomain, DirectoryError};
pub use ldap::LdapDirectoryClient;
