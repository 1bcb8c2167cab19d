use komainu_db::{access, DbPool};
use komainu_models::interaction::InteractionMember;
use komainu_models::permissions::Permissions;

use crate::error::CoreError;

pub fn is_server_admin(perms: Permissions) -> bool {
    perms.contains(Permissions::ADMINISTRATOR)
}

/// Whether `member` may use commands in `group`: administrators always may,
/// everyone else needs a role listed in the group's grant record.
pub async fn has_access(
    pool: &DbPool,
    guild_id: i64,
    member: &InteractionMember,
    group: &str,
) -> Result<bool, CoreError> {
    if is_server_admin(member.permissions) {
        return Ok(true);
    }
    let Some(granted) = access::get_roles(pool, guild_id, group).await? else {
        return Ok(false);
    };
    Ok(member.roles.iter().any(|role| granted.contains(role)))
}

pub async fn require_access(
    pool: &DbPool,
    guild_id: i64,
    member: &InteractionMember,
    group: &str,
) -> Result<(), CoreError> {
    if !has_access(pool, guild_id, member, group).await? {
        return Err(CoreError::Forbidden);
    }
    Ok(())
}
