use sqlx::SqliteExecutor;
use std::collections::BTreeSet;

use crate::records::{self, Mutation, ACCESS};
use crate::{DbError, DbPool};

/// Roles allowed to use a command group.
pub type RoleSet = BTreeSet<i64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUpdate {
    /// The role set after the operation.
    pub roles: RoleSet,
    pub changed: bool,
}

/// Roles granted for `group`. `None` means no grant record: administrators only.
pub async fn get_roles<'e, E>(
    executor: E,
    guild_id: i64,
    group: &str,
) -> Result<Option<RoleSet>, DbError>
where
    E: SqliteExecutor<'e>,
{
    records::get_object(executor, guild_id, ACCESS, group).await
}

pub async fn grant_role(
    pool: &DbPool,
    guild_id: i64,
    group: &str,
    role_id: i64,
) -> Result<AccessUpdate, DbError> {
    records::read_modify_write(pool, guild_id, ACCESS, group, |current: Option<RoleSet>| {
        let mut roles = current.unwrap_or_default();
        if roles.insert(role_id) {
            (
                Mutation::Put(roles.clone()),
                AccessUpdate {
                    roles,
                    changed: true,
                },
            )
        } else {
            (
                Mutation::Keep,
                AccessUpdate {
                    roles,
                    changed: false,
                },
            )
        }
    })
    .await
}

/// Remove a role from `group`. Revoking an absent role writes nothing, and a
/// set emptied by a revoke is removed so absence stays the only "admins only"
/// state.
pub async fn revoke_role(
    pool: &DbPool,
    guild_id: i64,
    group: &str,
    role_id: i64,
) -> Result<AccessUpdate, DbError> {
    records::read_modify_write(pool, guild_id, ACCESS, group, |current: Option<RoleSet>| {
        let Some(mut roles) = current else {
            return (
                Mutation::Keep,
                AccessUpdate {
                    roles: RoleSet::new(),
                    changed: false,
                },
            );
        };
        if !roles.remove(&role_id) {
            return (
                Mutation::Keep,
                AccessUpdate {
                    roles,
                    changed: false,
                },
            );
        }
        let mutation = if roles.is_empty() {
            Mutation::Remove
        } else {
            Mutation::Put(roles.clone())
        };
        (
            mutation,
            AccessUpdate {
                roles,
                changed: true,
            },
        )
    })
    .await
}
