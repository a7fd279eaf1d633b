//! Role/permission management: CRUD, tree materialization, assignment.

use std::collections::{HashMap, HashSet};

use db::models::{
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role, RolePermission, UpdateRole},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RbacError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("permission not found: {0}")]
    PermissionNotFound(Uuid),
    #[error("role not found: {0}")]
    RoleNotFound(Uuid),
    #[error("permission code already exists: {0}")]
    DuplicateCode(String),
    #[error("permission has child permissions")]
    HasChildren,
    #[error("a permission cannot be its own parent")]
    SelfParent,
    #[error("a permission cannot be moved under its own descendant")]
    DescendantParent,
    #[error("unknown parent permission: {0}")]
    UnknownParent(Uuid),
}

/// Permission with its children nested under it
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    #[serde(flatten)]
    pub permission: Permission,
    pub children: Vec<PermissionNode>,
}

/// Role with the ids of its assigned permissions
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permission_ids: Vec<Uuid>,
}

pub struct RbacService;

impl RbacService {
    pub async fn create_permission(
        pool: &SqlitePool,
        data: CreatePermission,
    ) -> Result<Permission, RbacError> {
        if Permission::find_by_code(pool, &data.code).await?.is_some() {
            return Err(RbacError::DuplicateCode(data.code));
        }
        if let Some(parent_id) = data.parent_id {
            Permission::find_by_id(pool, parent_id)
                .await?
                .ok_or(RbacError::UnknownParent(parent_id))?;
        }

        let permission = Permission::create(pool, &data).await?;
        info!(permission_id = %permission.id, code = %permission.code, "permission created");
        Ok(permission)
    }

    pub async fn update_permission(
        pool: &SqlitePool,
        id: Uuid,
        data: UpdatePermission,
    ) -> Result<Permission, RbacError> {
        if let Some(Some(parent_id)) = data.parent_id {
            if parent_id == id {
                return Err(RbacError::SelfParent);
            }
            Self::check_no_cycle(pool, id, parent_id).await?;
        }

        Permission::update(pool, id, &data)
            .await?
            .ok_or(RbacError::PermissionNotFound(id))
    }

    /// Walk the ancestor chain of the proposed parent. Reaching `id`
    /// means the parent is a descendant and the move would close a
    /// cycle, trapping both nodes outside the tree.
    async fn check_no_cycle(
        pool: &SqlitePool,
        id: Uuid,
        parent_id: Uuid,
    ) -> Result<(), RbacError> {
        let mut seen = HashSet::new();
        let mut cursor = parent_id;
        loop {
            if cursor == id {
                return Err(RbacError::DescendantParent);
            }
            if !seen.insert(cursor) {
                // Existing data already loops; the move itself is safe.
                return Ok(());
            }
            match Permission::find_by_id(pool, cursor).await? {
                Some(ancestor) => match ancestor.parent_id {
                    Some(next) => cursor = next,
                    None => return Ok(()),
                },
                None if cursor == parent_id => {
                    return Err(RbacError::UnknownParent(parent_id));
                }
                None => return Ok(()),
            }
        }
    }

    /// Delete a permission. Rejected while child permissions exist.
    pub async fn delete_permission(pool: &SqlitePool, id: Uuid) -> Result<(), RbacError> {
        if Permission::count_children(pool, id).await? > 0 {
            return Err(RbacError::HasChildren);
        }
        let deleted = Permission::delete(pool, id).await?;
        if deleted == 0 {
            return Err(RbacError::PermissionNotFound(id));
        }
        Ok(())
    }

    pub async fn list_permissions(pool: &SqlitePool) -> Result<Vec<Permission>, RbacError> {
        Ok(Permission::find_all(pool).await?)
    }

    /// Materialize the flat permission rows into a nested tree.
    pub async fn permission_tree(pool: &SqlitePool) -> Result<Vec<PermissionNode>, RbacError> {
        let permissions = Permission::find_all(pool).await?;
        Ok(build_tree(permissions))
    }

    pub async fn create_role(pool: &SqlitePool, data: CreateRole) -> Result<Role, RbacError> {
        let role = Role::create(pool, &data).await?;
        info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    pub async fn update_role(
        pool: &SqlitePool,
        id: Uuid,
        data: UpdateRole,
    ) -> Result<Role, RbacError> {
        Role::update(pool, id, &data)
            .await?
            .ok_or(RbacError::RoleNotFound(id))
    }

    pub async fn delete_role(pool: &SqlitePool, id: Uuid) -> Result<(), RbacError> {
        let deleted = Role::delete(pool, id).await?;
        if deleted == 0 {
            return Err(RbacError::RoleNotFound(id));
        }
        Ok(())
    }

    pub async fn list_roles(pool: &SqlitePool) -> Result<Vec<RoleWithPermissions>, RbacError> {
        let roles = Role::find_all(pool).await?;
        let mut out = Vec::with_capacity(roles.len());
        for role in roles {
            let permission_ids = RolePermission::find_by_role_id(pool, role.id)
                .await?
                .into_iter()
                .map(|rp| rp.permission_id)
                .collect();
            out.push(RoleWithPermissions {
                role,
                permission_ids,
            });
        }
        Ok(out)
    }

    /// Replace a role's permission set with the given ids.
    ///
    /// Unknown ids are rejected before any write; duplicates in the
    /// request are collapsed. The old set is deleted and the new one
    /// inserted in a single transaction.
    pub async fn assign_permissions(
        pool: &SqlitePool,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> Result<Vec<Permission>, RbacError> {
        Role::find_by_id(pool, role_id)
            .await?
            .ok_or(RbacError::RoleNotFound(role_id))?;

        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = permission_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        for id in &unique {
            Permission::find_by_id(pool, *id)
                .await?
                .ok_or(RbacError::PermissionNotFound(*id))?;
        }

        let mut tx = pool.begin().await?;
        RolePermission::replace_for_role(&mut tx, role_id, &unique).await?;
        tx.commit().await?;

        info!(role_id = %role_id, count = unique.len(), "role permissions replaced");

        Ok(Permission::find_by_role_id(pool, role_id).await?)
    }

    pub async fn role_permissions(
        pool: &SqlitePool,
        role_id: Uuid,
    ) -> Result<Vec<Permission>, RbacError> {
        Role::find_by_id(pool, role_id)
            .await?
            .ok_or(RbacError::RoleNotFound(role_id))?;
        Ok(Permission::find_by_role_id(pool, role_id).await?)
    }
}

/// Nest permissions under their parents by `parent_id`.
///
/// Rows whose parent id does not match any row are surfaced as roots
/// rather than dropped, and so are rows trapped in a parent cycle:
/// one member of each cycle is promoted to a root so the rest of the
/// cycle and its descendants stay visible under it. Sibling order
/// follows the input order, which the queries keep sorted by `code`.
pub fn build_tree(permissions: Vec<Permission>) -> Vec<PermissionNode> {
    let known: HashSet<Uuid> = permissions.iter().map(|p| p.id).collect();

    let mut by_id: HashMap<Uuid, Permission> = HashMap::new();
    let mut child_ids: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut root_ids: Vec<Uuid> = Vec::new();

    for permission in permissions {
        match permission.parent_id {
            Some(parent_id) if known.contains(&parent_id) && parent_id != permission.id => {
                child_ids.entry(parent_id).or_default().push(permission.id);
            }
            _ => root_ids.push(permission.id),
        }
        by_id.insert(permission.id, permission);
    }

    fn mark_reachable(
        from: Uuid,
        child_ids: &HashMap<Uuid, Vec<Uuid>>,
        reachable: &mut HashSet<Uuid>,
    ) {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                if let Some(children) = child_ids.get(&id) {
                    stack.extend(children.iter().copied());
                }
            }
        }
    }

    let mut reachable: HashSet<Uuid> = HashSet::new();
    for id in &root_ids {
        mark_reachable(*id, &child_ids, &mut reachable);
    }

    // Anything still unreachable sits in a parent cycle. Promote the
    // member with the smallest code, detach it from its parent, and
    // repeat until every row has a path to a root.
    while reachable.len() < by_id.len() {
        let Some(promoted) = by_id
            .values()
            .filter(|p| !reachable.contains(&p.id))
            .min_by(|a, b| a.code.cmp(&b.code))
            .map(|p| p.id)
        else {
            break;
        };

        if let Some(parent_id) = by_id[&promoted].parent_id {
            if let Some(siblings) = child_ids.get_mut(&parent_id) {
                siblings.retain(|id| *id != promoted);
            }
        }
        root_ids.push(promoted);
        mark_reachable(promoted, &child_ids, &mut reachable);
    }

    fn attach(
        permission: Permission,
        by_id: &mut HashMap<Uuid, Permission>,
        child_ids: &HashMap<Uuid, Vec<Uuid>>,
    ) -> PermissionNode {
        let mut children = Vec::new();
        if let Some(ids) = child_ids.get(&permission.id) {
            for id in ids.clone() {
                if let Some(child) = by_id.remove(&id) {
                    children.push(attach(child, by_id, child_ids));
                }
            }
        }
        PermissionNode {
            permission,
            children,
        }
    }

    let mut tree = Vec::new();
    for id in root_ids {
        if let Some(root) = by_id.remove(&id) {
            tree.push(attach(root, &mut by_id, &child_ids));
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::permission::PermissionType;

    use super::*;

    fn permission(code: &str, parent_id: Option<Uuid>) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            name: code.to_string(),
            code: code.to_string(),
            permission_type: PermissionType::Page,
            description: None,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let root = permission("article", None);
        let child_a = permission("article:list", Some(root.id));
        let child_b = permission("article:write", Some(root.id));
        let grandchild = permission("article:write:publish", Some(child_b.id));
        let other_root = permission("system", None);

        let tree = build_tree(vec![
            root.clone(),
            child_a.clone(),
            child_b.clone(),
            grandchild.clone(),
            other_root.clone(),
        ]);

        assert_eq!(tree.len(), 2);
        let article = tree.iter().find(|n| n.permission.id == root.id).unwrap();
        assert_eq!(article.children.len(), 2);
        let write = article
            .children
            .iter()
            .find(|n| n.permission.id == child_b.id)
            .unwrap();
        assert_eq!(write.children.len(), 1);
        assert_eq!(write.children[0].permission.id, grandchild.id);

        let system = tree.iter().find(|n| n.permission.id == other_root.id).unwrap();
        assert!(system.children.is_empty());
    }

    #[test]
    fn orphaned_rows_become_roots() {
        let orphan = permission("dangling", Some(Uuid::new_v4()));
        let tree = build_tree(vec![orphan.clone()]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].permission.id, orphan.id);
    }

    #[test]
    fn cycle_rows_are_surfaced_not_dropped() {
        // a and b point at each other; c hangs off a
        let mut a = permission("a", None);
        let mut b = permission("b", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        let c = permission("c", Some(a.id));

        let tree = build_tree(vec![a.clone(), b.clone(), c.clone()]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].permission.id, a.id);
        let child_ids: Vec<Uuid> = tree[0].children.iter().map(|n| n.permission.id).collect();
        assert!(child_ids.contains(&b.id));
        assert!(child_ids.contains(&c.id));

        fn count(nodes: &[PermissionNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        assert_eq!(count(&tree), 3);
    }

    #[test]
    fn self_parenting_row_becomes_a_root() {
        let mut looped = permission("loop", None);
        looped.parent_id = Some(looped.id);

        let tree = build_tree(vec![looped.clone()]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].permission.id, looped.id);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        assert!(build_tree(Vec::new()).is_empty());
    }

    async fn seed_permissions(pool: &SqlitePool, codes: &[&str]) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for code in codes {
            let created = RbacService::create_permission(
                pool,
                CreatePermission {
                    name: code.to_string(),
                    code: code.to_string(),
                    permission_type: PermissionType::Button,
                    description: None,
                    parent_id: None,
                },
            )
            .await
            .unwrap();
            ids.push(created.id);
        }
        ids
    }

    #[tokio::test]
    async fn assignment_replaces_prior_set() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["a", "b", "c"]).await;
        let role = RbacService::create_role(
            pool,
            CreateRole {
                name: "editor".to_string(),
                description: None,
                status: db::models::role::RoleStatus::Active,
            },
        )
        .await
        .unwrap();

        RbacService::assign_permissions(pool, role.id, vec![ids[0], ids[1]])
            .await
            .unwrap();

        // Second assignment replaces, it does not merge
        let assigned = RbacService::assign_permissions(pool, role.id, vec![ids[2]])
            .await
            .unwrap();

        let codes: Vec<&str> = assigned.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["c"]);
    }

    #[tokio::test]
    async fn assignment_rejects_unknown_permission() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["a"]).await;
        let role = RbacService::create_role(
            pool,
            CreateRole {
                name: "viewer".to_string(),
                description: None,
                status: db::models::role::RoleStatus::Active,
            },
        )
        .await
        .unwrap();
        RbacService::assign_permissions(pool, role.id, vec![ids[0]])
            .await
            .unwrap();

        let err = RbacService::assign_permissions(pool, role.id, vec![Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::PermissionNotFound(_)));

        // Failed assignment leaves the existing set untouched
        let assigned = RbacService::role_permissions(pool, role.id).await.unwrap();
        assert_eq!(assigned.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_collapsed() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["a"]).await;
        let role = RbacService::create_role(
            pool,
            CreateRole {
                name: "dup".to_string(),
                description: None,
                status: db::models::role::RoleStatus::Active,
            },
        )
        .await
        .unwrap();

        let assigned = RbacService::assign_permissions(pool, role.id, vec![ids[0], ids[0]])
            .await
            .unwrap();
        assert_eq!(assigned.len(), 1);
    }

    #[tokio::test]
    async fn delete_permission_with_children_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let parent = RbacService::create_permission(
            pool,
            CreatePermission {
                name: "system".to_string(),
                code: "system".to_string(),
                permission_type: PermissionType::Page,
                description: None,
                parent_id: None,
            },
        )
        .await
        .unwrap();
        RbacService::create_permission(
            pool,
            CreatePermission {
                name: "system users".to_string(),
                code: "system:user".to_string(),
                permission_type: PermissionType::Page,
                description: None,
                parent_id: Some(parent.id),
            },
        )
        .await
        .unwrap();

        let err = RbacService::delete_permission(pool, parent.id).await.unwrap_err();
        assert!(matches!(err, RbacError::HasChildren));
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        seed_permissions(pool, &["a"]).await;
        let err = RbacService::create_permission(
            pool,
            CreatePermission {
                name: "again".to_string(),
                code: "a".to_string(),
                permission_type: PermissionType::Page,
                description: None,
                parent_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RbacError::DuplicateCode(_)));
    }

    async fn seed_child(pool: &SqlitePool, code: &str, parent_id: Uuid) -> Uuid {
        RbacService::create_permission(
            pool,
            CreatePermission {
                name: code.to_string(),
                code: code.to_string(),
                permission_type: PermissionType::Page,
                description: None,
                parent_id: Some(parent_id),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn reparenting_under_a_descendant_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["root"]).await;
        let child = seed_child(pool, "root:child", ids[0]).await;
        let grandchild = seed_child(pool, "root:child:leaf", child).await;

        // Direct child and deeper descendant both close a cycle
        for parent in [child, grandchild] {
            let err = RbacService::update_permission(
                pool,
                ids[0],
                UpdatePermission {
                    name: None,
                    permission_type: None,
                    description: None,
                    parent_id: Some(Some(parent)),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, RbacError::DescendantParent));
        }

        // The rejected moves left the row untouched
        let root = Permission::find_by_id(pool, ids[0]).await.unwrap().unwrap();
        assert_eq!(root.parent_id, None);
    }

    #[tokio::test]
    async fn reparenting_to_self_is_rejected() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["a"]).await;
        let err = RbacService::update_permission(
            pool,
            ids[0],
            UpdatePermission {
                name: None,
                permission_type: None,
                description: None,
                parent_id: Some(Some(ids[0])),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RbacError::SelfParent));
    }

    #[tokio::test]
    async fn update_omitting_parent_keeps_it_and_null_clears_it() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["root"]).await;
        let child = seed_child(pool, "root:child", ids[0]).await;

        // A rename that says nothing about parentId keeps the parent
        let renamed: UpdatePermission =
            serde_json::from_str(r#"{"name": "renamed"}"#).unwrap();
        assert_eq!(renamed.parent_id, None);
        let updated = RbacService::update_permission(pool, child, renamed)
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.parent_id, Some(ids[0]));

        // An explicit null moves the row to the root
        let cleared: UpdatePermission =
            serde_json::from_str(r#"{"parentId": null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));
        let updated = RbacService::update_permission(pool, child, cleared)
            .await
            .unwrap();
        assert_eq!(updated.parent_id, None);
    }

    #[tokio::test]
    async fn deleting_role_removes_join_rows() {
        let db = db::DBService::new_in_memory().await.unwrap();
        let pool = &db.pool;

        let ids = seed_permissions(pool, &["a", "b"]).await;
        let role = RbacService::create_role(
            pool,
            CreateRole {
                name: "ephemeral".to_string(),
                description: None,
                status: db::models::role::RoleStatus::Active,
            },
        )
        .await
        .unwrap();
        RbacService::assign_permissions(pool, role.id, ids.clone())
            .await
            .unwrap();

        RbacService::delete_role(pool, role.id).await.unwrap();

        let leftover = RolePermission::find_by_role_id(pool, role.id).await.unwrap();
        assert!(leftover.is_empty());

        // Permissions themselves survive the role
        assert_eq!(RbacService::list_permissions(pool).await.unwrap().len(), 2);
    }
}
