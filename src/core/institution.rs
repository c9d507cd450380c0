//! Institution business logic - department linking and lookups.
//!
//! A department is claimed by quoting its shared `department_code`. The link is
//! stored on the department row, which keeps "at most one institution per
//! department" a property of the schema rather than of two lists kept in sync.

use crate::{
    entities::{Department, Institution, department, institution},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Lists every institution, alphabetically.
pub async fn list_institutions(db: &DatabaseConnection) -> Result<Vec<institution::Model>> {
    Institution::find()
        .order_by_asc(institution::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an institution by id, failing with `NotFound` when missing.
pub async fn get_institution<C>(db: &C, institution_id: i64) -> Result<institution::Model>
where
    C: ConnectionTrait,
{
    Institution::find_by_id(institution_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Institution", institution_id))
}

/// Finds a department by id, failing with `NotFound` when missing.
pub async fn get_department<C>(db: &C, department_id: i64) -> Result<department::Model>
where
    C: ConnectionTrait,
{
    Department::find_by_id(department_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Department", department_id))
}

/// Links the department with `department_code` to `institution_id`.
///
/// Linking a department that is already linked to the same institution is a
/// no-op. A department linked elsewhere is refused with `Conflict`; it must be
/// released before another institution can claim it.
#[tracing::instrument(skip(db))]
pub async fn link_department(
    db: &DatabaseConnection,
    institution_id: i64,
    department_code: &str,
) -> Result<department::Model> {
    get_institution(db, institution_id).await?;

    let code = department_code.trim();
    let dept = Department::find()
        .filter(department::Column::DepartmentCode.eq(code))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Department", code))?;

    match dept.institution_id {
        Some(current) if current == institution_id => Ok(dept),
        Some(_) => Err(Error::Conflict {
            message: format!("Department '{code}' is already linked to another institution"),
        }),
        None => {
            let mut active: department::ActiveModel = dept.into();
            active.institution_id = Set(Some(institution_id));
            let updated = active.update(db).await?;
            tracing::info!(
                "Linked department {} to institution {}",
                updated.id,
                institution_id
            );
            Ok(updated)
        }
    }
}

/// Lists departments linked to an institution, alphabetically.
pub async fn linked_departments<C>(db: &C, institution_id: i64) -> Result<Vec<department::Model>>
where
    C: ConnectionTrait,
{
    Department::find()
        .filter(department::Column::InstitutionId.eq(institution_id))
        .order_by_asc(department::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_link_department() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;
        let dept = create_test_department(&db, "ROADS", "Roads").await?;
        assert_eq!(dept.institution_id, None);

        let linked = link_department(&db, inst.id, "ROADS").await?;
        assert_eq!(linked.institution_id, Some(inst.id));

        let listed = linked_departments(&db, inst.id).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, dept.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_link_department_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;
        create_test_department(&db, "ROADS", "Roads").await?;

        link_department(&db, inst.id, "ROADS").await?;
        let again = link_department(&db, inst.id, "ROADS").await?;
        assert_eq!(again.institution_id, Some(inst.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_department_links_to_one_institution_only() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_institution(&db, "City").await?;
        let second = create_test_institution(&db, "County").await?;
        create_test_department(&db, "ROADS", "Roads").await?;

        link_department(&db, first.id, "ROADS").await?;
        let result = link_department(&db, second.id, "ROADS").await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        assert!(linked_departments(&db, second.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_link_unknown_code() -> Result<()> {
        let db = setup_test_db().await?;
        let inst = create_test_institution(&db, "City").await?;

        let result = link_department(&db, inst.id, "NOPE").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_institutions_sorted() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_institution(&db, "Zeta Board").await?;
        create_test_institution(&db, "Alpha Trust").await?;

        let names: Vec<String> = list_institutions(&db)
            .await?
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Alpha Trust", "Zeta Board"]);
        Ok(())
    }
}
