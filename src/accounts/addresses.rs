use uuid::Uuid;

use super::dto::AddressInput;
use super::repo_types::Address;
use crate::error::ApiError;

/// What an address submission should do to the list. The asymmetry is
/// deliberate product behavior: a colliding `addressType` is rejected
/// outright, while a matching id merges the submitted fields in place.
#[derive(Debug, PartialEq, Eq)]
pub enum AddressUpsert {
    Insert(Address),
    MergeById { index: usize, merged: Address },
}

/// Decides how `input` lands in `existing` without touching storage.
pub fn plan_upsert(existing: &[Address], input: AddressInput) -> Result<AddressUpsert, ApiError> {
    if existing.iter().any(|a| a.address_type == input.address_type) {
        return Err(ApiError::DuplicateAddressType(input.address_type));
    }

    if let Some(id) = input.id {
        if let Some(index) = existing.iter().position(|a| a.id == id) {
            let mut merged = existing[index].clone();
            merged.address_type = input.address_type;
            merged.country = input.country;
            merged.city = input.city;
            merged.address1 = input.address1;
            if input.address2.is_some() {
                merged.address2 = input.address2;
            }
            if input.zip_code.is_some() {
                merged.zip_code = input.zip_code;
            }
            return Ok(AddressUpsert::MergeById { index, merged });
        }
    }

    Ok(AddressUpsert::Insert(Address {
        id: Uuid::new_v4(),
        address_type: input.address_type,
        country: input.country,
        city: input.city,
        address1: input.address1,
        address2: input.address2,
        zip_code: input.zip_code,
    }))
}

pub fn apply_upsert(mut existing: Vec<Address>, plan: AddressUpsert) -> Vec<Address> {
    match plan {
        AddressUpsert::Insert(address) => existing.push(address),
        AddressUpsert::MergeById { index, merged } => existing[index] = merged,
    }
    existing
}

/// Removes any entry matching `address_id`. A miss is a no-op, not an error.
pub fn remove(existing: Vec<Address>, address_id: Uuid) -> Vec<Address> {
    existing
        .into_iter()
        .filter(|a| a.id != address_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home(id: Uuid) -> Address {
        Address {
            id,
            address_type: "home".into(),
            country: "DE".into(),
            city: "Berlin".into(),
            address1: "Unter den Linden 1".into(),
            address2: None,
            zip_code: Some("10117".into()),
        }
    }

    fn input(address_type: &str) -> AddressInput {
        AddressInput {
            id: None,
            address_type: address_type.into(),
            country: "DE".into(),
            city: "Hamburg".into(),
            address1: "Speicherstadt 2".into(),
            address2: None,
            zip_code: None,
        }
    }

    #[test]
    fn new_type_is_inserted_and_assigned_an_id() {
        let existing = vec![home(Uuid::new_v4())];
        let plan = plan_upsert(&existing, input("office")).unwrap();
        let updated = apply_upsert(existing, plan);
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1].address_type, "office");
    }

    #[test]
    fn colliding_type_is_rejected_and_list_unchanged() {
        let existing = vec![home(Uuid::new_v4())];
        let err = plan_upsert(&existing, input("home")).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateAddressType(t) if t == "home"));
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn matching_id_merges_in_place() {
        let id = Uuid::new_v4();
        let existing = vec![home(id)];
        let mut submitted = input("work");
        submitted.id = Some(id);
        submitted.address2 = Some("Floor 3".into());
        let plan = plan_upsert(&existing, submitted).unwrap();
        let updated = apply_upsert(existing, plan);
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, id);
        assert_eq!(updated[0].address_type, "work");
        assert_eq!(updated[0].city, "Hamburg");
        assert_eq!(updated[0].address2.as_deref(), Some("Floor 3"));
        // fields the client omitted keep their stored value
        assert_eq!(updated[0].zip_code.as_deref(), Some("10117"));
    }

    #[test]
    fn unknown_id_falls_back_to_insert() {
        let existing = vec![home(Uuid::new_v4())];
        let mut submitted = input("office");
        submitted.id = Some(Uuid::new_v4());
        let plan = plan_upsert(&existing, submitted).unwrap();
        assert!(matches!(plan, AddressUpsert::Insert(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let id = Uuid::new_v4();
        let existing = vec![home(id)];
        let after_miss = remove(existing.clone(), Uuid::new_v4());
        assert_eq!(after_miss.len(), 1);
        let after_hit = remove(after_miss, id);
        assert!(after_hit.is_empty());
        let after_second = remove(after_hit, id);
        assert!(after_second.is_empty());
    }
}
