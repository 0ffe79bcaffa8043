//! Repository layer: typed data-access operations per entity family.
//!
//! Repositories are free functions over a shared `&KvStore` handle. All
//! multi-item invariants (uniqueness registries, canonical/projection
//! pairs, the checkout write set) are enforced here through the store's
//! conditional transactions; nothing above this layer touches keys or
//! conditions directly.

pub mod checkout;
pub mod followup;
pub mod patient;
pub mod preset;
pub mod token;
pub mod user;
pub mod visit;

use serde::de::DeserializeOwned;

use crate::errors::DataError;
use crate::store::{cursor, Item, LastKey, Page};

/// One page of decoded entities plus the opaque continuation cursor to
/// feed into the next call.
#[derive(Debug)]
pub struct PageOf<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

pub(crate) fn decode_page<T: DeserializeOwned>(page: Page) -> Result<PageOf<T>, DataError> {
    let items = page
        .items
        .iter()
        .map(Item::decode)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(PageOf {
        items,
        cursor: page.last_key.as_ref().map(cursor::encode),
    })
}

/// Cursors decode defensively: anything malformed restarts from the top.
pub(crate) fn parse_cursor(token: Option<&str>) -> Option<LastKey> {
    token.and_then(cursor::decode)
}

#[cfg(test)]
mod tests {
    //! Cross-entity scenarios exercising the full front-desk flow.

    use chrono::NaiveDate;

    use crate::config;
    use crate::errors::DataError;
    use crate::models::*;
    use crate::store::KvStore;

    use super::{checkout, patient, user, visit};

    fn store() -> KvStore {
        KvStore::open_in_memory().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_doctor(store: &KvStore) -> User {
        user::create_user(
            store,
            NewUser {
                email: "dr.mehta@clinic.example".into(),
                name: "Dr. Mehta".into(),
                role: UserRole::Doctor,
                password_hash: "argon2id$stub".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn full_visit_lifecycle_through_checkout() {
        let store = store();
        let doctor = seeded_doctor(&store);
        let p = patient::create_patient(
            &store,
            NewPatient {
                name: "Asha Rao".into(),
                phone: "9876543210".into(),
                gender: None,
                dob: None,
                address: None,
            },
        )
        .unwrap();

        let today = config::clinic_today();
        let v = visit::create_visit(
            &store,
            NewVisit {
                patient_id: p.id,
                doctor_id: doctor.id,
                date: today,
                kind: VisitKind::Consult,
                zero_billed: false,
            },
        )
        .unwrap();
        assert_eq!(v.status, VisitStatus::Queued);

        let v = visit::advance_visit_status(&store, &v.id, VisitStatus::InProgress).unwrap();
        let v = visit::advance_visit_status(&store, &v.id, VisitStatus::Done).unwrap();
        assert_eq!(v.status, VisitStatus::Done);

        let input = BillInput::new(
            vec![BillLine {
                description: "Consultation".into(),
                quantity: 1,
                unit_amount: 500,
            }],
            50,
            0,
        );
        let billing = checkout::checkout(&store, &v.id, input.clone()).unwrap();
        assert_eq!(billing.subtotal, 500);
        assert_eq!(billing.discount_amount, 50);
        assert_eq!(billing.tax_amount, 0);
        assert_eq!(billing.total, 450);
        assert!(billing.bill_number.starts_with('B'));

        // Idempotency: the second attempt must collapse to a duplicate.
        let err = checkout::checkout(&store, &v.id, input).unwrap_err();
        assert!(matches!(err, DataError::DuplicateCheckout));

        // Both the canonical item and the projection carry the bill.
        let canonical = visit::get_visit(&store, &v.id).unwrap();
        assert_eq!(canonical.billing_amount, Some(450));
        assert!(canonical.checked_out);
        let history = visit::patient_visits(&store, &p.id, 10, None).unwrap();
        assert_eq!(history.items.len(), 1);
        assert_eq!(history.items[0].billing_amount, Some(450));
        assert_eq!(history.items[0].bill_number, canonical.bill_number);
    }

    #[test]
    fn queue_reflects_status_transitions() {
        let store = store();
        let doctor = seeded_doctor(&store);
        let d = date(2024, 3, 1);
        let mut ids = Vec::new();
        for (name, phone) in [("Asha Rao", "9876543210"), ("Vikram Iyer", "9876500000")] {
            let p = patient::create_patient(
                &store,
                NewPatient {
                    name: name.into(),
                    phone: phone.into(),
                    gender: None,
                    dob: None,
                    address: None,
                },
            )
            .unwrap();
            let v = visit::create_visit(
                &store,
                NewVisit {
                    patient_id: p.id,
                    doctor_id: doctor.id,
                    date: d,
                    kind: VisitKind::Consult,
                    zero_billed: false,
                },
            )
            .unwrap();
            ids.push(v.id);
        }

        let queue = visit::doctor_queue(&store, &doctor.id, d, 10, None).unwrap();
        assert_eq!(queue.items.len(), 2);
        assert!(queue.items.iter().all(|v| v.status == VisitStatus::Queued));

        // Advancing one visit regroups it ahead of QUEUED in the sort
        // order (DONE < IN_PROGRESS < QUEUED lexicographically).
        visit::advance_visit_status(&store, &ids[0], VisitStatus::InProgress).unwrap();
        let queue = visit::doctor_queue(&store, &doctor.id, d, 10, None).unwrap();
        assert_eq!(queue.items[0].id, ids[0]);
        assert_eq!(queue.items[0].status, VisitStatus::InProgress);
        assert_eq!(queue.items[1].status, VisitStatus::Queued);
    }

    #[test]
    fn soft_deleted_patient_blocks_new_visits() {
        let store = store();
        let doctor = seeded_doctor(&store);
        let p = patient::create_patient(
            &store,
            NewPatient {
                name: "Asha Rao".into(),
                phone: "9876543210".into(),
                gender: None,
                dob: None,
                address: None,
            },
        )
        .unwrap();
        patient::soft_delete_patient(&store, &p.id).unwrap();

        let err = visit::create_visit(
            &store,
            NewVisit {
                patient_id: p.id,
                doctor_id: doctor.id,
                date: date(2024, 3, 1),
                kind: VisitKind::Consult,
                zero_billed: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DataError::NotFound { entity_type: "patient", .. }));

        // The (phone, name) pair is free for a fresh registration.
        patient::create_patient(
            &store,
            NewPatient {
                name: "Asha Rao".into(),
                phone: "9876543210".into(),
                gender: None,
                dob: None,
                address: None,
            },
        )
        .unwrap();
    }
}
