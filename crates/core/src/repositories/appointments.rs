//! Appointment booking.
//!
//! A booking runs as a fixed sequence of checks followed by three writes and one event:
//!
//! 1. the caller must be a patient with a subject claim,
//! 2. `doctorId`, `slotISO` and an allowed `chiefComplaint` must be present,
//! 3. vitals are sanitised,
//! 4. the slot must parse and lie in the future,
//! 5. the doctor must exist, the slot must be published (if the doctor publishes any), and no
//!    appointment may already hold the (doctor, slot) pair,
//! 6. the appointment, its health-index snapshot and the `latest` snapshot are written, then
//!    `BOOKED` is emitted.
//!
//! The appointment write is conditional on the (doctor, slot) index being empty, so two
//! requests racing past the check in step 5 cannot both succeed. The three writes are not
//! transactional: if a snapshot write fails the appointment stays in place and the failure is
//! logged with the step reached.

use crate::constants::{BOOKED_EVENT, DOCTOR_SLOT_INDEX};
use crate::models::{to_item, Appointment, AppointmentStatus, HealthIndexRecord};
use crate::slot::SlotTime;
use crate::store::{Item, Key, KeyCondition, StoreError, Stores};
use crate::vitals::{is_truthy, sanitize_vitals};
use crate::{ClinicError, ClinicResult, CoreConfig};
use api_shared::{require_role, AuthError, Claims, CreateAppointmentReq, CreateAppointmentRes};
use chrono::{DateTime, Utc};
use clinic_types::{NonEmptyText, Role};
use clinic_ulid::Ulid;
use serde_json::Value;
use std::sync::Arc;

/// Books appointments for authenticated patients.
#[derive(Clone)]
pub struct AppointmentService {
    cfg: Arc<CoreConfig>,
    stores: Stores,
}

impl AppointmentService {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self { cfg, stores }
    }

    /// Book an appointment at the current time.
    ///
    /// See [`AppointmentService::create_at`].
    pub fn create(
        &self,
        claims: &Claims,
        req: CreateAppointmentReq,
    ) -> ClinicResult<CreateAppointmentRes> {
        self.create_at(claims, req, Utc::now())
    }

    /// Book an appointment, treating `now` as the current instant.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Auth`] if the caller is not a patient or has no subject claim.
    /// - [`ClinicError::Validation`] for missing fields, an unknown complaint, invalid vitals,
    ///   an unparseable or past slot, or a slot the doctor has not published.
    /// - [`ClinicError::NotFound`] if `doctorId` is not a doctor.
    /// - [`ClinicError::Conflict`] if the slot is already booked.
    /// - [`ClinicError::Store`] if a read or write fails.
    pub fn create_at(
        &self,
        claims: &Claims,
        req: CreateAppointmentReq,
        now: DateTime<Utc>,
    ) -> ClinicResult<CreateAppointmentRes> {
        require_role(claims, &[Role::Patient])?;
        let patient_id = claims.subject().ok_or(AuthError::Unauthenticated)?;

        let (doctor_id, slot_raw) = match (
            NonEmptyText::from_optional(req.doctor_id.as_deref()),
            NonEmptyText::from_optional(req.slot_iso.as_deref()),
        ) {
            (Some(doctor_id), Some(slot_raw)) => (doctor_id, slot_raw),
            _ => return Err(ClinicError::validation("doctorId and slotISO are required")),
        };
        let chief_complaint = req
            .chief_complaint
            .filter(|c| self.cfg.allow_lists().is_complaint(c))
            .ok_or_else(|| ClinicError::validation("chiefComplaint required"))?;

        let vitals = req
            .vitals
            .filter(is_truthy)
            .unwrap_or_else(|| Value::Object(Default::default()));
        let vitals_summary = sanitize_vitals(&vitals)?;

        let slot = SlotTime::parse(slot_raw.as_str())?;
        slot.ensure_future(now)?;

        let published = self.published_slots(doctor_id.as_str())?;
        slot.ensure_published(&published)?;

        let slot_iso = slot.canonical();
        let slot_key =
            KeyCondition::eq("doctorId", doctor_id.as_str()).and_eq("slotISO", slot_iso.as_str());
        let clashes = self
            .stores
            .appointments
            .query(DOCTOR_SLOT_INDEX, &slot_key, Some(1))?;
        if !clashes.is_empty() {
            tracing::info!(doctor_id = %doctor_id, slot = %slot_iso, "slot already booked");
            return Err(ClinicError::Conflict("slot not available".into()));
        }

        let appointment = Appointment {
            appointment_id: Ulid::generate(),
            doctor_id: doctor_id.into_inner(),
            patient_id: patient_id.to_string(),
            slot_iso,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
            chief_complaint,
            recommended_specialty: req.recommended_specialty,
            vitals_summary,
        };
        let appointment_item = to_item(&appointment)?;

        self.persist(&appointment, appointment_item.clone(), &slot_key)?;

        if let Err(e) = self
            .stores
            .events
            .emit(BOOKED_EVENT, &Value::Object(appointment_item))
        {
            tracing::warn!(
                appointment_id = %appointment.appointment_id,
                "booked event not emitted: {}",
                e
            );
        }

        tracing::info!(
            appointment_id = %appointment.appointment_id,
            doctor_id = %appointment.doctor_id,
            slot = %appointment.slot_iso,
            "appointment booked"
        );

        Ok(CreateAppointmentRes {
            appointment_id: appointment.appointment_id.to_string(),
            status: appointment.status.as_str().to_string(),
        })
    }

    /// Availability published by `doctor_id`.
    ///
    /// Fails with [`ClinicError::NotFound`] unless the id resolves to a user with the
    /// `DOCTOR` role.
    fn published_slots(&self, doctor_id: &str) -> ClinicResult<Vec<String>> {
        let doctor = self
            .stores
            .users
            .get(&Key::partition(doctor_id))?
            .filter(|item| item.get("role").and_then(Value::as_str) == Some(Role::Doctor.as_str()))
            .ok_or_else(|| ClinicError::NotFound("doctor not found".into()))?;

        Ok(doctor
            .get("doctorProfile")
            .and_then(|profile| profile.get("availSlots"))
            .and_then(Value::as_array)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn persist(
        &self,
        appointment: &Appointment,
        appointment_item: Item,
        slot_key: &KeyCondition,
    ) -> ClinicResult<()> {
        match self
            .stores
            .appointments
            .put_unique(appointment_item, DOCTOR_SLOT_INDEX, slot_key)
        {
            Ok(()) => {}
            Err(StoreError::ConditionFailed(_)) => {
                tracing::info!(
                    doctor_id = %appointment.doctor_id,
                    slot = %appointment.slot_iso,
                    "slot taken by a concurrent booking"
                );
                return Err(ClinicError::Conflict("slot not available".into()));
            }
            Err(e) => return Err(e.into()),
        }

        for record in HealthIndexRecord::pair_for(appointment) {
            let written = to_item(&record)
                .and_then(|item| self.stores.health_index.put(item).map_err(ClinicError::from));
            if let Err(e) = written {
                tracing::error!(
                    appointment_id = %appointment.appointment_id,
                    record_id = %record.record_id,
                    "appointment written but health index update failed: {}",
                    e
                );
                return Err(e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LATEST_RECORD_ID;
    use crate::events::RecordingEventSink;
    use crate::store::{
        appointments_table, health_index_table, users_table, Filter, MemoryTable, StoreResult,
        Table,
    };
    use chrono::{Duration, SecondsFormat, Timelike};
    use serde_json::json;

    struct Fixture {
        service: AppointmentService,
        appointments: Arc<dyn Table>,
        health_index: Arc<dyn Table>,
        users: Arc<dyn Table>,
        events: Arc<RecordingEventSink>,
    }

    fn fixture_with(appointments: Arc<dyn Table>, health_index: Arc<dyn Table>) -> Fixture {
        let users: Arc<dyn Table> = Arc::new(users_table("users"));
        let events = Arc::new(RecordingEventSink::new());
        let stores = Stores {
            users: users.clone(),
            appointments: appointments.clone(),
            health_index: health_index.clone(),
            events: events.clone(),
        };
        Fixture {
            service: AppointmentService::new(Arc::new(CoreConfig::default()), stores),
            appointments,
            health_index,
            users,
            events,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Arc::new(appointments_table("appointments")),
            Arc::new(health_index_table("health-index")),
        )
    }

    fn add_user(fx: &Fixture, value: Value) {
        match value {
            Value::Object(item) => fx.users.put(item).unwrap(),
            _ => panic!("user must be an object"),
        }
    }

    fn add_doctor(fx: &Fixture, id: &str, slots: &[String]) {
        add_user(
            fx,
            json!({
                "userId": id,
                "role": "DOCTOR",
                "doctorProfile": {"specialty": "Cardiology", "availSlots": slots},
            }),
        );
    }

    fn patient() -> Claims {
        Claims::for_subject("patient-1", Role::Patient)
    }

    fn iso(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn tomorrow() -> String {
        iso(Utc::now() + Duration::days(1))
    }

    fn request(doctor_id: &str, slot: &str) -> CreateAppointmentReq {
        CreateAppointmentReq {
            doctor_id: Some(doctor_id.into()),
            slot_iso: Some(slot.into()),
            chief_complaint: Some("Chest pain".into()),
            recommended_specialty: Some("Cardiology".into()),
            vitals: Some(json!({
                "heightCm": 180,
                "weightKg": 81,
                "bloodPressureSystolic": 120,
                "bloodPressureDiastolic": 80,
                "heartRate": 64,
                "allergies": ["None"],
                "ldl": 130,
            })),
        }
    }

    fn all(table: &Arc<dyn Table>) -> Vec<Item> {
        table.scan(&Filter::And(vec![])).unwrap()
    }

    fn assert_nothing_written(fx: &Fixture) {
        assert!(all(&fx.appointments).is_empty());
        assert!(all(&fx.health_index).is_empty());
        assert!(fx.events.events().is_empty());
    }

    #[test]
    fn books_with_permissive_availability() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);

        let res = fx.service.create(&patient(), request("doc-1", &tomorrow())).unwrap();

        assert_eq!(res.status, "PENDING");
        assert_eq!(res.appointment_id.len(), 26);
        assert!(Ulid::is_canonical(&res.appointment_id));

        let stored = fx
            .appointments
            .get(&Key::partition(res.appointment_id.as_str()))
            .unwrap()
            .unwrap();
        assert_eq!(stored["patientId"], "patient-1");
        assert_eq!(stored["doctorId"], "doc-1");
        assert_eq!(stored["status"], "PENDING");
        assert_eq!(stored["recommendedSpecialty"], "Cardiology");
        assert_eq!(stored["vitalsSummary"]["bmi"], 25.0);
        assert_eq!(stored["vitalsSummary"]["ldl"], 130.0);
        assert!(stored["slotISO"].as_str().unwrap().ends_with("+00:00"));
        assert_eq!(stored["createdAt"], stored["updatedAt"]);
    }

    #[test]
    fn writes_history_and_latest_snapshots_then_emits() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);

        let res = fx.service.create(&patient(), request("doc-1", &tomorrow())).unwrap();

        let history = fx
            .health_index
            .get(&Key::composite("patient-1", res.appointment_id.as_str()))
            .unwrap()
            .unwrap();
        let latest = fx
            .health_index
            .get(&Key::composite("patient-1", LATEST_RECORD_ID))
            .unwrap()
            .unwrap();
        assert_eq!(history["chiefComplaint"], "Chest pain");
        assert_eq!(history["summary"], latest["summary"]);
        assert_eq!(latest["recordId"], "latest");

        let events = fx.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "BOOKED");
        assert_eq!(events[0].1["appointmentId"], res.appointment_id.as_str());
        assert_eq!(events[0].1["vitalsSummary"]["heightCm"], 180.0);
    }

    #[test]
    fn past_slot_is_rejected_without_writes() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);
        let past = iso(Utc::now() - Duration::seconds(1));

        let err = fx.service.create(&patient(), request("doc-1", &past)).unwrap_err();

        assert!(matches!(&err, ClinicError::Validation(m) if m == "slot must be in the future"));
        assert_nothing_written(&fx);
    }

    #[test]
    fn malformed_slot_is_rejected() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);

        let err = fx
            .service
            .create(&patient(), request("doc-1", "next tuesday"))
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "slotISO must be ISO-8601 timestamp");
    }

    #[test]
    fn second_booking_of_same_slot_conflicts() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);
        let slot = tomorrow();

        fx.service.create(&patient(), request("doc-1", &slot)).unwrap();
        let other_patient = Claims::for_subject("patient-2", Role::Patient);
        let err = fx
            .service
            .create(&other_patient, request("doc-1", &slot))
            .unwrap_err();

        assert!(matches!(&err, ClinicError::Conflict(m) if m == "slot not available"));
        assert_eq!(all(&fx.appointments).len(), 1);
        assert_eq!(fx.events.events().len(), 1);
    }

    #[test]
    fn differently_formatted_same_slot_conflicts() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);
        let at = Utc::now() + Duration::days(2);

        fx.service
            .create(&patient(), request("doc-1", &iso(at)))
            .unwrap();
        let offset_form = at.to_rfc3339_opts(SecondsFormat::Secs, false);
        let err = fx
            .service
            .create(&patient(), request("doc-1", &offset_form))
            .unwrap_err();

        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn same_slot_with_other_doctor_is_fine() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);
        add_doctor(&fx, "doc-2", &[]);
        let slot = tomorrow();

        fx.service.create(&patient(), request("doc-1", &slot)).unwrap();
        fx.service.create(&patient(), request("doc-2", &slot)).unwrap();

        assert_eq!(all(&fx.appointments).len(), 2);
    }

    #[test]
    fn published_availability_is_enforced() {
        let fx = fixture();
        let at = (Utc::now() + Duration::days(3)).with_nanosecond(0).unwrap();
        let published = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        add_doctor(&fx, "doc-1", &[published]);

        let unpublished = iso(at + Duration::minutes(30));
        let err = fx
            .service
            .create(&patient(), request("doc-1", &unpublished))
            .unwrap_err();
        assert!(matches!(&err, ClinicError::Validation(m) if m == "slot not published by doctor"));

        fx.service
            .create(&patient(), request("doc-1", &iso(at)))
            .unwrap();
    }

    #[test]
    fn unknown_doctor_is_not_found() {
        let fx = fixture();
        add_user(&fx, json!({"userId": "pat-9", "role": "PATIENT"}));

        for doctor_id in ["missing", "pat-9"] {
            let err = fx
                .service
                .create(&patient(), request(doctor_id, &tomorrow()))
                .unwrap_err();
            assert!(matches!(&err, ClinicError::NotFound(m) if m == "doctor not found"));
        }
        assert_nothing_written(&fx);
    }

    #[test]
    fn only_patients_may_book() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);

        let doctor = Claims::for_subject("doc-1", Role::Doctor);
        let err = fx.service.create(&doctor, request("doc-1", &tomorrow())).unwrap_err();
        assert_eq!(err.status_code(), 403);

        let anonymous = Claims::new();
        let err = fx
            .service
            .create(&anonymous, request("doc-1", &tomorrow()))
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn patient_without_subject_is_unauthenticated() {
        let fx = fixture();
        let claims = Claims::new().with(api_shared::auth::ROLE_CLAIM, "PATIENT");

        let err = fx.service.create(&claims, request("doc-1", &tomorrow())).unwrap_err();

        assert!(matches!(err, ClinicError::Auth(AuthError::Unauthenticated)));
    }

    #[test]
    fn required_fields_are_checked() {
        let fx = fixture();

        let mut req = request("doc-1", &tomorrow());
        req.doctor_id = Some("  ".into());
        let err = fx.service.create(&patient(), req).unwrap_err();
        assert_eq!(err.to_string(), "doctorId and slotISO are required");

        let mut req = request("doc-1", &tomorrow());
        req.slot_iso = None;
        let err = fx.service.create(&patient(), req).unwrap_err();
        assert_eq!(err.to_string(), "doctorId and slotISO are required");

        let mut req = request("doc-1", &tomorrow());
        req.chief_complaint = Some("Sneezing".into());
        let err = fx.service.create(&patient(), req).unwrap_err();
        assert_eq!(err.to_string(), "chiefComplaint required");
    }

    #[test]
    fn vitals_errors_surface_as_validation() {
        let fx = fixture();
        add_doctor(&fx, "doc-1", &[]);

        let mut req = request("doc-1", &tomorrow());
        req.vitals = None;
        let err = fx.service.create(&patient(), req).unwrap_err();
        assert!(matches!(&err, ClinicError::Validation(m) if m.starts_with("Missing vital")));

        let mut req = request("doc-1", &tomorrow());
        req.vitals = Some(json!("tall"));
        let err = fx.service.create(&patient(), req).unwrap_err();
        assert_eq!(err.to_string(), "vitals must be an object");
        assert_nothing_written(&fx);
    }

    /// Appointments table whose index query misses concurrent writes, as if another request
    /// committed between the existence check and the write.
    struct StaleIndexTable(MemoryTable);

    impl Table for StaleIndexTable {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn get(&self, key: &Key) -> StoreResult<Option<Item>> {
            self.0.get(key)
        }
        fn put(&self, item: Item) -> StoreResult<()> {
            self.0.put(item)
        }
        fn put_unique(&self, item: Item, index: &str, condition: &KeyCondition) -> StoreResult<()> {
            self.0.put_unique(item, index, condition)
        }
        fn query(&self, _: &str, _: &KeyCondition, _: Option<usize>) -> StoreResult<Vec<Item>> {
            Ok(Vec::new())
        }
        fn scan(&self, filter: &Filter) -> StoreResult<Vec<Item>> {
            self.0.scan(filter)
        }
    }

    #[test]
    fn conditional_write_closes_check_then_write_race() {
        let fx = fixture_with(
            Arc::new(StaleIndexTable(appointments_table("appointments"))),
            Arc::new(health_index_table("health-index")),
        );
        add_doctor(&fx, "doc-1", &[]);
        let slot = tomorrow();

        fx.service.create(&patient(), request("doc-1", &slot)).unwrap();
        let err = fx.service.create(&patient(), request("doc-1", &slot)).unwrap_err();

        assert!(matches!(err, ClinicError::Conflict(_)));
        assert_eq!(all(&fx.appointments).len(), 1);
        assert_eq!(fx.events.events().len(), 1);
    }

    struct UnavailableTable;

    impl Table for UnavailableTable {
        fn name(&self) -> &str {
            "health-index"
        }
        fn get(&self, _: &Key) -> StoreResult<Option<Item>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn put(&self, _: Item) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn put_unique(&self, _: Item, _: &str, _: &KeyCondition) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn query(&self, _: &str, _: &KeyCondition, _: Option<usize>) -> StoreResult<Vec<Item>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn scan(&self, _: &Filter) -> StoreResult<Vec<Item>> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn snapshot_failure_leaves_appointment_in_place() {
        let fx = fixture_with(
            Arc::new(appointments_table("appointments")),
            Arc::new(UnavailableTable),
        );
        add_doctor(&fx, "doc-1", &[]);

        let err = fx.service.create(&patient(), request("doc-1", &tomorrow())).unwrap_err();

        assert!(matches!(err, ClinicError::Store(StoreError::Unavailable(_))));
        assert_eq!(err.status_code(), 500);
        assert_eq!(all(&fx.appointments).len(), 1);
        assert!(fx.events.events().is_empty());
    }
}
