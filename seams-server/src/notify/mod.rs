//! Live notifications
//!
//! Domain changes are published to rooms; each connected client listens to
//! `everyone`, its role room and its own user room. See [`hub`] for the
//! ordering and backpressure rules.

pub mod hub;

pub use hub::{Frame, Notification, NotificationHub, Subscription};

use std::fmt;

use seams_core::{EventStatus, Role};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::{Event, Registration};

/// Delivery target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Everyone,
    Role(Role),
    User(Uuid),
}

impl Room {
    /// Rooms a signed-in user listens to
    pub fn for_user(user_id: Uuid, role: Role) -> Vec<Room> {
        vec![Room::Everyone, Room::Role(role), Room::User(user_id)]
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Everyone => f.write_str("everyone"),
            Room::Role(role) => write!(f, "role:{}", role),
            Room::User(id) => write!(f, "user:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EventCreated,
    EventUpdated,
    EventDeleted,
    EventStatusUpdated,
    EventApproved,
    RegistrationCreated,
    RegistrationRejected,
    AttendanceVerified,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EventCreated => "event_created",
            NotificationKind::EventUpdated => "event_updated",
            NotificationKind::EventDeleted => "event_deleted",
            NotificationKind::EventStatusUpdated => "event_status_updated",
            NotificationKind::EventApproved => "event_approved",
            NotificationKind::RegistrationCreated => "registration_created",
            NotificationKind::RegistrationRejected => "registration_rejected",
            NotificationKind::AttendanceVerified => "attendance_verified",
        }
    }
}

fn event_summary(event: &Event) -> serde_json::Value {
    json!({
        "id": event.id,
        "title": event.title,
        "date": event.date,
        "category": event.category,
        "status": event.status,
        "organizer_id": event.organizer_id,
    })
}

/// Organizer and admins; students too once the event is public
fn event_audience(event: &Event) -> Vec<Room> {
    let mut rooms = vec![Room::Role(Role::Admin), Room::User(event.organizer_id)];
    if event.status == EventStatus::Approved {
        rooms.push(Room::Role(Role::Student));
    }
    rooms
}

/// Routing of domain changes to rooms
impl NotificationHub {
    pub fn event_created(&self, event: &Event) {
        self.publish(
            NotificationKind::EventCreated,
            vec![Room::Everyone],
            event_summary(event),
        );
    }

    pub fn event_updated(&self, event: &Event) {
        self.publish(
            NotificationKind::EventUpdated,
            event_audience(event),
            event_summary(event),
        );
    }

    pub fn event_deleted(&self, event: &Event) {
        self.publish(
            NotificationKind::EventDeleted,
            event_audience(event),
            json!({ "id": event.id, "title": event.title }),
        );
    }

    pub fn event_status_updated(&self, event: &Event, previous: EventStatus) {
        let mut payload = event_summary(event);
        payload["previous_status"] = json!(previous);
        self.publish(
            NotificationKind::EventStatusUpdated,
            vec![Room::Role(Role::Admin), Room::User(event.organizer_id)],
            payload,
        );
        if event.status == EventStatus::Approved {
            self.publish(
                NotificationKind::EventApproved,
                vec![Room::Role(Role::Student)],
                event_summary(event),
            );
        }
    }

    pub fn registration_created(&self, registration: &Registration, event: &Event) {
        self.publish(
            NotificationKind::RegistrationCreated,
            vec![Room::User(event.organizer_id), Room::Role(Role::Admin)],
            json!({
                "registration_id": registration.id,
                "event_id": event.id,
                "event_title": event.title,
                "student_id": registration.student_id,
                "registered_count": event.registered_count,
            }),
        );
    }

    pub fn registration_rejected(&self, registration: &Registration, event: &Event) {
        self.publish(
            NotificationKind::RegistrationRejected,
            vec![
                Room::User(event.organizer_id),
                Room::Role(Role::Admin),
                Room::User(registration.student_id),
            ],
            json!({
                "registration_id": registration.id,
                "event_id": event.id,
                "event_title": event.title,
                "student_id": registration.student_id,
            }),
        );
    }

    pub fn attendance_verified(&self, registration: &Registration, event: &Event, points: i32) {
        self.publish(
            NotificationKind::AttendanceVerified,
            vec![
                Room::User(event.organizer_id),
                Room::User(registration.student_id),
            ],
            json!({
                "registration_id": registration.id,
                "event_id": event.id,
                "event_title": event.title,
                "student_id": registration.student_id,
                "points_awarded": points,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use chrono::{NaiveDate, Utc};
    use futures_util::Stream;
    use seams_core::{EventCategory, RegistrationStatus};

    /// One subscriber per audience the routing distinguishes
    struct Listeners {
        organizer_id: Uuid,
        student_id: Uuid,
        admin: Subscription,
        organizer: Subscription,
        student: Subscription,
        other_student: Subscription,
        faculty: Subscription,
    }

    impl Listeners {
        fn new(hub: &NotificationHub) -> Self {
            let organizer_id = Uuid::new_v4();
            let student_id = Uuid::new_v4();
            let listen = |id, role| hub.subscribe(Room::for_user(id, role), None);
            Self {
                organizer_id,
                student_id,
                admin: listen(Uuid::new_v4(), Role::Admin),
                organizer: listen(organizer_id, Role::Coordinator),
                student: listen(student_id, Role::Student),
                other_student: listen(Uuid::new_v4(), Role::Student),
                faculty: listen(Uuid::new_v4(), Role::Faculty),
            }
        }
    }

    /// Kinds delivered so far
    fn kinds(sub: &mut Subscription) -> Vec<&'static str> {
        let waker = futures_util::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut out = Vec::new();
        while let Poll::Ready(Some(frame)) = Pin::new(&mut *sub).poll_next(&mut cx) {
            if let Frame::Notification(n) = frame {
                out.push(n.kind.as_str());
            }
        }
        out
    }

    fn event(organizer_id: Uuid, status: EventStatus) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "Robotics Expo".into(),
            description: "Demos".into(),
            date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            time: "10:00".into(),
            end_date: None,
            end_time: None,
            venue: "Lab 3".into(),
            category: EventCategory::Technical,
            points: 10,
            max_participants: None,
            registered_count: 1,
            poster: None,
            coordinators: Vec::new(),
            organizer_id,
            status,
            qr_nonce: None,
            qr_active: false,
            qr_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn registration(student_id: Uuid, event: &Event) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            student_id,
            event_id: event.id,
            status: RegistrationStatus::Registered,
            registered_at: Utc::now(),
            attended_at: None,
            verified_by: None,
            points_awarded: 0,
        }
    }

    #[test]
    fn test_event_created_reaches_everyone() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        hub.event_created(&event(l.organizer_id, EventStatus::Pending));

        for sub in [
            &mut l.admin,
            &mut l.organizer,
            &mut l.student,
            &mut l.other_student,
            &mut l.faculty,
        ] {
            assert_eq!(kinds(sub), vec!["event_created"]);
        }
    }

    #[test]
    fn test_pending_event_changes_skip_students() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        let pending = event(l.organizer_id, EventStatus::Pending);
        hub.event_updated(&pending);
        hub.event_deleted(&pending);

        assert_eq!(kinds(&mut l.admin), vec!["event_updated", "event_deleted"]);
        assert_eq!(kinds(&mut l.organizer), vec!["event_updated", "event_deleted"]);
        assert!(kinds(&mut l.student).is_empty());
        assert!(kinds(&mut l.faculty).is_empty());
    }

    #[test]
    fn test_approved_event_changes_reach_students() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        let approved = event(l.organizer_id, EventStatus::Approved);
        hub.event_updated(&approved);
        hub.event_deleted(&approved);

        assert_eq!(kinds(&mut l.student), vec!["event_updated", "event_deleted"]);
        assert_eq!(kinds(&mut l.other_student), vec!["event_updated", "event_deleted"]);
        assert!(kinds(&mut l.faculty).is_empty());
    }

    #[test]
    fn test_approval_announces_to_students() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        hub.event_status_updated(
            &event(l.organizer_id, EventStatus::Approved),
            EventStatus::Pending,
        );

        assert_eq!(kinds(&mut l.admin), vec!["event_status_updated"]);
        assert_eq!(kinds(&mut l.organizer), vec!["event_status_updated"]);
        assert_eq!(kinds(&mut l.student), vec!["event_approved"]);
        assert!(kinds(&mut l.faculty).is_empty());
    }

    #[test]
    fn test_rejection_review_stays_with_admin_and_organizer() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        hub.event_status_updated(
            &event(l.organizer_id, EventStatus::Rejected),
            EventStatus::Pending,
        );

        assert_eq!(kinds(&mut l.admin), vec!["event_status_updated"]);
        assert_eq!(kinds(&mut l.organizer), vec!["event_status_updated"]);
        assert!(kinds(&mut l.student).is_empty());
    }

    #[test]
    fn test_registration_notifications() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        let ev = event(l.organizer_id, EventStatus::Approved);
        let reg = registration(l.student_id, &ev);

        hub.registration_created(&reg, &ev);
        hub.registration_rejected(&reg, &ev);

        let both = vec!["registration_created", "registration_rejected"];
        assert_eq!(kinds(&mut l.admin), both);
        assert_eq!(kinds(&mut l.organizer), both);
        assert_eq!(kinds(&mut l.student), vec!["registration_rejected"]);
        assert!(kinds(&mut l.other_student).is_empty());
        assert!(kinds(&mut l.faculty).is_empty());
    }

    #[test]
    fn test_attendance_verified_skips_admins() {
        let hub = NotificationHub::new(64, 64);
        let mut l = Listeners::new(&hub);
        let ev = event(l.organizer_id, EventStatus::Approved);
        hub.attendance_verified(&registration(l.student_id, &ev), &ev, 10);

        assert_eq!(kinds(&mut l.organizer), vec!["attendance_verified"]);
        assert_eq!(kinds(&mut l.student), vec!["attendance_verified"]);
        assert!(kinds(&mut l.admin).is_empty());
        assert!(kinds(&mut l.other_student).is_empty());
    }

    #[test]
    fn test_room_names() {
        let id = Uuid::nil();
        assert_eq!(Room::Everyone.to_string(), "everyone");
        assert_eq!(Room::Role(Role::Admin).to_string(), "role:admin");
        assert_eq!(
            Room::User(id).to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_kind_serializes_as_wire_name() {
        for kind in [
            NotificationKind::EventCreated,
            NotificationKind::EventStatusUpdated,
            NotificationKind::AttendanceVerified,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }
}
