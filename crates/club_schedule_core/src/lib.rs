pub mod absence;
pub mod clock;
pub mod domain;
pub mod error;
pub mod makeup;
pub mod memory;
pub mod occurrences;
pub mod policy;
pub mod ports;
pub mod service;

pub use absence::{Absence, AbsenceState, AbsenceStatus, Makeup};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Actor, AssignmentStatus, ClassCancellation, ClassOccurrence, ClassSlot, MemberClassAssignment,
    NewClassSlot, Role, SlotAvailability,
};
pub use error::{ScheduleError, ScheduleResult};
pub use memory::InMemoryStore;
pub use policy::SchedulePolicy;
pub use ports::{DatabaseService, PortError, PortResult};
pub use service::ScheduleService;
