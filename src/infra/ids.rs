use std::sync::Mutex;

use uuid::Uuid;

use crate::domain::RequestId;

pub trait RequestIdGenerator: Send + Sync {
    fn next_id(&self) -> RequestId;
}

/// Random v4 UUIDs.
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl RequestIdGenerator for UuidGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::new_v4()
    }
}

/// Sequential ids (`00000000-0000-0000-0000-000000000001`, ...), for tests
/// and reproducible logs.
#[derive(Debug, Default)]
pub struct SequentialGenerator {
    next: Mutex<u128>,
}

impl RequestIdGenerator for SequentialGenerator {
    fn next_id(&self) -> RequestId {
        let mut next = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *next += 1;
        RequestId::from_uuid(Uuid::from_u128(*next))
    }
}
